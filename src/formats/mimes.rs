pub(crate) fn image_avif() -> mime::Mime {
    "image/avif".parse().expect("Valid mime")
}

pub(crate) fn image_webp() -> mime::Mime {
    "image/webp".parse().expect("Valid mime")
}

pub(crate) fn video_avi() -> mime::Mime {
    "video/avi".parse().expect("Valid mime")
}

pub(crate) fn video_flv() -> mime::Mime {
    "video/x-flv".parse().expect("Valid mime")
}

pub(crate) fn video_matroska() -> mime::Mime {
    "video/x-matroska".parse().expect("Valid mime")
}

pub(crate) fn video_mp2t() -> mime::Mime {
    "video/mp2t".parse().expect("Valid mime")
}

pub(crate) fn video_mp4() -> mime::Mime {
    "video/mp4".parse().expect("Valid mime")
}

pub(crate) fn video_mpeg() -> mime::Mime {
    "video/mpeg".parse().expect("Valid mime")
}

pub(crate) fn video_quicktime() -> mime::Mime {
    "video/quicktime".parse().expect("Valid mime")
}

pub(crate) fn video_webm() -> mime::Mime {
    "video/webm".parse().expect("Valid mime")
}
