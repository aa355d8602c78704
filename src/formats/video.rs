#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum VideoFormat {
    Avi,
    Flv,
    Matroska,
    Mp4,
    Mpeg,
    MpegTs,
    QuickTime,
    Webm,
}

impl VideoFormat {
    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::Avi => ".avi",
            Self::Flv => ".flv",
            Self::Matroska => ".mkv",
            Self::Mp4 => ".mp4",
            Self::Mpeg => ".mpg",
            Self::MpegTs => ".ts",
            Self::QuickTime => ".mov",
            Self::Webm => ".webm",
        }
    }

    pub(crate) fn media_type(self) -> mime::Mime {
        match self {
            Self::Avi => super::mimes::video_avi(),
            Self::Flv => super::mimes::video_flv(),
            Self::Matroska => super::mimes::video_matroska(),
            Self::Mp4 => super::mimes::video_mp4(),
            Self::Mpeg => super::mimes::video_mpeg(),
            Self::MpegTs => super::mimes::video_mp2t(),
            Self::QuickTime => super::mimes::video_quicktime(),
            Self::Webm => super::mimes::video_webm(),
        }
    }
}
