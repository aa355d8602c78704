mod image;
mod mimes;
mod video;

pub(crate) use image::{ImageFormat, ThumbnailFormat};
pub(crate) use video::VideoFormat;

/// How many leading bytes the sniffer wants to see
pub(crate) const SNIFF_LEN: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum InputFormat {
    Image(ImageFormat),
    Video(VideoFormat),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Classification {
    pub(crate) is_video: bool,
    pub(crate) content_type: mime::Mime,
    pub(crate) format: Option<InputFormat>,
}

struct Signature {
    offset: usize,
    magic: &'static [u8],
    format: InputFormat,
}

const fn sig(offset: usize, magic: &'static [u8], format: InputFormat) -> Signature {
    Signature {
        offset,
        magic,
        format,
    }
}

const SIGNATURES: &[Signature] = &[
    sig(
        0,
        b"\x89PNG\r\n\x1a\n",
        InputFormat::Image(ImageFormat::Png),
    ),
    sig(0, b"\xff\xd8\xff", InputFormat::Image(ImageFormat::Jpeg)),
    sig(0, b"GIF87a", InputFormat::Image(ImageFormat::Gif)),
    sig(0, b"GIF89a", InputFormat::Image(ImageFormat::Gif)),
    sig(0, b"BM", InputFormat::Image(ImageFormat::Bmp)),
    sig(0, b"FLV\x01", InputFormat::Video(VideoFormat::Flv)),
    sig(0, b"\x00\x00\x01\xba", InputFormat::Video(VideoFormat::Mpeg)),
    sig(0, b"\x00\x00\x01\xb3", InputFormat::Video(VideoFormat::Mpeg)),
];

const EBML_MAGIC: &[u8] = b"\x1a\x45\xdf\xa3";
const TS_PACKET_LEN: usize = 188;
const TS_SYNC: u8 = 0x47;

impl InputFormat {
    pub(crate) const fn is_video(self) -> bool {
        matches!(self, Self::Video(_))
    }

    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::Image(format) => format.file_extension(),
            Self::Video(format) => format.file_extension(),
        }
    }

    pub(crate) fn media_type(self) -> mime::Mime {
        match self {
            Self::Image(format) => format.media_type(),
            Self::Video(format) => format.media_type(),
        }
    }
}

impl Classification {
    fn unknown() -> Self {
        Classification {
            is_video: false,
            content_type: mime::APPLICATION_OCTET_STREAM,
            format: None,
        }
    }

    fn known(format: InputFormat) -> Self {
        Classification {
            is_video: format.is_video(),
            content_type: format.media_type(),
            format: Some(format),
        }
    }

    pub(crate) fn is_recognized(&self) -> bool {
        self.format.is_some()
    }

    pub(crate) fn file_extension(&self) -> &'static str {
        self.format.map(InputFormat::file_extension).unwrap_or("")
    }
}

/// Decide what kind of media the leading bytes describe
///
/// Anything unrecognized, including empty input, is reported as `application/octet-stream`
/// and not a video.
pub(crate) fn classify(head: &[u8]) -> Classification {
    let head = &head[..head.len().min(SNIFF_LEN)];

    sniff(head).map_or_else(Classification::unknown, Classification::known)
}

fn sniff(head: &[u8]) -> Option<InputFormat> {
    if let Some(format) = sniff_ftyp(head) {
        return Some(format);
    }

    if head.starts_with(b"RIFF") {
        return sniff_riff(head);
    }

    if head.starts_with(EBML_MAGIC) {
        return Some(sniff_ebml(head));
    }

    SIGNATURES
        .iter()
        .find(|signature| matches_at(head, signature.offset, signature.magic))
        .map(|signature| signature.format)
        .or_else(|| is_mpeg_ts(head).then_some(InputFormat::Video(VideoFormat::MpegTs)))
}

fn matches_at(head: &[u8], offset: usize, magic: &[u8]) -> bool {
    head.get(offset..offset + magic.len()) == Some(magic)
}

// ISO base media: size(4) "ftyp" brand(4)
fn sniff_ftyp(head: &[u8]) -> Option<InputFormat> {
    if !matches_at(head, 4, b"ftyp") {
        return None;
    }

    let brand = head.get(8..12)?;

    match brand {
        b"qt  " => Some(InputFormat::Video(VideoFormat::QuickTime)),
        b"avif" | b"avis" => Some(InputFormat::Image(ImageFormat::Avif)),
        b"heic" | b"heix" | b"mif1" | b"msf1" => None,
        _ => Some(InputFormat::Video(VideoFormat::Mp4)),
    }
}

// "RIFF" size(4) form(4)
fn sniff_riff(head: &[u8]) -> Option<InputFormat> {
    match head.get(8..12)? {
        b"WEBP" => Some(InputFormat::Image(ImageFormat::Webp)),
        b"AVI " => Some(InputFormat::Video(VideoFormat::Avi)),
        _ => None,
    }
}

fn sniff_ebml(head: &[u8]) -> InputFormat {
    let is_webm = head.windows(4).any(|window| window == b"webm");

    if is_webm {
        InputFormat::Video(VideoFormat::Webm)
    } else {
        InputFormat::Video(VideoFormat::Matroska)
    }
}

fn is_mpeg_ts(head: &[u8]) -> bool {
    head.first() == Some(&TS_SYNC) && head.get(TS_PACKET_LEN) == Some(&TS_SYNC)
}

#[cfg(test)]
mod tests {
    use super::{classify, ImageFormat, InputFormat, VideoFormat};

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.resize(64, 0);
        bytes
    }

    #[test]
    fn recognizes_images() {
        let cases: &[(&[u8], ImageFormat, &str)] = &[
            (b"\x89PNG\r\n\x1a\n", ImageFormat::Png, "image/png"),
            (b"\xff\xd8\xff\xe0\x00\x10JFIF", ImageFormat::Jpeg, "image/jpeg"),
            (b"GIF89a", ImageFormat::Gif, "image/gif"),
            (b"RIFF\x24\x00\x00\x00WEBPVP8 ", ImageFormat::Webp, "image/webp"),
            (b"\x00\x00\x00\x1cftypavif", ImageFormat::Avif, "image/avif"),
        ];

        for (prefix, format, media_type) in cases {
            let classification = classify(&padded(prefix));

            assert!(!classification.is_video, "{format:?}");
            assert_eq!(classification.format, Some(InputFormat::Image(*format)));
            assert_eq!(classification.content_type.essence_str(), *media_type);
        }
    }

    #[test]
    fn recognizes_videos() {
        let cases: &[(&[u8], VideoFormat)] = &[
            (b"\x00\x00\x00\x20ftypisom", VideoFormat::Mp4),
            (b"\x00\x00\x00\x18ftypmp42", VideoFormat::Mp4),
            (b"\x00\x00\x00\x14ftypqt  ", VideoFormat::QuickTime),
            (b"\x1a\x45\xdf\xa3\x9f\x42\x86\x81\x01\x42\x82\x84webm", VideoFormat::Webm),
            (b"\x1a\x45\xdf\xa3\xa3\x42\x82\x88matroska", VideoFormat::Matroska),
            (b"RIFF\x00\x00\x00\x00AVI LIST", VideoFormat::Avi),
            (b"FLV\x01\x05", VideoFormat::Flv),
            (b"\x00\x00\x01\xba\x44", VideoFormat::Mpeg),
        ];

        for (prefix, format) in cases {
            let classification = classify(&padded(prefix));

            assert!(classification.is_video, "{format:?}");
            assert_eq!(classification.format, Some(InputFormat::Video(*format)));
            assert_eq!(classification.content_type, format.media_type());
        }
    }

    #[test]
    fn recognizes_transport_stream() {
        let mut bytes = vec![0u8; 400];
        bytes[0] = 0x47;
        bytes[188] = 0x47;

        let classification = classify(&bytes);

        assert!(classification.is_video);
        assert_eq!(classification.content_type.essence_str(), "video/mp2t");
    }

    #[test]
    fn unknown_input_fails_closed() {
        let cases: &[&[u8]] = &[
            b"",
            b"hello, world",
            b"RIFF\x00\x00\x00\x00WAVEfmt ",
            b"\x00\x00\x00\x18ftypheic",
            b"OggS\x00\x02",
            &[0x47; 100],
        ];

        for bytes in cases {
            let classification = classify(bytes);

            assert!(!classification.is_video);
            assert!(!classification.is_recognized());
            assert_eq!(classification.content_type, mime::APPLICATION_OCTET_STREAM);
            assert_eq!(classification.file_extension(), "");
        }
    }

    #[test]
    fn only_leading_bytes_matter() {
        let mut bytes = b"hello".to_vec();
        bytes.resize(4096, 0);
        bytes.extend_from_slice(b"\x89PNG\r\n\x1a\n");

        assert!(!classify(&bytes).is_recognized());
    }

    #[test]
    fn extensions_follow_format() {
        assert_eq!(
            classify(&padded(b"\x00\x00\x00\x20ftypisom")).file_extension(),
            ".mp4"
        );
        assert_eq!(classify(&padded(b"\x89PNG\r\n\x1a\n")).file_extension(), ".png");
    }
}
