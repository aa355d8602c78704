
use std::{path::Path, time::Duration};

use actix_web::web::Bytes;

use crate::{
    error_code::ErrorCode,
    formats::ThumbnailFormat,
    ladder::Dimension,
    probe::ProbeError,
    process::{Process, ProcessError, ProcessLimiter},
};

/// The spooled file the transcoder reads its input from
#[derive(Clone, Copy, Debug)]
pub(crate) struct MediaSource<'a> {
    path: &'a Path,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ArtifactKind {
    Rendition,
    VideoThumbnail {
        format: ThumbnailFormat,
        seek_seconds: f64,
    },
    ImageThumbnail {
        format: ThumbnailFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ArtifactSpec {
    pub(crate) kind: ArtifactKind,
    pub(crate) target: Dimension,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("Invalid media file provided")]
    Path,
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Path => ErrorCode::COMMAND_ERROR,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        match self {
            Self::Process(e) => e.is_client_error(),
            Self::Path => false,
        }
    }
}

impl From<ProcessError> for FfMpegError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

/// The operations the pipeline needs from a transcoder
#[async_trait::async_trait(?Send)]
pub(crate) trait Transcoder {
    async fn probe_dimension(&self, source: &MediaSource<'_>) -> Result<Dimension, ProbeError>;

    async fn probe_duration(&self, source: &MediaSource<'_>) -> Result<f64, ProbeError>;

    async fn transcode(
        &self,
        source: &MediaSource<'_>,
        spec: &ArtifactSpec,
    ) -> Result<Bytes, FfMpegError>;
}

#[derive(Clone, Debug)]
pub(crate) struct FfMpeg {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
    limiter: ProcessLimiter,
}

impl<'a> MediaSource<'a> {
    pub(crate) const fn file(path: &'a Path) -> Self {
        MediaSource { path }
    }

    /// ffmpeg seeks in its input, so it is always named on the command line
    pub(crate) fn input_arg(&self) -> Option<&str> {
        self.path.to_str()
    }
}

impl ArtifactSpec {
    pub(crate) const fn rendition(target: Dimension) -> Self {
        ArtifactSpec {
            kind: ArtifactKind::Rendition,
            target,
        }
    }

    pub(crate) const fn video_thumbnail(
        target: Dimension,
        format: ThumbnailFormat,
        seek_seconds: f64,
    ) -> Self {
        ArtifactSpec {
            kind: ArtifactKind::VideoThumbnail {
                format,
                seek_seconds,
            },
            target,
        }
    }

    pub(crate) const fn image_thumbnail(target: Dimension, format: ThumbnailFormat) -> Self {
        ArtifactSpec {
            kind: ArtifactKind::ImageThumbnail { format },
            target,
        }
    }

    pub(crate) fn media_type(&self) -> mime::Mime {
        match self.kind {
            ArtifactKind::Rendition => crate::formats::VideoFormat::Mp4.media_type(),
            ArtifactKind::VideoThumbnail { format, .. } | ArtifactKind::ImageThumbnail { format } => {
                format.media_type()
            }
        }
    }
}

/// Fit inside the target box, then letterbox to exactly the target size
pub(crate) fn scale_filter(target: Dimension) -> String {
    let Dimension { width, height } = target;

    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
    )
}

pub(crate) fn transcode_args(input: &str, spec: &ArtifactSpec) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-v".into(), "warning".into()];

    match spec.kind {
        ArtifactKind::Rendition => {
            args.extend(
                ["-i", input, "-movflags", "frag_keyframe+empty_moov", "-f", "mp4"]
                    .map(String::from),
            );
        }
        ArtifactKind::VideoThumbnail {
            format,
            seek_seconds,
        } => {
            args.extend([
                "-ss".into(),
                format!("{seek_seconds:.4}"),
                "-i".into(),
                input.into(),
            ]);
            args.extend(frame_args(format));
        }
        ArtifactKind::ImageThumbnail { format } => {
            args.extend(["-i".into(), input.into()]);
            args.extend(frame_args(format));
        }
    }

    args.extend(["-vf".into(), scale_filter(spec.target), "pipe:1".into()]);

    args
}

fn frame_args(format: ThumbnailFormat) -> [String; 6] {
    [
        "-frames:v",
        "1",
        "-codec",
        format.as_ffmpeg_codec(),
        "-f",
        format.as_ffmpeg_format(),
    ]
    .map(String::from)
}

impl FfMpeg {
    pub(crate) fn new(
        ffmpeg_path: String,
        ffprobe_path: String,
        timeout: Duration,
        limiter: ProcessLimiter,
    ) -> Self {
        FfMpeg {
            ffmpeg_path,
            ffprobe_path,
            timeout,
            limiter,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl Transcoder for FfMpeg {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn probe_dimension(&self, source: &MediaSource<'_>) -> Result<Dimension, ProbeError> {
        crate::probe::dimension(&self.ffprobe_path, source, &self.limiter, self.timeout).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn probe_duration(&self, source: &MediaSource<'_>) -> Result<f64, ProbeError> {
        crate::probe::duration(&self.ffprobe_path, source, &self.limiter, self.timeout).await
    }

    #[tracing::instrument(level = "debug", skip(self, source))]
    async fn transcode(
        &self,
        source: &MediaSource<'_>,
        spec: &ArtifactSpec,
    ) -> Result<Bytes, FfMpegError> {
        let input = source.input_arg().ok_or(FfMpegError::Path)?;
        let args = transcode_args(input, spec);

        let process = Process::run(&self.ffmpeg_path, &args, &self.limiter, self.timeout).await?;

        let mut output = Vec::new();
        process.pipe(tokio::io::empty(), &mut output).await?;

        Ok(Bytes::from(output))
    }
}
