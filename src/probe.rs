
use std::time::Duration;

use crate::{
    error_code::ErrorCode,
    ffmpeg::MediaSource,
    ladder::Dimension,
    process::{Process, ProcessError, ProcessLimiter},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("Error in ffprobe process")]
    Process(#[source] ProcessError),

    #[error("Invalid media file provided")]
    Path,

    #[error("Failed to parse ffprobe output {0:?}")]
    Parse(String),

    #[error("Probed resolution {0} is too small")]
    InvalidResolution(Dimension),

    #[error("Probed duration {0} is invalid")]
    InvalidDuration(f64),
}

impl ProbeError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Path => ErrorCode::COMMAND_ERROR,
            Self::Parse(_) => ErrorCode::PROBE_PARSE_ERROR,
            Self::InvalidResolution(_) => ErrorCode::INVALID_RESOLUTION,
            Self::InvalidDuration(_) => ErrorCode::INVALID_DURATION,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        match self {
            Self::Process(e) => e.is_client_error(),
            Self::Path => false,
            Self::Parse(_) | Self::InvalidResolution(_) | Self::InvalidDuration(_) => true,
        }
    }
}

impl From<ProcessError> for ProbeError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

fn dimension_args(input: &str) -> [&str; 10] {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "csv=s=x:p=0",
        "-i",
        input,
    ]
}

fn duration_args(input: &str) -> [&str; 8] {
    [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        "-i",
        input,
    ]
}

/// Parse `WIDTHxHEIGHT` as printed by ffprobe's csv writer
pub(crate) fn parse_dimension(output: &str) -> Result<Dimension, ProbeError> {
    let line = first_line(output);

    let mut fields = line.split('x');

    let (Some(width), Some(height), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(ProbeError::Parse(line.to_string()));
    };

    let (Ok(width), Ok(height)) = (width.trim().parse::<u32>(), height.trim().parse::<u32>())
    else {
        return Err(ProbeError::Parse(line.to_string()));
    };

    let dimension = Dimension::new(width, height);

    if dimension.is_degenerate() {
        return Err(ProbeError::InvalidResolution(dimension));
    }

    Ok(dimension)
}

pub(crate) fn parse_duration(output: &str) -> Result<f64, ProbeError> {
    let line = first_line(output);

    let duration = line
        .parse::<f64>()
        .map_err(|_| ProbeError::Parse(line.to_string()))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(ProbeError::InvalidDuration(duration));
    }

    Ok(duration)
}

fn first_line(output: &str) -> &str {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[tracing::instrument(level = "debug", skip(source, limiter))]
pub(crate) async fn dimension(
    ffprobe_path: &str,
    source: &MediaSource<'_>,
    limiter: &ProcessLimiter,
    timeout: Duration,
) -> Result<Dimension, ProbeError> {
    let input = source.input_arg().ok_or(ProbeError::Path)?;
    let output = run(ffprobe_path, &dimension_args(input), limiter, timeout).await?;

    parse_dimension(&output)
}

#[tracing::instrument(level = "debug", skip(source, limiter))]
pub(crate) async fn duration(
    ffprobe_path: &str,
    source: &MediaSource<'_>,
    limiter: &ProcessLimiter,
    timeout: Duration,
) -> Result<f64, ProbeError> {
    let input = source.input_arg().ok_or(ProbeError::Path)?;
    let output = run(ffprobe_path, &duration_args(input), limiter, timeout).await?;

    parse_duration(&output)
}

async fn run(
    ffprobe_path: &str,
    args: &[&str],
    limiter: &ProcessLimiter,
    timeout: Duration,
) -> Result<String, ProbeError> {
    let process = Process::run(ffprobe_path, args, limiter, timeout).await?;

    let mut output = Vec::new();
    process.pipe(tokio::io::empty(), &mut output).await?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}
