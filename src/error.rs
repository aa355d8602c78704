use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }

    /// The input itself could not be processed, as opposed to a failure on our side
    pub(crate) fn is_client_error(&self) -> bool {
        self.kind().is_some_and(UploadError::is_client_error)
    }

    pub(crate) fn is_unrecognized_format(&self) -> bool {
        matches!(self.kind(), Some(UploadError::UnrecognizedFormat))
    }

    /// Input that no pipeline could ever accept, however often it is retried
    pub(crate) fn is_unprocessable_input(&self) -> bool {
        matches!(
            self.kind(),
            Some(UploadError::UnrecognizedFormat | UploadError::EmptyUpload)
        )
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error reading request body")]
    Payload(#[from] actix_web::error::PayloadError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error probing media")]
    Probe(#[from] crate::probe::ProbeError),

    #[error("Error in ffmpeg")]
    Ffmpeg(#[from] crate::ffmpeg::FfMpegError),

    #[error("Uploaded media is not in a supported format")]
    UnrecognizedFormat,

    #[error("Error building reqwest client")]
    BuildClient(#[source] reqwest::Error),

    #[error("Error configuring TLS for the http client")]
    Tls(#[from] rustls::Error),

    #[error("Error making request")]
    RequestMiddleware(#[from] reqwest_middleware::Error),

    #[error("Error in request response")]
    Request(#[from] reqwest::Error),

    #[error("Unable to download media, bad response {0}")]
    Download(reqwest::StatusCode),

    #[error("Hit limit")]
    Limit(#[from] crate::ingest::LimitError),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("No files present in upload")]
    NoFiles,

    #[error("No media reference provided")]
    MissingUrl,

    #[error("Notification for bucket {0} which is not the input bucket")]
    WrongBucket(String),

    #[error("Failed to decode storage notification")]
    Event(#[from] serde_json::Error),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Payload(_) | Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Store(e) => e.error_code(),
            Self::Probe(e) => e.error_code(),
            Self::Ffmpeg(e) => e.error_code(),
            Self::UnrecognizedFormat => ErrorCode::UNRECOGNIZED_FORMAT,
            Self::BuildClient(_)
            | Self::Tls(_)
            | Self::RequestMiddleware(_)
            | Self::Request(_) => {
                ErrorCode::HTTP_CLIENT_ERROR
            }
            Self::Download(_) => ErrorCode::DOWNLOAD_FILE_ERROR,
            Self::Limit(_) => ErrorCode::VALIDATE_FILE_SIZE,
            Self::EmptyUpload => ErrorCode::VALIDATE_FILE_EMPTY,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::MissingUrl => ErrorCode::MISSING_URL,
            Self::WrongBucket(_) => ErrorCode::WRONG_BUCKET,
            Self::Event(_) => ErrorCode::INVALID_EVENT,
        }
    }

    fn is_client_error(&self) -> bool {
        match self {
            Self::Upload(_)
            | Self::Payload(_)
            | Self::UnrecognizedFormat
            | Self::Limit(_)
            | Self::EmptyUpload
            | Self::NoFiles
            | Self::MissingUrl
            | Self::WrongBucket(_)
            | Self::Event(_) => true,
            Self::Store(e) => e.is_not_found(),
            Self::Probe(e) => e.is_client_error(),
            Self::Ffmpeg(e) => e.is_client_error(),
            Self::Download(status) => status.is_client_error(),
            _ => false,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", format!("{self:?}").replace('\n', "\n  "));
        } else {
            tracing::warn!("Rejected request: {}", format!("{self:?}").replace('\n', "\n  "));
        }

        let msg = if status.is_server_error() {
            "Cannot proceed with processing due to internal error"
        } else {
            "Provided media could not be processed"
        };

        HttpResponse::build(status)
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": msg,
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, ResponseError};

    use super::{Error, UploadError};
    use crate::{
        ffmpeg::FfMpegError,
        ladder::Dimension,
        probe::ProbeError,
        process::ProcessError,
    };

    #[test]
    fn bad_input_is_400() {
        let errors: Vec<Error> = vec![
            UploadError::UnrecognizedFormat.into(),
            UploadError::EmptyUpload.into(),
            UploadError::MissingUrl.into(),
            ProbeError::InvalidResolution(Dimension::new(5, 5)).into(),
            ProbeError::InvalidDuration(-1.0).into(),
        ];

        for error in errors {
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST, "{error:?}");
        }
    }

    #[test]
    fn processing_failures_are_500() {
        let errors: Vec<Error> = vec![
            FfMpegError::Process(ProcessError::Timeout(String::from("ffmpeg"))).into(),
            FfMpegError::Process(ProcessError::NotFound(String::from("ffmpeg"))).into(),
            std::io::Error::new(std::io::ErrorKind::Other, "disk").into(),
            UploadError::Download(reqwest::StatusCode::BAD_GATEWAY).into(),
        ];

        for error in errors {
            assert_eq!(
                error.status_code(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "{error:?}"
            );
        }
    }

    #[test]
    fn response_hides_details() {
        let error: Error = ProbeError::Parse(String::from("secret internal output")).into();

        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = actix_web::body::to_bytes(response.into_body());
        let body = actix_web::rt::System::new().block_on(body).unwrap();
        let body = String::from_utf8_lossy(&body);

        assert!(!body.contains("secret"), "{body}");
        assert!(body.contains("probe-parse-error"), "{body}");
    }
}
