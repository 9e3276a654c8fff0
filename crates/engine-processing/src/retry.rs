use crate::error::UploadError;
use engine_core::retry::RetryDisposition;

/// Connection failures, timeouts, throttling and server errors are transient.
pub fn classify_upload_error(err: &UploadError) -> RetryDisposition {
    match err {
        UploadError::Http { source, .. } if source.is_connect() || source.is_timeout() => {
            RetryDisposition::Retry
        }
        UploadError::Http { .. } => RetryDisposition::Stop,
        UploadError::Status { status, .. } if *status == 429 || *status >= 500 => {
            RetryDisposition::Retry
        }
        UploadError::Status { .. } => RetryDisposition::Stop,
        UploadError::ItemErrors { .. } => RetryDisposition::Stop,
        UploadError::File { .. } | UploadError::Directory { .. } => RetryDisposition::Stop,
        UploadError::Client(_) => RetryDisposition::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retried() {
        let status = |status| UploadError::Status {
            batch_number: 1,
            status,
            body: String::new(),
        };
        assert_eq!(classify_upload_error(&status(503)), RetryDisposition::Retry);
        assert_eq!(classify_upload_error(&status(429)), RetryDisposition::Retry);
        assert_eq!(classify_upload_error(&status(400)), RetryDisposition::Stop);
        assert_eq!(
            classify_upload_error(&UploadError::ItemErrors { batch_number: 1 }),
            RetryDisposition::Stop
        );
    }
}
