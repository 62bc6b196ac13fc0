/// Failure taxonomy for a single replay invocation.
///
/// Every variant aborts the invocation. The `Display` output starts with the
/// taxonomy name so that runtimes which only forward a message still report
/// which kind of failure occurred.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("AuthFailure: {message}")]
    AuthFailure { message: String },

    #[error("SourceUnavailable: scan of page {page_index} failed: {message}")]
    SourceUnavailable { page_index: usize, message: String },

    #[error("InvalidCheckpoint: {reason}")]
    InvalidCheckpoint { reason: String },

    #[error("SinkFailure: page {page_index} ({record_count} records) was not accepted: {message}")]
    SinkFailure {
        page_index: usize,
        record_count: usize,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthFailure,
    SourceUnavailable,
    InvalidCheckpoint,
    SinkFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailure => "AuthFailure",
            Self::SourceUnavailable => "SourceUnavailable",
            Self::InvalidCheckpoint => "InvalidCheckpoint",
            Self::SinkFailure => "SinkFailure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReplayError {
    pub fn invalid_checkpoint(reason: impl Into<String>) -> Self {
        Self::InvalidCheckpoint {
            reason: reason.into(),
        }
    }

    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::AuthFailure {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::InvalidCheckpoint { .. } => ErrorKind::InvalidCheckpoint,
            Self::SinkFailure { .. } => ErrorKind::SinkFailure,
        }
    }
}
