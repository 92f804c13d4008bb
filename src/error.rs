use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("feed snapshot unavailable: {0}")]
    FeedUnavailable(String),
    #[error("watcher daemon already running (lock held: {0})")]
    Locked(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommErrorCode {
    E001Locked,
    E002FeedMissing,
    E003ConfigInvalid,
}

impl CommErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002FeedMissing => "E002_FEED_MISSING",
            Self::E003ConfigInvalid => "E003_CONFIG_INVALID",
        }
    }
}

impl CommError {
    pub fn code(&self) -> CommErrorCode {
        match self {
            Self::FeedUnavailable(_) => CommErrorCode::E002FeedMissing,
            Self::Locked(_) => CommErrorCode::E001Locked,
            Self::InvalidConfig(_) => CommErrorCode::E003ConfigInvalid,
        }
    }
}

/// Code for a top-level failure, when it is one of ours.
pub fn code_for(err: &anyhow::Error) -> Option<CommErrorCode> {
    err.downcast_ref::<CommError>().map(CommError::code)
}
