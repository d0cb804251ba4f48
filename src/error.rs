use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradebookError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("could not authenticate with the grade store: {0}")]
    Auth(String),

    #[error("grade store access failed: {0}")]
    Store(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("grade entry is not authorized for period {period}; contact the school office")]
    NotAuthorized { period: String },

    #[error("grade entry is only allowed between {start} and {end}")]
    WindowClosed { start: String, end: String },

    #[error("release window date format error: {0}")]
    DateFormat(String),

    #[error("write failed: {0}")]
    Write(String),
}

impl GradebookError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GradebookError::NotFound(_)
                | GradebookError::InvalidInput(_)
                | GradebookError::NotAuthorized { .. }
                | GradebookError::WindowClosed { .. }
                | GradebookError::DateFormat(_)
                | GradebookError::Write(_)
        )
    }
}

impl From<sqlx::Error> for GradebookError {
    fn from(err: sqlx::Error) -> Self {
        GradebookError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GradebookError>;
