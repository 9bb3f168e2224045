use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    LaunchError(String),

    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("script evaluation failed: {0}")]
    EvaluationError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("page already closed")]
    PageClosed,
}

/// Errors raised by the browser pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down
    #[error("browser pool is closed")]
    Closed,

    /// A new instance could not be created
    #[error("failed to create browser instance: {0}")]
    Create(#[source] BrowserError),
}
