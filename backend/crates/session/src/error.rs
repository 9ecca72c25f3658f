//! Session Error Types
//!
//! This module provides session-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Session-specific result type alias
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific error variants
#[derive(Debug, Error)]
pub enum SessionError {
    /// Identity provider unreachable or failing
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Wrong email or secret
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Sign-up for an email that already has an account
    #[error("Account already registered")]
    AccountExists,

    /// Operation needs a session and there is none
    #[error("No active session")]
    NoActiveSession,

    /// User-record store lookup or write failed
    #[error("User record resolution failed: {0}")]
    RecordResolution(String),

    /// Token refresh rejected or errored
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    /// Operation exceeded its time budget
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// Caller input rejected before reaching the provider
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Manager already torn down
    #[error("Session manager has been disposed")]
    Disposed,

    /// Cached value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local durable storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] platform::StorageError),
}

impl SessionError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::ProviderUnavailable(_) | SessionError::RecordResolution(_) => {
                ErrorKind::Unavailable
            }
            SessionError::InvalidCredentials
            | SessionError::NoActiveSession
            | SessionError::RefreshFailed(_) => ErrorKind::Unauthorized,
            SessionError::AccountExists => ErrorKind::Conflict,
            SessionError::Timeout(_) => ErrorKind::Timeout,
            SessionError::InvalidInput(_) => ErrorKind::InvalidInput,
            SessionError::Disposed | SessionError::Serialization(_) | SessionError::Storage(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Convert to the user-facing AppError
    pub fn to_app_error(&self) -> AppError {
        match self {
            SessionError::ProviderUnavailable(_) => {
                AppError::unavailable("The sign-in service is unreachable.")
                    .with_action("Check your connection and try again.")
            }
            SessionError::InvalidCredentials => {
                AppError::unauthorized("Invalid email or password.")
            }
            SessionError::AccountExists => {
                AppError::conflict("An account with this email already exists.")
                    .with_action("Sign in instead.")
            }
            SessionError::NoActiveSession | SessionError::RefreshFailed(_) => {
                AppError::unauthorized("Your session has ended.").with_action("Please sign in again.")
            }
            SessionError::Timeout(_) => {
                AppError::timeout("The sign-in service took too long to respond.")
            }
            SessionError::InvalidInput(msg) => AppError::invalid_input(msg.clone()),
            other => AppError::new(other.kind(), "Something went wrong. Please try again."),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SessionError::ProviderUnavailable(reason) => {
                tracing::warn!(reason = %reason, "Identity provider unavailable");
            }
            SessionError::RecordResolution(reason) => {
                tracing::warn!(reason = %reason, "User record resolution failed");
            }
            SessionError::RefreshFailed(reason) => {
                tracing::error!(reason = %reason, "Session refresh failed");
            }
            SessionError::Timeout(operation) => {
                tracing::warn!(operation, "Session operation timed out");
            }
            SessionError::Serialization(e) => {
                tracing::error!(error = %e, "Session serialization error");
            }
            SessionError::Storage(e) => {
                tracing::error!(error = %e, "Session storage error");
            }
            SessionError::InvalidCredentials => {
                tracing::warn!("Invalid sign-in attempt");
            }
            _ => {
                tracing::debug!(error = %self, "Session error");
            }
        }
    }
}

impl From<AppError> for SessionError {
    fn from(err: AppError) -> Self {
        SessionError::InvalidInput(err.user_message())
    }
}
