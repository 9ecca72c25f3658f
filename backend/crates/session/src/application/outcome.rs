//! Action Outcome
//!
//! Structured result of every public entry point. Failures carry a message
//! that can be shown to the user as-is.

use serde::Serialize;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }
}

impl From<&SessionError> for ActionOutcome {
    fn from(err: &SessionError) -> Self {
        Self::failed(err.to_app_error().user_message())
    }
}

impl From<SessionError> for ActionOutcome {
    fn from(err: SessionError) -> Self {
        Self::from(&err)
    }
}
