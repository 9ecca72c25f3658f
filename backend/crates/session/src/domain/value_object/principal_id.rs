//! PrincipalId Value Object
//!
//! The identity provider's stable identifier for an authenticated subject.
//! Opaque to this crate: only trimmed and length-checked.

use derive_more::Display;
use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const PRINCIPAL_ID_MAX_LENGTH: usize = 255;

#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> AppResult<Self> {
        let id = id.into().trim().to_string();

        if id.is_empty() {
            return Err(AppError::invalid_input("Principal ID cannot be empty"));
        }
        if id.len() > PRINCIPAL_ID_MAX_LENGTH {
            return Err(AppError::invalid_input(format!(
                "Principal ID must be at most {} characters",
                PRINCIPAL_ID_MAX_LENGTH
            )));
        }

        Ok(Self(id))
    }

    /// Fresh random ID, as issued by providers that use UUID subjects
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PrincipalId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        PrincipalId::new(s)
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
