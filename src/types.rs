use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Success envelope shared by the `/api` endpoints: `{"code": 0, "result": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub code: u32,
    pub result: T,
}

impl<T> ApiResponse<T> {
    pub const SUCCESS: u32 = 0;

    pub fn ok(result: T) -> Self {
        Self { code: Self::SUCCESS, result }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub password: String,
}

/// Mobile numbers are exactly this many bytes long.
pub const MOBILE_LEN: usize = 11;

impl RegisterRequest {
    /// Trims every field in place and checks the registration rules.
    pub fn validate(&mut self) -> AppResult<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(invalid("name", "Name must not be empty"));
        }
        self.mobile = self.mobile.trim().to_string();
        if self.mobile.len() != MOBILE_LEN {
            return Err(invalid("mobile", "Mobile number is invalid"));
        }
        self.password = self.password.trim().to_string();
        if self.password.is_empty() {
            return Err(invalid("password", "Password must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> AppError {
    AppError::ValidationError { field: field.to_string(), message: message.to_string() }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfTokenResponse {
    pub token: String,
}
