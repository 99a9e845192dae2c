use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::services::otp::is_well_formed_code;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestCodeRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "brand@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyCodeRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "brand@example.com")]
    pub email: String,

    #[validate(custom(function = "validate_code"))]
    #[schema(example = "042917", min_length = 6, max_length = 6)]
    pub code: String,
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if is_well_formed_code(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("code_format");
        err.message = Some("Code must be exactly six digits".into());
        Err(err)
    }
}

/// Same body whether or not a code was actually sent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    #[schema(example = true)]
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeResponse {
    #[schema(example = true)]
    pub ok: bool,
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires.
    #[schema(example = 43200)]
    pub expires_in: i64,
    #[schema(example = "acme-coffee")]
    pub brand_slug: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionInfoResponse {
    pub email: Option<String>,
    #[schema(example = "brand")]
    pub role: String,
    pub brand_slug: Option<String>,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_request_rejects_bad_code_and_email() {
        let ok = VerifyCodeRequest {
            email: "brand@example.com".into(),
            code: "004211".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = VerifyCodeRequest {
            email: "not-an-email".into(),
            code: "12 456".into(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("code"));
    }
}
