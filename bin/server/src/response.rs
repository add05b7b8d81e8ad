//! JSON result envelope shared by every endpoint.

use serde::Serialize;

/// Success code.
pub const CODE_OK: i32 = 20000;
/// The request needs a logged-in user.
pub const CODE_NOT_LOGGED_IN: i32 = 40001;
/// Login was attempted with unknown credentials.
pub const CODE_BAD_CREDENTIALS: i32 = 40002;
/// The user lacks the roles the resource requires.
pub const CODE_FORBIDDEN: i32 = 40300;
/// A backing service failed.
pub const CODE_SYSTEM_ERROR: i32 = 50000;

/// `{ flag, code, message, data }` body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub flag: bool,
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            flag: true,
            code: CODE_OK,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response without a payload.
    #[must_use]
    pub fn done() -> Self {
        Self {
            flag: true,
            code: CODE_OK,
            message: "success".to_string(),
            data: None,
        }
    }

    /// Failure response.
    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self {
            flag: false,
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(
            body,
            json!({"flag": true, "code": 20000, "message": "success", "data": [1, 2]})
        );
    }

    #[test]
    fn failure_has_null_data() {
        let body = serde_json::to_value(ApiResponse::fail(CODE_FORBIDDEN, "nope")).unwrap();
        assert_eq!(
            body,
            json!({"flag": false, "code": 40300, "message": "nope", "data": null})
        );
    }
}
