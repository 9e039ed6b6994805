use crate::error::{BackendError, BackendResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const GENERIC_FAILURE: &str = "Request failed";

#[derive(Serialize)]
pub(super) struct TokenForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
}

#[derive(Deserialize)]
pub(super) struct UploadResponse {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub(super) struct AskRequest<'a> {
    pub question: &'a str,
    pub model_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<&'a str>,
}

#[derive(Deserialize)]
pub(super) struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub used_model: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Classify a backend response and decode its success body.
///
/// 2xx decodes into `T`; 401 means the credential is expired or invalid; any
/// other status is a rejection carrying the backend's `detail` message when
/// one is present.
pub fn classify_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> BackendResult<T> {
    if status.is_success() {
        return serde_json::from_str::<T>(body)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::ExpiredOrInvalidCredential);
    }

    Err(BackendError::Rejected {
        status: status.as_u16(),
        message: detail_message(body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
    })
}

fn detail_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(message) if !message.trim().is_empty() => Some(message),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_decodes_body() {
        let answer: AskResponse = classify_response(
            StatusCode::OK,
            r#"{"answer":"42","used_model":"gemini-flash"}"#,
        )
        .unwrap();
        assert_eq!(answer.answer, "42");
        assert_eq!(answer.used_model.as_deref(), Some("gemini-flash"));
    }

    #[test]
    fn test_unauthorized_is_expired_credential() {
        let result = classify_response::<AskResponse>(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Could not validate credentials"}"#,
        );
        assert!(matches!(result, Err(BackendError::ExpiredOrInvalidCredential)));
    }

    #[test]
    fn test_rejection_carries_detail() {
        let result = classify_response::<UploadResponse>(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Only PDF files are supported"}"#,
        );
        match result {
            Err(BackendError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Only PDF files are supported");
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_rejection_without_detail_is_generic() {
        let result = classify_response::<UploadResponse>(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html>Internal Server Error</html>",
        );
        match result {
            Err(BackendError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, GENERIC_FAILURE);
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_structured_detail_is_rendered_as_json() {
        let result = classify_response::<AskResponse>(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","question"],"msg":"field required"}]}"#,
        );
        match result {
            Err(BackendError::Rejected { status, message }) => {
                assert_eq!(status, 422);
                assert!(message.contains("field required"));
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_undecodable_success_is_invalid_response() {
        let result = classify_response::<TokenResponse>(StatusCode::OK, r#"{"token":"abc"}"#);
        assert!(matches!(result, Err(BackendError::InvalidResponse(_))));
    }

    #[test]
    fn test_ask_request_omits_absent_scope() {
        let unscoped = serde_json::to_value(AskRequest {
            question: "What is this?",
            model_type: "flash",
            file_name: None,
        })
        .unwrap();
        assert_eq!(
            unscoped,
            serde_json::json!({"question": "What is this?", "model_type": "flash"})
        );

        let scoped = serde_json::to_value(AskRequest {
            question: "Summarize",
            model_type: "flash",
            file_name: Some("report.pdf"),
        })
        .unwrap();
        assert_eq!(scoped["file_name"], "report.pdf");
    }

    #[test]
    fn test_upload_response_name_is_optional() {
        let accepted: UploadResponse =
            classify_response(StatusCode::OK, r#"{"message":"indexed"}"#).unwrap();
        assert!(accepted.name.is_none());
    }
}
