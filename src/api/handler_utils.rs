use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::api::error::ErrorKind;
use crate::media::IntakeError;
use crate::session::slot::SlotError;
use crate::session::{
    settle_all, DispatchHandle, SessionError, SessionSnapshot, Settlement, SlotTicket,
    TransformSession,
};

pub type ApiObject<T> = (StatusCode, Json<T>);

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
    error_kind: ErrorKind,
    error_code: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DispatchQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Serialize)]
struct SessionResponse {
    ok: bool,
    session: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
struct DispatchResponse {
    ok: bool,
    dispatched: Vec<SlotTicket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settlements: Option<Vec<Settlement>>,
    session: SessionSnapshot,
}

pub fn error_response(
    status: StatusCode,
    kind: ErrorKind,
    code: impl Into<String>,
    message: impl Into<String>,
) -> ApiObject<Value> {
    (
        status,
        into_json(ErrorResponse {
            ok: false,
            error: message.into(),
            error_kind: kind,
            error_code: code.into(),
        }),
    )
}

pub fn validation_error(message: impl Into<String>) -> ApiObject<Value> {
    error_response(
        ErrorKind::Validation.status(),
        ErrorKind::Validation,
        "validation_error",
        message,
    )
}

pub fn map_intake_error(error: IntakeError) -> ApiObject<Value> {
    error_response(
        ErrorKind::Validation.status(),
        ErrorKind::Validation,
        "invalid_media",
        error.to_string(),
    )
}

pub fn map_session_error(error: SessionError) -> ApiObject<Value> {
    let message = error.to_string();
    match error {
        SessionError::WrongMode { .. } => {
            error_response(ErrorKind::State.status(), ErrorKind::State, "wrong_mode", message)
        }
        SessionError::NothingToExport { .. } => {
            error_response(ErrorKind::State.status(), ErrorKind::State, "no_result", message)
        }
        SessionError::Slot(SlotError::NoSuchSlot { .. }) => {
            error_response(StatusCode::NOT_FOUND, ErrorKind::Validation, "not_found", message)
        }
        SessionError::Slot(SlotError::ParameterMismatch { .. }) => validation_error(message),
        SessionError::Slot(
            SlotError::InvalidTransition { .. }
            | SlotError::MissingSource { .. }
            | SlotError::SourceAlreadySet { .. },
        ) => error_response(
            ErrorKind::State.status(),
            ErrorKind::State,
            "invalid_state",
            message,
        ),
    }
}

pub fn session_ok(session: &TransformSession) -> ApiObject<Value> {
    (
        StatusCode::OK,
        into_json(SessionResponse {
            ok: true,
            session: session.snapshot(),
        }),
    )
}

pub fn internal_error(message: impl Into<String>) -> ApiObject<Value> {
    let detail = message.into();
    error!(detail = %detail, "internal api error");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Infra,
        "internal_error",
        "Internal server error",
    )
}

pub fn parse_slot_index(raw: &str) -> Result<usize, ApiObject<Value>> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| validation_error(format!("slot index must be a non-negative integer, got '{raw}'")))
}

/// Answers a dispatching call. With `wait` the response is held until every
/// issued request has settled; otherwise it returns 202 with the Loading view.
pub async fn dispatch_response(
    session: &TransformSession,
    handles: Vec<DispatchHandle>,
    wait: bool,
) -> ApiObject<Value> {
    let dispatched = handles
        .iter()
        .map(|handle| *handle.ticket())
        .collect::<Vec<_>>();
    let (status, settlements) = if wait {
        (StatusCode::OK, Some(settle_all(handles).await))
    } else if dispatched.is_empty() {
        (StatusCode::OK, None)
    } else {
        (StatusCode::ACCEPTED, None)
    };

    (
        status,
        into_json(DispatchResponse {
            ok: true,
            dispatched,
            settlements,
            session: session.snapshot(),
        }),
    )
}

pub fn into_json(payload: impl Serialize) -> Json<Value> {
    match serde_json::to_value(payload) {
        Ok(value) => Json(value),
        Err(source) => {
            error!(error = %source, "api payload failed to serialize");
            Json(Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::session::SlotStatus;
    use crate::transform::prompt::Mode;

    #[test]
    fn wrong_mode_maps_to_state_conflict() {
        let (status, payload) = map_session_error(SessionError::WrongMode {
            active: Mode::Age,
            operation: "generate all",
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.0["ok"], json!(false));
        assert_eq!(payload.0["error"], json!("generate all is not available in age mode"));
        assert_eq!(payload.0["error_kind"], json!("state"));
        assert_eq!(payload.0["error_code"], json!("wrong_mode"));
    }

    #[test]
    fn slot_errors_split_between_validation_and_state() {
        let (status, payload) =
            map_session_error(SessionError::Slot(SlotError::NoSuchSlot { index: 5 }));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.0["error_kind"], json!("validation"));

        let (status, payload) = map_session_error(SessionError::Slot(
            SlotError::InvalidTransition {
                index: 0,
                operation: "retry",
                status: SlotStatus::Loading,
            },
        ));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.0["error_code"], json!("invalid_state"));
        assert_eq!(payload.0["error"], json!("slot 0 cannot retry while loading"));
    }

    #[test]
    fn intake_errors_use_invalid_media_code() {
        let (status, payload) = map_intake_error(IntakeError::InvalidMedia);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.0["error"], json!("Please upload an image file"));
        assert_eq!(payload.0["error_code"], json!("invalid_media"));
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let (status, payload) = internal_error("sensitive detail");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload.0["error"], json!("Internal server error"));
        assert_eq!(payload.0["error_kind"], json!("infra"));
        assert_eq!(payload.0["error_code"], json!("internal_error"));
    }

    #[test]
    fn slot_index_must_be_numeric() {
        assert_eq!(parse_slot_index("1").ok(), Some(1));
        let (status, payload) = parse_slot_index("first").expect_err("not a number");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.0["error_code"], json!("validation_error"));
    }
}
