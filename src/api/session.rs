use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::handler_utils::{into_json, session_ok, validation_error, ApiObject};
use crate::api::server::AppState;
use crate::session::{ModeSwitch, SessionSnapshot};
use crate::transform::prompt::Mode;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeModeInput {
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ChangeModeResponse {
    ok: bool,
    outcome: ModeSwitch,
    session: SessionSnapshot,
}

pub async fn get_session_handler(State(state): State<AppState>) -> ApiObject<Value> {
    session_ok(&state.session)
}

/// A switch requested while a slot is Loading is answered with
/// `rejected_busy` and leaves the session untouched.
pub async fn change_mode_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChangeModeInput>,
) -> ApiObject<Value> {
    let Some(raw) = payload.mode.as_deref() else {
        return validation_error("Field 'mode' is required");
    };
    let Some(mode) = Mode::parse(raw) else {
        return validation_error(format!(
            "Unknown mode '{raw}'; expected one of reverse, age, style, country"
        ));
    };

    let outcome = state.session.change_mode(mode);
    (
        StatusCode::OK,
        into_json(ChangeModeResponse {
            ok: true,
            outcome,
            session: state.session.snapshot(),
        }),
    )
}
