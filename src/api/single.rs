use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::handler_utils::{
    dispatch_response, map_intake_error, map_session_error, session_ok, validation_error,
    ApiObject, DispatchQuery,
};
use crate::api::server::AppState;
use crate::media::intake::accept_data_url;
use crate::transform::prompt::{ModeParameter, AGE_RANGE};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetParameterInput {
    pub age: Option<i64>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitInput {
    pub image: Option<String>,
}

pub async fn set_parameter_handler(
    State(state): State<AppState>,
    Json(payload): Json<SetParameterInput>,
) -> ApiObject<Value> {
    let parameter = match parameter_from_input(payload) {
        Ok(parameter) => parameter,
        Err(response) => return response,
    };
    match state.session.set_single_parameter(parameter) {
        Ok(()) => session_ok(&state.session),
        Err(error) => map_session_error(error),
    }
}

pub async fn submit_handler(
    State(state): State<AppState>,
    Query(query): Query<DispatchQuery>,
    Json(payload): Json<SubmitInput>,
) -> ApiObject<Value> {
    let Some(raw) = payload.image.as_deref() else {
        return validation_error("Field 'image' is required");
    };
    let image = match accept_data_url(raw) {
        Ok(image) => image,
        Err(error) => return map_intake_error(error),
    };
    match state.session.submit(image) {
        Ok(handle) => dispatch_response(&state.session, vec![handle], query.wait).await,
        Err(error) => map_session_error(error),
    }
}

pub async fn retry_handler(
    State(state): State<AppState>,
    Query(query): Query<DispatchQuery>,
) -> ApiObject<Value> {
    match state.session.retry_single() {
        Ok(handle) => dispatch_response(&state.session, vec![handle], query.wait).await,
        Err(error) => map_session_error(error),
    }
}

pub async fn reset_handler(State(state): State<AppState>) -> ApiObject<Value> {
    match state.session.reset_single() {
        Ok(()) => session_ok(&state.session),
        Err(error) => map_session_error(error),
    }
}

fn parameter_from_input(payload: SetParameterInput) -> Result<ModeParameter, ApiObject<Value>> {
    match (payload.age, payload.style) {
        (Some(_), Some(_)) => Err(validation_error(
            "Provide either 'age' or 'style', not both",
        )),
        (Some(age), None) => u32::try_from(age)
            .ok()
            .filter(|age| AGE_RANGE.contains(age))
            .map(ModeParameter::Age)
            .ok_or_else(|| {
                validation_error(format!(
                    "Field 'age' must be between {} and {}",
                    AGE_RANGE.start(),
                    AGE_RANGE.end()
                ))
            }),
        (None, Some(style)) => Ok(ModeParameter::Style(style)),
        (None, None) => Err(validation_error("Field 'age' or 'style' is required")),
    }
}
