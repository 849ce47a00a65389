use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::handler_utils::{
    dispatch_response, map_intake_error, map_session_error, parse_slot_index, session_ok,
    validation_error, ApiObject, DispatchQuery,
};
use crate::api::server::AppState;
use crate::media::intake::accept_data_url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetCountryInput {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachImageInput {
    pub image: Option<String>,
}

pub async fn set_country_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Json(payload): Json<SetCountryInput>,
) -> ApiObject<Value> {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response,
    };
    let country = match payload.country.as_deref().map(str::trim) {
        Some(country) if !country.is_empty() => country.to_string(),
        _ => return validation_error("Field 'country' is required"),
    };
    match state.session.set_country(index, country.as_str()) {
        Ok(()) => session_ok(&state.session),
        Err(error) => map_session_error(error),
    }
}

pub async fn attach_image_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Json(payload): Json<AttachImageInput>,
) -> ApiObject<Value> {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response,
    };
    let Some(raw) = payload.image.as_deref() else {
        return validation_error("Field 'image' is required");
    };
    let image = match accept_data_url(raw) {
        Ok(image) => image,
        Err(error) => return map_intake_error(error),
    };
    match state.session.attach_country_image(index, image) {
        Ok(()) => session_ok(&state.session),
        Err(error) => map_session_error(error),
    }
}

/// Starts or re-runs one slot. A slot without an image, or one already
/// Loading, is left alone and the response lists no dispatched requests.
pub async fn generate_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Query(query): Query<DispatchQuery>,
) -> ApiObject<Value> {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response,
    };
    match state.session.generate_one(index) {
        Ok(handle) => {
            dispatch_response(&state.session, handle.into_iter().collect(), query.wait).await
        }
        Err(error) => map_session_error(error),
    }
}

pub async fn retry_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Query(query): Query<DispatchQuery>,
) -> ApiObject<Value> {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response,
    };
    match state.session.retry_country(index) {
        Ok(handle) => dispatch_response(&state.session, vec![handle], query.wait).await,
        Err(error) => map_session_error(error),
    }
}

pub async fn reset_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> ApiObject<Value> {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response,
    };
    match state.session.reset_country(index) {
        Ok(()) => session_ok(&state.session),
        Err(error) => map_session_error(error),
    }
}

pub async fn generate_all_handler(
    State(state): State<AppState>,
    Query(query): Query<DispatchQuery>,
) -> ApiObject<Value> {
    match state.session.generate_all() {
        Ok(handles) => dispatch_response(&state.session, handles, query.wait).await,
        Err(error) => map_session_error(error),
    }
}

