use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::routes::{route_catalog, HttpMethod, RouteDefinition};
use crate::config::AppConfig;
use crate::media::export::now_unix_ms;
use crate::session::TransformSession;
use crate::transform::client::{GeminiTransformClient, SharedTransformClient};

#[derive(Clone)]
pub struct AppState {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub started_unix_ms: i64,
    pub routes: Arc<[RouteDefinition]>,
    pub session: TransformSession,
}

impl AppState {
    pub fn new(routes: Vec<RouteDefinition>, session: TransformSession) -> Self {
        Self {
            service_name: "reverse-ai-core",
            service_version: env!("CARGO_PKG_VERSION"),
            started_unix_ms: now_unix_ms(),
            routes: routes.into(),
            session,
        }
    }
}

pub fn session_from_config(config: &AppConfig) -> TransformSession {
    let client: SharedTransformClient =
        Arc::new(GeminiTransformClient::new(config.provider.clone()));
    TransformSession::new(client).with_timeout(config.provider.request_timeout)
}

pub fn build_router(config: &AppConfig) -> Router {
    build_router_with_session(session_from_config(config))
}

pub fn build_router_with_session(session: TransformSession) -> Router {
    let catalog = route_catalog();
    let state = AppState::new(catalog.clone(), session);

    let mut router = Router::new();
    for route in catalog {
        let path = route.spec.path;
        match method_router_for(&route) {
            Some(method_router) => router = router.route(path, method_router),
            None => warn!(route = %route.spec, "route has no handler attached"),
        }
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn serve(config: AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let app = build_router(&config);
    info!(
        bind = %config.bind,
        model = %config.provider.model,
        "starting reverse-ai-core HTTP surface"
    );
    axum::serve(listener, app).await
}

fn method_router_for(route: &RouteDefinition) -> Option<MethodRouter<AppState>> {
    let method_router = match (route.spec.method, route.spec.path) {
        (HttpMethod::Get, "/health") => get(health_handler),
        (HttpMethod::Get, "/api/routes") => get(list_routes_handler),
        (HttpMethod::Get, "/api/session") => get(crate::api::session::get_session_handler),
        (HttpMethod::Post, "/api/session/mode") => {
            post(crate::api::session::change_mode_handler)
        }
        (HttpMethod::Put, "/api/single/parameter") => {
            put(crate::api::single::set_parameter_handler)
        }
        (HttpMethod::Post, "/api/single/submit") => post(crate::api::single::submit_handler),
        (HttpMethod::Post, "/api/single/retry") => post(crate::api::single::retry_handler),
        (HttpMethod::Post, "/api/single/reset") => post(crate::api::single::reset_handler),
        (HttpMethod::Put, "/api/country/slots/{index}/country") => {
            put(crate::api::country::set_country_handler)
        }
        (HttpMethod::Put, "/api/country/slots/{index}/image") => {
            put(crate::api::country::attach_image_handler)
        }
        (HttpMethod::Post, "/api/country/slots/{index}/generate") => {
            post(crate::api::country::generate_handler)
        }
        (HttpMethod::Post, "/api/country/slots/{index}/retry") => {
            post(crate::api::country::retry_handler)
        }
        (HttpMethod::Post, "/api/country/slots/{index}/reset") => {
            post(crate::api::country::reset_handler)
        }
        (HttpMethod::Post, "/api/country/generate-all") => {
            post(crate::api::country::generate_all_handler)
        }
        (HttpMethod::Get, "/api/slots/{index}/export") => {
            get(crate::api::exports::export_slot_handler)
        }
        _ => return None,
    };
    Some(method_router)
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "status": "ok",
            "service": state.service_name,
            "version": state.service_version,
            "started_unix_ms": state.started_unix_ms,
            "route_count": state.routes.len(),
        })),
    )
}

async fn list_routes_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "routes": state.routes.as_ref(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_route_has_a_handler() {
        for route in route_catalog() {
            assert!(
                method_router_for(&route).is_some(),
                "no handler for {}",
                route.spec
            );
        }
    }
}
