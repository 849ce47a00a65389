use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDomain {
    System,
    Session,
    Single,
    Country,
    Exports,
}

impl RouteDomain {
    fn from_path(path: &str) -> Self {
        if path == "/health" || path == "/api/routes" {
            return Self::System;
        }
        if path.starts_with("/api/single/") {
            return Self::Single;
        }
        if path.starts_with("/api/country/") {
            return Self::Country;
        }
        if path.ends_with("/export") {
            return Self::Exports;
        }
        Self::Session
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteSpec {
    pub method: HttpMethod,
    pub path: &'static str,
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDefinition {
    #[serde(flatten)]
    pub spec: RouteSpec,
    pub domain: RouteDomain,
    pub handler_id: String,
}

pub fn route_catalog() -> Vec<RouteDefinition> {
    let mut out = Vec::with_capacity(ROUTES.len());
    let mut seen = BTreeSet::new();

    for (method, path) in ROUTES {
        let spec = RouteSpec {
            method: *method,
            path,
        };
        if !seen.insert(spec.clone()) {
            continue;
        }
        out.push(RouteDefinition {
            domain: RouteDomain::from_path(path),
            handler_id: handler_id_for(*method, path),
            spec,
        });
    }

    out
}

fn handler_id_for(method: HttpMethod, path: &str) -> String {
    let mut tokens = vec![method.as_str().to_ascii_lowercase()];

    for part in path.trim_matches('/').split('/') {
        let normalized = if part.starts_with('{') && part.ends_with('}') {
            part.trim_matches(|ch| ch == '{' || ch == '}')
                .to_ascii_lowercase()
        } else {
            part.chars()
                .map(|ch| {
                    if ch.is_ascii_alphanumeric() {
                        ch.to_ascii_lowercase()
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        };
        tokens.push(normalized);
    }

    tokens.join("_")
}

const ROUTES: &[(HttpMethod, &str)] = &[
    (HttpMethod::Get, "/health"),
    (HttpMethod::Get, "/api/routes"),
    (HttpMethod::Get, "/api/session"),
    (HttpMethod::Post, "/api/session/mode"),
    (HttpMethod::Put, "/api/single/parameter"),
    (HttpMethod::Post, "/api/single/submit"),
    (HttpMethod::Post, "/api/single/retry"),
    (HttpMethod::Post, "/api/single/reset"),
    (HttpMethod::Put, "/api/country/slots/{index}/country"),
    (HttpMethod::Put, "/api/country/slots/{index}/image"),
    (HttpMethod::Post, "/api/country/slots/{index}/generate"),
    (HttpMethod::Post, "/api/country/slots/{index}/retry"),
    (HttpMethod::Post, "/api/country/slots/{index}/reset"),
    (HttpMethod::Post, "/api/country/generate-all"),
    (HttpMethod::Get, "/api/slots/{index}/export"),
];
