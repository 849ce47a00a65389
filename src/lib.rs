pub mod api;
pub mod config;
pub mod media;
pub mod session;
pub mod transform;
