pub mod country;
pub mod error;
pub mod exports;
pub mod handler_utils;
pub mod routes;
pub mod server;
pub mod session;
pub mod single;
