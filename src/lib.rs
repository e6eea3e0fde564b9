#![doc = "The `tasknest` library crate."]
#![doc = ""]
#![doc = "Domain models, the authentication filter, storage backends, the task service and"]
#![doc = "route configuration for the TaskNest API. The binary (`main.rs`) wires them into"]
#![doc = "an actix-web server; the integration tests wire them into test services."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use error::AppError;
pub use state::AppState;
