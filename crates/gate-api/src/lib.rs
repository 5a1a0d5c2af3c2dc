//! # gate-api
//!
//! REST API server for the authentication core, built with Axum.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_app, create_app_state, run, run_server};
