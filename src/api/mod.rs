//! REST access to the platform microservices.

pub mod client;
pub mod endpoints;

pub use client::ApiClient;
pub use endpoints::{Endpoints, Service};
