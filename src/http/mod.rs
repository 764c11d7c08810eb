//! HTTP modules

pub mod routes;

pub use routes::build_router;
