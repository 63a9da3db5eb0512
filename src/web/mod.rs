//! HTTP surface (spec §6): request/response DTOs, the `X-User-Id` extractor,
//! and error mapping.

pub mod error;
pub mod extractors;
pub mod routes;

pub use routes::create_router;
