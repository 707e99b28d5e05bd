//! HTTP service for icbg.
//!
//! - `api`: router, handlers, and server startup
//! - `error`: mapping of engine errors onto `{code, message}` responses

pub mod api;
pub mod error;
