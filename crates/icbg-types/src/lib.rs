//! Shared domain types for the icbg workspace.
//!
//! Every crate in the workspace exchanges data through the types defined
//! here: geometry, addresses, catalog products, pairings, orders and the
//! HTTP payloads built from them.

pub mod address;
pub mod api;
pub mod geo;
pub mod ids;
pub mod order;
pub mod pairing;
pub mod product;
pub mod selection;
pub mod validation;

pub use address::*;
pub use api::*;
pub use geo::*;
pub use ids::*;
pub use order::*;
pub use pairing::*;
pub use product::*;
pub use selection::*;
pub use validation::*;
