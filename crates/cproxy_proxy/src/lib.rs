//! Caching proxy engine: cache lookups, conditional revalidation and the
//! origin client.

pub mod engine;
pub mod error;
pub mod headers;
pub mod origin;

pub use engine::ProxyEngine;
pub use error::OriginError;
pub use headers::HopByHop;
pub use origin::{HttpOrigin, Origin, OriginRequest, OriginResponse};
