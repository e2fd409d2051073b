//! Provider clients
//!
//! The gateway client is the only provider integration shipped; anything
//! implementing the adapter capability traits plus [`crate::source::RecommendationSource`]
//! can drive the pipeline.

mod gateway;

pub use gateway::{GatewayClient, DEFAULT_GATEWAY_TIMEOUT};
