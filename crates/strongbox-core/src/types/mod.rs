//! Core types shared across the engine

mod cancellation;
mod context;

pub use cancellation::CancellationToken;
pub use context::OpContext;
