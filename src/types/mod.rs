//! Type definitions shared between the engine and the HTTP layer

pub mod prediction;

pub use prediction::Prediction;
