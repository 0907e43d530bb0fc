//! Time-based filters for noisy inputs.

mod hold;

pub use hold::*;
