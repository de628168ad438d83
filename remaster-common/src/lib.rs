//! # Remaster Common Library
//!
//! Shared code for the Remaster mastering/streaming engine:
//! - Error taxonomy shared across crates
//! - Wire event types (StreamEvent enum)
//! - Mastering parameter types and validation
//! - Fade curve definitions and calculations
//! - Chunk boundary math (window offsets, overlap, index lookup)

pub mod boundary;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod params;

pub use boundary::ChunkSpec;
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use params::{MasteringPreset, ProcessingParameters};
