//! Mastering DSP chain
//!
//! Stages are stateless per call and composed by [`chain::MasteringChain`]:
//! spectral EQ (frequency domain), soft-knee limiting, loudness makeup.
//!
//! Every stage preserves sample count, channel count, and the f32 sample
//! type. Framing a stage needs internally (FFT padding) is trimmed before
//! the stage returns.

pub mod chain;
pub mod dynamics;
pub mod eq;
pub mod features;
pub mod loudness;

pub use chain::MasteringChain;
pub use features::SpectralFeatures;
