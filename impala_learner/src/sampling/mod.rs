//! Sampling policies.
//!
//! - `SamplingStrategy::Uniform`: FIFO head of the ordinary pool
//! - `SamplingStrategy::Mixed`: outcome-balanced batch (win / final / ordinary)

pub mod sampler;


pub use sampler::{BatchComposition, MixedSamplingConfig, SampleBatch, Sampler, SamplingStrategy};
