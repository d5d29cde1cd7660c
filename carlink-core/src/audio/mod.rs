//! Audio delivery: ring buffers, per-stream players, playback sinks,
//! and microphone capture.

pub mod buffer;
pub mod microphone;
pub mod output;
pub mod pipeline;
pub mod player;

pub use buffer::{PcmChunk, PcmRing, SharedPcmRing};
pub use microphone::{MIC_CHANNELS, MIC_SAMPLE_RATE, Microphone};
pub use output::PcmOutput;
pub use pipeline::{AudioPipeline, DEFAULT_MEDIA_VOLUME, DEFAULT_NAV_VOLUME, PipelineOptions};
pub use player::{AudioPlayer, VolumeControl};
