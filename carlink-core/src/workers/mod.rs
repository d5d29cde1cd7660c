//! Isolated execution contexts and their boundary contracts.

pub mod protocol;
pub mod render;

pub use protocol::{DongleDriver, ProtocolContext, ProtocolHandle, ProtocolWorker};
pub use render::{DrawSurface, RenderWorker};
