//! Session harness library: configuration, the scripted dongle
//! driver, and the headless render sink.

pub mod config;
pub mod driver;
pub mod surface;

pub use config::SimConfig;
pub use driver::SimDriver;
pub use surface::NullSurface;
