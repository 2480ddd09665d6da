//! Data models for the BER tester

pub mod config;
pub mod sample;

// Re-export main model types
pub use config::{Config, Framing, SerialSettings, TcpSettings, TransportConfig};
pub use sample::LoopbackSample;
