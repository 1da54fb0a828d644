//! # Core Engine Module
//!
//! Error handling, configuration, and the [`EngineContext`] that owns every
//! subsystem and drives the per-frame sequence.

pub mod config;
pub mod context;
pub mod error;

pub use config::{Config, ConfigError, EngineConfig, LoggingConfig, RenderConfig, ResourceConfig, SceneConfig};
pub use context::{EngineContext, FrameStats};
pub use error::{EngineError, EngineResult, ErrorCode};
