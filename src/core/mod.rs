//! 核心模块
//!
//! 包含编排引擎的配置。

pub mod config;

pub use config::{LifecycleConfig, LogConfig, OrchestratorConfig, OrchestratorConfigBuilder};
