//! # Chips Orchestrator - 薯片模块编排引擎
//!
//! 负责把一组独立编写的模块按依赖关系编排起来：
//!
//! - **依赖解析**: 由模块清单构建依赖图，报告缺失依赖与循环依赖（含完整路径）
//! - **启动顺序**: 确定性的拓扑排序，`priority` 只在无依赖关系的模块之间决定先后
//! - **生命周期**: 每个模块一个异步状态机，带超时、取消与故障隔离
//! - **观测**: 状态快照、状态变更订阅、健康汇总
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chips_orchestrator::{LifecycleManager, ModuleManifest, PassiveModule, ShutdownHook};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(LifecycleManager::new());
//!     manager
//!         .register_module(ModuleManifest::new("db").critical(), Arc::new(PassiveModule))
//!         .await?;
//!     manager
//!         .register_module(ModuleManifest::new("api").depends_on("db"), Arc::new(PassiveModule))
//!         .await?;
//!
//!     let token = CancellationToken::new();
//!     manager.start_all_modules(token.clone()).await?;
//!
//!     let hook = Arc::new(ShutdownHook::new(manager.clone()));
//!     hook.install(token).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 清单、依赖解析、生命周期管理
//! - `core` - 配置
//! - `utils` - 错误类型和日志

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    DependencyResolver, HealthReport, HealthState, HealthStatus, LifecycleManager, ModuleHandle,
    ModuleManifest, ModuleRuntimeRecord, ModuleSource, ModuleState, PassiveModule, ShutdownHook,
    StateChange, ValidationResult,
};

pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, RotationStrategy};
pub use utils::{error_code, status_code, CoreError, Result};

pub use crate::core::config::{LifecycleConfig, LogConfig, OrchestratorConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
