//! 模块编排
//!
//! 包含编排引擎的核心组件：
//! - 模块清单、状态机与健康状态
//! - 依赖图与依赖解析器
//! - 生命周期句柄接口与模块源
//! - 生命周期管理器、状态变更通道、健康汇总与关闭钩子

pub mod dependency;
pub mod events;
pub mod handle;
pub mod health;
pub mod lifecycle;
pub mod metadata;
pub mod shutdown;
pub mod source;

// 重导出常用类型
pub use dependency::{
    ConflictingModules, DependencyCycle, DependencyGraph, DependencyResolver, MissingDependency,
    ValidationResult,
};
pub use events::{StateChange, StateChangeBus};
pub use handle::ModuleHandle;
pub use health::HealthReport;
pub use lifecycle::{LifecycleManager, LifecycleManagerBuilder};
pub use metadata::{
    HealthState, HealthStatus, ModuleManifest, ModuleRuntimeRecord, ModuleState,
    DEFAULT_PRIORITY, DEFAULT_STARTUP_TIMEOUT_SECS,
};
pub use shutdown::{wait_for_shutdown_signal, ShutdownHook};
pub use source::{
    load_manifests, HandleFactory, ManifestFileSource, ModuleRegistration, ModuleSource,
    PassiveModule, StaticModuleSource,
};
