//! 编排引擎错误类型定义
//!
//! 本模块定义了依赖解析与生命周期编排中使用的所有错误类型。

use thiserror::Error;

use crate::module::dependency::ValidationResult;
use crate::module::metadata::ModuleState;

/// 编排引擎核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 依赖解析错误 ====================

    /// 声明的依赖没有对应的已注册模块
    #[error("模块 '{module}' 的依赖 '{dependency}' 未注册")]
    MissingDependency {
        /// 声明依赖的模块
        module: String,
        /// 缺失的依赖名称
        dependency: String,
    },

    /// 硬依赖子图中存在环
    #[error("检测到循环依赖: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// 构成环的模块路径（首尾相同）
        cycle: Vec<String>,
    },

    /// 依赖图校验失败，携带完整缺陷列表
    #[error("依赖校验失败: {0}")]
    ValidationFailed(Box<ValidationResult>),

    // ==================== 生命周期错误 ====================

    /// 模块启动超时
    #[error("模块 '{module}' 启动超时（{timeout_secs} 秒）")]
    StartupTimeout {
        /// 模块名称
        module: String,
        /// 配置的超时时间（秒）
        timeout_secs: u64,
    },

    /// 模块启动钩子失败
    #[error("模块 '{module}' 启动失败: {source}")]
    StartupFailure {
        /// 模块名称
        module: String,
        /// 原始错误
        #[source]
        source: anyhow::Error,
    },

    /// 模块停止钩子失败或超时（永远非致命）
    #[error("模块 '{module}' 停止失败: {reason}")]
    ShutdownFailure {
        /// 模块名称
        module: String,
        /// 失败原因
        reason: String,
    },

    /// 依赖未能进入 Started 状态
    #[error("模块 '{module}' 的依赖 '{dependency}' 未启动（当前状态 {state:?}）")]
    DependencyNotStarted {
        /// 模块名称
        module: String,
        /// 依赖名称
        dependency: String,
        /// 依赖当前状态
        state: ModuleState,
    },

    /// 非法的状态转换
    #[error("模块 '{module}' 不允许从 {from:?} 转换到 {to:?}")]
    InvalidStateTransition {
        /// 模块名称
        module: String,
        /// 当前状态
        from: ModuleState,
        /// 目标状态
        to: ModuleState,
    },

    /// 当前状态不允许执行该操作
    #[error("模块 '{module}' 当前状态 {state:?} 不允许执行 {operation}")]
    InvalidState {
        /// 模块名称
        module: String,
        /// 当前状态
        state: ModuleState,
        /// 操作名称
        operation: &'static str,
    },

    /// 模块不支持热重载
    #[error("模块 '{0}' 不支持重载")]
    ReloadNotSupported(String),

    /// 模块重载失败
    #[error("模块 '{module}' 重载失败: {source}")]
    ReloadFailure {
        /// 模块名称
        module: String,
        /// 原始错误
        #[source]
        source: anyhow::Error,
    },

    /// 操作被取消
    #[error("模块 '{0}' 的操作被取消")]
    Cancelled(String),

    // ==================== 注册错误 ====================

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 无效的模块清单
    #[error("无效的模块清单: {0}")]
    InvalidManifest(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        /// 配置键
        key: String,
        /// 原因
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 编排操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 状态码常量（供健康检查端点使用）
pub mod status_code {
    /// 成功
    pub const OK: u16 = 200;

    /// 未找到
    pub const NOT_FOUND: u16 = 404;

    /// 请求超时
    pub const TIMEOUT: u16 = 408;

    /// 冲突
    pub const CONFLICT: u16 = 409;

    /// 内部错误
    pub const INTERNAL_ERROR: u16 = 500;

    /// 服务不可用
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    pub const MODULE_INVALID_MANIFEST: &str = "MODULE-002";
    pub const MODULE_STARTUP_FAILED: &str = "MODULE-003";
    pub const MODULE_SHUTDOWN_FAILED: &str = "MODULE-004";
    pub const MODULE_CIRCULAR_DEPENDENCY: &str = "MODULE-005";
    pub const MODULE_MISSING_DEPENDENCY: &str = "MODULE-006";
    pub const MODULE_VALIDATION_FAILED: &str = "MODULE-007";
    pub const MODULE_DEPENDENCY_NOT_STARTED: &str = "MODULE-008";
    pub const MODULE_INVALID_STATE: &str = "MODULE-009";
    pub const MODULE_RELOAD_FAILED: &str = "MODULE-010";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // 超时错误 (TIMEOUT-xxx)
    pub const TIMEOUT_MODULE_START: &str = "TIMEOUT-002";

    // 取消 (CANCEL-xxx)
    pub const CANCELLED: &str = "CANCEL-001";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::InvalidManifest(_) => error_code::MODULE_INVALID_MANIFEST,
            CoreError::StartupFailure { .. } => error_code::MODULE_STARTUP_FAILED,
            CoreError::StartupTimeout { .. } => error_code::TIMEOUT_MODULE_START,
            CoreError::ShutdownFailure { .. } => error_code::MODULE_SHUTDOWN_FAILED,
            CoreError::CircularDependency { .. } => error_code::MODULE_CIRCULAR_DEPENDENCY,
            CoreError::MissingDependency { .. } => error_code::MODULE_MISSING_DEPENDENCY,
            CoreError::ValidationFailed(_) => error_code::MODULE_VALIDATION_FAILED,
            CoreError::DependencyNotStarted { .. } => error_code::MODULE_DEPENDENCY_NOT_STARTED,
            CoreError::InvalidStateTransition { .. } | CoreError::InvalidState { .. } => {
                error_code::MODULE_INVALID_STATE
            }
            CoreError::ReloadNotSupported(_) | CoreError::ReloadFailure { .. } => {
                error_code::MODULE_RELOAD_FAILED
            }
            CoreError::Cancelled(_) => error_code::CANCELLED,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 获取 HTTP 状态码（供管理端点映射响应）
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::ModuleNotFound(_) => status_code::NOT_FOUND,
            CoreError::StartupTimeout { .. } => status_code::TIMEOUT,
            CoreError::InvalidState { .. } | CoreError::InvalidStateTransition { .. } => {
                status_code::CONFLICT
            }
            CoreError::DependencyNotStarted { .. } => status_code::SERVICE_UNAVAILABLE,
            _ => status_code::INTERNAL_ERROR,
        }
    }

    /// 是否为启动阶段的模块级失败（超时、钩子失败、依赖未启动、取消）
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            CoreError::StartupTimeout { .. }
                | CoreError::StartupFailure { .. }
                | CoreError::DependencyNotStarted { .. }
                | CoreError::Cancelled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ModuleNotFound("auth".to_string());
        assert!(err.to_string().contains("auth"));
    }

    #[test]
    fn test_circular_dependency_display() {
        let err = CoreError::CircularDependency {
            cycle: vec!["x".to_string(), "y".to_string(), "x".to_string()],
        };
        assert!(err.to_string().contains("x -> y -> x"));
    }

    #[test]
    fn test_startup_timeout_is_distinguishable() {
        let timeout = CoreError::StartupTimeout {
            module: "db".to_string(),
            timeout_secs: 5,
        };
        let failure = CoreError::StartupFailure {
            module: "db".to_string(),
            source: anyhow::anyhow!("connection refused"),
        };

        assert_ne!(timeout.error_code(), failure.error_code());
        assert!(timeout.to_string().contains("5"));
        assert!(failure.to_string().contains("connection refused"));
        assert!(timeout.is_startup_failure());
        assert!(failure.is_startup_failure());
    }

    #[test]
    fn test_startup_failure_keeps_source() {
        use std::error::Error as _;

        let err = CoreError::StartupFailure {
            module: "cache".to_string(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::MissingDependency {
            module: "d".to_string(),
            dependency: "e".to_string(),
        };
        assert_eq!(err.error_code(), error_code::MODULE_MISSING_DEPENDENCY);
    }

    #[test]
    fn test_status_code() {
        let err = CoreError::ModuleNotFound("test".to_string());
        assert_eq!(err.status_code(), status_code::NOT_FOUND);

        let err = CoreError::StartupTimeout {
            module: "m".to_string(),
            timeout_secs: 1,
        };
        assert_eq!(err.status_code(), status_code::TIMEOUT);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }
}
