//! 日志系统模块
//!
//! 基于 tracing 生态初始化日志输出：
//!
//! - 多级别日志（TRACE, DEBUG, INFO, WARN, ERROR），`RUST_LOG` 优先
//! - 结构化日志（JSON 格式输出）
//! - 文件日志输出（异步非阻塞，按时间轮转）
//!
//! 编排引擎本身不依赖这里的初始化：[`LifecycleManager`](crate::module::LifecycleManager)
//! 只向注入的 span 写事件，由宿主决定是否以及如何安装订阅者。
//!
//! # 示例
//!
//! ```rust,no_run
//! use chips_orchestrator::utils::logger::{Logger, LoggerConfig, RotationStrategy};
//! use std::path::PathBuf;
//!
//! let config = LoggerConfig::builder()
//!     .level("debug")
//!     .json_format(true)
//!     .file_output(PathBuf::from("./logs"))
//!     .rotation(RotationStrategy::Daily)
//!     .build();
//!
//! let _guard = Logger::init(config).unwrap();
//! tracing::info!(module = "db", state = "started", "模块状态变更");
//! ```

use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::core::config::LogConfig;
use crate::utils::{CoreError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

// ============================================================================
// 日志轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每分钟轮转（主要用于测试）
    Minutely,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Minutely => Rotation::MINUTELY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }
}

impl FromStr for RotationStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "never" | "none" => Ok(RotationStrategy::Never),
            "minutely" | "minute" => Ok(RotationStrategy::Minutely),
            "hourly" | "hour" => Ok(RotationStrategy::Hourly),
            "daily" | "day" => Ok(RotationStrategy::Daily),
            other => Err(CoreError::InvalidConfigValue {
                key: "logging.rotation".to_string(),
                reason: format!("未知的轮转策略 '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationStrategy::Never => write!(f, "never"),
            RotationStrategy::Minutely => write!(f, "minutely"),
            RotationStrategy::Hourly => write!(f, "hourly"),
            RotationStrategy::Daily => write!(f, "daily"),
        }
    }
}

// ============================================================================
// 日志配置
// ============================================================================

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（"trace"、"debug"、"info"、"warn"、"error"）
    pub level: String,

    /// 是否使用 JSON 格式输出
    pub json_format: bool,

    /// 是否输出到控制台
    pub console_output: bool,

    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 日志轮转策略
    pub rotation: RotationStrategy,

    /// 是否显示目标模块
    pub show_target: bool,

    /// 是否显示线程 ID
    pub show_thread_ids: bool,

    /// 是否显示文件名和行号
    pub show_file_line: bool,

    /// 是否显示日志级别
    pub show_level: bool,

    /// 附加过滤指令（EnvFilter 格式），例如 `"chips_orchestrator::module::dependency=debug"`
    pub filter_directives: Option<String>,

    /// 控制台是否启用 ANSI 颜色
    pub ansi_colors: bool,

    /// Span 事件配置
    pub span_events: SpanEvents,
}

/// Span 事件配置
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    /// 记录 span 进入事件
    pub enter: bool,
    /// 记录 span 退出事件
    pub exit: bool,
    /// 记录 span 关闭事件（包含耗时）
    pub close: bool,
}

impl SpanEvents {
    fn to_fmt_span(self) -> FmtSpan {
        let mut span = FmtSpan::NONE;
        if self.enter {
            span |= FmtSpan::ENTER;
        }
        if self.exit {
            span |= FmtSpan::EXIT;
        }
        if self.close {
            span |= FmtSpan::CLOSE;
        }
        span
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: "chips-orchestrator".to_string(),
            rotation: RotationStrategy::Daily,
            show_target: true,
            show_thread_ids: false,
            show_file_line: false,
            show_level: true,
            filter_directives: None,
            ansi_colors: true,
            span_events: SpanEvents::default(),
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::new()
    }

    /// 从配置文件中的 [`LogConfig`] 创建
    pub fn from_log_config(log_config: &LogConfig) -> Result<Self> {
        Ok(Self {
            level: log_config.level.clone(),
            json_format: log_config.json_format,
            file_output: if log_config.file_output {
                log_config.log_dir.clone()
            } else {
                None
            },
            rotation: log_config.rotation.parse()?,
            ..Default::default()
        })
    }
}

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 设置是否使用 JSON 格式
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置是否输出到控制台
    pub fn console_output(mut self, enable: bool) -> Self {
        self.config.console_output = enable;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_output = Some(dir.into());
        self
    }

    /// 设置日志文件名前缀
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, strategy: RotationStrategy) -> Self {
        self.config.rotation = strategy;
        self
    }

    /// 设置是否显示线程 ID
    pub fn show_thread_ids(mut self, enable: bool) -> Self {
        self.config.show_thread_ids = enable;
        self
    }

    /// 设置是否显示文件名和行号
    pub fn show_file_line(mut self, enable: bool) -> Self {
        self.config.show_file_line = enable;
        self
    }

    /// 设置附加过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 设置是否启用 ANSI 颜色
    pub fn ansi_colors(mut self, enable: bool) -> Self {
        self.config.ansi_colors = enable;
        self
    }

    /// 设置 span 事件
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.config.span_events = events;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

// ============================================================================
// 日志守卫
// ============================================================================

/// 日志系统守卫
///
/// 持有非阻塞写入器的 WorkerGuard，丢弃时刷新所有挂起的日志。
#[must_use = "丢弃守卫会立即停止后台日志写入"]
#[derive(Default)]
pub struct LogGuard {
    guards: Vec<WorkerGuard>,
}

impl LogGuard {
    /// 持有的写入器数量
    pub fn writer_count(&self) -> usize {
        self.guards.len()
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("writers", &self.guards.len())
            .finish()
    }
}

// ============================================================================
// 日志系统
// ============================================================================

/// 日志系统
pub struct Logger;

impl Logger {
    /// 安装全局订阅者
    ///
    /// 返回的 [`LogGuard`] 必须保持存活直到程序退出。
    ///
    /// # 错误
    ///
    /// - 过滤指令无效时返回 `InvalidConfigValue`
    /// - 进程中已经安装过全局订阅者时返回 `InitFailed`
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        let mut guard = LogGuard::default();
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if config.console_output {
            let (writer, worker) = tracing_appender::non_blocking(io::stdout());
            guard.guards.push(worker);
            layers.push(Self::build_layer(&config, writer, config.ansi_colors)?);
        }

        if let Some(ref log_dir) = config.file_output {
            let appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                log_dir,
                format!("{}.log", config.file_prefix),
            );
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard.guards.push(worker);
            layers.push(Self::build_layer(&config, writer, false)?);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| CoreError::InitFailed(format!("日志系统初始化失败: {}", e)))?;

        Ok(guard)
    }

    /// 尝试初始化日志系统（不会失败）
    ///
    /// 已安装过订阅者或配置无效时返回空守卫，适用于测试。
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_default()
    }

    /// 使用默认配置初始化日志系统
    pub fn init_default() -> Result<LogGuard> {
        Self::init(LoggerConfig::default())
    }

    /// 为一个写入目标构建格式化层，每层带自己的过滤器
    fn build_layer<W>(config: &LoggerConfig, writer: W, ansi: bool) -> Result<BoxedLayer>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = Self::create_env_filter(config)?;

        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_level(config.show_level)
            .with_span_events(config.span_events.to_fmt_span());

        let layer = if config.json_format {
            layer.json().with_ansi(false).with_filter(filter).boxed()
        } else {
            layer.with_ansi(ansi).with_filter(filter).boxed()
        };

        Ok(layer)
    }

    /// 创建 EnvFilter：`RUST_LOG` 优先，否则使用配置的级别，再叠加附加指令
    fn create_env_filter(config: &LoggerConfig) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

        if let Some(ref directives) = config.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                let parsed = directive.parse().map_err(|e| CoreError::InvalidConfigValue {
                    key: "filter_directives".to_string(),
                    reason: format!("无效的过滤指令 '{}': {}", directive, e),
                })?;
                filter = filter.add_directive(parsed);
            }
        }

        Ok(filter)
    }
}

// ============================================================================
// 结构化日志字段定义
// ============================================================================

/// 标准日志字段名称
///
/// 编排引擎输出的事件统一使用这些字段名，便于日志检索。
pub mod fields {
    /// 模块名称
    pub const MODULE: &str = "module";
    /// 依赖名称
    pub const DEPENDENCY: &str = "dependency";
    /// 依赖方名称
    pub const DEPENDENT: &str = "dependent";
    /// 当前状态
    pub const STATE: &str = "state";
    /// 转换前状态
    pub const FROM: &str = "from";
    /// 转换后状态
    pub const TO: &str = "to";
    /// 状态变更序号
    pub const SEQUENCE: &str = "sequence";
    /// 优先级
    pub const PRIORITY: &str = "priority";
    /// 是否关键模块
    pub const CRITICAL: &str = "critical";
    /// 超时（秒）
    pub const TIMEOUT_SECS: &str = "timeout_secs";
    /// 累计错误次数
    pub const ERROR_COUNT: &str = "error_count";
    /// 错误信息
    pub const ERROR: &str = "error";
    /// 错误码
    pub const CODE: &str = "code";
    /// 耗时（毫秒）
    pub const DURATION_MS: &str = "duration_ms";
}
