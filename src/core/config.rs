//! 编排引擎配置
//!
//! 定义编排引擎的配置结构和加载逻辑。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{CoreError, Result};

/// 生命周期配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// 清单未指定启动超时（为 0）时使用的默认值（秒）
    #[serde(default = "default_startup_timeout_secs")]
    pub default_startup_timeout_secs: u64,

    /// 单个模块停止钩子的超时（秒）
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// 单个模块健康检查的超时（秒）
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,

    /// 状态变更通道容量
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_stop_timeout_secs() -> u64 {
    30
}

fn default_health_check_timeout_secs() -> u64 {
    10
}

fn default_event_capacity() -> usize {
    256
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_startup_timeout_secs: default_startup_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl LifecycleConfig {
    /// 停止超时
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// 健康检查超时
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const ROTATIONS: &[&str] = &[
    "never", "none", "minutely", "minute", "hourly", "hour", "daily", "day",
];

/// 编排引擎配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 生命周期配置
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// 默认的模块清单文件
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl OrchestratorConfig {
    /// 创建配置构建器
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// 扩展名为 `.json` 时按 JSON 解析，否则按 YAML 解析。加载后会执行 [`validate`](Self::validate)。
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;

        let mut config: OrchestratorConfig =
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };

        config.validate()?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: OrchestratorConfig) {
        // 只覆盖非默认值的配置
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.logging.rotation != default_rotation() {
            self.logging.rotation = other.logging.rotation;
        }
        if other.lifecycle.default_startup_timeout_secs != default_startup_timeout_secs() {
            self.lifecycle.default_startup_timeout_secs =
                other.lifecycle.default_startup_timeout_secs;
        }
        if other.lifecycle.stop_timeout_secs != default_stop_timeout_secs() {
            self.lifecycle.stop_timeout_secs = other.lifecycle.stop_timeout_secs;
        }
        if other.lifecycle.health_check_timeout_secs != default_health_check_timeout_secs() {
            self.lifecycle.health_check_timeout_secs = other.lifecycle.health_check_timeout_secs;
        }
        if other.lifecycle.event_capacity != default_event_capacity() {
            self.lifecycle.event_capacity = other.lifecycle.event_capacity;
        }
        if other.manifest_path.is_some() {
            self.manifest_path = other.manifest_path;
        }
        if other.dev_mode {
            self.dev_mode = true;
        }
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<()> {
        let lifecycle = &self.lifecycle;

        if lifecycle.default_startup_timeout_secs == 0 {
            return Err(invalid("lifecycle.default_startup_timeout_secs", "必须大于 0"));
        }
        if lifecycle.stop_timeout_secs == 0 {
            return Err(invalid("lifecycle.stop_timeout_secs", "必须大于 0"));
        }
        if lifecycle.health_check_timeout_secs == 0 {
            return Err(invalid("lifecycle.health_check_timeout_secs", "必须大于 0"));
        }
        if lifecycle.event_capacity == 0 {
            return Err(invalid("lifecycle.event_capacity", "必须大于 0"));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.level",
                format!("未知的日志级别 '{}'", self.logging.level),
            ));
        }

        let rotation = self.logging.rotation.to_lowercase();
        if !ROTATIONS.contains(&rotation.as_str()) {
            return Err(invalid(
                "logging.rotation",
                format!("未知的轮转策略 '{}'", self.logging.rotation),
            ));
        }

        if self.logging.file_output && self.logging.log_dir.is_none() {
            return Err(invalid("logging.log_dir", "启用文件日志时必须指定目录"));
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidConfigValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
        }
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 设置默认启动超时
    pub fn default_startup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.default_startup_timeout_secs = secs;
        self
    }

    /// 设置停止超时
    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.stop_timeout_secs = secs;
        self
    }

    /// 设置健康检查超时
    pub fn health_check_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.health_check_timeout_secs = secs;
        self
    }

    /// 设置状态变更通道容量
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.lifecycle.event_capacity = capacity;
        self
    }

    /// 设置模块清单文件
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manifest_path = Some(path.into());
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}
