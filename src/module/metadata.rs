//! 模块元数据定义
//!
//! 定义模块清单、状态机、运行时记录以及健康状态等数据结构。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 默认优先级
pub const DEFAULT_PRIORITY: i32 = 100;

/// 默认启动超时（秒）
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// 模块清单
///
/// 注册时创建一次，之后不可变。可以从 YAML/JSON 反序列化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// 模块唯一名称
    pub name: String,

    /// 模块版本（仅用于展示）
    #[serde(default = "default_version")]
    pub version: String,

    /// 模块描述
    #[serde(default)]
    pub description: String,

    /// 作者信息
    #[serde(default)]
    pub author: String,

    /// 硬依赖：必须先于本模块启动
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 可选依赖：存在时排在前面，缺失不报错
    #[serde(default)]
    pub optional_dependencies: Vec<String>,

    /// 排序优先级，数值越小越早（仅在依赖关系无法区分时生效）
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// 关键模块启动失败时中止整个启动流程
    #[serde(default)]
    pub is_critical: bool,

    /// 启动超时（秒），0 表示使用全局默认值
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// 是否支持重载
    #[serde(default)]
    pub supports_reload: bool,

    /// 声明的能力
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// 不能同时注册的模块
    #[serde(default)]
    pub conflicts_with: Vec<String>,
}

impl ModuleManifest {
    /// 创建新的模块清单
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            author: String::new(),
            dependencies: vec![],
            optional_dependencies: vec![],
            priority: DEFAULT_PRIORITY,
            is_critical: false,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            supports_reload: false,
            capabilities: vec![],
            conflicts_with: vec![],
        }
    }

    /// 设置版本
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 设置作者
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// 添加硬依赖（重复名称会被忽略）
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// 添加可选依赖
    pub fn optionally_depends_on(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.optional_dependencies.contains(&dependency) {
            self.optional_dependencies.push(dependency);
        }
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 标记为关键模块
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    /// 设置启动超时
    pub fn with_startup_timeout(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = secs;
        self
    }

    /// 声明支持重载
    pub fn reloadable(mut self) -> Self {
        self.supports_reload = true;
        self
    }

    /// 添加能力声明
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// 声明冲突模块
    pub fn conflicts_with(mut self, module: impl Into<String>) -> Self {
        self.conflicts_with.push(module.into());
        self
    }

    /// 是否声明了某项能力
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// 计算实际生效的启动超时
    pub fn startup_timeout(&self, fallback_secs: u64) -> Duration {
        if self.startup_timeout_secs == 0 {
            Duration::from_secs(fallback_secs)
        } else {
            Duration::from_secs(self.startup_timeout_secs)
        }
    }

    /// 验证清单有效性
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = vec![];

        if self.name.trim().is_empty() {
            errors.push("模块名称不能为空".to_string());
        }

        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            errors.push(format!("模块 '{}' 声明了空的依赖名称", self.name));
        }

        if self.optional_dependencies.iter().any(|d| d.trim().is_empty()) {
            errors.push(format!("模块 '{}' 声明了空的可选依赖名称", self.name));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 模块状态
///
/// 每个模块一个有限状态机：
///
/// ```text
/// NotLoaded ──► Loading ──► Started ──► Stopping ──► NotLoaded
///                  │          │  ▲          │
///                  ▼          ▼  │          ▼
///                Error ◄── Reloading      Error
///                  │
///                  └──► Loading（仅重启）
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// 已注册但未运行
    #[default]
    NotLoaded,
    /// 正在启动
    Loading,
    /// 运行中
    Started,
    /// 正在停止
    Stopping,
    /// 正在重载
    Reloading,
    /// 错误状态
    Error,
}

impl ModuleState {
    /// 检查状态转换是否合法
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (NotLoaded, Loading)
                | (Loading, Started)
                | (Loading, Error)
                | (Started, Stopping)
                | (Started, Reloading)
                | (Stopping, NotLoaded)
                | (Stopping, Error)
                | (Reloading, Started)
                | (Reloading, Error)
                | (Error, Loading)
        )
    }

    /// 是否正在进行中（Loading/Stopping/Reloading）
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ModuleState::Loading | ModuleState::Stopping | ModuleState::Reloading
        )
    }

    /// 是否运行中
    pub fn is_started(self) -> bool {
        self == ModuleState::Started
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleState::NotLoaded => "not_loaded",
            ModuleState::Loading => "loading",
            ModuleState::Started => "started",
            ModuleState::Stopping => "stopping",
            ModuleState::Reloading => "reloading",
            ModuleState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// 模块运行时记录
///
/// 由生命周期管理器独占修改，对外只提供快照。
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRuntimeRecord {
    /// 模块名称
    pub module_name: String,

    /// 当前状态
    pub state: ModuleState,

    /// 注册时间
    pub registered_at: DateTime<Utc>,

    /// 最近一次状态变更时间
    pub last_state_change: DateTime<Utc>,

    /// 累计错误次数
    pub error_count: u32,

    /// 最近一次错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// 模块清单
    pub manifest: Arc<ModuleManifest>,
}

impl ModuleRuntimeRecord {
    /// 创建处于 NotLoaded 状态的新记录
    pub fn new(manifest: Arc<ModuleManifest>) -> Self {
        let now = Utc::now();
        Self {
            module_name: manifest.name.clone(),
            state: ModuleState::NotLoaded,
            registered_at: now,
            last_state_change: now,
            error_count: 0,
            last_error: None,
            manifest,
        }
    }

    /// 记录一次错误
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(message.into());
    }
}

/// 健康状态等级
///
/// 排序即严重程度：`Healthy < Degraded < Unhealthy`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// 健康
    #[default]
    Healthy,
    /// 降级
    Degraded,
    /// 不健康
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// 健康检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// 状态等级
    pub status: HealthState,

    /// 描述
    #[serde(default)]
    pub description: String,

    /// 结构化附加数据
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// 检查耗时
    #[serde(default, with = "duration_millis")]
    pub duration: Duration,

    /// 检查时间
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    fn with_state(status: HealthState, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            data: HashMap::new(),
            duration: Duration::ZERO,
            checked_at: Utc::now(),
        }
    }

    /// 创建健康状态
    pub fn healthy(description: impl Into<String>) -> Self {
        Self::with_state(HealthState::Healthy, description)
    }

    /// 创建降级状态
    pub fn degraded(description: impl Into<String>) -> Self {
        Self::with_state(HealthState::Degraded, description)
    }

    /// 创建不健康状态
    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::with_state(HealthState::Unhealthy, description)
    }

    /// 附加结构化数据
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// 设置检查耗时
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// 由生命周期状态推导默认健康状态
    pub fn from_module_state(state: ModuleState) -> Self {
        let status = if state == ModuleState::Started {
            Self::healthy("模块运行中")
        } else {
            Self::unhealthy(format!("模块未运行，当前状态: {}", state))
        };
        status.with_data("state", serde_json::json!(state))
    }

    /// 是否健康
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// 毫秒数，超出 u64 时取最大值
    pub fn to_u64(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(to_u64(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
