//! 生命周期管理器
//!
//! 管理模块的生命周期，包括启动、停止、重启、重载和健康检查。
//!
//! # 锁约定
//!
//! - 状态表（`modules`）的锁只包住状态转换本身，从不跨越钩子的 `.await`
//! - 每个模块有一把操作锁，串行化同一模块的 start/stop/reload
//! - 启动时递归处理依赖不持有任何操作锁
//! - 停止时先持有自身的操作锁再逐个获取依赖方的锁，加锁顺序始终是依赖在前
//!
//! # 关闭
//!
//! `stop_all_modules` 开始时取消当前的关闭令牌，进行中的启动流程看到后立即中止；
//! 停止完成后换上新令牌，之后的启动不受影响。
//!
//! # 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use chips_orchestrator::module::{LifecycleManager, ModuleManifest, ModuleState, PassiveModule};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> chips_orchestrator::Result<()> {
//! let manager = LifecycleManager::new();
//! manager.register_module(ModuleManifest::new("db"), Arc::new(PassiveModule)).await?;
//! manager.register_module(ModuleManifest::new("api").depends_on("db"), Arc::new(PassiveModule)).await?;
//!
//! let token = CancellationToken::new();
//! manager.start_all_modules(token.clone()).await?;
//! assert_eq!(manager.get_module_state("api").await, Some(ModuleState::Started));
//!
//! manager.stop_all_modules(token).await?;
//! assert_eq!(manager.get_module_state("db").await, Some(ModuleState::NotLoaded));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Span};

use super::dependency::{DependencyResolver, ValidationResult};
use super::events::{StateChange, StateChangeBus};
use super::handle::ModuleHandle;
use super::health::HealthReport;
use super::metadata::{
    duration_millis, HealthStatus, ModuleManifest, ModuleRuntimeRecord, ModuleState,
};
use super::source::ModuleSource;
use crate::core::config::LifecycleConfig;
use crate::utils::{CoreError, Result};

/// 单个模块在管理器中的条目
struct ModuleEntry {
    record: ModuleRuntimeRecord,
    handle: Arc<dyn ModuleHandle>,
    op_lock: Arc<Mutex<()>>,
}

/// 生命周期管理器
///
/// 每个进程构造一次，由宿主持有（通常放在 `Arc` 中共享给健康检查、管理界面和关闭钩子）。
pub struct LifecycleManager {
    /// 依赖解析器
    resolver: RwLock<DependencyResolver>,

    /// 模块条目：模块名 -> 条目
    modules: RwLock<HashMap<String, ModuleEntry>>,

    /// 最近一次计算的启动顺序
    last_startup_order: RwLock<Vec<String>>,

    /// 关闭令牌，`stop_all_modules` 期间处于取消状态
    shutdown: RwLock<CancellationToken>,

    /// 状态变更通道
    bus: StateChangeBus,

    /// 生命周期配置
    config: LifecycleConfig,

    /// 注入的父级 span，所有公开操作都挂在它下面
    span: Span,
}

/// [`LifecycleManager`] 构建器
#[derive(Debug, Default)]
pub struct LifecycleManagerBuilder {
    config: LifecycleConfig,
    span: Option<Span>,
}

impl LifecycleManagerBuilder {
    /// 设置生命周期配置
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// 注入父级 span
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// 构建管理器
    pub fn build(self) -> LifecycleManager {
        let span = self
            .span
            .unwrap_or_else(|| info_span!("lifecycle_manager"));

        span.in_scope(|| info!("创建生命周期管理器"));

        LifecycleManager {
            resolver: RwLock::new(DependencyResolver::new()),
            modules: RwLock::new(HashMap::new()),
            last_startup_order: RwLock::new(Vec::new()),
            shutdown: RwLock::new(CancellationToken::new()),
            bus: StateChangeBus::new(self.config.event_capacity),
            config: self.config,
            span,
        }
    }
}

impl LifecycleManager {
    /// 使用默认配置创建管理器
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// 使用指定配置创建管理器
    pub fn with_config(config: LifecycleConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// 获取构建器
    pub fn builder() -> LifecycleManagerBuilder {
        LifecycleManagerBuilder::default()
    }

    /// 当前配置
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ==================== 注册 ====================

    /// 注册模块
    ///
    /// 创建处于 `NotLoaded` 的运行时记录。启动之后注册也是合法的，
    /// 新模块不会被卷入已经完成的启动流程。
    ///
    /// # 错误
    ///
    /// - `InvalidManifest`：名称为空
    /// - `InvalidState`：同名模块正在运行或处于过渡状态
    #[instrument(parent = &self.span, skip(self, manifest, handle), fields(module = %manifest.name))]
    pub async fn register_module(
        &self,
        manifest: ModuleManifest,
        handle: Arc<dyn ModuleHandle>,
    ) -> Result<()> {
        let mut resolver = self.resolver.write().await;
        let mut modules = self.modules.write().await;

        if let Some(existing) = modules.get(&manifest.name) {
            let state = existing.record.state;
            if !matches!(state, ModuleState::NotLoaded | ModuleState::Error) {
                return Err(CoreError::InvalidState {
                    module: manifest.name.clone(),
                    state,
                    operation: "register",
                });
            }
        }

        let manifest = resolver.register_module(manifest)?;
        let name = manifest.name.clone();

        modules.insert(
            name,
            ModuleEntry {
                record: ModuleRuntimeRecord::new(manifest.clone()),
                handle,
                op_lock: Arc::new(Mutex::new(())),
            },
        );

        info!(
            priority = manifest.priority,
            critical = manifest.is_critical,
            dependencies = manifest.dependencies.len(),
            "模块已注册"
        );
        Ok(())
    }

    /// 注册模块源提供的全部模块，返回注册数量
    #[instrument(parent = &self.span, skip(self, source))]
    pub async fn register_source(&self, source: &dyn ModuleSource) -> Result<usize> {
        let registrations = source.modules()?;
        let count = registrations.len();

        for (manifest, handle) in registrations {
            self.register_module(manifest, handle).await?;
        }

        info!(count, "模块源注册完成");
        Ok(count)
    }

    // ==================== 依赖查询 ====================

    /// 校验依赖关系
    pub async fn validate_dependencies(&self) -> ValidationResult {
        self.resolver.read().await.validate_dependencies()
    }

    /// 计算启动顺序
    pub async fn get_startup_order(&self) -> Result<Vec<String>> {
        self.resolver.read().await.get_startup_order()
    }

    /// 计算停止顺序
    pub async fn get_shutdown_order(&self) -> Result<Vec<String>> {
        self.resolver.read().await.get_shutdown_order()
    }

    /// 全部传递依赖
    pub async fn get_all_dependencies(&self, name: &str) -> Vec<String> {
        self.resolver.read().await.get_all_dependencies(name)
    }

    /// 全部传递依赖方
    pub async fn get_dependents(&self, name: &str) -> Vec<String> {
        self.resolver.read().await.get_dependents(name)
    }

    // ==================== 启动 ====================

    /// 按依赖顺序启动全部模块
    ///
    /// 1. 校验依赖，失败时携带完整缺陷列表返回 `ValidationFailed`，不启动任何模块
    /// 2. 计算启动顺序
    /// 3. 依次启动尚未运行的模块
    /// 4. 关键模块失败时立即返回该错误，剩余模块不再启动
    /// 5. 非关键模块失败时记录错误并继续
    ///
    /// 期间一旦开始关闭（`stop_all_modules`），返回 `Cancelled`，不再启动后续模块。
    #[instrument(parent = &self.span, skip(self, token))]
    pub async fn start_all_modules(&self, token: CancellationToken) -> Result<()> {
        let shutdown = self.shutdown_token().await;
        let order = {
            let resolver = self.resolver.read().await;
            let validation = resolver.validate_dependencies();

            for conflict in &validation.conflicts {
                warn!(
                    module = %conflict.module,
                    conflicts_with = %conflict.conflicts_with,
                    "检测到冲突模块同时注册"
                );
            }

            if !validation.is_valid {
                error!(defects = %validation, "依赖校验失败，中止启动");
                return Err(CoreError::ValidationFailed(Box::new(validation)));
            }

            resolver.get_startup_order()?
        };

        *self.last_startup_order.write().await = order.clone();

        let started_at = Instant::now();
        info!(count = order.len(), order = ?order, "开始启动全部模块");

        let mut started = 0usize;
        let mut failed = 0usize;

        for name in &order {
            if self.get_module_state(name).await == Some(ModuleState::Started) {
                continue;
            }

            match self
                .start_inner(name.clone(), token.clone(), shutdown.clone(), false, Vec::new())
                .await
            {
                Ok(()) => started += 1,
                Err(e) => {
                    let critical = self
                        .manifest_of(name)
                        .await
                        .map(|m| m.is_critical)
                        .unwrap_or(false);

                    if critical || matches!(e, CoreError::Cancelled(_)) {
                        error!(module = %name, critical, error = %e, "启动流程中止");
                        return Err(e);
                    }

                    warn!(module = %name, error = %e, "非关键模块启动失败，继续启动后续模块");
                    failed += 1;
                }
            }
        }

        info!(
            started,
            failed,
            duration_ms = duration_millis::to_u64(started_at.elapsed()),
            "全部模块启动完成"
        );
        Ok(())
    }

    /// 启动单个模块
    ///
    /// 已运行时为空操作。会先递归启动所有未运行的直接依赖，
    /// 因此可以脱离全局顺序单独调用。
    #[instrument(parent = &self.span, skip(self, token), fields(module = %name))]
    pub async fn start_module(&self, name: &str, token: CancellationToken) -> Result<()> {
        let shutdown = self.shutdown_token().await;
        self.start_inner(name.to_string(), token, shutdown, false, Vec::new())
            .await
    }

    /// 当前的关闭令牌
    async fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.read().await.clone()
    }

    fn start_inner(
        &self,
        name: String,
        token: CancellationToken,
        shutdown: CancellationToken,
        recover: bool,
        mut path: Vec<String>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(pos) = path.iter().position(|n| *n == name) {
                let mut cycle = path.split_off(pos);
                cycle.push(name);
                return Err(CoreError::CircularDependency { cycle });
            }

            let (manifest, handle, op_lock) = self.entry_parts(&name).await?;

            match self.get_module_state(&name).await {
                Some(ModuleState::Started) => {
                    warn!(module = %name, "模块已在运行中");
                    return Ok(());
                }
                Some(ModuleState::Error) if !recover => {
                    return Err(CoreError::InvalidState {
                        module: name,
                        state: ModuleState::Error,
                        operation: "start",
                    });
                }
                _ => {}
            }

            if token.is_cancelled() || shutdown.is_cancelled() {
                return Err(CoreError::Cancelled(name));
            }

            // 先确保所有直接依赖已运行
            path.push(name.clone());
            for dep in &manifest.dependencies {
                match self.get_module_state(dep).await {
                    Some(ModuleState::Started) => continue,
                    // 未注册的依赖由 validate_dependencies 报告，这里只拒绝启动
                    None => {
                        let err = CoreError::DependencyNotStarted {
                            module: name.clone(),
                            dependency: dep.clone(),
                            state: ModuleState::NotLoaded,
                        };
                        self.record_failure(&name, &err).await;
                        return Err(err);
                    }
                    Some(_) => {}
                }

                debug!(module = %name, dependency = %dep, "先启动依赖");
                if let Err(e) = self
                    .start_inner(
                        dep.clone(),
                        token.clone(),
                        shutdown.clone(),
                        false,
                        path.clone(),
                    )
                    .await
                {
                    if matches!(e, CoreError::CircularDependency { .. } | CoreError::Cancelled(_)) {
                        return Err(e);
                    }

                    let state = self.get_module_state(dep).await.unwrap_or_default();
                    warn!(module = %name, dependency = %dep, error = %e, "依赖启动失败");
                    let err = CoreError::DependencyNotStarted {
                        module: name.clone(),
                        dependency: dep.clone(),
                        state,
                    };
                    self.record_failure(&name, &err).await;
                    return Err(err);
                }
            }

            let _guard = op_lock.lock().await;

            if shutdown.is_cancelled() {
                debug!(module = %name, "正在关闭，放弃启动");
                return Err(CoreError::Cancelled(name));
            }

            match self.get_module_state(&name).await {
                Some(ModuleState::Started) => return Ok(()),
                Some(ModuleState::NotLoaded) => {}
                Some(ModuleState::Error) if recover => {}
                Some(state) => {
                    return Err(CoreError::InvalidState {
                        module: name,
                        state,
                        operation: "start",
                    });
                }
                None => return Err(CoreError::ModuleNotFound(name)),
            }

            // 持有操作锁后再确认一次依赖，期间依赖可能已被停止
            for dep in &manifest.dependencies {
                let state = self.get_module_state(dep).await.unwrap_or_default();
                if state != ModuleState::Started {
                    let err = CoreError::DependencyNotStarted {
                        module: name.clone(),
                        dependency: dep.clone(),
                        state,
                    };
                    self.record_failure(&name, &err).await;
                    return Err(err);
                }
            }

            self.transition(&name, ModuleState::Loading, None).await?;

            let timeout = manifest.startup_timeout(self.config.default_startup_timeout_secs);
            let child = token.child_token();
            let started_at = Instant::now();

            info!(module = %name, timeout_secs = timeout.as_secs(), "启动模块");

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(CoreError::Cancelled(name.clone())),
                _ = shutdown.cancelled() => Err(CoreError::Cancelled(name.clone())),
                res = time::timeout(timeout, run_start_hooks(handle.as_ref(), child.clone())) => match res {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(source)) => Err(CoreError::StartupFailure {
                        module: name.clone(),
                        source,
                    }),
                    Err(_elapsed) => Err(CoreError::StartupTimeout {
                        module: name.clone(),
                        timeout_secs: timeout.as_secs(),
                    }),
                },
            };

            match result {
                Ok(()) => {
                    self.transition(&name, ModuleState::Started, None).await?;
                    info!(
                        module = %name,
                        duration_ms = duration_millis::to_u64(started_at.elapsed()),
                        "模块启动成功"
                    );
                    Ok(())
                }
                Err(e) => {
                    child.cancel();
                    self.transition(&name, ModuleState::Error, Some(e.to_string()))
                        .await?;
                    error!(
                        module = %name,
                        error = %e,
                        code = e.error_code(),
                        duration_ms = duration_millis::to_u64(started_at.elapsed()),
                        "模块启动失败"
                    );
                    Err(e)
                }
            }
        })
    }

    // ==================== 停止 ====================

    /// 按停止顺序停止全部模块
    ///
    /// 停止顺序是最新启动顺序的精确反序。单个模块停止失败不会中断后续模块。
    /// 开始前先取消关闭令牌，进行中的启动流程随之中止。
    #[instrument(parent = &self.span, skip(self, token))]
    pub async fn stop_all_modules(&self, token: CancellationToken) -> Result<()> {
        self.shutdown.read().await.cancel();

        let order = self.shutdown_order().await;
        let stopped_at = Instant::now();

        info!(count = order.len(), order = ?order, "开始停止全部模块");

        for name in &order {
            if let Err(e) = self.stop_inner(name.clone(), token.clone()).await {
                warn!(module = %name, error = %e, "停止模块失败，继续停止后续模块");
            }
        }

        *self.shutdown.write().await = CancellationToken::new();

        info!(
            duration_ms = duration_millis::to_u64(stopped_at.elapsed()),
            "全部模块已停止"
        );
        Ok(())
    }

    /// 启动顺序的反序；依赖图已失效时退回到上一次的启动顺序
    async fn shutdown_order(&self) -> Vec<String> {
        let fresh = self.resolver.read().await.get_startup_order();

        let mut order = match fresh {
            Ok(order) => {
                *self.last_startup_order.write().await = order.clone();
                order
            }
            Err(e) => {
                warn!(error = %e, "无法重新计算启动顺序，使用上一次的启动顺序");
                let mut order = self.last_startup_order.read().await.clone();
                let mut extra: Vec<String> = self
                    .modules
                    .read()
                    .await
                    .keys()
                    .filter(|name| !order.contains(name))
                    .cloned()
                    .collect();
                extra.sort();
                order.extend(extra);
                order
            }
        };

        order.reverse();
        order
    }

    /// 停止单个模块
    ///
    /// 先转入 `Stopping`，再停止所有直接依赖它的模块，最后执行自身的停止钩子，
    /// 保证运行中的模块不会失去依赖。
    /// 停止钩子失败只记录日志并将模块置为 `Error`，不向上返回错误。
    #[instrument(parent = &self.span, skip(self, token), fields(module = %name))]
    pub async fn stop_module(&self, name: &str, token: CancellationToken) -> Result<()> {
        self.stop_inner(name.to_string(), token).await
    }

    fn stop_inner(&self, name: String, token: CancellationToken) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let (_, handle, op_lock) = self.entry_parts(&name).await?;

            // 持锁期间没有进行中的启动，依赖方也无法再通过依赖检查
            let _guard = op_lock.lock().await;

            match self.get_module_state(&name).await {
                Some(ModuleState::Started) => {}
                Some(ModuleState::Error) => {
                    debug!(module = %name, "模块处于错误状态，跳过停止");
                    return Ok(());
                }
                Some(state) => {
                    debug!(module = %name, state = %state, "模块未运行，无需停止");
                    return Ok(());
                }
                None => return Err(CoreError::ModuleNotFound(name)),
            }

            self.transition(&name, ModuleState::Stopping, None).await?;

            let dependents = self.resolver.read().await.get_direct_dependents(&name);
            for dependent in dependents {
                if let Err(e) = self.stop_inner(dependent.clone(), token.clone()).await {
                    warn!(module = %name, dependent = %dependent, error = %e, "停止依赖方失败");
                }
            }

            let stop_timeout = self.config.stop_timeout();
            let child = token.child_token();
            let stopped_at = Instant::now();

            info!(module = %name, "停止模块");

            let outcome = match time::timeout(stop_timeout, run_stop_hooks(handle.as_ref(), child.clone())).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_elapsed) => {
                    child.cancel();
                    Err(format!("停止超时（{} 秒）", stop_timeout.as_secs()))
                }
            };

            match outcome {
                Ok(()) => {
                    self.transition(&name, ModuleState::NotLoaded, None).await?;
                    info!(
                        module = %name,
                        duration_ms = duration_millis::to_u64(stopped_at.elapsed()),
                        "模块已停止"
                    );
                }
                Err(reason) => {
                    let err = CoreError::ShutdownFailure {
                        module: name.clone(),
                        reason,
                    };
                    self.transition(&name, ModuleState::Error, Some(err.to_string()))
                        .await?;
                    error!(module = %name, error = %err, code = err.error_code(), "模块停止失败");
                }
            }

            Ok(())
        })
    }

    // ==================== 重启与重载 ====================

    /// 重启模块
    ///
    /// 运行中的模块先停止（连带停止其依赖方）再启动；依赖方不会被自动重新启动。
    /// 处于 `Error` 的模块跳过停止阶段，直接重新进入 `Loading`。
    #[instrument(parent = &self.span, skip(self, token), fields(module = %name))]
    pub async fn restart_module(&self, name: &str, token: CancellationToken) -> Result<()> {
        let state = self
            .get_module_state(name)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))?;

        info!(state = %state, "重启模块");

        let shutdown = self.shutdown_token().await;
        if state != ModuleState::Error {
            self.stop_inner(name.to_string(), token.clone()).await?;
        }

        self.start_inner(name.to_string(), token, shutdown, true, Vec::new())
            .await
    }

    /// 重载模块
    ///
    /// 仅当清单声明 `supports_reload` 且句柄 `can_reload()` 时可用，
    /// 执行 `Started -> Reloading -> Started`，失败时进入 `Error`。
    #[instrument(parent = &self.span, skip(self, token), fields(module = %name))]
    pub async fn reload_module(&self, name: &str, token: CancellationToken) -> Result<()> {
        let (manifest, handle, op_lock) = self.entry_parts(name).await?;

        if !manifest.supports_reload || !handle.can_reload() {
            return Err(CoreError::ReloadNotSupported(name.to_string()));
        }

        let _guard = op_lock.lock().await;

        let state = self.get_module_state(name).await.unwrap_or_default();
        if state != ModuleState::Started {
            return Err(CoreError::InvalidState {
                module: name.to_string(),
                state,
                operation: "reload",
            });
        }

        self.transition(name, ModuleState::Reloading, None).await?;

        let timeout = manifest.startup_timeout(self.config.default_startup_timeout_secs);
        let child = token.child_token();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CoreError::Cancelled(name.to_string())),
            res = time::timeout(timeout, handle.reload(child.clone())) => match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(CoreError::ReloadFailure {
                    module: name.to_string(),
                    source,
                }),
                Err(_elapsed) => Err(CoreError::ReloadFailure {
                    module: name.to_string(),
                    source: anyhow::anyhow!("重载超时（{} 秒）", timeout.as_secs()),
                }),
            },
        };

        match result {
            Ok(()) => {
                self.transition(name, ModuleState::Started, None).await?;
                info!("模块重载成功");
                Ok(())
            }
            Err(e) => {
                child.cancel();
                self.transition(name, ModuleState::Error, Some(e.to_string()))
                    .await?;
                error!(error = %e, "模块重载失败");
                Err(e)
            }
        }
    }

    // ==================== 状态快照 ====================

    /// 全部模块状态快照
    pub async fn get_all_module_states(&self) -> HashMap<String, ModuleState> {
        self.modules
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.record.state))
            .collect()
    }

    /// 单个模块状态
    pub async fn get_module_state(&self, name: &str) -> Option<ModuleState> {
        self.modules
            .read()
            .await
            .get(name)
            .map(|entry| entry.record.state)
    }

    /// 单个模块运行时记录快照
    pub async fn get_module_record(&self, name: &str) -> Option<ModuleRuntimeRecord> {
        self.modules
            .read()
            .await
            .get(name)
            .map(|entry| entry.record.clone())
    }

    /// 全部运行时记录快照（按名称排序）
    pub async fn get_all_module_records(&self) -> Vec<ModuleRuntimeRecord> {
        let mut records: Vec<ModuleRuntimeRecord> = self
            .modules
            .read()
            .await
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| a.module_name.cmp(&b.module_name));
        records
    }

    /// 处于指定状态的模块（按名称排序）
    pub async fn get_modules_by_state(&self, state: ModuleState) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.record.state == state)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// 已注册模块数量
    pub async fn module_count(&self) -> usize {
        self.modules.read().await.len()
    }

    /// 最近一次计算的启动顺序
    pub async fn last_startup_order(&self) -> Vec<String> {
        self.last_startup_order.read().await.clone()
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.bus.subscribe()
    }

    // ==================== 健康检查 ====================

    /// 检查单个模块健康状态
    ///
    /// 句柄提供健康检查时委托给它（受 `health_check_timeout_secs` 限制），
    /// 否则由当前状态推导：`Started` 为健康，其余为不健康。
    #[instrument(parent = &self.span, skip(self, token), fields(module = %name))]
    pub async fn check_module_health(
        &self,
        name: &str,
        token: CancellationToken,
    ) -> Result<HealthStatus> {
        let (handle, state) = {
            let modules = self.modules.read().await;
            let entry = modules
                .get(name)
                .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))?;
            (entry.handle.clone(), entry.record.state)
        };

        let checked_at = Instant::now();

        if !handle.has_health_check() {
            return Ok(HealthStatus::from_module_state(state).with_duration(checked_at.elapsed()));
        }

        let timeout = self.config.health_check_timeout();
        let status = match time::timeout(timeout, handle.health_check(token.child_token())).await
        {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(error = %e, "健康检查失败");
                HealthStatus::unhealthy(format!("健康检查失败: {e:#}"))
            }
            Err(_elapsed) => {
                warn!(timeout_secs = timeout.as_secs(), "健康检查超时");
                HealthStatus::unhealthy(format!("健康检查超时（{} 秒）", timeout.as_secs()))
            }
        };

        Ok(status.with_duration(checked_at.elapsed()))
    }

    /// 检查全部模块并汇总（取最差状态）
    #[instrument(parent = &self.span, skip(self, token))]
    pub async fn check_all_health(&self, token: CancellationToken) -> HealthReport {
        let started_at = Instant::now();
        let mut names: Vec<String> = self.modules.read().await.keys().cloned().collect();
        names.sort();

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            let status = match self.check_module_health(&name, token.clone()).await {
                Ok(status) => status,
                Err(e) => HealthStatus::unhealthy(e.to_string()),
            };
            statuses.push((name, status));
        }

        let report = HealthReport::aggregate(statuses, started_at.elapsed());
        debug!(status = %report.status, modules = report.modules.len(), "健康检查汇总完成");
        report
    }

    // ==================== 内部方法 ====================

    async fn entry_parts(
        &self,
        name: &str,
    ) -> Result<(Arc<ModuleManifest>, Arc<dyn ModuleHandle>, Arc<Mutex<()>>)> {
        let modules = self.modules.read().await;
        let entry = modules
            .get(name)
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))?;
        Ok((
            entry.record.manifest.clone(),
            entry.handle.clone(),
            entry.op_lock.clone(),
        ))
    }

    async fn manifest_of(&self, name: &str) -> Option<Arc<ModuleManifest>> {
        self.modules
            .read()
            .await
            .get(name)
            .map(|entry| entry.record.manifest.clone())
    }

    /// 执行一次状态转换并发布事件
    ///
    /// 锁只在转换期间持有。`error` 非空时累加错误计数。
    async fn transition(
        &self,
        name: &str,
        to: ModuleState,
        error: Option<String>,
    ) -> Result<ModuleState> {
        let mut modules = self.modules.write().await;
        let entry = modules
            .get_mut(name)
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))?;

        let from = entry.record.state;
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidStateTransition {
                module: name.to_string(),
                from,
                to,
            });
        }

        entry.record.state = to;
        entry.record.last_state_change = chrono::Utc::now();
        if let Some(message) = &error {
            entry.record.record_error(message.clone());
        }

        let sequence = self.bus.publish(name, from, to, error);
        debug!(module = %name, from = %from, to = %to, sequence, "状态转换");

        Ok(from)
    }

    /// 记录一次不改变状态的失败
    async fn record_failure(&self, name: &str, err: &CoreError) {
        if let Some(entry) = self.modules.write().await.get_mut(name) {
            entry.record.record_error(err.to_string());
            warn!(
                module = %name,
                error = %err,
                error_count = entry.record.error_count,
                "模块未能启动"
            );
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

async fn run_start_hooks(handle: &dyn ModuleHandle, token: CancellationToken) -> anyhow::Result<()> {
    handle.pre_start(token.clone()).await?;
    handle.start(token.clone()).await?;
    handle.post_start(token).await
}

async fn run_stop_hooks(handle: &dyn ModuleHandle, token: CancellationToken) -> anyhow::Result<()> {
    handle.pre_stop(token.clone()).await?;
    handle.stop(token.clone()).await?;
    handle.post_stop(token).await
}
