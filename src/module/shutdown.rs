//! 进程关闭钩子
//!
//! [`ShutdownHook`] 保证 `stop_all_modules` 在整个进程生命周期内只执行一次，
//! 无论有多少调用方（信号处理、启动失败后的清理、管理端点）同时触发。
//!
//! 在 Unix 上监听 SIGINT / SIGTERM / SIGQUIT，其他平台只监听 Ctrl-C。

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::lifecycle::LifecycleManager;

/// 只执行一次的关闭钩子
pub struct ShutdownHook {
    manager: Arc<LifecycleManager>,
    done: OnceCell<()>,
}

impl ShutdownHook {
    /// 为管理器创建关闭钩子
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        Self {
            manager,
            done: OnceCell::new(),
        }
    }

    /// 触发关闭
    ///
    /// 第一次调用执行停止流程并返回 `true`；并发的其他调用等待其完成后返回 `false`。
    /// 仍在进行的启动流程会在下一个检查点中止，不会在关闭之后再拉起模块。
    pub async fn trigger(&self, token: CancellationToken) -> bool {
        let mut ran = false;
        let ran_ref = &mut ran;
        let manager = &self.manager;

        self.done
            .get_or_init(|| async move {
                *ran_ref = true;
                info!("执行关闭钩子，停止全部模块");
                if let Err(e) = manager.stop_all_modules(token).await {
                    error!(error = %e, "关闭钩子停止模块失败");
                }
            })
            .await;

        ran
    }

    /// 是否已经执行过
    pub fn is_triggered(&self) -> bool {
        self.done.initialized()
    }

    /// 在后台等待关闭信号，收到后触发钩子
    pub fn install(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => info!("收到关闭信号"),
                Err(e) => error!(error = %e, "监听关闭信号失败，立即关闭"),
            }
            self.trigger(token).await;
        })
    }
}

/// 等待进程终止信号
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// 等待进程终止信号
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
