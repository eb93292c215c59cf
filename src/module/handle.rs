//! 模块生命周期句柄
//!
//! 定义生命周期管理器驱动模块所需的能力接口。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::metadata::HealthStatus;

/// 模块生命周期句柄
///
/// 每个注册的模块提供一个句柄。管理器按 `pre_start -> start -> post_start`
/// 启动模块，按 `pre_stop -> stop -> post_stop` 停止模块。
///
/// 所有钩子都会收到取消令牌，超时或全局关闭时令牌被取消，
/// 长时间运行的钩子应当在 `token.cancelled()` 上尽快返回。
///
/// # 示例
///
/// ```rust
/// use async_trait::async_trait;
/// use chips_orchestrator::module::handle::ModuleHandle;
/// use tokio_util::sync::CancellationToken;
///
/// struct Database;
///
/// #[async_trait]
/// impl ModuleHandle for Database {
///     async fn start(&self, _token: CancellationToken) -> anyhow::Result<()> {
///         Ok(())
///     }
///
///     async fn stop(&self, _token: CancellationToken) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ModuleHandle: Send + Sync {
    /// 启动前钩子
    async fn pre_start(&self, _token: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启动模块
    async fn start(&self, token: CancellationToken) -> anyhow::Result<()>;

    /// 启动后钩子
    async fn post_start(&self, _token: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// 停止前钩子
    async fn pre_stop(&self, _token: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// 停止模块
    async fn stop(&self, token: CancellationToken) -> anyhow::Result<()>;

    /// 停止后钩子
    async fn post_stop(&self, _token: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// 是否支持重载
    fn can_reload(&self) -> bool {
        false
    }

    /// 重载模块（仅在 `can_reload` 返回 true 时调用）
    async fn reload(&self, _token: CancellationToken) -> anyhow::Result<()> {
        anyhow::bail!("reload is not implemented")
    }

    /// 是否提供自定义健康检查
    fn has_health_check(&self) -> bool {
        false
    }

    /// 自定义健康检查（仅在 `has_health_check` 返回 true 时调用）
    ///
    /// 返回值的 `duration` 由管理器覆盖为实测耗时。
    async fn health_check(&self, _token: CancellationToken) -> anyhow::Result<HealthStatus> {
        Ok(HealthStatus::healthy("ok"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::HealthState;

    struct Minimal;

    #[async_trait]
    impl ModuleHandle for Minimal {
        async fn start(&self, _token: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self, _token: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_capabilities() {
        let handle = Minimal;
        let token = CancellationToken::new();

        assert!(!handle.can_reload());
        assert!(!handle.has_health_check());
        assert!(handle.pre_start(token.clone()).await.is_ok());
        assert!(handle.post_stop(token.clone()).await.is_ok());
        assert!(handle.reload(token.clone()).await.is_err());

        let health = handle.health_check(token).await.unwrap();
        assert_eq!(health.status, HealthState::Healthy);
    }
}
