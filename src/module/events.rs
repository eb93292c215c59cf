//! 模块状态变更事件
//!
//! 管理器每完成一次状态转换就发布一条 [`StateChange`]。
//! [`StateChangeBus`] 是 [`tokio::sync::broadcast`] 的薄封装：
//!
//! - [`StateChangeBus::publish`] 非阻塞地发送给所有订阅者，没有订阅者时直接丢弃
//! - [`StateChangeBus::subscribe`] 创建新的接收端，慢订阅者会收到 `Lagged` 而不是阻塞引擎

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::metadata::ModuleState;

/// 一次状态转换的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    /// 全局单调递增序号
    pub sequence: u64,
    /// 模块名称
    pub module: String,
    /// 转换前状态
    pub from: ModuleState,
    /// 转换后状态
    pub to: ModuleState,
    /// 转换时间
    pub at: DateTime<Utc>,
    /// 进入 Error 时的错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 状态变更广播通道
#[derive(Clone)]
pub struct StateChangeBus {
    tx: broadcast::Sender<StateChange>,
    seq: Arc<AtomicU64>,
}

impl StateChangeBus {
    /// 使用给定容量创建通道
    ///
    /// 容量为 0 时按 1 处理。
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 发布一次状态转换，返回分配的序号
    pub fn publish(
        &self,
        module: &str,
        from: ModuleState,
        to: ModuleState,
        error: Option<String>,
    ) -> u64 {
        let sequence = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.tx.send(StateChange {
            sequence,
            module: module.to_string(),
            from,
            to,
            at: Utc::now(),
            error,
        });
        sequence
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for StateChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChangeBus")
            .field("subscribers", &self.tx.receiver_count())
            .field("published", &self.seq.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = StateChangeBus::new(4);
        assert_eq!(
            bus.publish("m", ModuleState::NotLoaded, ModuleState::Loading, None),
            1
        );
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_receives_in_order() {
        let bus = StateChangeBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish("db", ModuleState::NotLoaded, ModuleState::Loading, None);
        bus.publish("db", ModuleState::Loading, ModuleState::Started, None);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        assert_eq!(first.to, ModuleState::Loading);
        assert_eq!(second.to, ModuleState::Started);
        assert!(first.sequence < second.sequence);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = StateChangeBus::new(1);
        let mut rx = bus.subscribe();

        bus.publish("a", ModuleState::NotLoaded, ModuleState::Loading, None);
        bus.publish("a", ModuleState::Loading, ModuleState::Started, None);

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().to, ModuleState::Started);
    }
}
