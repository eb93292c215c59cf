//! 健康状态汇总
//!
//! 把各模块的 [`HealthStatus`] 汇总成一份报告，整体状态取最差的一项。

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metadata::{HealthState, HealthStatus};
use crate::utils::error::status_code;

/// 健康检查汇总报告
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// 整体状态（各模块中最差的）
    pub status: HealthState,

    /// 按模块名索引的明细
    pub modules: BTreeMap<String, HealthStatus>,

    /// 汇总时间
    pub checked_at: DateTime<Utc>,

    /// 全部检查总耗时（毫秒）
    #[serde(serialize_with = "super::metadata::duration_millis::serialize")]
    pub duration: Duration,
}

impl HealthReport {
    /// 汇总各模块状态
    ///
    /// 没有任何模块时视为健康。
    pub fn aggregate<I>(statuses: I, duration: Duration) -> Self
    where
        I: IntoIterator<Item = (String, HealthStatus)>,
    {
        let modules: BTreeMap<String, HealthStatus> = statuses.into_iter().collect();
        let status = modules
            .values()
            .map(|s| s.status)
            .max()
            .unwrap_or(HealthState::Healthy);

        Self {
            status,
            modules,
            checked_at: Utc::now(),
            duration,
        }
    }

    /// 对应的 HTTP 状态码：不健康时 503，否则 200
    pub fn http_status(&self) -> u16 {
        match self.status {
            HealthState::Unhealthy => status_code::SERVICE_UNAVAILABLE,
            HealthState::Healthy | HealthState::Degraded => status_code::OK,
        }
    }

    /// 整体是否健康
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }

    /// 非健康的模块名
    pub fn unhealthy_modules(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|(_, s)| s.status != HealthState::Healthy)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
