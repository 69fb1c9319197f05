// Poll tasks. Each one is invokable by name from the scheduler or the HTTP surface.

pub mod auto_write;
pub mod cleanup;
pub mod clock;
pub mod olt_info;
pub mod onu_info;
pub mod onu_traffic;

use crate::config::{DeadlineConfig, PollingConfig};
use crate::inventory_repo::InventoryRepo;
use crate::transport::TransportSettings;
use chrono::FixedOffset;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskName {
    GetClock,
    CleanOltData,
    GetOltInfo,
    OltAutowrite,
    GetOnuInfo,
    GetOnuTraffic,
    CleanOnuData,
}

impl TaskName {
    pub const ALL: [TaskName; 7] = [
        TaskName::GetClock,
        TaskName::CleanOltData,
        TaskName::GetOltInfo,
        TaskName::OltAutowrite,
        TaskName::GetOnuInfo,
        TaskName::GetOnuTraffic,
        TaskName::CleanOnuData,
    ];

    /// Name used in `[[scheduler.tasks]]`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::GetClock => "get_clock",
            TaskName::CleanOltData => "clean_olt_data",
            TaskName::GetOltInfo => "get_olt_info",
            TaskName::OltAutowrite => "olt_autowrite",
            TaskName::GetOnuInfo => "get_onu_info",
            TaskName::GetOnuTraffic => "get_onu_traffic",
            TaskName::CleanOnuData => "clean_onu_data",
        }
    }

    /// Path segment under `/cron/`.
    pub fn route(&self) -> &'static str {
        match self {
            TaskName::GetClock => "olt-getclock",
            TaskName::CleanOltData => "olt-cleaning",
            TaskName::GetOltInfo => "olt-getinfo",
            TaskName::OltAutowrite => "olt-autowrite",
            TaskName::GetOnuInfo => "onu-getinfo",
            TaskName::GetOnuTraffic => "onu-traffic",
            TaskName::CleanOnuData => "onu-cleaning",
        }
    }

    pub fn from_route(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.route() == segment)
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown task '{s}'"))
    }
}

/// Everything a task needs; cloned into each spawned worker.
#[derive(Clone)]
pub struct TaskContext {
    pub repo: Arc<InventoryRepo>,
    pub transport: TransportSettings,
    pub offset: FixedOffset,
    pub deadlines: DeadlineConfig,
}

impl TaskContext {
    pub fn new(repo: Arc<InventoryRepo>, polling: &PollingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            repo,
            transport: polling.transport(),
            offset: polling.offset()?,
            deadlines: polling.deadlines.clone(),
        })
    }
}

/// Runs one task to completion. Errors only when the task could not start (host listing or
/// cleanup queries failing); per-device failures are logged by the fleet.
pub async fn run_task(ctx: &TaskContext, task: TaskName, caller: &str) -> anyhow::Result<()> {
    let started = Instant::now();
    let (pool_size, pool_idle) = ctx.repo.pool_status();
    info!(task = %task, caller, pool_size, pool_idle, "task started");

    let result = match task {
        TaskName::GetClock => clock::run(ctx).await,
        TaskName::GetOltInfo => olt_info::run(ctx).await,
        TaskName::OltAutowrite => auto_write::run(ctx).await,
        TaskName::GetOnuInfo => onu_info::run(ctx).await,
        TaskName::GetOnuTraffic => onu_traffic::run(ctx).await,
        TaskName::CleanOltData => cleanup::run_olt(ctx).await,
        TaskName::CleanOnuData => cleanup::run_onu(ctx).await,
    };

    let (pool_size, pool_idle) = ctx.repo.pool_status();
    match &result {
        Ok(()) => info!(
            task = %task,
            caller,
            pool_size,
            pool_idle,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task finished"
        ),
        Err(e) => tracing::error!(task = %task, caller, error = %e, "task failed"),
    }
    result
}
