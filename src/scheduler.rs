// Cron dispatcher. One loop per enabled task; the next fire time is computed only after the
// previous run returned, so a task never overlaps itself.

use crate::config::SchedulerConfig;
use crate::tasks::{TaskContext, TaskName, run_task};
use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Accepts 5-field (minute first) or 6/7-field (seconds first) expressions.
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expr}"))
    } else {
        Schedule::from_str(expr)
    }
}

/// Next fire time strictly after `now`.
pub fn next_fire(schedule: &Schedule, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    schedule.after(&now).next()
}

/// Spawns one loop per enabled entry. Loops exit when `shutdown` flips to true.
pub fn spawn(
    config: &SchedulerConfig,
    ctx: TaskContext,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    if !config.enabled {
        info!("scheduler disabled");
        return Ok(Vec::new());
    }
    let mut handles = Vec::new();
    for entry in config.tasks.iter().filter(|t| t.enabled) {
        let task: TaskName = entry.task.parse()?;
        let schedule = parse_schedule(&entry.schedule)
            .map_err(|e| anyhow::anyhow!("schedule '{}' for {}: {}", entry.schedule, task, e))?;
        info!(task = %task, schedule = %entry.schedule, "task scheduled");
        handles.push(tokio::spawn(task_loop(
            task,
            schedule,
            ctx.clone(),
            shutdown.clone(),
        )));
    }
    Ok(handles)
}

async fn task_loop(
    task: TaskName,
    schedule: Schedule,
    ctx: TaskContext,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now().with_timezone(&ctx.offset);
        let Some(next) = next_fire(&schedule, now) else {
            warn!(task = %task, "schedule has no future fire time");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!(task = %task, "scheduler loop stopping");
                return;
            }
        }
        // Failures are already logged by run_task; the next tick is the retry.
        let _ = run_task(&ctx, task, "scheduler").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expressions_get_seconds() {
        let schedule = parse_schedule("*/5 * * * *").unwrap();
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 1, 2, 14, 23, 1).unwrap();
        let next = next_fire(&schedule, now).unwrap();
        assert_eq!(next, offset.with_ymd_and_hms(2024, 1, 2, 14, 25, 0).unwrap());
    }

    #[test]
    fn six_field_expressions_pass_through() {
        assert!(parse_schedule("30 0 3 * * *").is_ok());
        assert!(parse_schedule("every minute").is_err());
    }
}
