use crate::scheduler::parse_schedule;
use crate::tasks::TaskName;
use crate::transport::TransportSettings;
use chrono::FixedOffset;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
}

/// HTTP Basic credentials guarding the /cron routes.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_telnet_port")]
    pub telnet_port: u16,
    #[serde(default = "default_snmp_port")]
    pub snmp_port: u16,
    /// ICMP probe before opening device sessions.
    #[serde(default = "default_true")]
    pub verify_reachable: bool,
    /// Fixed offset for device clocks and cron schedules.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub deadlines: DeadlineConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            telnet_port: default_telnet_port(),
            snmp_port: default_snmp_port(),
            verify_reachable: true,
            utc_offset_hours: default_utc_offset_hours(),
            deadlines: DeadlineConfig::default(),
        }
    }
}

impl PollingConfig {
    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            telnet_port: self.telnet_port,
            snmp_port: self.snmp_port,
            verify_reachable: self.verify_reachable,
        }
    }

    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            anyhow::anyhow!("polling.utc_offset_hours out of range: {}", self.utc_offset_hours)
        })
    }
}

fn default_telnet_port() -> u16 {
    23
}

fn default_snmp_port() -> u16 {
    161
}

fn default_true() -> bool {
    true
}

fn default_utc_offset_hours() -> i32 {
    -4
}

/// Room kept under a worker deadline to reconcile and store rows from a walk cut short.
const WALK_MARGIN: Duration = Duration::from_secs(6);

/// Telnet connect plus login, ahead of the `write` exchange.
pub const SESSION_SETUP: Duration = Duration::from_secs(15);

/// Outer per-device budget for each task, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_clock_secs")]
    pub clock_secs: u64,
    #[serde(default = "default_olt_info_secs")]
    pub olt_info_secs: u64,
    #[serde(default = "default_auto_write_secs")]
    pub auto_write_secs: u64,
    #[serde(default = "default_onu_info_secs")]
    pub onu_info_secs: u64,
    #[serde(default = "default_onu_traffic_secs")]
    pub onu_traffic_secs: u64,
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            clock_secs: default_clock_secs(),
            olt_info_secs: default_olt_info_secs(),
            auto_write_secs: default_auto_write_secs(),
            onu_info_secs: default_onu_info_secs(),
            onu_traffic_secs: default_onu_traffic_secs(),
            cleanup_secs: default_cleanup_secs(),
        }
    }
}

impl DeadlineConfig {
    pub fn for_task(&self, task: TaskName) -> Duration {
        let secs = match task {
            TaskName::GetClock => self.clock_secs,
            TaskName::GetOltInfo => self.olt_info_secs,
            TaskName::OltAutowrite => self.auto_write_secs,
            TaskName::GetOnuInfo => self.onu_info_secs,
            TaskName::GetOnuTraffic => self.onu_traffic_secs,
            TaskName::CleanOltData | TaskName::CleanOnuData => self.cleanup_secs,
        };
        Duration::from_secs(secs)
    }

    /// Deadline for SNMP table walks inside one worker; always ends before `for_task`.
    pub fn walk_budget(&self, task: TaskName) -> Duration {
        let outer = self.for_task(task);
        outer - WALK_MARGIN.min(outer / 4)
    }

    /// Exchange budget for `write`: the autowrite deadline minus session setup.
    pub fn write_budget(&self) -> Duration {
        self.for_task(TaskName::OltAutowrite)
            .saturating_sub(SESSION_SETUP)
    }

    fn all(&self) -> [(&'static str, u64); 6] {
        [
            ("clock_secs", self.clock_secs),
            ("olt_info_secs", self.olt_info_secs),
            ("auto_write_secs", self.auto_write_secs),
            ("onu_info_secs", self.onu_info_secs),
            ("onu_traffic_secs", self.onu_traffic_secs),
            ("cleanup_secs", self.cleanup_secs),
        ]
    }
}

fn default_clock_secs() -> u64 {
    20
}

fn default_olt_info_secs() -> u64 {
    20
}

fn default_auto_write_secs() -> u64 {
    70
}

fn default_onu_info_secs() -> u64 {
    40
}

fn default_onu_traffic_secs() -> u64 {
    57
}

fn default_cleanup_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tasks: Vec<ScheduledTask>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tasks: Vec::new(),
        }
    }
}

/// One `[[scheduler.tasks]]` line.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledTask {
    pub task: String,
    /// Cron expression, 5 fields (minute first) or 6 (seconds first).
    pub schedule: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            !self.auth.username.is_empty() && !self.auth.password.is_empty(),
            "auth.username and auth.password must be non-empty"
        );
        anyhow::ensure!(
            self.polling.telnet_port > 0 && self.polling.snmp_port > 0,
            "polling ports must be > 0"
        );
        anyhow::ensure!(
            (-12..=14).contains(&self.polling.utc_offset_hours),
            "polling.utc_offset_hours must be within -12..=14, got {}",
            self.polling.utc_offset_hours
        );
        for (field, secs) in self.polling.deadlines.all() {
            anyhow::ensure!(secs > 0, "polling.deadlines.{field} must be > 0");
        }
        anyhow::ensure!(
            self.polling.deadlines.auto_write_secs > SESSION_SETUP.as_secs(),
            "polling.deadlines.auto_write_secs must exceed {}s of login, got {}",
            SESSION_SETUP.as_secs(),
            self.polling.deadlines.auto_write_secs
        );
        for entry in &self.scheduler.tasks {
            anyhow::ensure!(
                entry.task.parse::<TaskName>().is_ok(),
                "scheduler.tasks: unknown task '{}'",
                entry.task
            );
            if let Err(e) = parse_schedule(&entry.schedule) {
                anyhow::bail!(
                    "scheduler.tasks: invalid schedule '{}' for {}: {}",
                    entry.schedule,
                    entry.task,
                    e
                );
            }
        }
        Ok(())
    }
}
