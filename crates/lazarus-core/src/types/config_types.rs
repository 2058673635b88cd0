//! Configuration types (lazarus.yaml)
//!
//! Every section and field is optional; omitted values fall back to the
//! defaults defined here.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default backup root
pub const DEFAULT_BACKUP_ROOT: &str = "/var/backups/lazarus";

/// Root configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LazarusConfigFile {
    pub recovery: RecoverySettings,
    pub resources: ResourceThresholds,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub application: ApplicationConfig,
    pub containers: ContainerConfig,
    pub kubernetes: KubernetesConfig,
    pub traffic: TrafficConfig,
    pub monitoring: MonitoringConfig,
}

/// Orchestrator ceilings and timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    /// Maximum number of versions a rollback may cross
    pub max_rollback_depth: usize,

    /// Upper bound for the whole verification battery
    pub verification_timeout_secs: u64,

    /// Maximum number of simultaneously executing operations
    pub parallel_recovery_jobs: usize,

    /// Wait after DNS/load-balancer changes before verifying
    pub propagation_wait_secs: u64,

    /// Rollback is refused at or above this many open database connections
    pub max_active_connections: u32,

    /// Capacity of the in-memory recent-operations list
    pub history_limit: usize,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_rollback_depth: 5,
            verification_timeout_secs: 300,
            parallel_recovery_jobs: 2,
            propagation_wait_secs: 30,
            max_active_connections: 50,
            history_limit: 100,
        }
    }
}

/// Headroom required before a rollback may start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceThresholds {
    pub max_cpu_percent: f64,
    pub max_memory_percent: f64,
    pub max_disk_percent: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: 85.0,
            max_memory_percent: 90.0,
            max_disk_percent: 90.0,
        }
    }
}

/// Database connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,

    /// Environment variable holding the password
    pub password_env: String,

    /// Dump tool executable
    pub dump_tool: String,

    /// Restore tool executable
    pub restore_tool: String,

    /// Interactive client executable
    pub client_tool: String,

    /// Hot standby promoted during failover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standby_host: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "app".to_string(),
            user: "postgres".to_string(),
            password_env: "PGPASSWORD".to_string(),
            dump_tool: "pg_dump".to_string(),
            restore_tool: "pg_restore".to_string(),
            client_tool: "psql".to_string(),
            standby_host: None,
        }
    }
}

/// Backup artifact category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupCategory {
    #[default]
    Database,
    Code,
    Config,
}

impl BackupCategory {
    /// Subdirectory of the backup root holding this category
    pub fn subdir(&self) -> &'static str {
        match self {
            BackupCategory::Database => "database",
            BackupCategory::Code => "code_snapshots",
            BackupCategory::Config => "config_snapshots",
        }
    }
}

impl fmt::Display for BackupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupCategory::Database => write!(f, "database"),
            BackupCategory::Code => write!(f, "code"),
            BackupCategory::Config => write!(f, "config"),
        }
    }
}

/// How one backup category is produced. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Normalised to the owning section by the loader
    #[serde(default)]
    pub backup_type: BackupCategory,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default = "default_true")]
    pub encryption: bool,

    /// Storage location; relative paths resolve against the backup root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<Utf8PathBuf>,

    /// Artifacts above this size fail creation
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Write and check a SHA-256 sidecar
    #[serde(default = "default_true")]
    pub verify_integrity: bool,
}

impl BackupConfig {
    pub fn for_category(backup_type: BackupCategory) -> Self {
        Self {
            backup_type,
            retention_days: default_retention_days(),
            compression: true,
            encryption: true,
            storage_location: None,
            max_size_bytes: default_max_size(),
            verify_integrity: true,
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_size() -> u64 {
    50 * 1024 * 1024 * 1024
}

/// Per-category backup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupPolicies {
    pub database: BackupConfig,
    pub code: BackupConfig,
    pub config: BackupConfig,
}

impl Default for BackupPolicies {
    fn default() -> Self {
        Self {
            database: BackupConfig::for_category(BackupCategory::Database),
            code: BackupConfig::for_category(BackupCategory::Code),
            config: BackupConfig::for_category(BackupCategory::Config),
        }
    }
}

impl BackupPolicies {
    /// Force each section's `backup_type` to match its key
    pub fn normalize(&mut self) {
        self.database.backup_type = BackupCategory::Database;
        self.code.backup_type = BackupCategory::Code;
        self.config.backup_type = BackupCategory::Config;
    }

    pub fn get(&self, category: BackupCategory) -> &BackupConfig {
        match category {
            BackupCategory::Database => &self.database,
            BackupCategory::Code => &self.code,
            BackupCategory::Config => &self.config,
        }
    }
}

/// Retention policy for recovery points and their artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Points older than this are deleted by cleanup
    pub days: u32,

    /// Maximum number of points kept per deployment version
    pub versions: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: 30,
            versions: 10,
        }
    }
}

/// Storage paths, encryption and retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backup_root: Utf8PathBuf,

    /// Encryption key file; defaults to `<backup_root>/.backup.key`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<Utf8PathBuf>,

    pub encryption: bool,

    /// Provision a key on first run when none exists
    pub auto_generate_key: bool,

    pub retention: RetentionPolicy,

    pub backups: BackupPolicies,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backup_root: Utf8PathBuf::from(DEFAULT_BACKUP_ROOT),
            key_path: None,
            encryption: true,
            auto_generate_key: true,
            retention: RetentionPolicy::default(),
            backups: BackupPolicies::default(),
        }
    }
}

/// Ephemeral key-value cache for recovery point records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL; no cache target when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: "lazarus:".to_string(),
        }
    }
}

/// The application under protection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub code_dir: Utf8PathBuf,
    pub config_dir: Utf8PathBuf,

    /// HTTP endpoint answering 2xx when the application is responsive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,

    /// Shell command running the post-rollback integration suite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_test_command: Option<String>,

    pub git: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            code_dir: Utf8PathBuf::from("/srv/app"),
            config_dir: Utf8PathBuf::from("/srv/app/config"),
            health_url: None,
            integration_test_command: None,
            git: "git".to_string(),
        }
    }
}

/// Container runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub runtime: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<Utf8PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Image repository updated on rollback (`<image>:<version>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            compose_file: None,
            project: None,
            image: None,
        }
    }
}

/// Orchestration platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    pub namespace: String,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            context: None,
            namespace: "default".to_string(),
        }
    }
}

/// DNS / load balancer hooks. `{version}` is substituted before execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_command: Option<String>,
}

/// Monitoring / alerting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// File whose presence marks monitoring as being in emergency state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_flag_path: Option<Utf8PathBuf>,
}
