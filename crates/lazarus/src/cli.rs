//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use lazarus_core::types::RecoveryType;

/// Lazarus - disaster recovery and rollback orchestration
#[derive(Parser, Debug)]
#[command(name = "lazarus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to lazarus.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show recent recovery operations and available recovery points
    Status(StatusArgs),

    /// Capture a recovery point of the current state
    CreateRecoveryPoint(CreateRecoveryPointArgs),

    /// Roll the application back to a previous version
    Rollback(RollbackArgs),

    /// Execute a disaster-recovery strategy
    DisasterRecovery(DisasterRecoveryArgs),

    /// List recovery points
    ListRecoveryPoints(ListRecoveryPointsArgs),

    /// Delete recovery points, artifacts and operation records past retention
    Cleanup(CleanupArgs),

    /// Check connectivity to the database, cache, container runtime and backup storage
    Health(HealthArgs),
}

fn parse_recovery_type(value: &str) -> Result<RecoveryType, String> {
    value.parse().map_err(|e: lazarus_core::Error| e.to_string())
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of operations to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct CreateRecoveryPointArgs {
    /// Deployment version the point captures
    #[arg(value_name = "VERSION")]
    pub deployment_version: String,

    /// Recovery type recorded on the point
    #[arg(long = "type", default_value = "rollback", value_parser = parse_recovery_type)]
    pub recovery_type: RecoveryType,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Version to roll back to
    #[arg(value_name = "VERSION")]
    pub target_version: String,

    /// Restore from this recovery point instead of the latest one for the version
    #[arg(long)]
    pub recovery_point: Option<String>,

    /// Skip feasibility validation (a safety point is still taken)
    #[arg(short, long)]
    pub force: bool,

    /// Do not ask for confirmation
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Args, Debug)]
pub struct DisasterRecoveryArgs {
    /// Recovery type: rollback, failover, restore, emergency_stop,
    /// data_recovery, service_recovery or infrastructure_recovery
    #[arg(value_parser = parse_recovery_type)]
    pub recovery_type: RecoveryType,

    /// Recovery point to restore from
    #[arg(long)]
    pub recovery_point: Option<String>,

    /// Alert at critical level before acting
    #[arg(long)]
    pub emergency: bool,
}

#[derive(Args, Debug)]
pub struct ListRecoveryPointsArgs {
    /// Only points created within the last N days
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Show at most N points
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Report what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rollback_flags() {
        let cli = Cli::try_parse_from([
            "lazarus",
            "rollback",
            "v1.4.0",
            "--force",
            "--non-interactive",
        ])
        .unwrap();
        match cli.command {
            Commands::Rollback(args) => {
                assert_eq!(args.target_version, "v1.4.0");
                assert!(args.force);
                assert!(args.non_interactive);
                assert!(args.recovery_point.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_disaster_type_is_case_insensitive() {
        let cli =
            Cli::try_parse_from(["lazarus", "disaster-recovery", "EMERGENCY_STOP", "--emergency"])
                .unwrap();
        match cli.command {
            Commands::DisasterRecovery(args) => {
                assert_eq!(args.recovery_type, RecoveryType::EmergencyStop);
                assert!(args.emergency);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_disaster_type_rejected() {
        assert!(Cli::try_parse_from(["lazarus", "disaster-recovery", "reboot"]).is_err());
    }

    #[test]
    fn test_create_point_type_defaults_to_rollback() {
        let cli = Cli::try_parse_from(["lazarus", "create-recovery-point", "v2.0.0"]).unwrap();
        match cli.command {
            Commands::CreateRecoveryPoint(args) => {
                assert_eq!(args.deployment_version, "v2.0.0");
                assert_eq!(args.recovery_type, RecoveryType::Rollback);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_positional_version_does_not_shadow_version_flag() {
        let cli = Cli::try_parse_from(["lazarus", "create-recovery-point", "v2.0.0"]).unwrap();
        assert!(matches!(cli.command, Commands::CreateRecoveryPoint(_)));

        let err = Cli::try_parse_from(["lazarus", "rollback", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_disaster_recovery_accepts_rollback() {
        let cli = Cli::try_parse_from(["lazarus", "disaster-recovery", "rollback"]).unwrap();
        match cli.command {
            Commands::DisasterRecovery(args) => {
                assert_eq!(args.recovery_type, RecoveryType::Rollback)
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lazarus",
            "list-recovery-points",
            "--days",
            "1",
            "--limit",
            "5",
            "-vv",
            "--config",
            "/etc/lazarus.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref().map(|p| p.as_str()), Some("/etc/lazarus.yaml"));
        match cli.command {
            Commands::ListRecoveryPoints(args) => {
                assert_eq!(args.days, 1);
                assert_eq!(args.limit, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
