//! Argument parsing for the `attendance` binary.

use attendance_core::config::{ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL, ENV_UTC_OFFSET};
use attendance_core::{ConfigError, CoreConfig, Role, YearMonth};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level parser. Global flags fall back to `ATTENDANCE_*` variables.
#[derive(Debug, Parser)]
#[command(name = "attendance", version, about = "Role-scoped attendance ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite store path
    #[arg(long, global = true, env = ENV_DB_PATH)]
    pub db: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = ENV_LOG_LEVEL)]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; file logging is off without it
    #[arg(long, global = true, env = ENV_LOG_DIR)]
    pub log_dir: Option<PathBuf>,

    /// Offset defining calendar days, e.g. +02:00
    #[arg(long, global = true, env = ENV_UTC_OFFSET, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Authenticated user id to act as
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub actor: Option<Uuid>,
}

impl Cli {
    /// Merges flags (already overlaid on the environment by clap) into a
    /// validated core config.
    pub fn core_config(&self) -> Result<CoreConfig, ConfigError> {
        CoreConfig::from_lookup(|key| match key {
            ENV_DB_PATH => self.db.as_ref().map(|path| path.display().to_string()),
            ENV_LOG_LEVEL => self.log_level.clone(),
            ENV_LOG_DIR => self.log_dir.as_ref().map(|path| path.display().to_string()),
            ENV_UTC_OFFSET => self.utc_offset.clone(),
            _ => None,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a user to the directory
    Register(RegisterArgs),
    /// List directory entries visible to the actor
    Users,
    /// Show the actor's own directory entry
    Profile,
    /// Mark today's attendance for the actor
    Mark,
    /// List attendance records visible to the actor
    List(ListArgs),
    /// Change a record's status (Admin/Manager)
    Edit {
        id: Uuid,
        /// Present|Absent
        status: String,
    },
    /// Delete a record (Admin/Manager)
    Delete { id: Uuid },
    /// Read the audit log (Admin)
    Audit(AuditArgs),
    /// Present/absent counts
    #[command(subcommand)]
    Summary(SummaryCommand),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    /// Admin|Manager|User (default User)
    #[arg(long)]
    pub role: Option<Role>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only records in this month (YYYY-MM)
    #[arg(long)]
    pub month: Option<YearMonth>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Only entries for this record id
    #[arg(long)]
    pub record: Option<Uuid>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Debug, Subcommand)]
pub enum SummaryCommand {
    /// Counts for one subject
    Subject {
        id: Uuid,
        #[arg(long)]
        month: Option<YearMonth>,
    },
    /// Counts for every subject in the actor's scope
    Team {
        #[arg(long)]
        month: Option<YearMonth>,
    },
}
