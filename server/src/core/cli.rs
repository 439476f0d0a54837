use clap::{Args, Parser, Subcommand};
use chrono::NaiveDateTime;

use std::path::PathBuf;

use crate::data::filters::{FlatFilter, QueryTarget, Scalar};
use crate::data::postgres::repositories::alarms::{AlarmChangeFilter, AlarmFilter};
use crate::utils::time::parse_timestamp;

use super::constants::{ENV_CONFIG, ENV_DEFAULT_LIMIT, ENV_POSTGRES_URL};

#[derive(Parser)]
#[command(name = "meterstore")]
#[command(version, about = "Telemetry sample query compiler and statistics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// Row limit applied when a listing command passes none
    #[arg(long, global = true, env = ENV_DEFAULT_LIMIT)]
    pub default_limit: Option<u32>,
}

/// Parse a query target from CLI string
fn parse_target(s: &str) -> Result<QueryTarget, String> {
    s.parse().map_err(|_| {
        format!(
            "Invalid query target '{}'. Valid options: samples, alarms, alarm_history",
            s
        )
    })
}

/// Parse a timestamp from CLI string
fn parse_timestamp_arg(s: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(s).ok_or_else(|| format!("Invalid timestamp '{}'", s))
}

/// Parse `metadata.key=value`; JSON scalars keep their type, anything else is text
fn parse_metaquery_arg(s: &str) -> Result<(String, Scalar), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid metaquery '{}', expected key=value", s))?;
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Scalar::from_json(&json).map_err(|e| e.to_string())?,
        Err(_) => Scalar::Text(raw.to_string()),
    };
    Ok((key.trim().to_string(), value))
}

/// Flat sample filter flags shared by the listing commands
#[derive(Args, Clone, Debug, Default)]
pub struct FlatFilterArgs {
    /// Meter (counter) name
    #[arg(long)]
    pub meter: Option<String>,

    /// Source name
    #[arg(long)]
    pub source: Option<String>,

    /// User UUID
    #[arg(long)]
    pub user: Option<String>,

    /// Project UUID
    #[arg(long)]
    pub project: Option<String>,

    /// External resource identifier
    #[arg(long)]
    pub resource: Option<String>,

    /// Sample message id
    #[arg(long)]
    pub message_id: Option<String>,

    /// Lower time bound
    #[arg(long, value_parser = parse_timestamp_arg)]
    pub start: Option<NaiveDateTime>,

    /// Lower bound operator (gt or ge)
    #[arg(long)]
    pub start_op: Option<String>,

    /// Upper time bound
    #[arg(long, value_parser = parse_timestamp_arg)]
    pub end: Option<NaiveDateTime>,

    /// Upper bound operator (lt or le)
    #[arg(long)]
    pub end_op: Option<String>,

    /// Metadata match as metadata.key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_metaquery_arg)]
    pub metaquery: Vec<(String, Scalar)>,
}

impl From<FlatFilterArgs> for FlatFilter {
    fn from(args: FlatFilterArgs) -> Self {
        Self {
            meter: args.meter,
            source: args.source,
            user: args.user,
            project: args.project,
            resource: args.resource,
            message_id: args.message_id,
            start: args.start,
            start_op: args.start_op,
            end: args.end,
            end_op: args.end_op,
            metaquery: args.metaquery.into_iter().collect(),
        }
    }
}

/// Flat alarm filter flags
#[derive(Args, Clone, Debug, Default)]
pub struct AlarmFilterArgs {
    /// Alarm name
    #[arg(long)]
    pub name: Option<String>,

    /// Owning user UUID
    #[arg(long)]
    pub user: Option<String>,

    /// Owning project UUID
    #[arg(long)]
    pub project: Option<String>,

    /// Alarm state (ok, alarm, insufficient data)
    #[arg(long)]
    pub state: Option<String>,

    /// Only enabled (true) or disabled (false) alarms
    #[arg(long)]
    pub enabled: Option<bool>,

    #[arg(long)]
    pub alarm_id: Option<i64>,
}

impl From<AlarmFilterArgs> for AlarmFilter {
    fn from(args: AlarmFilterArgs) -> Self {
        Self {
            name: args.name,
            user: args.user,
            project: args.project,
            state: args.state,
            enabled: args.enabled,
            alarm_id: args.alarm_id,
        }
    }
}

/// Alarm history filter flags
#[derive(Args, Clone, Debug)]
pub struct AlarmChangeArgs {
    /// Alarm whose history is listed
    pub alarm_id: i64,

    /// Tenant UUID the changes were made for
    #[arg(long)]
    pub on_behalf_of: Option<String>,

    /// User UUID
    #[arg(long)]
    pub user: Option<String>,

    /// Project UUID
    #[arg(long)]
    pub project: Option<String>,

    /// Change type, e.g. creation or state transition
    #[arg(long = "type")]
    pub change_type: Option<String>,

    /// Lower time bound, inclusive unless --start-op gt
    #[arg(long, value_parser = parse_timestamp_arg)]
    pub start: Option<NaiveDateTime>,

    #[arg(long)]
    pub start_op: Option<String>,

    /// Upper time bound, inclusive unless --end-op lt
    #[arg(long, value_parser = parse_timestamp_arg)]
    pub end: Option<NaiveDateTime>,

    #[arg(long)]
    pub end_op: Option<String>,
}

impl From<AlarmChangeArgs> for AlarmChangeFilter {
    fn from(args: AlarmChangeArgs) -> Self {
        Self {
            alarm_id: args.alarm_id,
            on_behalf_of: args.on_behalf_of,
            user: args.user,
            project: args.project,
            change_type: args.change_type,
            start: args.start,
            start_op: args.start_op,
            end: args.end,
            end_op: args.end_op,
        }
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Print the compiled SQL fragment and parameters of a filter
    Compile {
        /// Filter JSON, e.g. '{"=": {"counter_name": "cpu_util"}}'
        filter: String,

        /// Entity the filter applies to
        #[arg(long, default_value = "samples", value_parser = parse_target)]
        target: QueryTarget,

        /// Ordering JSON, e.g. '[{"timestamp": "desc"}]'
        #[arg(long)]
        orderby: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// List samples of one meter
    Samples {
        #[command(flatten)]
        filter: FlatFilterArgs,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run a complex query against samples, alarms or alarm history
    Query {
        #[arg(long, default_value = "samples", value_parser = parse_target)]
        target: QueryTarget,

        /// Filter JSON; omit to match everything
        #[arg(long)]
        filter: Option<String>,

        /// Ordering JSON
        #[arg(long)]
        orderby: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// Aggregate a meter's samples, optionally per time window
    Statistics {
        #[command(flatten)]
        filter: FlatFilterArgs,

        /// Window length in seconds; omit for one result over the whole range
        #[arg(long)]
        period: Option<u64>,

        /// Group-by fields (comma separated)
        #[arg(long, value_delimiter = ',')]
        groupby: Vec<String>,

        /// Aggregate functions (comma separated); all when omitted
        #[arg(long = "aggregate", value_delimiter = ',')]
        aggregates: Vec<String>,
    },
    /// List meters with their latest resource
    Meters {
        #[command(flatten)]
        filter: FlatFilterArgs,
    },
    /// List resources with their first and last sample
    Resources {
        #[command(flatten)]
        filter: FlatFilterArgs,
    },
    /// List known user ids
    Users {
        /// Only users of this source
        #[arg(long)]
        source: Option<String>,
    },
    /// List known project ids
    Projects {
        /// Only projects of this source
        #[arg(long)]
        source: Option<String>,
    },
    /// List alarms matching field filters
    Alarms {
        #[command(flatten)]
        filter: AlarmFilterArgs,
    },
    /// List the changes of one alarm, newest first
    AlarmHistory {
        #[command(flatten)]
        filter: AlarmChangeArgs,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub postgres_url: Option<String>,
    pub default_limit: Option<u32>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        postgres_url: cli.postgres_url,
        default_limit: cli.default_limit,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statistics_command() {
        let cli = Cli::try_parse_from([
            "meterstore",
            "statistics",
            "--meter",
            "cpu_util",
            "--start",
            "2015-01-01T00:00:00",
            "--period",
            "300",
            "--groupby",
            "project_id,user_id",
            "--aggregate",
            "avg",
        ])
        .unwrap();

        let Commands::Statistics {
            filter,
            period,
            groupby,
            aggregates,
        } = cli.command
        else {
            panic!("expected statistics command");
        };
        assert_eq!(filter.meter.as_deref(), Some("cpu_util"));
        assert!(filter.start.is_some());
        assert_eq!(period, Some(300));
        assert_eq!(groupby, vec!["project_id", "user_id"]);
        assert_eq!(aggregates, vec!["avg"]);
    }

    #[test]
    fn test_parse_metaquery_values() {
        assert_eq!(
            parse_metaquery_arg("metadata.size=5").unwrap(),
            ("metadata.size".to_string(), Scalar::Int(5))
        );
        assert_eq!(
            parse_metaquery_arg("metadata.status=active").unwrap(),
            ("metadata.status".to_string(), Scalar::Text("active".into()))
        );
        assert!(parse_metaquery_arg("metadata.status").is_err());
        assert!(parse_metaquery_arg("metadata.tags=[1]").is_err());
    }

    #[test]
    fn test_flat_filter_from_args() {
        let cli = Cli::try_parse_from([
            "meterstore",
            "samples",
            "--meter",
            "cpu_util",
            "--meta",
            "metadata.image.name=cirros",
            "--limit",
            "10",
        ])
        .unwrap();
        let Commands::Samples { filter, limit } = cli.command else {
            panic!("expected samples command");
        };
        let filter = FlatFilter::from(filter);
        assert_eq!(filter.meter.as_deref(), Some("cpu_util"));
        assert_eq!(
            filter.metaquery.get("metadata.image.name"),
            Some(&Scalar::Text("cirros".into()))
        );
        assert_eq!(limit, Some(10));
    }

    #[test]
    fn test_parse_alarm_commands() {
        let cli = Cli::try_parse_from([
            "meterstore",
            "alarms",
            "--state",
            "alarm",
            "--enabled",
            "false",
        ])
        .unwrap();
        let Commands::Alarms { filter } = cli.command else {
            panic!("expected alarms command");
        };
        let filter = AlarmFilter::from(filter);
        assert_eq!(filter.state.as_deref(), Some("alarm"));
        assert_eq!(filter.enabled, Some(false));

        let cli = Cli::try_parse_from([
            "meterstore",
            "alarm-history",
            "42",
            "--type",
            "creation",
            "--end",
            "2015-04-02T00:00:00",
            "--end-op",
            "lt",
        ])
        .unwrap();
        let Commands::AlarmHistory { filter } = cli.command else {
            panic!("expected alarm-history command");
        };
        let filter = AlarmChangeFilter::from(filter);
        assert_eq!(filter.alarm_id, 42);
        assert_eq!(filter.change_type.as_deref(), Some("creation"));
        assert_eq!(filter.end_op.as_deref(), Some("lt"));
        assert!(filter.end.is_some());
    }

    #[test]
    fn test_parse_owner_commands() {
        let cli = Cli::try_parse_from(["meterstore", "users", "--source", "openstack"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Users { source: Some(ref s) } if s == "openstack"
        ));
        let cli = Cli::try_parse_from(["meterstore", "projects"]).unwrap();
        assert!(matches!(cli.command, Commands::Projects { source: None }));
        assert!(Cli::try_parse_from(["meterstore", "alarm-history"]).is_err());
    }

    #[test]
    fn test_invalid_target_and_timestamp() {
        assert!(Cli::try_parse_from(["meterstore", "query", "--target", "widgets"]).is_err());
        assert!(Cli::try_parse_from(["meterstore", "samples", "--start", "yesterday"]).is_err());
    }
}
