//! Core application

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, ENV_LOG};
use crate::data::PostgresService;
use crate::data::filters::{
    Compilation, FilterExpression, FlatFilter, OrderBy, QueryTarget, compile_query,
    parse_filter_with_limit, parse_orderby,
};
use crate::data::postgres::repositories::{
    alarms, identities, meters, resources, samples, statistics,
};
use crate::domain::statistics::StatisticsQuery;

pub struct CoreApp {
    pub config: AppConfig,
    pub database: PostgresService,
    /// Fired on Ctrl-C; long statistics runs stop before their next round trip
    pub cancel: CancellationToken,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        // compiling needs no database
        if let Commands::Compile {
            filter,
            target,
            orderby,
            limit,
        } = &command
        {
            let config = AppConfig::load(&cli_config)?;
            let output = compile_command(&config, filter, *target, orderby.as_deref(), *limit)?;
            return print_json(&output);
        }

        let app = Self::init(&cli_config).await?;
        let result = app.execute(command).await;
        app.database.close().await;
        result
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let database = PostgresService::init(&config.postgres)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("Interrupt received, cancelling");
                on_signal.cancel();
            }
        });

        Ok(Self {
            config,
            database,
            cancel,
        })
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        let pool = self.database.pool();
        match command {
            Commands::Compile { .. } => Ok(()),
            Commands::Samples { filter, limit } => {
                let filter = FlatFilter::from(filter);
                let rows =
                    samples::get_samples(pool, &filter, self.config.query.limit(limit)).await?;
                print_json(&rows)
            }
            Commands::Query {
                target,
                filter,
                orderby,
                limit,
            } => {
                let (expr, orderby) =
                    self.parse_complex(target, filter.as_deref(), orderby.as_deref())?;
                let limit = self.config.query.limit(limit);
                match target {
                    QueryTarget::Samples => print_json(
                        &samples::query_samples(pool, expr.as_ref(), &orderby, limit).await?,
                    ),
                    QueryTarget::Alarms => print_json(
                        &alarms::query_alarms(pool, expr.as_ref(), &orderby, limit).await?,
                    ),
                    QueryTarget::AlarmHistory => print_json(
                        &alarms::query_alarm_history(pool, expr.as_ref(), &orderby, limit).await?,
                    ),
                }
            }
            Commands::Statistics {
                filter,
                period,
                groupby,
                aggregates,
            } => {
                let query = StatisticsQuery {
                    filter: FlatFilter::from(filter),
                    period,
                    groupby,
                    aggregates,
                };
                let buckets =
                    statistics::get_meter_statistics(pool, &query, self.cancel.clone()).await?;
                print_json(&buckets)
            }
            Commands::Meters { filter } => {
                print_json(&meters::get_meters(pool, &FlatFilter::from(filter)).await?)
            }
            Commands::Resources { filter } => {
                print_json(&resources::get_resources(pool, &FlatFilter::from(filter)).await?)
            }
            Commands::Users { source } => {
                print_json(&identities::get_users(pool, source.as_deref()).await?)
            }
            Commands::Projects { source } => {
                print_json(&identities::get_projects(pool, source.as_deref()).await?)
            }
            Commands::Alarms { filter } => {
                print_json(&alarms::get_alarms(pool, &filter.into()).await?)
            }
            Commands::AlarmHistory { filter } => {
                print_json(&alarms::get_alarm_changes(pool, &filter.into()).await?)
            }
        }
    }

    fn parse_complex(
        &self,
        target: QueryTarget,
        filter: Option<&str>,
        orderby: Option<&str>,
    ) -> Result<(Option<FilterExpression>, Vec<OrderBy>)> {
        let max_bytes = self.config.query.max_filter_json_bytes;
        let expr = filter
            .map(|json| parse_filter_with_limit(json, target, max_bytes))
            .transpose()?;
        let orderby = match orderby {
            Some(json) => parse_orderby(json, target)?,
            None => Vec::new(),
        };
        Ok((expr, orderby))
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

/// Compiled SQL fragment and parameters of a filter, as JSON
fn compile_command(
    config: &AppConfig,
    filter: &str,
    target: QueryTarget,
    orderby: Option<&str>,
    limit: Option<u32>,
) -> Result<serde_json::Value> {
    let expr = parse_filter_with_limit(filter, target, config.query.max_filter_json_bytes)?;
    let orderby = match orderby {
        Some(json) => parse_orderby(json, target)?,
        None => Vec::new(),
    };
    Ok(match compile_query(Some(&expr), &orderby, limit)? {
        Compilation::Query(query) => json!({
            "sql": query.where_clause,
            "parameters": query.parameters,
        }),
        Compilation::Empty(reason) => json!({ "empty": format!("{:?}", reason) }),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_command_output() {
        let output = compile_command(
            &AppConfig::default(),
            r#"{"or": [{"=": {"counter_name": "cpu_util"}}, {">": {"counter_volume": 5}}]}"#,
            QueryTarget::Samples,
            Some(r#"[{"timestamp": "desc"}]"#),
            Some(10),
        )
        .unwrap();
        assert_eq!(
            output["sql"],
            " where (counter_name = %s or counter_volume > %s) order by timestamp desc limit %s"
        );
        assert_eq!(output["parameters"], json!(["cpu_util", 5.0, 10]));
    }

    #[test]
    fn test_compile_command_zero_limit() {
        let output = compile_command(
            &AppConfig::default(),
            r#"{"=": {"state": "ok"}}"#,
            QueryTarget::Alarms,
            None,
            Some(0),
        )
        .unwrap();
        assert_eq!(output["empty"], "ZeroLimit");
    }

    #[test]
    fn test_compile_command_respects_size_limit() {
        let mut config = AppConfig::default();
        config.query.max_filter_json_bytes = 8;
        assert!(
            compile_command(
                &config,
                r#"{"=": {"state": "ok"}}"#,
                QueryTarget::Alarms,
                None,
                None
            )
            .is_err()
        );
    }
}
