//! Statistics aggregator
//!
//! Drives aggregate statements through an executor. Unbounded requests run a
//! single statement; periodic requests run one statement per time window,
//! sequentially, reusing the same SQL text with only the window bounds varying.

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use tokio_util::sync::CancellationToken;

use super::aggregate::{AggregateFunction, GroupByField};
use super::error::StatsError;
use super::period::{Window, iter_period};
use super::statement::{StatsStatement, StatsTemplate};
use crate::data::DataError;
use crate::data::filters::FlatFilter;
use crate::data::types::{StatisticsBucket, StatisticsRow};
use crate::utils::time::span_seconds;

/// Runs one aggregate statement and maps its rows
#[async_trait]
pub trait StatisticsExecutor: Send + Sync {
    async fn fetch_statistics(
        &self,
        statement: &StatsStatement,
    ) -> Result<Vec<StatisticsRow>, DataError>;
}

/// A statistics request over a flat filter
#[derive(Debug, Clone, Default)]
pub struct StatisticsQuery {
    pub filter: FlatFilter,
    /// Window length in seconds; `None` or `0` computes one unbounded result
    pub period: Option<u64>,
    pub groupby: Vec<String>,
    /// Aggregate function names; empty selects all of them
    pub aggregates: Vec<String>,
}

pub struct StatisticsAggregator<E> {
    executor: E,
    cancel: CancellationToken,
}

impl<E: StatisticsExecutor> StatisticsAggregator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort before the next round trip once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Compute statistics for a meter.
    ///
    /// Allow-lists and the filter are validated before any statement runs.
    pub async fn get_meter_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<StatisticsBucket>, StatsError> {
        let aggregates = AggregateFunction::parse_list(&query.aggregates)?;
        let groupby = GroupByField::parse_list(&query.groupby)?;

        let Some(template) = StatsTemplate::from_filter(&query.filter, &aggregates, &groupby)?
        else {
            return Ok(Vec::new());
        };

        match query.period.filter(|period| *period > 0) {
            None => self.unbounded(&template).await,
            Some(period) => self.periodic(&query.filter, &template, period).await,
        }
    }

    async fn unbounded(&self, template: &StatsTemplate) -> Result<Vec<StatisticsBucket>, StatsError> {
        let rows = self.execute(&template.unbounded()).await?;
        Ok(rows.into_iter().map(unbounded_bucket).collect())
    }

    async fn periodic(
        &self,
        filter: &FlatFilter,
        template: &StatsTemplate,
        period: u64,
    ) -> Result<Vec<StatisticsBucket>, StatsError> {
        let (start, end) = match (filter.start, filter.end) {
            (Some(start), Some(end)) => (start, end),
            _ => match self.discover_range(template).await? {
                Some((tsmin, tsmax)) => (
                    filter.start.unwrap_or(tsmin),
                    // the range is half-open, keep the latest sample inside it
                    filter.end.unwrap_or_else(|| after(tsmax)),
                ),
                None => {
                    tracing::debug!("No samples match the statistics filter");
                    return Ok(Vec::new());
                }
            },
        };

        let mut buckets = Vec::new();
        for window in iter_period(start, end, period) {
            let rows = self.execute(&template.windowed(window)).await?;
            buckets.extend(rows.into_iter().map(|row| window_bucket(row, window)));
        }

        tracing::debug!(
            period,
            %start,
            %end,
            buckets = buckets.len(),
            "Computed periodic statistics"
        );
        Ok(buckets)
    }

    /// Overall sample time span under the filter, ignoring grouping
    async fn discover_range(
        &self,
        template: &StatsTemplate,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, StatsError> {
        let rows = self.execute(&template.ungrouped().unbounded()).await?;
        let tsmin = rows.iter().filter_map(|r| r.tsmin).min();
        let tsmax = rows.iter().filter_map(|r| r.tsmax).max();
        Ok(tsmin.zip(tsmax))
    }

    async fn execute(&self, statement: &StatsStatement) -> Result<Vec<StatisticsRow>, StatsError> {
        if self.cancel.is_cancelled() {
            return Err(StatsError::Cancelled);
        }
        tracing::trace!(sql = %statement.sql, params = statement.params.len(), "Executing statistics statement");
        Ok(self.executor.fetch_statistics(statement).await?)
    }
}

fn after(ts: NaiveDateTime) -> NaiveDateTime {
    ts.checked_add_signed(TimeDelta::microseconds(1))
        .unwrap_or(ts)
}

fn duration(row: &StatisticsRow) -> Option<f64> {
    row.tsmin
        .zip(row.tsmax)
        .map(|(tsmin, tsmax)| span_seconds(tsmin, tsmax))
}

fn unbounded_bucket(row: StatisticsRow) -> StatisticsBucket {
    StatisticsBucket {
        period: 0,
        period_start: row.tsmin,
        period_end: row.tsmax,
        duration_start: row.tsmin,
        duration_end: row.tsmax,
        duration: duration(&row),
        unit: row.unit,
        aggregates: row.aggregates,
        groupby: row.groupby,
    }
}

fn window_bucket(row: StatisticsRow, window: Window) -> StatisticsBucket {
    StatisticsBucket {
        period: window.seconds(),
        period_start: Some(window.start),
        period_end: Some(window.end),
        duration_start: row.tsmin,
        duration_end: row.tsmax,
        duration: duration(&row),
        unit: row.unit,
        aggregates: row.aggregates,
        groupby: row.groupby,
    }
}
