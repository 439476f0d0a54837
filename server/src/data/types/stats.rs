//! Statistics result types

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// One row returned by an aggregate statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsRow {
    /// Earliest sample timestamp in the group
    pub tsmin: Option<NaiveDateTime>,
    /// Latest sample timestamp in the group
    pub tsmax: Option<NaiveDateTime>,
    pub unit: Option<String>,
    /// Aggregate name (`avg`, `count`, ...) to value; null aggregates are absent
    pub aggregates: BTreeMap<String, f64>,
    /// Group-by field (`project_id`, ...) to identifier
    pub groupby: BTreeMap<String, String>,
}

/// Statistics for one time window (or the whole range when unbounded)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsBucket {
    /// Actual window length in seconds; 0 when no period was requested
    pub period: u64,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    /// Timestamps of the first and last sample inside the window
    pub duration_start: Option<NaiveDateTime>,
    pub duration_end: Option<NaiveDateTime>,
    /// Seconds between `duration_start` and `duration_end`
    pub duration: Option<f64>,
    pub unit: Option<String>,
    pub aggregates: BTreeMap<String, f64>,
    pub groupby: BTreeMap<String, String>,
}
