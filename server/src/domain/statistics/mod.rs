//! Meter statistics
//!
//! Aggregates samples matching a flat filter, optionally sliced into
//! fixed-width, back-to-back time windows.

mod aggregate;
mod aggregator;
mod error;
mod period;
mod statement;

pub use aggregate::{AggregateFunction, GroupByField};
pub use aggregator::{StatisticsAggregator, StatisticsExecutor, StatisticsQuery};
pub use error::StatsError;
pub use period::{Periods, Window, iter_period};
pub use statement::{StatsStatement, StatsTemplate};
