//! Shared data types for query results
//!
//! Typed records per result shape, plus the statistics row and bucket types
//! shared between the aggregator and its executors.

mod rows;
mod stats;

// Re-export row types
pub use rows::{AlarmChangeRow, AlarmRow, MeterRow, ResourceRow, SampleRow};

// Re-export stats types
pub use stats::{StatisticsBucket, StatisticsRow};
