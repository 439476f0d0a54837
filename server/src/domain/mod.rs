//! Domain logic over the sample store
//!
//! - `statistics` - Windowed meter aggregation

pub mod statistics;
