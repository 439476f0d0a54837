//! Statistics errors

use thiserror::Error;

use crate::data::DataError;
use crate::data::filters::FilterError;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Unable to group by field: {0}")]
    UnsupportedGroupBy(String),

    #[error("Unsupported aggregate function: {0}")]
    UnsupportedAggregate(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Statistics query cancelled")]
    Cancelled,
}
