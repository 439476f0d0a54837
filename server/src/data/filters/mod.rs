//! Query filter system
//!
//! Compiles sample filters into parameterized SQL WHERE fragments.
//! Two input forms are supported: flat filters (an implicit conjunction of
//! optional fields) and expression trees (`and`/`or`/`not` over comparisons and
//! metadata matches). Every value is bound through a positional `%s`
//! placeholder; column text only ever comes from compiled-in allow-lists.
//!
//! ## Usage
//!
//! ```no_run
//! use meterstore_server::data::filters::{QueryTarget, compile_tree, parse_filter};
//!
//! let json = r#"{"and": [{"=": {"counter_name": "cpu_util"}}, {">": {"counter_volume": 5}}]}"#;
//! let expr = parse_filter(json, QueryTarget::Samples).unwrap();
//! let query = compile_tree(&expr).unwrap();
//! assert_eq!(query.placeholder_count(), query.parameters.len());
//! ```

mod builder;
mod error;
pub mod flat;
pub mod metadata;
mod parser;
mod types;

pub use builder::{
    OrderBy, QueryTarget, SortDirection, columns, compile_orderby, compile_query, compile_tree,
};
pub use error::FilterError;
pub use flat::{Condition, ConditionKind, FlatConditions, FlatFilter, compile_flat};
pub use parser::{parse_filter, parse_filter_value, parse_filter_with_limit, parse_orderby};
pub use types::{
    BoolKind, Compilation, CompiledQuery, EmptyReason, FieldDef, FieldKind, FieldRef,
    FilterExpression, Operator, PLACEHOLDER, Scalar, SqlParams, SqlValue,
};
