//! Read-side repositories over the sample store

pub mod alarms;
pub mod identities;
pub mod meters;
pub mod resources;
pub mod samples;
pub mod statistics;
