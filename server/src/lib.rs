//! Telemetry sample store queries
//!
//! Compiles flat and tree-shaped sample filters into parameterized SQL, runs
//! them against PostgreSQL and computes per-window meter statistics.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
