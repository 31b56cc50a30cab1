//! Article like counters: cache-buffered writes reconciled into Postgres.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
