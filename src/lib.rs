//! Batch Photo Edit Worker
//!
//! This library provides the core functionality for the batch-edit-worker
//! system, which polls a PostgreSQL job table for pending image edits, applies
//! a fixed color/tone pipeline to each source image, and publishes the result
//! to R2 object storage.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
