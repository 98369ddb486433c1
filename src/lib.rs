//! Lead Qualification API Library
//!
//! Backend for a sales-lead qualification dashboard: lead CRUD with BANT
//! scores, filtered listing and export, dashboard analytics, and the Ideal
//! Customer Profile (ICP) reference data.
//!
//! # Modules
//!
//! - `analytics`: Dashboard aggregates over a lead list.
//! - `api`: Route table.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema setup.
//! - `db_storage`: Postgres storage backend.
//! - `errors`: Error handling types.
//! - `export`: Normalized JSON and CSV exports.
//! - `filters`: Query-parameter validation and lead filters.
//! - `handlers`: Lead HTTP handlers and shared state.
//! - `icp_handler`: ICP HTTP handlers.
//! - `models`: Core data models.
//! - `storage`: Repository traits and the in-memory backend.
//! - `validation`: Payload validation and merge patches.

pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod export;
pub mod filters;
pub mod handlers;
pub mod icp_handler;
pub mod models;
pub mod storage;
pub mod validation;
