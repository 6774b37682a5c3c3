//! jobdash - job execution statistics dashboard
//!
//! Users register and log in against a SQLite user table; logged-in users see
//! status counts, runtimes and per-month summaries aggregated from the
//! externally populated month tables (`Jan`..`Dec`).
//! All modules are public so the integration tests can drive them.

pub mod entities;
pub mod errors;
pub mod jobs;
pub mod secrets;
pub mod session;
pub mod settings;
pub mod storage;
pub mod web;
