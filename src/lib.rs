//! Lead Intake API Library
//!
//! This library provides the core functionality for the lead intake service:
//! schema validation and rate limiting for landing-page lead submissions, and
//! best-effort fan-out of accepted leads to a webhook and an email inbox.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Lead data models.
//! - `notify`: Delivery channel fan-out.
//! - `rate_limit`: Fixed-window rate limiting.
//! - `validation`: Lead schema validation.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod rate_limit;
pub mod validation;
