//! Client library for the campus platform microservices.
//!
//! Two pieces carry the interesting behavior:
//!
//! - [`stats::Aggregator`] fans out independent fetches and keeps every
//!   outcome, so one unavailable service never hides the others.
//! - [`task::TaskPoller`] starts a long-running server job and follows its
//!   status until it settles or the caller stops observing it.
//!
//! Everything else is the REST plumbing ([`api`], [`session`]) and the
//! presentation used by the `campusctl` binary.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod session;
pub mod stats;
pub mod task;
