//! quizgrade-core: assessment scoring and attempt lifecycle.
//!
//! This crate defines the quiz data model, per-type scoring strategies, the
//! attempt state machine, start/expiry policy, and the reduction of many
//! attempts into one reportable grade. Persistence, identity, and
//! notification are collaborators injected through [`traits`].

pub mod attempt;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod parser;
pub mod policy;
pub mod reducer;
pub mod report;
pub mod scoring;
pub mod statistics;
pub mod traits;
