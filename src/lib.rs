//! Citizen report dashboard.
//!
//! Loads a dataset of citizen reports, scores each report with a heuristic
//! priority, serves aggregates and rule-based problem detection over HTTP,
//! and analyzes user-uploaded CSV/Excel files with keyword heuristics.

pub mod analyzer;
pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod problems;
pub mod reports;
pub mod scorer;
pub mod store;
pub mod types;
pub mod upload;
pub mod util;
