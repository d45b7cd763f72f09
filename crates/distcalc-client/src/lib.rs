//! Client library for submitting expressions to a distcalc orchestrator.

pub mod client;

pub use client::DistcalcClient;
