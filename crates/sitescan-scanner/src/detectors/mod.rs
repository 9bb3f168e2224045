//! Heuristic detectors run inline by the primary analyzer.

pub mod dap;
pub mod uswds;

pub use dap::{DapScan, DapScriptCandidate};
pub use uswds::UswdsScan;
