//! Core engine — the scan → evaluate → acquire loop.

pub mod scanner;
pub mod evaluator;
pub mod executor;
pub mod scheduler;
