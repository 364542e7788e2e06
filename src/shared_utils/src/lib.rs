//! Small helpers shared by the portfolio crates.

pub mod env;
