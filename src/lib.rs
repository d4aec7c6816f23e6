// src/lib.rs — Library root for caseforge

pub mod campaign;
pub mod cli;
pub mod core;
pub mod curator;
pub mod evaluator;
pub mod generator;
pub mod infra;
pub mod planner;
pub mod provider;
pub mod util;
