// src/core/mod.rs — Shared data model and persistence helpers

pub mod state;
pub mod types;
