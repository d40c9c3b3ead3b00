//! Shared types and models for the Farm Management Platform
//!
//! This crate contains the domain records, validation rules, prompt templates
//! and AI-output parsers shared between the backend and the frontend (via WASM).

pub mod ai_output;
pub mod models;
pub mod prompt;
pub mod types;
pub mod validation;
pub mod valve_rules;

pub use ai_output::*;
pub use models::*;
pub use types::*;
pub use validation::*;
pub use valve_rules::*;
