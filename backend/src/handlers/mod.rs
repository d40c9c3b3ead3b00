//! HTTP handlers for the Farm Management Platform

pub mod advisor;
pub mod auth;
pub mod chat;
pub mod events;
pub mod farm;
pub mod health;
pub mod profile;
pub mod valve;

pub use advisor::*;
pub use auth::*;
pub use chat::*;
pub use events::*;
pub use farm::*;
pub use health::*;
pub use profile::*;
pub use valve::*;
