//! Business logic services for the Farm Management Platform

pub mod advisor;
pub mod auth;
pub mod chat;
pub mod events;
pub mod farm;
pub mod profile;
pub mod valve;

pub use advisor::AdvisorService;
pub use auth::AuthService;
pub use chat::ChatService;
pub use events::{FarmEvent, FarmEventBus};
pub use farm::FarmService;
pub use profile::ProfileService;
pub use valve::ValveService;
