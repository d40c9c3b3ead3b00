//! Domain models for the Farm Management Platform

mod chat;
mod crop;
mod farm;
mod profile;
mod user;
mod valve;
mod weather;

pub use chat::*;
pub use crop::*;
pub use farm::*;
pub use profile::*;
pub use user::*;
pub use valve::*;
pub use weather::*;
