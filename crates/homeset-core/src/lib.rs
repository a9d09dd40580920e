//! Homeset core: damage cooldowns, delayed teleports and home resolution.
//!
//! The host (game server bridge, tests) supplies movement/damage/disconnect
//! events and the teleport primitive through [`host::HomeHost`]; everything
//! else lives here.

pub mod config;
pub mod cooldown;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod service;

pub use config::Settings;
pub use error::{ErrorKind, HomeError};
pub use host::{HomeHost, MoveResult, SharingPolicy};
pub use service::{HomeService, SetHomeOutcome, SetSharedOutcome};
