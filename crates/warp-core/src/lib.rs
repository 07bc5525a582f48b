//! Warp Core - Warp-marker timeline mapping engine

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod map;
pub mod marker;
pub mod snapshot;
pub mod tempo;
pub mod transient;
pub mod types;

pub use types::*;
