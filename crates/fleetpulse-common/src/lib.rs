//! Shared data model for the fleetpulse agent crates.

pub mod types;
