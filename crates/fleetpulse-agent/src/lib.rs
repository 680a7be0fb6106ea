//! Store-and-forward delivery for the fleetpulse agent.
//!
//! Collected records are appended to a date-partitioned queue on local disk
//! ([`queue`]). On a coarser timer the [`scheduler`] checks connectivity
//! ([`probe`]) and hands the queue to the [`delivery`] engine, which ships
//! whole partitions oldest-first through a [`sender`] and deletes each one
//! only after the endpoint accepted it. Delivery is at-least-once.

pub mod config;
pub mod delivery;
pub mod error;
pub mod probe;
pub mod queue;
pub mod scheduler;
pub mod sender;

use tracing_subscriber::EnvFilter;

/// Installs the `fmt` subscriber, honouring `RUST_LOG` on top of
/// `fleetpulse=info`.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleetpulse=info".parse()?))
        .init();
    Ok(())
}
