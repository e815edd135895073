//! Bootstrap supervisor for a locally installed message broker.
//!
//! Loads (or creates) the persisted broker configuration, announces the
//! broker's address over local-network multicast so clients can find it, and
//! makes sure the broker OS service is actually running, starting it if not.

pub mod bootstrap;
pub mod config;
pub mod discovery;
pub mod error;
pub mod params;
pub mod service;
