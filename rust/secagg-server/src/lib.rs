//! The coordinator of the secure aggregation protocol.
//!
//! It loads its [`settings`] from a configuration file, registers simulated participants and
//! drives aggregation rounds of either scheme of [`secagg_core`] through the
//! [`coordinator::Coordinator`].

pub mod coordinator;
pub mod settings;
