//! Shared tool catalogs, tenant bindings, and their reconciliation.
//!
//! This module follows hexagonal architecture:
//!
//! - **Domain**: catalogs, tools, bindings, change detection, write plans
//! - **Ports**: store, credential, fetcher, sealer, and outbox contracts
//! - **Adapters**: in-memory, `PostgreSQL`, HTTP, and AES-GCM implementations
//! - **Services**: refresh, merge, binding administration, dispatch

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
