//! Toolhub: shared tool catalogs for multi-tenant tool servers.
//!
//! Upstream tool servers expose catalogs of callable tools. Tenants bind
//! one or more catalogs into composite entities and choose which tools each
//! binding allows. This crate keeps the shared catalogs in step with their
//! upstreams and assembles new composite entities from several catalogs.
//!
//! # Architecture
//!
//! Toolhub follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, HTTP, etc.)
//!
//! # Modules
//!
//! - [`catalog`]: Catalog refresh, template merge, and binding administration
//! - [`config`]: Console settings and environment overrides

pub mod catalog;
pub mod config;
