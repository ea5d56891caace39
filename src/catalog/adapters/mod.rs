//! Adapter implementations for catalog ports.

mod cipher;
pub mod http;
pub mod memory;
pub mod postgres;

pub use cipher::AesGcmCredentialSealer;
pub use http::HttpCatalogFetcher;
