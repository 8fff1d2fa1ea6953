//! Adapters - Concrete implementations of ports, plus the HTTP surface.

#[cfg(feature = "s3")]
pub mod aws;

pub mod http;
pub mod local;
