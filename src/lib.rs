//! hlsdrop - HLS packaging and distribution
//!
//! Splits a source video into an HLS Segment Set with ffmpeg (stream copy), uploads the set
//! to an S3-compatible bucket under a fresh namespace prefix, and proxies playback requests
//! back out of the bucket.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (playlists, keys, namespaces, directory walking, jobs)
//! - ports/: Trait definitions (object store, transcoder)
//! - adapters/: Concrete implementations and the HTTP surface
//! - application/: Segmenter, Uploader, Catalog, Stream Gateway, packaging service
//! - config: Environment configuration
//!
//! # Features
//! - `s3` (default): S3-compatible object store adapter

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use config::AppConfig;
pub use error::PipelineError;
