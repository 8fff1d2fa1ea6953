//! AWS S3 (and S3-compatible) adapter.

pub mod s3;

pub use s3::S3Store;
