//! Ports - Trait definitions for the pipeline's external capabilities.

pub mod storage;
pub mod transcoder;
