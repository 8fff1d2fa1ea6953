//! Application layer - services composed over the ports.

pub mod catalog;
pub mod gateway;
pub mod pipeline;
pub mod segmenter;
pub mod uploader;
