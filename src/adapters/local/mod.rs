//! Local adapters: filesystem object store and the ffmpeg process runner.

pub mod ffmpeg;
pub mod fs;

pub use ffmpeg::FfmpegTranscoder;
pub use fs::FsStore;
