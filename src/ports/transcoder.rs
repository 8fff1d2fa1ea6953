use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

/// One HLS segmentation run handed to the transcoder.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    pub input: PathBuf,
    /// Playlist path inside the output directory, e.g. `output/timer.m3u8`
    pub playlist: PathBuf,
    pub segment_duration: Duration,
    pub start_number: u64,
    /// 0 keeps every segment in the playlist
    pub list_size: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run to completion and report the process output
    async fn segment(&self, request: &SegmentRequest) -> io::Result<Output>;
}
