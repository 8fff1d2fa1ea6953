use crate::ports::transcoder::{SegmentRequest, Transcoder};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Runs the `ffmpeg` binary for HLS segmentation with stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn args(request: &SegmentRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), request.input.clone().into()];
        for (flag, value) in [
            ("-codec", "copy".to_string()),
            ("-start_number", request.start_number.to_string()),
            ("-hls_time", request.segment_duration.as_secs().to_string()),
            ("-hls_list_size", request.list_size.to_string()),
            ("-f", "hls".to_string()),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }
        args.push(request.playlist.clone().into());
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn segment(&self, request: &SegmentRequest) -> io::Result<Output> {
        tracing::debug!(binary = %self.binary, ?request, "Spawning transcoder");
        Command::new(&self.binary)
            .args(Self::args(request))
            .stdin(Stdio::null())
            // A timed-out run is dropped by the caller; the child must die with it.
            .kill_on_drop(true)
            .output()
            .await
    }
}
