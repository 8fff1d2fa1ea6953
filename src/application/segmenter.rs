use crate::domain::hls::{MediaPlaylist, SegmentSet, PLAYLIST_EXTENSION};
use crate::domain::keys::validate_segment;
use crate::domain::walker::walk;
use crate::error::PipelineError;
use crate::ports::transcoder::{SegmentRequest, Transcoder};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub segment_duration: Duration,
    pub start_number: u64,
    /// 0 = never prune old segments from the playlist
    pub list_size: u32,
    pub timeout: Duration,
    /// Empty the output directory before each run
    pub clean_output: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_secs(10),
            start_number: 0,
            list_size: 0,
            timeout: Duration::from_secs(600),
            clean_output: true,
        }
    }
}

/// Splits one input into an HLS playlist and `.ts` segments inside an output directory.
pub struct Segmenter {
    transcoder: Arc<dyn Transcoder>,
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(transcoder: Arc<dyn Transcoder>, config: SegmenterConfig) -> Self {
        Self { transcoder, config }
    }

    /// Segment `input` into `output_dir` and return the validated Segment Set.
    ///
    /// On any failure the output directory is left empty, so a partial set can never be
    /// picked up by a later upload.
    pub async fn run(&self, input: &Path, output_dir: &Path) -> Result<SegmentSet, PipelineError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| PipelineError::fs(output_dir, e))?;
        if self.config.clean_output {
            clear_dir(output_dir).await?;
        }

        match self.segment(input, output_dir).await {
            Ok(set) => {
                tracing::info!(
                    input = %input.display(),
                    playlist = %set.playlist,
                    segments = set.segments.len(),
                    "Segmentation completed"
                );
                Ok(set)
            }
            Err(err) => {
                tracing::error!(input = %input.display(), error = %err, "Segmentation failed");
                if let Err(clean_err) = clear_dir(output_dir).await {
                    tracing::warn!(error = %clean_err, "Could not discard partial segment set");
                }
                Err(err)
            }
        }
    }

    async fn segment(&self, input: &Path, output_dir: &Path) -> Result<SegmentSet, PipelineError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(PipelineError::SegmentationFailed(format!(
                "{}: No such file or directory",
                input.display()
            )));
        }

        let unusable = || {
            PipelineError::SegmentationFailed(format!("{}: unusable file name", input.display()))
        };
        let stem = input.file_stem().and_then(|s| s.to_str()).ok_or_else(unusable)?;
        // Playlist and `{stem}{n}.ts` names become key segments the gateway must accept.
        let playlist_name = format!("{}{}", stem, PLAYLIST_EXTENSION);
        validate_segment(&playlist_name).map_err(|_| unusable())?;

        let request = SegmentRequest {
            input: input.to_path_buf(),
            playlist: output_dir.join(&playlist_name),
            segment_duration: self.config.segment_duration,
            start_number: self.config.start_number,
            list_size: self.config.list_size,
        };

        let output = tokio::time::timeout(self.config.timeout, self.transcoder.segment(&request))
            .await
            .map_err(|_| PipelineError::SegmentationTimedOut(self.config.timeout))?
            .map_err(|e| PipelineError::SegmentationFailed(format!("failed to run transcoder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("transcoder exited with {}", output.status)
            } else {
                stderr
            };
            return Err(PipelineError::SegmentationFailed(message));
        }

        let text = tokio::fs::read_to_string(&request.playlist)
            .await
            .map_err(|e| PipelineError::SegmentationFailed(format!("playlist unreadable: {}", e)))?;
        let playlist = MediaPlaylist::parse(&text)
            .map_err(|e| PipelineError::SegmentationFailed(format!("playlist invalid: {}", e)))?;

        let present: Vec<String> = walk(output_dir)?.into_iter().map(|f| f.relative).collect();
        SegmentSet::verify(&playlist_name, &playlist, &present, self.config.start_number)
            .map_err(|e| PipelineError::SegmentationFailed(e.to_string()))
    }
}

/// Remove everything inside `dir`, keeping the directory itself.
async fn clear_dir(dir: &Path) -> Result<(), PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::fs(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::fs(dir, e))?
    {
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .map_err(|e| PipelineError::fs(&path, e))?;
        let removed = if is_dir {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| PipelineError::fs(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::transcoder::MockTranscoder;
    use async_trait::async_trait;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use tempfile::tempdir;

    fn mock_output(stderr: &str, success: bool) -> io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1 << 8)
            },
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    /// Writes what ffmpeg would write for `durations`.
    fn write_segment_set(request: &SegmentRequest, durations: &[f64]) {
        let dir = request.playlist.parent().unwrap();
        let stem = request.input.file_stem().unwrap().to_str().unwrap();
        let mut playlist = MediaPlaylist::new(10);
        for (i, duration) in durations.iter().enumerate() {
            let name = format!("{}{}.ts", stem, request.start_number + i as u64);
            std::fs::write(dir.join(&name), format!("segment {}", i)).unwrap();
            playlist.add_segment(*duration, name);
        }
        std::fs::write(&request.playlist, playlist.render()).unwrap();
    }

    fn input_file(dir: &Path) -> std::path::PathBuf {
        let input = dir.join("timer.mp4");
        std::fs::write(&input, b"not really a movie").unwrap();
        input
    }

    #[tokio::test]
    async fn test_segment_set_matches_playlist() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());
        let out = dir.path().join("output");

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_segment()
            .withf(|req| {
                req.playlist.ends_with("output/timer.m3u8")
                    && req.segment_duration == Duration::from_secs(10)
                    && req.start_number == 0
                    && req.list_size == 0
            })
            .times(1)
            .returning(|req| {
                write_segment_set(req, &[10.0, 10.0, 10.0, 5.0]);
                mock_output("", true)
            });

        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());
        let set = segmenter.run(&input, &out).await.unwrap();

        assert_eq!(set.playlist, "timer.m3u8");
        assert_eq!(
            set.segments,
            vec!["timer0.ts", "timer1.ts", "timer2.ts", "timer3.ts"]
        );
    }

    #[tokio::test]
    async fn test_missing_input_leaves_empty_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("output");

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().times(0);

        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());
        let err = segmenter
            .run(&dir.path().join("video/missing.mp4"), &out)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SegmentationFailed(_)));
        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unservable_file_name_is_rejected_before_transcoding() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("output");

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().times(0);
        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());

        for name in ["my clip.mp4", "caf\u{e9}.mp4", "a..b.mp4"] {
            let input = dir.path().join(name);
            std::fs::write(&input, b"movie").unwrap();

            match segmenter.run(&input, &out).await {
                Err(PipelineError::SegmentationFailed(message)) => {
                    assert!(message.contains(name), "{message}");
                    assert!(message.contains("unusable file name"));
                }
                other => panic!("{name:?} should be rejected, got {:?}", other.map(|s| s.playlist)),
            }
            assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
        }
    }

    #[tokio::test]
    async fn test_transcoder_failure_carries_stderr_and_discards_partial_output() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());
        let out = dir.path().join("output");

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().times(1).returning(|req| {
            let dir = req.playlist.parent().unwrap();
            std::fs::write(dir.join("timer0.ts"), b"partial").unwrap();
            mock_output("Invalid data found when processing input", false)
        });

        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());
        let err = segmenter.run(&input, &out).await.unwrap_err();

        match err {
            PipelineError::SegmentationFailed(message) => {
                assert!(message.contains("Invalid data found"))
            }
            other => panic!("expected SegmentationFailed, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_error_is_segmentation_failure() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_segment()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found")));

        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());
        let err = segmenter.run(&input, &dir.path().join("output")).await.unwrap_err();

        assert!(err.to_string().contains("ffmpeg not found"));
    }

    #[tokio::test]
    async fn test_stale_files_are_cleared_before_run() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());
        let out = dir.path().join("output");
        std::fs::create_dir_all(out.join("old")).unwrap();
        std::fs::write(out.join("timer7.ts"), b"stale").unwrap();
        std::fs::write(out.join("old/other.m3u8"), b"stale").unwrap();

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().returning(|req| {
            write_segment_set(req, &[10.0, 4.0]);
            mock_output("", true)
        });

        let segmenter = Segmenter::new(Arc::new(transcoder), SegmenterConfig::default());
        let set = segmenter.run(&input, &out).await.unwrap();

        assert_eq!(set.segments, vec!["timer0.ts", "timer1.ts"]);
        assert!(!out.join("timer7.ts").exists());
        assert!(!out.join("old").exists());
    }

    #[tokio::test]
    async fn test_unlisted_leftover_fails_without_cleaning() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());
        let out = dir.path().join("output");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("timer7.ts"), b"stale").unwrap();

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().returning(|req| {
            write_segment_set(req, &[10.0]);
            mock_output("", true)
        });

        let config = SegmenterConfig {
            clean_output: false,
            ..SegmenterConfig::default()
        };
        let segmenter = Segmenter::new(Arc::new(transcoder), config);
        let err = segmenter.run(&input, &out).await.unwrap_err();

        assert!(err.to_string().contains("timer7.ts"));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    struct HangingTranscoder;

    #[async_trait]
    impl Transcoder for HangingTranscoder {
        async fn segment(&self, _request: &SegmentRequest) -> io::Result<Output> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            mock_output("", true)
        }
    }

    #[tokio::test]
    async fn test_hung_transcoder_times_out() {
        let dir = tempdir().unwrap();
        let input = input_file(dir.path());

        let config = SegmenterConfig {
            timeout: Duration::from_millis(50),
            ..SegmenterConfig::default()
        };
        let segmenter = Segmenter::new(Arc::new(HangingTranscoder), config);
        let err = segmenter.run(&input, &dir.path().join("output")).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::SegmentationTimedOut(d) if d == Duration::from_millis(50)
        ));
    }
}
