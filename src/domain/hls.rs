use std::collections::BTreeSet;
use std::fmt::Write as _;
use thiserror::Error;

pub const PLAYLIST_EXTENSION: &str = ".m3u8";
pub const SEGMENT_EXTENSION: &str = ".ts";
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Content type served for a Segment Set member, decided by its trailing extension only.
pub fn content_type_for(name: &str) -> &'static str {
    if is_playlist(name) {
        PLAYLIST_CONTENT_TYPE
    } else {
        SEGMENT_CONTENT_TYPE
    }
}

pub fn is_playlist(name: &str) -> bool {
    name.ends_with(PLAYLIST_EXTENSION)
}

#[derive(Debug, Error, PartialEq)]
pub enum PlaylistError {
    #[error("missing #EXTM3U header")]
    MissingHeader,
    #[error("malformed tag: {0}")]
    MalformedTag(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub duration: f64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration: u64,
    pub media_sequence: u64,
    pub segments: Vec<MediaSegment>,
    /// `#EXT-X-ENDLIST` seen: the muxer finished and no segment will be appended
    pub end_list: bool,
}

impl MediaPlaylist {
    pub fn new(target_duration: u64) -> Self {
        Self {
            target_duration,
            media_sequence: 0,
            segments: Vec::new(),
            end_list: true,
        }
    }

    pub fn add_segment(&mut self, duration: f64, uri: String) {
        self.segments.push(MediaSegment { duration, uri });
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.uri.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        // Writing into a String cannot fail.
        out.push_str("#EXT-X-VERSION:3\n");
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration);
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence);

        for segment in &self.segments {
            let _ = writeln!(out, "#EXTINF:{:.6},", segment.duration);
            out.push_str(&segment.uri);
            out.push('\n');
        }

        if self.end_list {
            out.push_str("#EXT-X-ENDLIST\n");
        }

        out
    }

    pub fn parse(text: &str) -> Result<Self, PlaylistError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        if lines.next() != Some("#EXTM3U") {
            return Err(PlaylistError::MissingHeader);
        }

        let mut playlist = MediaPlaylist::new(0);
        playlist.end_list = false;
        let mut pending_duration: Option<f64> = None;

        for line in lines {
            if let Some(value) = line.strip_prefix("#EXTINF:") {
                let duration = value.split(',').next().unwrap_or_default();
                pending_duration = Some(
                    duration
                        .parse()
                        .map_err(|_| PlaylistError::MalformedTag(line.to_string()))?,
                );
            } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                playlist.target_duration = parse_tag(line, value)?;
            } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
                playlist.media_sequence = parse_tag(line, value)?;
            } else if line == "#EXT-X-ENDLIST" {
                playlist.end_list = true;
            } else if line.starts_with('#') {
                // Other tags carry nothing the pipeline needs.
                continue;
            } else {
                let duration = pending_duration.take().unwrap_or_default();
                playlist.add_segment(duration, line.to_string());
            }
        }

        Ok(playlist)
    }
}

fn parse_tag<T: std::str::FromStr>(line: &str, value: &str) -> Result<T, PlaylistError> {
    value
        .trim()
        .parse()
        .map_err(|_| PlaylistError::MalformedTag(line.to_string()))
}

#[derive(Debug, Error, PartialEq)]
pub enum SegmentSetError {
    #[error("playlist {0:?} is not among the produced files")]
    MissingPlaylist(String),
    #[error("playlist has no #EXT-X-ENDLIST, segmentation did not finish")]
    Unterminated,
    #[error("segments listed but not present: {0:?}")]
    Missing(Vec<String>),
    #[error("segments present but not listed: {0:?}")]
    Unlisted(Vec<String>),
    #[error("segment {position} is {found:?}, expected {expected:?}")]
    Numbering {
        position: usize,
        expected: String,
        found: String,
    },
}

/// One playlist plus the segment files it enumerates, as produced for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSet {
    pub playlist: String,
    pub segments: Vec<String>,
}

impl SegmentSet {
    /// Checks a parsed playlist against the files actually present next to it.
    ///
    /// `present` holds paths relative to the output directory, playlist included.
    /// Segments must be named `{stem}{n}.ts` with `n` counting up from `start_number`.
    pub fn verify(
        playlist_name: &str,
        playlist: &MediaPlaylist,
        present: &[String],
        start_number: u64,
    ) -> Result<Self, SegmentSetError> {
        if !present.iter().any(|p| p == playlist_name) {
            return Err(SegmentSetError::MissingPlaylist(playlist_name.to_string()));
        }
        if !playlist.end_list {
            return Err(SegmentSetError::Unterminated);
        }

        let listed: BTreeSet<&str> = playlist.uris().collect();
        let on_disk: BTreeSet<&str> = present
            .iter()
            .map(String::as_str)
            .filter(|p| *p != playlist_name)
            .collect();

        let missing: Vec<String> = listed.difference(&on_disk).map(|s| s.to_string()).collect();
        if !missing.is_empty() {
            return Err(SegmentSetError::Missing(missing));
        }
        let unlisted: Vec<String> = on_disk.difference(&listed).map(|s| s.to_string()).collect();
        if !unlisted.is_empty() {
            return Err(SegmentSetError::Unlisted(unlisted));
        }

        let stem = playlist_name
            .strip_suffix(PLAYLIST_EXTENSION)
            .unwrap_or(playlist_name);
        for (position, uri) in playlist.uris().enumerate() {
            let expected = format!("{}{}{}", stem, start_number + position as u64, SEGMENT_EXTENSION);
            if uri != expected {
                return Err(SegmentSetError::Numbering {
                    position,
                    expected,
                    found: uri.to_string(),
                });
            }
        }

        Ok(Self {
            playlist: playlist_name.to_string(),
            segments: playlist.uris().map(String::from).collect(),
        })
    }
}
