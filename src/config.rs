//! Configuration, read once at startup and shared read-only afterwards.

use crate::domain::keys::validate_segment;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} env var required")]
    Missing(&'static str),
}

/// S3-compatible bucket settings.
#[derive(Clone, Debug)]
pub struct S3Settings {
    /// Custom endpoint for S3-compatible providers, e.g. `https://ewr1.vultrobjects.com`
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

#[derive(Clone, Debug)]
pub enum StorageSettings {
    S3(S3Settings),
    /// Directory-backed store for local runs
    Local { root: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Source video packaged by `/convert`
    pub input_file: PathBuf,
    /// Directory holding the Segment Set between segmentation and upload
    pub working_dir: PathBuf,
    /// First component of every object key
    pub collection_root: String,
    pub segment_duration: Duration,
    pub upload_concurrency: usize,
    pub transcode_timeout: Duration,
    pub clean_working_dir: bool,
    pub namespace_salt: Option<String>,
    pub ffmpeg_bin: String,
    pub index_html: PathBuf,
    pub video_stream_url: String,
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let backend = get("STORAGE_BACKEND").unwrap_or_else(|| {
            if get("S3_BUCKET").is_some() {
                "s3".to_string()
            } else {
                "local".to_string()
            }
        });

        let storage = match backend.as_str() {
            "s3" => StorageSettings::S3(S3Settings {
                endpoint: get("S3_ENDPOINT"),
                region: or("S3_REGION", "us-east-1"),
                bucket: get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?,
                access_key_id: get("S3_ACCESS_KEY_ID"),
                secret_access_key: get("S3_SECRET_ACCESS_KEY"),
                connect_timeout: Duration::from_secs(parse(vars, "S3_CONNECT_TIMEOUT_SECS", 10)?),
                operation_timeout: Duration::from_secs(parse(
                    vars,
                    "S3_OPERATION_TIMEOUT_SECS",
                    30,
                )?),
            }),
            "local" => StorageSettings::Local {
                root: PathBuf::from(or("LOCAL_STORE_DIR", "object-store")),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: backend,
                })
            }
        };

        let upload_concurrency: usize = parse(vars, "UPLOAD_CONCURRENCY", 8)?;
        if upload_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        let namespace_salt = get("NAMESPACE_SALT");
        if let Some(salt) = &namespace_salt {
            if validate_segment(salt).is_err() {
                return Err(ConfigError::Invalid {
                    name: "NAMESPACE_SALT",
                    value: salt.clone(),
                });
            }
        }

        Ok(Self {
            addr: or("ADDR", "127.0.0.1"),
            port: or("PORT", "3000"),
            input_file: PathBuf::from(or("INPUT_FILE", "video/timer.mp4")),
            working_dir: PathBuf::from(or("WORKING_DIR", "output")),
            collection_root: or("COLLECTION_ROOT", "videos"),
            segment_duration: Duration::from_secs(parse(vars, "SEGMENT_DURATION_SECS", 10)?),
            upload_concurrency,
            transcode_timeout: Duration::from_secs(parse(vars, "TRANSCODE_TIMEOUT_SECS", 600)?),
            clean_working_dir: parse(vars, "CLEAN_WORKING_DIR", true)?,
            namespace_salt,
            ffmpeg_bin: or("FFMPEG_BIN", "ffmpeg"),
            index_html: PathBuf::from(or("INDEX_HTML", "static/index.html")),
            video_stream_url: or("VIDEO_STREAM_URL", "/video-local/timer.m3u8"),
            storage,
        })
    }
}

fn parse<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name).filter(|v| !v.is_empty()) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_use_local_store() {
        let config = AppConfig::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.port, "3000");
        assert_eq!(config.collection_root, "videos");
        assert_eq!(config.segment_duration, Duration::from_secs(10));
        assert_eq!(config.input_file, PathBuf::from("video/timer.mp4"));
        assert!(config.clean_working_dir);
        assert!(matches!(config.storage, StorageSettings::Local { .. }));
    }

    #[test]
    fn test_bucket_selects_s3() {
        let config = AppConfig::from_vars(&vars(&[
            ("S3_BUCKET", "media"),
            ("S3_ENDPOINT", "https://ewr1.vultrobjects.com"),
            ("S3_REGION", "ewr1"),
        ]))
        .unwrap();

        match config.storage {
            StorageSettings::S3(s3) => {
                assert_eq!(s3.bucket, "media");
                assert_eq!(s3.region, "ewr1");
                assert_eq!(s3.connect_timeout, Duration::from_secs(10));
                assert_eq!(s3.operation_timeout, Duration::from_secs(30));
            }
            other => panic!("expected S3 settings, got {:?}", other),
        }
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let result = AppConfig::from_vars(&vars(&[("STORAGE_BACKEND", "s3")]));
        assert!(matches!(result, Err(ConfigError::Missing("S3_BUCKET"))));
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let result = AppConfig::from_vars(&vars(&[("UPLOAD_CONCURRENCY", "many")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "UPLOAD_CONCURRENCY",
                ..
            })
        ));

        let result = AppConfig::from_vars(&vars(&[("UPLOAD_CONCURRENCY", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_salt_cannot_escape_namespace() {
        let result = AppConfig::from_vars(&vars(&[("NAMESPACE_SALT", "../x")]));
        assert!(result.is_err());
    }
}
