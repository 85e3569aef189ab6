//! Constants and runtime tunables.
//!
//! Compile time constants live at module level, while values that can be tuned at
//! deploy time are collected in [`Configurables`] and read once from the environment
//! (a `.env` file in the working directory is loaded first, if present).

use log::warn;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Page size used when the caller does not provide one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Hard cap on the page size of any query holding a prefix search filter.
pub const SEARCH_PAGE_SIZE_CAP: usize = 50;

/// Highest code point of the private use area, appended to a prefix to obtain
/// the lexical upper bound of a prefix search.
pub const SEARCH_UPPER_BOUND_SENTINEL: char = '\u{f8ff}';

/// Document field that carries the document identifier in typed payloads.
pub const DOCUMENT_ID_FIELD: &str = "id";

pub mod flags {
    /// Boolean flag signaling that the backend is under maintenance.
    pub const IS_MAINTENANCE: &str = "is_maintenance";
    /// String flag holding the minimum version clients must run.
    pub const FORCE_UPDATE_VERSION: &str = "force_update_version";
    /// Minimum version assumed when the remote source does not provide one.
    pub const DEFAULT_FORCE_UPDATE_VERSION: &str = "1.0";
}

pub mod env {
    pub const STORE_URL: &str = "CLOUDUTILS_STORE_URL";
    pub const MAX_CONCURRENT_FETCHES: &str = "CLOUDUTILS_MAX_CONCURRENT_FETCHES";
    pub const FLAGS_MIN_FETCH_INTERVAL_SECS: &str = "CLOUDUTILS_FLAGS_MIN_FETCH_INTERVAL_SECS";
    pub const MAX_DOWNLOAD_BYTES: &str = "CLOUDUTILS_MAX_DOWNLOAD_BYTES";
    pub const UPLOAD_CHUNK_BYTES: &str = "CLOUDUTILS_UPLOAD_CHUNK_BYTES";
}

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;
const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 1024 * 1024;
const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 5 * 1024 * 1024;
/// Smallest non final part accepted by S3 multipart uploads.
const MIN_UPLOAD_CHUNK_BYTES: usize = 5 * 1024 * 1024;
const RELEASE_FLAGS_MIN_FETCH_INTERVAL_SECS: u64 = 720;

#[derive(Debug, Clone, PartialEq)]
pub struct Configurables {
    /// Upper bound of concurrent fetches issued by a batch get.
    pub max_concurrent_fetches: usize,
    /// Minimum time between two effective remote flag fetches.
    pub flags_min_fetch_interval: Duration,
    /// Maximum size of a blob loaded in memory.
    pub max_download_bytes: u64,
    /// Size of each part sent by a multipart upload, never below 5 MiB.
    pub upload_chunk_bytes: usize,
}

impl Default for Configurables {
    fn default() -> Self {
        let min_fetch_interval_secs = if cfg!(debug_assertions) {
            0
        } else {
            RELEASE_FLAGS_MIN_FETCH_INTERVAL_SECS
        };

        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            flags_min_fetch_interval: Duration::from_secs(min_fetch_interval_secs),
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            upload_chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
        }
    }
}

impl Configurables {
    /// Builds the configurables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrent_fetches = parse_or(
            env::MAX_CONCURRENT_FETCHES,
            defaults.max_concurrent_fetches,
            &mut lookup,
        )
        .max(1);

        let flags_min_fetch_interval = Duration::from_secs(parse_or(
            env::FLAGS_MIN_FETCH_INTERVAL_SECS,
            defaults.flags_min_fetch_interval.as_secs(),
            &mut lookup,
        ));

        let max_download_bytes = parse_or(
            env::MAX_DOWNLOAD_BYTES,
            defaults.max_download_bytes,
            &mut lookup,
        );

        let upload_chunk_bytes = parse_or(
            env::UPLOAD_CHUNK_BYTES,
            defaults.upload_chunk_bytes,
            &mut lookup,
        )
        .max(MIN_UPLOAD_CHUNK_BYTES);

        Self {
            max_concurrent_fetches,
            flags_min_fetch_interval,
            max_download_bytes,
            upload_chunk_bytes,
        }
    }
}

fn parse_or<T, F>(key: &str, default: T, lookup: &mut F) -> T
where
    T: FromStr + Copy,
    F: FnMut(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("invalid value `{}` for `{}`, using default", raw, key);
            default
        }
    }
}

static CONFIGURABLES: OnceLock<Configurables> = OnceLock::new();

/// Returns the process wide configurables, loading them on first access.
pub fn configurables() -> &'static Configurables {
    CONFIGURABLES.get_or_init(|| {
        dotenv::dotenv().ok();
        Configurables::from_env()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let conf = Configurables::from_lookup(lookup(&[]));
        assert_eq!(conf, Configurables::default());
        assert_eq!(conf.max_download_bytes, 1024 * 1024);
    }

    #[test]
    fn reads_overrides() {
        let conf = Configurables::from_lookup(lookup(&[
            (env::MAX_CONCURRENT_FETCHES, "4"),
            (env::FLAGS_MIN_FETCH_INTERVAL_SECS, " 30 "),
            (env::MAX_DOWNLOAD_BYTES, "2048"),
            (env::UPLOAD_CHUNK_BYTES, "8388608"),
        ]));

        assert_eq!(conf.max_concurrent_fetches, 4);
        assert_eq!(conf.flags_min_fetch_interval, Duration::from_secs(30));
        assert_eq!(conf.max_download_bytes, 2048);
        assert_eq!(conf.upload_chunk_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn invalid_values_fall_back() {
        let conf = Configurables::from_lookup(lookup(&[
            (env::MAX_CONCURRENT_FETCHES, "many"),
            (env::UPLOAD_CHUNK_BYTES, "0"),
        ]));

        assert_eq!(conf.max_concurrent_fetches, DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(conf.upload_chunk_bytes, MIN_UPLOAD_CHUNK_BYTES);
    }

    #[test]
    fn chunk_size_respects_multipart_minimum() {
        let conf = Configurables::from_lookup(lookup(&[(env::UPLOAD_CHUNK_BYTES, "4096")]));
        assert_eq!(conf.upload_chunk_bytes, 5 * 1024 * 1024);
    }
}
