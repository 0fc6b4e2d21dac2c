//! Local cache for remote inputs (vocabularies, n-gram lists, corpora).
//!
//! A URL maps to a cache file named after the hash of the URL, plus the hash of the
//! server's ETag when one is available. Each cached file gets a `<file>.json`
//! sidecar recording the URL and ETag it came from. When the ETag cannot be fetched
//! (offline, non-200 HEAD) the newest-looking cached variant of the URL is reused.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::constants::cache::{
    CACHE_DIR_ENV, DEFAULT_CACHE_DIR, DOWNLOAD_BUFFER_BYTES, FILENAME_HASH_SEED, META_SUFFIX,
};
use crate::errors::PretrainError;
use crate::hash::stable_hash_str;

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    url: String,
    etag: Option<String>,
}

/// Cache directory from `PRETRAIN_DATA_CACHE`, else `$HOME/.cache/pretrain_data`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(value) = env::var(CACHE_DIR_ENV)
        && !value.trim().is_empty()
    {
        return PathBuf::from(value);
    }
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_CACHE_DIR),
        None => PathBuf::from(DEFAULT_CACHE_DIR),
    }
}

/// Repeatable cache filename for `url`, extended with the ETag hash when known.
pub fn url_to_filename(url: &str, etag: Option<&str>) -> String {
    let mut filename = format!("{:016x}", stable_hash_str(FILENAME_HASH_SEED, url));
    if let Some(etag) = etag {
        filename.push('.');
        filename.push_str(&format!("{:016x}", stable_hash_str(FILENAME_HASH_SEED, etag)));
    }
    filename
}

/// URL and ETag recorded for a cached `filename`.
pub fn filename_to_url(
    filename: &str,
    cache_dir: &Path,
) -> Result<(String, Option<String>), PretrainError> {
    let cache_path = cache_dir.join(filename);
    if !cache_path.exists() {
        return Err(PretrainError::FileNotFound {
            path: cache_path.display().to_string(),
        });
    }
    let meta_path = meta_path_for(&cache_path);
    if !meta_path.exists() {
        return Err(PretrainError::FileNotFound {
            path: meta_path.display().to_string(),
        });
    }
    let metadata: CacheMetadata = serde_json::from_slice(&fs::read(&meta_path)?)?;
    Ok((metadata.url, metadata.etag))
}

/// Resolve a URL or local path to a readable local file.
///
/// `http`/`https` URLs go through the cache; existing paths are returned unchanged.
pub fn cached_path(url_or_filename: &str, cache_dir: Option<&Path>) -> Result<PathBuf, PretrainError> {
    let scheme = url_or_filename
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();
    match scheme.as_str() {
        "http" | "https" => {
            let cache_dir = cache_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(default_cache_dir);
            get_from_cache(url_or_filename, &cache_dir)
        }
        "s3" => Err(PretrainError::Configuration(format!(
            "s3 urls are not supported: {url_or_filename}"
        ))),
        _ if Path::new(url_or_filename).exists() => Ok(PathBuf::from(url_or_filename)),
        "" => Err(PretrainError::FileNotFound {
            path: url_or_filename.to_string(),
        }),
        _ => Err(PretrainError::Configuration(format!(
            "unable to parse {url_or_filename} as a URL or as a local path"
        ))),
    }
}

/// Return the cached copy of `url`, downloading it when missing.
pub fn get_from_cache(url: &str, cache_dir: &Path) -> Result<PathBuf, PretrainError> {
    fs::create_dir_all(cache_dir)?;
    let etag = fetch_etag(url);
    let filename = url_to_filename(url, etag.as_deref());
    let mut cache_path = cache_dir.join(&filename);

    if !cache_path.exists()
        && etag.is_none()
        && let Some(fallback) = latest_cached_variant(cache_dir, &filename)?
    {
        debug!(url, path = %fallback.display(), "reusing cached variant without etag");
        cache_path = fallback;
    }

    if cache_path.exists() {
        debug!(url, path = %cache_path.display(), "cache hit");
        return Ok(cache_path);
    }

    info!(url, path = %cache_path.display(), "not cached, downloading");
    let mut temp = NamedTempFile::new_in(cache_dir)?;
    let bytes = http_get(url, temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.persist(&cache_path)
        .map_err(|err| PretrainError::Io(err.error))?;

    let metadata = CacheMetadata {
        url: url.to_string(),
        etag,
    };
    fs::write(meta_path_for(&cache_path), serde_json::to_vec(&metadata)?)?;
    info!(url, bytes, path = %cache_path.display(), "cached download");
    Ok(cache_path)
}

fn fetch_etag(url: &str) -> Option<String> {
    match ureq::head(url).call() {
        Ok(response) if response.status() == 200 => response
            .headers()
            .get("ETag")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        Ok(response) => {
            debug!(url, status = %response.status(), "HEAD returned no etag");
            None
        }
        Err(err) => {
            warn!(url, error = %err, "HEAD request failed; falling back to cached copies");
            None
        }
    }
}

fn latest_cached_variant(cache_dir: &Path, filename: &str) -> Result<Option<PathBuf>, PretrainError> {
    let prefix = format!("{filename}.");
    let mut matches = Vec::new();
    for entry in fs::read_dir(cache_dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(META_SUFFIX) {
            matches.push(name);
        }
    }
    matches.sort();
    Ok(matches.pop().map(|name| cache_dir.join(name)))
}

fn http_get(url: &str, file: &mut fs::File) -> Result<u64, PretrainError> {
    let response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::StatusCode(404) => PretrainError::RemoteNotFound {
            url: url.to_string(),
        },
        other => PretrainError::Remote {
            url: url.to_string(),
            reason: other.to_string(),
        },
    })?;
    let mut reader = response.into_body().into_reader();
    let mut buffer = vec![0u8; DOWNLOAD_BUFFER_BYTES];
    let mut total = 0u64;
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|err| PretrainError::Remote {
                url: url.to_string(),
                reason: format!("failed reading response body: {err}"),
            })?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}

fn meta_path_for(cache_path: &Path) -> PathBuf {
    let mut raw = cache_path.as_os_str().to_owned();
    raw.push(META_SUFFIX);
    PathBuf::from(raw)
}

/// De-duplicated set of lines (trailing whitespace stripped).
pub fn read_set_from_file(path: impl AsRef<Path>) -> Result<HashSet<String>, PretrainError> {
    let raw = fs::read_to_string(path)?;
    Ok(raw.lines().map(|line| line.trim_end().to_string()).collect())
}

/// Extension of `path`, optionally with its leading dot and lowercased.
pub fn get_file_extension(path: impl AsRef<Path>, dot: bool, lower: bool) -> String {
    let ext = path
        .as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = if dot && !ext.is_empty() {
        format!(".{ext}")
    } else {
        ext
    };
    if lower { ext.to_lowercase() } else { ext }
}
