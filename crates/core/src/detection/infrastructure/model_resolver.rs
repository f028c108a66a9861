use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::model_manifest::{ManifestError, ModelManifest};
use crate::shared::constants::MODEL_MANIFEST_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model directory {0} does not exist")]
    MissingDir(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

pub fn is_remote(base: &str) -> bool {
    base.starts_with("http://") || base.starts_with("https://")
}

/// Resolve a model base to a local directory holding the manifest and shards.
///
/// Local bases are returned as-is. Remote bases are mirrored into the cache:
/// the manifest is fetched first, then every shard it lists that is not
/// already cached.
pub fn resolve_model_base(
    base: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if !is_remote(base) {
        let dir = PathBuf::from(base);
        if !dir.is_dir() {
            return Err(ModelResolveError::MissingDir(dir));
        }
        return Ok(dir);
    }

    let cache_dir = model_cache_dir()?.join(cache_key(base));
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;

    let manifest_path = cache_dir.join(MODEL_MANIFEST_NAME);
    if !manifest_path.exists() {
        download(&join_url(base, MODEL_MANIFEST_NAME), &manifest_path, None)?;
    }
    let text = fs::read_to_string(&manifest_path).map_err(|source| ManifestError::Read {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest = ModelManifest::parse(&text).map_err(|source| ManifestError::Parse {
        path: manifest_path.clone(),
        source,
    })?;

    for shard in manifest.shard_paths() {
        let dest = cache_dir.join(shard);
        if dest.exists() {
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(ModelResolveError::CacheDir)?;
        }
        log::info!("Downloading model shard {shard}");
        download(&join_url(base, shard), &dest, progress.as_deref())?;
    }

    Ok(cache_dir)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceSight/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceSight/models/` or `~/.cache/FaceSight/models/`
/// - Windows: `%LOCALAPPDATA%/FaceSight/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceSight").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceSight").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

/// Directory name for a remote base, unique per URL.
fn cache_key(base: &str) -> String {
    base.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn download(
    url: &str,
    dest: &Path,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = fs::File::create(temp_path).map_err(|e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;

    let mut reader = response;
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| ModelResolveError::Write {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| ModelResolveError::Write {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(|e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_base_resolves_to_itself() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_string_lossy().to_string();
        assert_eq!(resolve_model_base(&base, None).unwrap(), tmp.path());
    }

    #[test]
    fn test_missing_local_base_is_error() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("nope").to_string_lossy().to_string();
        let err = resolve_model_base(&base, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::MissingDir(_)));
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/models"));
        assert!(is_remote("http://localhost:8080/models"));
        assert!(!is_remote("models"));
        assert!(!is_remote("/opt/facesight/models"));
    }

    #[test]
    fn test_join_url_handles_trailing_slash() {
        assert_eq!(
            join_url("https://example.com/models/", "manifest.json"),
            "https://example.com/models/manifest.json"
        );
        assert_eq!(
            join_url("https://example.com/models", "a.onnx"),
            "https://example.com/models/a.onnx"
        );
    }

    #[test]
    fn test_cache_key_is_filesystem_safe() {
        assert_eq!(
            cache_key("https://cdn.example.com:443/face/models/"),
            "cdn.example.com_443_face_models"
        );
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceSight"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let _ = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
