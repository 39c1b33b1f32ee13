//! Artifact URI handling shared by the backends

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::config::relative_file_uri;
use crate::{Error, Result};

/// Where a run's artifact root lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Directory on the local filesystem (`file:` URI or bare path).
    Local(PathBuf),
    /// Served through the tracking server's artifact proxy
    /// (`mlflow-artifacts:`); holds the path below the proxy root.
    Proxied(String),
    /// Held in process memory (`memory:`).
    Memory,
}

impl ArtifactLocation {
    /// Classify an artifact URI.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedArtifactUri` for remote stores this client
    /// cannot write to (`s3:`, `gs:`, ...).
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(path) = relative_file_uri(uri) {
            return Ok(Self::Local(path));
        }
        match Url::parse(uri) {
            Ok(url) => match url.scheme() {
                "file" => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|()| Error::UnsupportedArtifactUri(uri.to_string())),
                "mlflow-artifacts" => Ok(Self::Proxied(
                    url.path().trim_start_matches('/').to_string(),
                )),
                "memory" => Ok(Self::Memory),
                scheme if scheme.len() == 1 => Ok(Self::Local(PathBuf::from(uri))),
                _ => Err(Error::UnsupportedArtifactUri(uri.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Local(PathBuf::from(uri))),
            Err(_) => Err(Error::UnsupportedArtifactUri(uri.to_string())),
        }
    }
}

/// Path of an uploaded file relative to the artifact root.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `local_path` has no file name or
/// `artifact_dir` escapes the artifact root.
pub fn relative_artifact_path(local_path: &Path, artifact_dir: Option<&str>) -> Result<String> {
    let file_name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "artifact path has no file name: {}",
                local_path.display()
            ))
        })?;

    match artifact_dir.map(|dir| dir.trim_matches('/')) {
        None | Some("") => Ok(file_name.to_string()),
        Some(dir) => {
            if dir.split('/').any(|part| part == ".." || part.is_empty()) {
                return Err(Error::InvalidInput(format!(
                    "invalid artifact directory: {dir}"
                )));
            }
            Ok(format!("{dir}/{file_name}"))
        }
    }
}

/// Copy `local_path` to `<root>/<relative>`, creating parent directories.
///
/// Returns the number of bytes copied.
///
/// # Errors
///
/// Returns `Error::Io` if the source cannot be read or the destination
/// cannot be written.
pub async fn copy_to_local_root(root: &Path, local_path: &Path, relative: &str) -> Result<u64> {
    let destination = root.join(relative);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = tokio::fs::copy(local_path, &destination)
        .await
        .map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!(
                    "failed to copy {} to {}: {e}",
                    local_path.display(),
                    destination.display()
                ),
            ))
        })?;
    debug!(destination = %destination.display(), bytes, "copied artifact");
    Ok(bytes)
}
