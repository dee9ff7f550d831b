use std::path::{Path, PathBuf};

use infuse_core::Asset;
use url::Url;

/// Turns an [`Asset`] into its raw bytes.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    http: reqwest::Client,
}

impl AssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn resolve(&self, asset: &Asset) -> Result<Vec<u8>, ResolveError> {
        match asset {
            Asset::File { path } => read_file(path).await,
            Asset::Remote { uri } => self.fetch(uri).await,
            Asset::String { text } => Ok(text.as_bytes().to_vec()),
        }
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, ResolveError> {
        let url = Url::parse(uri).map_err(|_| ResolveError::InvalidUri {
            uri: uri.to_owned(),
        })?;

        match url.scheme() {
            "http" | "https" => {
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| ResolveError::Fetch {
                        uri: uri.to_owned(),
                        source: e,
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ResolveError::FetchStatus {
                        uri: uri.to_owned(),
                        status: status.as_u16(),
                    });
                }

                let body = response.bytes().await.map_err(|e| ResolveError::Fetch {
                    uri: uri.to_owned(),
                    source: e,
                })?;
                Ok(body.to_vec())
            }
            "file" => read_file(&file_uri_path(&url, uri)?).await,
            scheme => Err(ResolveError::UnsupportedScheme {
                scheme: format!("{scheme}:"),
            }),
        }
    }
}

/// Local path named by a `file:` URI. The host part, if any, is ignored:
/// `file://host/etc/app.conf` reads `/etc/app.conf`.
fn file_uri_path(url: &Url, uri: &str) -> Result<PathBuf, ResolveError> {
    let invalid = || ResolveError::InvalidUri {
        uri: uri.to_owned(),
    };

    let local = match url.host() {
        None => url.clone(),
        Some(_) => Url::parse(&format!("file://{}", url.path())).map_err(|_| invalid())?,
    };
    local.to_file_path().map_err(|()| invalid())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ResolveError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| open_error(path, e))?;
    if metadata.is_dir() {
        return Err(ResolveError::IsDirectory {
            path: path.to_path_buf(),
        });
    }

    tokio::fs::read(path).await.map_err(|e| open_error(path, e))
}

fn open_error(path: &Path, err: std::io::Error) -> ResolveError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ResolveError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ResolveError::FileOpen {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to open asset file '{path}': ENOENT: no such file or directory")]
    FileNotFound { path: PathBuf },

    #[error("Failed to open asset file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Asset '{path}' is a directory; try using an archive")]
    IsDirectory { path: PathBuf },

    #[error("Invalid remote asset URI '{uri}'")]
    InvalidUri { uri: String },

    #[error("Unsupported remote asset URI scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("Failed to fetch remote asset '{uri}' ({status})")]
    FetchStatus { uri: String, status: u16 },

    #[error("Failed to fetch remote asset '{uri}'")]
    Fetch { uri: String, source: reqwest::Error },
}
