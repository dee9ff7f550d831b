use std::path::{Path, PathBuf};

use infuse_core::{Asset, InjectableAsset, Owner};
use secrecy::SecretBox;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::resolve::{AssetResolver, ResolveError};

/// An asset whose bytes have been resolved and content-addressed.
#[derive(Debug)]
pub struct ResolvedAsset {
    /// `<staging>/<digest>` after staging; the link inside the build context
    /// once the context is built. Sensitive assets keep their staging name
    /// but nothing is ever written there.
    pub source: PathBuf,
    /// sha256 hex digest of the content.
    pub digest: String,
    /// Normalized in-image path.
    pub destination: String,
    pub mode: Option<u32>,
    pub owner: Option<Owner>,
    /// Content of sensitive assets, kept in memory only.
    pub sensitive: Option<SecretBox<Vec<u8>>>,
}

impl ResolvedAsset {
    pub fn is_sensitive(&self) -> bool {
        self.sensitive.is_some()
    }
}

/// Resolves assets and stores their content under its own digest.
pub struct ContentStager<'a> {
    dir: PathBuf,
    resolver: &'a AssetResolver,
}

impl<'a> ContentStager<'a> {
    pub fn new(dir: impl Into<PathBuf>, resolver: &'a AssetResolver) -> Self {
        Self {
            dir: dir.into(),
            resolver,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stages assets one by one, in order; the first failure aborts.
    pub async fn stage_all(
        &self,
        assets: &[InjectableAsset],
    ) -> Result<Vec<ResolvedAsset>, StageError> {
        let mut staged = Vec::with_capacity(assets.len());
        for asset in assets {
            staged.push(self.stage(asset).await?);
        }
        Ok(staged)
    }

    pub async fn stage(&self, asset: &InjectableAsset) -> Result<ResolvedAsset, StageError> {
        let destination = asset.normalized_destination()?;

        let sensitive = asset.source.is_sensitive();
        let inner = asset.source.asset();
        match inner {
            Asset::File { path } => debug!("InjectAssets<FileAsset>: {}", path.display()),
            Asset::Remote { uri } => debug!("InjectAssets<RemoteAsset>: {uri}"),
            Asset::String { .. } => debug!("InjectAssets<StringAsset>: Write content"),
        }

        let content = self.resolver.resolve(inner).await?;
        let digest = hex::encode(Sha256::digest(&content));
        let source = self.dir.join(&digest);

        let sensitive = if sensitive {
            Some(SecretBox::new(Box::new(content)))
        } else {
            let write_error = |e| StageError::Write {
                path: source.clone(),
                source: e,
            };
            // Same name, same bytes.
            if !tokio::fs::try_exists(&source).await.map_err(write_error)? {
                tokio::fs::write(&source, &content)
                    .await
                    .map_err(write_error)?;
            }
            None
        };

        Ok(ResolvedAsset {
            source,
            digest,
            destination,
            mode: asset.mode,
            owner: asset.owner.clone(),
            sensitive,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Invalid(#[from] infuse_core::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to stage asset content at {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
