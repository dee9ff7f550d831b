//! Deterministic build contexts.
//!
//! If the context directory changes between two runs, the build engine
//! rebuilds the image even when nothing else changed. The directory name is
//! therefore derived from the stack identity and a hash of the ordered
//! content digests, and the content is hard-linked from the staging area so
//! no bytes are copied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use infuse_core::{StackIdentity, normalize_destination};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::janitor::Janitor;
use crate::stage::ResolvedAsset;

/// Prefix of every context directory name.
pub const CONTEXT_DIR_PREFIX: &str = "pulumi";

/// A build context ready to hand over to the build engine.
#[derive(Debug)]
pub struct BuildContext {
    /// Base64 sha256 over the ordered content digests.
    pub hash: String,
    pub contextdir: PathBuf,
    /// Non-sensitive entries point at their link inside `contextdir`.
    pub assets: Vec<ResolvedAsset>,
}

impl BuildContext {
    /// Path of `destination` once mirrored under the context directory.
    pub fn target_path(&self, destination: &str) -> PathBuf {
        self.contextdir.join(destination.trim_start_matches('/'))
    }

    pub fn sensitive_assets(&self) -> impl Iterator<Item = &ResolvedAsset> {
        self.assets.iter().filter(|asset| asset.is_sensitive())
    }
}

/// Assembles [`BuildContext`]s under a root directory.
pub struct ContextBuilder<'a> {
    stack: &'a StackIdentity,
    root: &'a Path,
    janitor: &'a Janitor,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(stack: &'a StackIdentity, root: &'a Path, janitor: &'a Janitor) -> Self {
        Self {
            stack,
            root,
            janitor,
        }
    }

    /// Directory a given asset set lands in, without creating anything.
    pub fn contextdir(&self, hash: &str) -> PathBuf {
        self.root.join(format!(
            "{CONTEXT_DIR_PREFIX}-{}-{}",
            stack_id(self.stack),
            prefix8(hash)
        ))
    }

    pub async fn build(
        &self,
        mut assets: Vec<ResolvedAsset>,
    ) -> Result<BuildContext, ContextError> {
        check_destinations(&assets)?;

        let hash = context_hash(&assets);
        let contextdir = self.contextdir(&hash);
        recreate_dir(&contextdir).await?;
        self.janitor.track_context(&contextdir);
        debug!(path = %contextdir.display(), %hash, "build context ready");

        for asset in assets.iter_mut().filter(|asset| !asset.is_sensitive()) {
            let target = contextdir.join(asset.destination.trim_start_matches('/'));
            link(&asset.source, &target).await?;
            asset.source = target;
        }

        Ok(BuildContext {
            hash,
            contextdir,
            assets,
        })
    }
}

/// Empties `dir`, creating it if needed. Earlier calls with the same content
/// digests may have linked other destinations here.
async fn recreate_dir(dir: &Path) -> Result<(), ContextError> {
    let create_error = |e| ContextError::Create {
        path: dir.to_path_buf(),
        source: e,
    };

    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(create_error(e)),
    }
    tokio::fs::create_dir_all(dir).await.map_err(create_error)
}

async fn link(source: &Path, target: &Path) -> Result<(), ContextError> {
    let link_error = |e| ContextError::Link {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        source: e,
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ContextError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    match tokio::fs::remove_file(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(link_error(e)),
    }
    tokio::fs::hard_link(source, target)
        .await
        .map_err(link_error)
}

/// First 8 base64 characters of sha256(organization ‖ project ‖ stack).
pub fn stack_id(stack: &StackIdentity) -> String {
    let digest = Sha256::new()
        .chain_update(stack.organization.as_bytes())
        .chain_update(stack.project.as_bytes())
        .chain_update(stack.name.as_bytes())
        .finalize();
    prefix8(&STANDARD.encode(digest)).to_owned()
}

/// Base64 sha256 over the content digests, in order.
///
/// Destinations, modes and owners are not part of the hash; they only
/// affect the Dockerfile text.
pub fn context_hash(assets: &[ResolvedAsset]) -> String {
    let mut hasher = Sha256::new();
    for asset in assets {
        hasher.update(asset.digest.as_bytes());
    }
    STANDARD.encode(hasher.finalize())
}

/// Fails on the first destination claimed by more than one asset.
///
/// Destinations are compared in normalized form, so `/etc/app.conf` and
/// `/etc/./app.conf` collide.
pub fn check_destinations(assets: &[ResolvedAsset]) -> Result<(), ContextError> {
    let mut order: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, asset) in assets.iter().enumerate() {
        let destination = normalize_destination(&asset.destination)
            .unwrap_or_else(|_| asset.destination.clone());
        match positions.get(&destination) {
            Some(&pos) => order[pos].1.push(idx),
            None => {
                positions.insert(destination.clone(), order.len());
                order.push((destination, vec![idx]));
            }
        }
    }

    match order.into_iter().find(|(_, indices)| indices.len() > 1) {
        Some((destination, indices)) => Err(ContextError::DuplicateDestination {
            indices,
            destination,
        }),
        None => Ok(()),
    }
}

fn prefix8(s: &str) -> &str {
    s.get(..8).unwrap_or(s)
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(
        "Several assets ({}) found with the same destination: {destination}",
        format_indices(indices)
    )]
    DuplicateDestination {
        indices: Vec<usize>,
        destination: String,
    },

    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to link {source_path} to {target}")]
    Link {
        source_path: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },
}

fn format_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|idx| format!("#{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}
