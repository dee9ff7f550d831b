use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Descriptors ──
    #[error("failed to read {kind} at {path}")]
    DescriptorRead {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {kind} at {path}")]
    DescriptorParse {
        kind: &'static str,
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize image descriptor")]
    DescriptorSerialize { source: toml::ser::Error },

    // ── Asset validation ──
    #[error("Unsupported asset type for '{repr}' ({kind}): not a FileAsset, RemoteAsset or StringAsset")]
    UnsupportedAsset { repr: String, kind: String },

    #[error("invalid asset destination {destination:?}: {reason}")]
    InvalidDestination {
        destination: String,
        reason: &'static str,
    },

    #[error("asset {destination:?} sets `group` without `user`")]
    GroupWithoutUser { destination: String },

    // ── Directory assets ──
    #[error("invalid directory asset: {source}")]
    DirectorySource { source: toml::de::Error },

    #[error("invalid directory filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        source: regex::Error,
    },

    #[error("failed to list directory asset {path}")]
    DirectoryRead {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("invalid tag suffix template {template:?}: {reason}")]
    InvalidSuffix {
        template: String,
        reason: &'static str,
    },
}
