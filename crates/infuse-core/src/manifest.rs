use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::asset::{AssetSource, DirectoryAsset, Owner, Principal, SecretAsset};
use crate::{Error, InjectableAsset};

/// Ordered list of assets to inject, read from a TOML manifest:
///
/// ```toml
/// [[asset]]
/// destination = "/etc/app/config.yaml"
/// mode = 0o640
/// user = "app"
/// source = { file = "config.yaml" }
///
/// [[asset]]
/// destination = "/run/app/token"
/// source = { secret = { remote = "https://vault.example.org/token" } }
///
/// [[asset]]
/// destination = "/srv/www"
/// source = { directory = "public", recursive = true, filters = ['\.html$'] }
/// ```
///
/// Order is significant: it drives the context hash. A `directory` entry
/// expands in place into one asset per matching file, sorted by relative
/// path, each landing under `destination`.
#[derive(Debug, Clone, Default)]
pub struct AssetManifest {
    pub assets: Vec<InjectableAsset>,
}

impl AssetManifest {
    /// Parses a manifest located at `path`. Relative `file` and `directory`
    /// sources are resolved against the manifest's directory.
    pub fn parse(content: &str, path: &Path) -> crate::Result<Self> {
        let raw: RawManifest = toml::from_str(content).map_err(|e| Error::DescriptorParse {
            kind: "asset manifest",
            path: path.to_path_buf(),
            source: e,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut assets = Vec::with_capacity(raw.entries.len());
        for entry in raw.entries {
            entry.expand_into(base, &mut assets)?;
        }
        Ok(Self { assets })
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::DescriptorRead {
            kind: "asset manifest",
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest = Self::parse(&content, path)?;
        tracing::debug!(
            path = %path.display(),
            assets = manifest.assets.len(),
            "loaded asset manifest"
        );
        Ok(manifest)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default, rename = "asset")]
    entries: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    source: EntrySource,
    destination: String,
    #[serde(default)]
    mode: Option<u32>,
    #[serde(default)]
    user: Option<Principal>,
    #[serde(default)]
    group: Option<Principal>,
}

impl ManifestEntry {
    fn expand_into(self, base: &Path, out: &mut Vec<InjectableAsset>) -> crate::Result<()> {
        let owner = match (self.user, self.group) {
            (Some(user), group) => Some(Owner { user, group }),
            (None, None) => None,
            (None, Some(_)) => {
                return Err(Error::GroupWithoutUser {
                    destination: self.destination,
                });
            }
        };

        match self.source {
            EntrySource::Asset(source) => {
                let asset = InjectableAsset {
                    source,
                    destination: self.destination,
                    mode: self.mode,
                    owner,
                };
                out.push(asset.rebased(base));
            }
            EntrySource::Directory {
                mut directory,
                sensitive,
            } => {
                if directory.path.is_relative() {
                    directory.path = base.join(&directory.path);
                }
                let expanded = directory.inject_under(&self.destination)?;
                tracing::debug!(
                    path = %directory.path.display(),
                    files = expanded.len(),
                    "expanded directory asset"
                );
                for mut asset in expanded {
                    if sensitive {
                        asset.source = SecretAsset::new(asset.source).into();
                    }
                    asset.mode = self.mode;
                    asset.owner = owner.clone();
                    out.push(asset);
                }
            }
        }
        Ok(())
    }
}

/// Either a single asset or a directory to expand, optionally under
/// `secret`.
#[derive(Deserialize)]
#[serde(try_from = "toml::Value")]
enum EntrySource {
    Asset(AssetSource),
    Directory {
        directory: DirectoryAsset,
        sensitive: bool,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectorySource {
    directory: PathBuf,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    filters: Vec<String>,
}

impl TryFrom<toml::Value> for EntrySource {
    type Error = Error;

    fn try_from(value: toml::Value) -> crate::Result<Self> {
        let is_directory =
            |v: &toml::Value| v.as_table().is_some_and(|t| t.contains_key("directory"));

        let secret_directory = value
            .as_table()
            .filter(|t| t.len() == 1)
            .and_then(|t| t.get("secret"))
            .filter(|inner| is_directory(inner))
            .cloned();
        if let Some(inner) = secret_directory {
            return Ok(Self::Directory {
                directory: parse_directory(inner)?,
                sensitive: true,
            });
        }
        if is_directory(&value) {
            return Ok(Self::Directory {
                directory: parse_directory(value)?,
                sensitive: false,
            });
        }
        AssetSource::try_from(value).map(Self::Asset)
    }
}

fn parse_directory(value: toml::Value) -> crate::Result<DirectoryAsset> {
    let raw: DirectorySource = value
        .try_into()
        .map_err(|e| Error::DirectorySource { source: e })?;

    let mut directory = DirectoryAsset::new(raw.directory).recursive(raw.recursive);
    for filter in raw.filters {
        let regex = Regex::new(&filter).map_err(|e| Error::InvalidFilter {
            filter: filter.clone(),
            source: e,
        })?;
        directory = directory.with_filter(regex);
    }
    Ok(directory)
}
