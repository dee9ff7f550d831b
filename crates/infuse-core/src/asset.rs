//! Asset model: what gets injected and where it lands.
//!
//! An [`Asset`] is a value identified by its content, never by its identity.
//! Wrapping it in a [`SecretAsset`] marks the content as sensitive: it is
//! delivered through a build secret instead of the visible build context.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::{Error, Result};

/// A named source of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    /// A file on the local filesystem.
    File { path: PathBuf },
    /// A `http`, `https` or `file` URI.
    Remote { uri: String },
    /// Inline text, embedded as UTF-8.
    String { text: String },
}

impl Asset {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn remote(uri: impl Into<String>) -> Self {
        Self::Remote { uri: uri.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::String { text: text.into() }
    }

    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "FileAsset",
            Self::Remote { .. } => "RemoteAsset",
            Self::String { .. } => "StringAsset",
        }
    }

    fn rebased(self, base: &Path) -> Self {
        match self {
            Self::File { path } if path.is_relative() => Self::File {
                path: base.join(path),
            },
            other => other,
        }
    }
}

/// Marks the wrapped asset as sensitive.
///
/// Wrapping is idempotent: a secret of a secret still resolves to the
/// innermost [`Asset`].
///
/// ```
/// use infuse_core::{Asset, SecretAsset};
///
/// let nested = SecretAsset::new(SecretAsset::new(Asset::text("token")));
/// assert_eq!(nested.asset(), &Asset::text("token"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretAsset {
    inner: Box<AssetSource>,
}

impl SecretAsset {
    pub fn new(inner: impl Into<AssetSource>) -> Self {
        Self {
            inner: Box::new(inner.into()),
        }
    }

    /// The innermost wrapped asset.
    pub fn asset(&self) -> &Asset {
        self.inner.asset()
    }
}

impl fmt::Debug for SecretAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretAsset<{}>([REDACTED])", self.asset().kind())
    }
}

/// Either a plain asset or a secret-wrapped one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "toml::Value")]
pub enum AssetSource {
    Plain(Asset),
    Secret(SecretAsset),
}

impl AssetSource {
    pub fn asset(&self) -> &Asset {
        match self {
            Self::Plain(asset) => asset,
            Self::Secret(secret) => secret.asset(),
        }
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    fn rebased(self, base: &Path) -> Self {
        match self {
            Self::Plain(asset) => Self::Plain(asset.rebased(base)),
            Self::Secret(secret) => Self::Secret(SecretAsset::new(secret.inner.rebased(base))),
        }
    }
}

impl From<Asset> for AssetSource {
    fn from(asset: Asset) -> Self {
        Self::Plain(asset)
    }
}

impl From<SecretAsset> for AssetSource {
    fn from(secret: SecretAsset) -> Self {
        Self::Secret(secret)
    }
}

/// Manifest shape: a table holding exactly one of `file`, `remote`, `text`
/// or `secret`.
impl TryFrom<toml::Value> for AssetSource {
    type Error = Error;

    fn try_from(value: toml::Value) -> Result<Self> {
        let unsupported = || Error::UnsupportedAsset {
            repr: value.to_string(),
            kind: value.type_str().to_owned(),
        };

        let Some(table) = value.as_table().filter(|t| t.len() == 1) else {
            return Err(unsupported());
        };
        let Some((key, inner)) = table.iter().next() else {
            return Err(unsupported());
        };

        match (key.as_str(), inner) {
            ("file", toml::Value::String(path)) => Ok(Asset::file(path).into()),
            ("remote", toml::Value::String(uri)) => Ok(Asset::remote(uri.as_str()).into()),
            ("text", toml::Value::String(text)) => Ok(Asset::text(text.as_str()).into()),
            ("secret", inner) => Ok(SecretAsset::new(Self::try_from(inner.clone())?).into()),
            _ => Err(unsupported()),
        }
    }
}

/// A user or group, by name or numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Id(u32),
    Name(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<u32> for Principal {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

/// `chown` target of an injected asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub user: Principal,
    pub group: Option<Principal>,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}:{group}", self.user),
            None => write!(f, "{}", self.user),
        }
    }
}

/// An asset together with its location inside the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectableAsset {
    pub source: AssetSource,
    /// Absolute path inside the image.
    pub destination: String,
    /// Permission bits applied with `chmod`.
    pub mode: Option<u32>,
    pub owner: Option<Owner>,
}

impl InjectableAsset {
    pub fn new(source: impl Into<AssetSource>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: None,
            owner: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_owner(mut self, user: impl Into<Principal>, group: Option<Principal>) -> Self {
        self.owner = Some(Owner {
            user: user.into(),
            group,
        });
        self
    }

    /// Rejects destinations that could not mirror the image layout.
    pub fn validate(&self) -> Result<()> {
        self.normalized_destination().map(drop)
    }

    /// See [`normalize_destination`].
    pub fn normalized_destination(&self) -> Result<String> {
        normalize_destination(&self.destination)
    }

    pub(crate) fn rebased(mut self, base: &Path) -> Self {
        self.source = self.source.rebased(base);
        self
    }
}

/// Validates an in-image path and drops its `.` segments and repeated
/// separators.
///
/// Two destinations with equal normalized forms land on the same file.
///
/// ```
/// assert_eq!(
///     infuse_core::asset::normalize_destination("/etc/./app//app.conf").unwrap(),
///     "/etc/app/app.conf"
/// );
/// ```
pub fn normalize_destination(destination: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidDestination {
        destination: destination.to_owned(),
        reason,
    };

    let path = Path::new(destination);
    if !path.has_root() {
        return Err(invalid("must be an absolute path"));
    }
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(segment) => segments.push(segment.to_string_lossy()),
            Component::ParentDir => return Err(invalid("must not contain '..' components")),
            Component::Prefix(_) => return Err(invalid("must be an absolute path")),
        }
    }
    if segments.is_empty() {
        return Err(invalid("must name a file"));
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Filter applied to directory entries on top of the regex filters.
pub type EntryPredicate = Arc<dyn Fn(&walkdir::DirEntry) -> bool + Send + Sync>;

/// A local directory expanded into one [`Asset::File`] per regular file.
///
/// Entries are returned sorted by their path relative to the directory, so
/// the expansion (and therefore the context hash) does not depend on the
/// order the filesystem lists them in.
///
/// A file is kept when any regex filter matches its relative path (or no
/// filter is set) and every predicate accepts it.
#[derive(Clone, Default)]
pub struct DirectoryAsset {
    pub path: PathBuf,
    pub recursive: bool,
    pub filters: Vec<Regex>,
    predicates: Vec<EntryPredicate>,
}

impl DirectoryAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&walkdir::DirEntry) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Matching files as `(relative path, asset)` pairs. Relative paths
    /// always use `/` as separator.
    pub fn files(&self) -> Result<Vec<(String, Asset)>> {
        let walker = WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| Error::DirectoryRead {
                path: self.path.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.path)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let matched =
                self.filters.is_empty() || self.filters.iter().any(|rx| rx.is_match(&relative));
            if matched && self.predicates.iter().all(|accept| accept(&entry)) {
                files.push((relative, Asset::file(entry.path())));
            }
        }
        files.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(files)
    }

    /// One injectable asset per matching file, mirrored under `prefix`.
    pub fn inject_under(&self, prefix: &str) -> Result<Vec<InjectableAsset>> {
        let prefix = prefix.trim_end_matches('/');
        Ok(self
            .files()?
            .into_iter()
            .map(|(relative, asset)| InjectableAsset::new(asset, format!("{prefix}/{relative}")))
            .collect())
    }
}

impl fmt::Debug for DirectoryAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryAsset")
            .field("path", &self.path)
            .field("recursive", &self.recursive)
            .field("filters", &self.filters)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
