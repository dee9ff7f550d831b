//! Image descriptors and the injection chain recorded in their labels.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Label namespace of injection records.
pub const INJECTION_LABEL_PREFIX: &str = "sh.chezmoi.injected";

/// A built (or buildable) container image and the settings it was built with.
///
/// This is the descriptor exchanged with callers: the output of one injection
/// is a valid input of the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Resolvable reference, e.g. `registry/name:tag@sha256:…` or a bare digest.
    pub reference: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub no_cache: bool,
    #[serde(default)]
    pub cache_from: Vec<String>,
    #[serde(default)]
    pub cache_to: Vec<String>,
    /// Build stage of the base definition; never inherited by derived images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub settings: BuildSettings,
}

/// Build engine settings propagated unchanged from a base image to its
/// derived images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Buildx builder instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    #[serde(default = "default_true")]
    pub build_on_preview: bool,
    #[serde(default)]
    pub exec: bool,
    /// `--output` specifications
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub load: bool,
    /// `default`, `host` or `none`
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub pull: bool,
    #[serde(default)]
    pub push: bool,
    /// SSH agent sockets or keys (`default`, `id=path`)
    #[serde(default)]
    pub ssh: Vec<String>,
    #[serde(default)]
    pub registries: Vec<Registry>,
}

/// Registry credentials; the password is read from an environment variable
/// so descriptors never carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            builder: None,
            build_on_preview: true,
            exec: false,
            exports: Vec::new(),
            load: false,
            network: default_network(),
            platforms: Vec::new(),
            pull: false,
            push: false,
            ssh: Vec::new(),
            registries: Vec::new(),
        }
    }
}

impl Image {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            tags: Vec::new(),
            no_cache: false,
            cache_from: Vec::new(),
            cache_to: Vec::new(),
            target: None,
            labels: BTreeMap::new(),
            settings: BuildSettings::default(),
        }
    }

    /// Injections already applied to this image.
    pub fn injections(&self) -> InjectionChain {
        InjectionChain::from_labels(&self.labels)
    }

    /// Load an image descriptor from a TOML file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::DescriptorRead {
            kind: "image descriptor",
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| crate::Error::DescriptorParse {
            kind: "image descriptor",
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string(self).map_err(|e| crate::Error::DescriptorSerialize { source: e })
    }
}

/// One injection call: the context hash it built and the image it started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRecord {
    pub hash: String,
    /// `None` when an inherited record carries no `base.ref` label.
    pub base_ref: Option<String>,
}

/// Append-only list of injections applied to an image.
///
/// Record `n` is stored as the label pair `sh.chezmoi.injected.<n>.hash` /
/// `sh.chezmoi.injected.<n>.base.ref`.
///
/// ```
/// use std::collections::BTreeMap;
/// use infuse_core::{InjectionChain, InjectionRecord};
///
/// let mut chain = InjectionChain::default();
/// let idx = chain.push(InjectionRecord {
///     hash: "h".into(),
///     base_ref: Some("busybox".into()),
/// });
/// assert_eq!(idx, 0);
///
/// let mut labels = BTreeMap::new();
/// chain.apply_to(&mut labels);
/// assert_eq!(labels["sh.chezmoi.injected.0.base.ref"], "busybox");
/// assert_eq!(InjectionChain::from_labels(&labels).next_index(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionChain {
    records: Vec<InjectionRecord>,
}

impl InjectionChain {
    /// Collects records with contiguous indices starting at 0.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let mut records = Vec::new();
        while let Some(hash) = labels.get(&Self::hash_label(records.len())) {
            let base_ref = labels.get(&Self::base_ref_label(records.len())).cloned();
            records.push(InjectionRecord {
                hash: hash.clone(),
                base_ref,
            });
        }
        Self { records }
    }

    pub fn records(&self) -> &[InjectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index the next record will receive.
    pub fn next_index(&self) -> usize {
        self.records.len()
    }

    /// Appends a record and returns its index.
    pub fn push(&mut self, record: InjectionRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Writes every record as its label pair, keeping unrelated labels.
    /// A record without a base reference writes its hash label only.
    pub fn apply_to(&self, labels: &mut BTreeMap<String, String>) {
        for (idx, record) in self.records.iter().enumerate() {
            labels.insert(Self::hash_label(idx), record.hash.clone());
            if let Some(base_ref) = &record.base_ref {
                labels.insert(Self::base_ref_label(idx), base_ref.clone());
            }
        }
    }

    pub fn hash_label(idx: usize) -> String {
        format!("{INJECTION_LABEL_PREFIX}.{idx}.hash")
    }

    pub fn base_ref_label(idx: usize) -> String {
        format!("{INJECTION_LABEL_PREFIX}.{idx}.base.ref")
    }
}

fn default_true() -> bool {
    true
}

fn default_network() -> String {
    "default".to_owned()
}
