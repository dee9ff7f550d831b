use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pinned utility image used as the staging stage of every injection build.
pub const DEFAULT_HELPER_IMAGE: &str = "docker.io/library/busybox:stable@sha256:9ae97d36d26566ff84e8893c64a6dc4fe8ca6d1144bf5b87b2b85a32def253c7";

/// Default tag suffix template; `{idx}` is the injection index.
pub const DEFAULT_SUFFIX: &str = "-injected.{idx}";

/// infuse.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfuseConfig {
    #[serde(default)]
    pub stack: StackIdentity,
    #[serde(default)]
    pub inject: InjectConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Identity of the deployment stack, used to namespace context directories
/// of concurrent stacks sharing a temp root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackIdentity {
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_stack_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectConfig {
    /// Tag suffix template
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Utility image for the staging stage
    #[serde(default = "default_helper_image")]
    pub helper_image: String,
    /// Root for staging and context directories (defaults to the OS temp dir)
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
    /// Asset count above which an advisory warning is emitted
    #[serde(default = "default_max_assets_advisory")]
    pub max_assets_advisory: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Container CLI providing `buildx`
    #[serde(default = "default_program")]
    pub program: String,
    /// Buildx builder instance; the current one when unset
    #[serde(default)]
    pub builder: Option<String>,
}

impl StackIdentity {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            name: name.into(),
        }
    }
}

impl Default for StackIdentity {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            project: default_project(),
            name: default_stack_name(),
        }
    }
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            helper_image: default_helper_image(),
            staging_root: None,
            max_assets_advisory: default_max_assets_advisory(),
        }
    }
}

impl InjectConfig {
    /// Directory under which staging areas and contexts are created.
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            builder: None,
        }
    }
}

impl InfuseConfig {
    /// Load from infuse.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &Path) -> crate::Result<Self> {
        let config_path = dir.join("infuse.toml");
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            tracing::debug!(dir = %dir.display(), "no infuse.toml found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from an explicit path; the file must exist.
    pub fn load_file(config_path: &Path) -> crate::Result<Self> {
        let content =
            std::fs::read_to_string(config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.to_path_buf(),
                source: e,
            })?;
        toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }
}

fn default_organization() -> String {
    "organization".to_owned()
}

fn default_project() -> String {
    "project".to_owned()
}

fn default_stack_name() -> String {
    "dev".to_owned()
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_owned()
}

fn default_helper_image() -> String {
    DEFAULT_HELPER_IMAGE.to_owned()
}

fn default_max_assets_advisory() -> usize {
    4096
}

fn default_program() -> String {
    "docker".to_owned()
}
