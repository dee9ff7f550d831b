use std::collections::BTreeMap;
use std::path::PathBuf;

use infuse_core::BuildSettings;
use secrecy::SecretString;

use crate::error::EngineError;

/// Everything the build engine needs to produce a derived image.
#[derive(Debug)]
pub struct BuildRequest {
    /// Build context directory.
    pub context: PathBuf,
    /// Inline Dockerfile text.
    pub dockerfile: String,
    /// Build secrets, `asset<k>` → base64 of the plaintext.
    pub secrets: BTreeMap<String, SecretString>,
    pub no_cache: bool,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub cache_from: Vec<String>,
    pub cache_to: Vec<String>,
    pub settings: BuildSettings,
}

/// Handle of an image produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    /// Resolvable reference of the new image.
    pub reference: String,
    pub digest: String,
}

/// External image builder.
///
/// Production code uses [`DockerBuildx`](crate::DockerBuildx), tests use
/// mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait BuildEngine: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<BuiltImage, EngineError>;
}
