use std::fmt;
use std::path::PathBuf;

use infuse_build::{
    AssetResolver, ContentStager, ContextBuilder, ContextError, DockerfileGenerator, Janitor,
    StageError, SuffixTemplate,
};
use infuse_core::{Image, InfuseConfig, InjectableAsset, InjectionRecord, StackIdentity};
use tracing::{debug, info, warn};

use crate::engine::{BuildEngine, BuildRequest};
use crate::error::EngineError;

/// Settings shared by every injection of one process.
#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub stack: StackIdentity,
    pub suffix: SuffixTemplate,
    pub helper_image: String,
    /// Root of staging areas and build contexts.
    pub staging_root: PathBuf,
    /// Asset count above which [`CapacityWarning::Oversized`] is raised.
    pub max_assets_advisory: usize,
}

impl InjectOptions {
    pub fn from_config(config: &InfuseConfig) -> infuse_core::Result<Self> {
        Ok(Self {
            stack: config.stack.clone(),
            suffix: SuffixTemplate::parse(&config.inject.suffix)?,
            helper_image: config.inject.helper_image.clone(),
            staging_root: config.inject.staging_root(),
            max_assets_advisory: config.inject.max_assets_advisory,
        })
    }
}

/// Advisory raised by an injection call; never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityWarning {
    /// Nothing to inject: the input image is returned unchanged.
    Empty,
    /// Large asset lists risk exceeding the orchestration payload ceiling.
    Oversized { count: usize, limit: usize },
}

impl CapacityWarning {
    pub fn check(count: usize, limit: usize) -> Option<Self> {
        match count {
            0 => Some(Self::Empty),
            n if n > limit => Some(Self::Oversized { count: n, limit }),
            _ => None,
        }
    }
}

impl fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no assets to inject; the image is left unchanged"),
            Self::Oversized { count, limit } => write!(
                f,
                "injecting {count} assets (more than {limit}) may exceed the orchestration payload limit"
            ),
        }
    }
}

/// Result of [`Injector::inject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub image: Image,
    pub warning: Option<CapacityWarning>,
}

/// Derives images from a base image plus a list of assets.
///
/// Directories created along the way belong to the [`Janitor`] passed in;
/// the caller tears it down once the builds are done.
pub struct Injector<'j, E: BuildEngine> {
    engine: E,
    options: InjectOptions,
    resolver: AssetResolver,
    janitor: &'j Janitor,
}

impl<'j, E: BuildEngine> Injector<'j, E> {
    pub fn new(engine: E, options: InjectOptions, janitor: &'j Janitor) -> Self {
        Self {
            engine,
            options,
            resolver: AssetResolver::new(),
            janitor,
        }
    }

    pub fn with_resolver(mut self, resolver: AssetResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &InjectOptions {
        &self.options
    }

    /// Builds `image` plus `assets` into a new image.
    ///
    /// The new image carries one more injection record than `image`, its tags
    /// run through the suffix template, caching is disabled and every other
    /// build setting is inherited. Without assets, `image` comes back as is.
    pub async fn inject(
        &self,
        image: &Image,
        assets: &[InjectableAsset],
    ) -> Result<Injection, InjectError> {
        let warning = CapacityWarning::check(assets.len(), self.options.max_assets_advisory);
        if let Some(warning) = &warning {
            warn!(image = %image.reference, "{warning}");
        }
        if assets.is_empty() {
            return Ok(Injection {
                image: image.clone(),
                warning,
            });
        }

        let request = self.prepare(image, assets).await?;
        info!(
            image = %image.reference,
            assets = assets.len(),
            tags = ?request.tags,
            "injecting assets"
        );
        let built = self.engine.build(&request).await?;
        debug!(reference = %built.reference, "image built");

        let BuildRequest {
            no_cache,
            tags,
            labels,
            cache_from,
            cache_to,
            settings,
            ..
        } = request;
        Ok(Injection {
            image: Image {
                reference: built.reference,
                tags,
                no_cache,
                cache_from,
                cache_to,
                target: None,
                labels,
                settings,
            },
            warning,
        })
    }

    /// Stages `assets` and assembles the build request without running it.
    pub async fn prepare(
        &self,
        image: &Image,
        assets: &[InjectableAsset],
    ) -> Result<BuildRequest, InjectError> {
        let root = &self.options.staging_root;
        let staging = self
            .janitor
            .staging_dir(root)
            .await
            .map_err(|e| InjectError::Staging {
                path: root.clone(),
                source: e,
            })?;

        let staged = ContentStager::new(staging, &self.resolver)
            .stage_all(assets)
            .await?;
        let context = ContextBuilder::new(&self.options.stack, root, self.janitor)
            .build(staged)
            .await?;

        let generator =
            DockerfileGenerator::new(&image.reference, &self.options.helper_image, &context);

        let mut chain = image.injections();
        chain.push(InjectionRecord {
            hash: context.hash.clone(),
            base_ref: Some(image.reference.clone()),
        });
        let mut labels = image.labels.clone();
        chain.apply_to(&mut labels);

        Ok(BuildRequest {
            dockerfile: generator.render(),
            secrets: generator.secrets(),
            no_cache: true,
            tags: image
                .tags
                .iter()
                .map(|tag| self.options.suffix.apply(tag))
                .collect(),
            labels,
            cache_from: Vec::new(),
            cache_to: Vec::new(),
            settings: image.settings.clone(),
            context: context.contextdir,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("failed to create a staging directory under {path}")]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Build(#[from] EngineError),
}
