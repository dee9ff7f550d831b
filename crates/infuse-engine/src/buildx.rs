use std::path::Path;

use infuse_core::{EngineConfig, Registry};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::engine::{BuildEngine, BuildRequest, BuiltImage};
use crate::error::EngineError;
use crate::executor::{CommandExecutor, RealExecutor};

/// Key of the image digest in the buildx metadata file.
pub const DIGEST_KEY: &str = "containerimage.digest";

/// Environment variable carrying the build secret `id` to buildx.
///
/// ```
/// assert_eq!(infuse_engine::buildx::secret_env("asset0"), "INFUSE_SECRET_ASSET0");
/// ```
pub fn secret_env(id: &str) -> String {
    format!("INFUSE_SECRET_{}", id.to_uppercase())
}

/// `docker buildx build` driven through a [`CommandExecutor`].
pub struct DockerBuildx<E: CommandExecutor = RealExecutor> {
    program: String,
    builder: Option<String>,
    executor: E,
}

impl DockerBuildx<RealExecutor> {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_executor(config, RealExecutor)
    }
}

impl<E: CommandExecutor> DockerBuildx<E> {
    pub fn with_executor(config: &EngineConfig, executor: E) -> Self {
        Self {
            program: config.program.clone(),
            builder: config.builder.clone(),
            executor,
        }
    }

    /// Arguments of the build invocation. The Dockerfile is read from stdin.
    pub fn build_args(&self, request: &BuildRequest, metadata_file: &Path) -> Vec<String> {
        let settings = &request.settings;
        let mut args = args(["buildx", "build", "--file", "-"]);

        // The image's own builder wins over the configured one.
        if let Some(builder) = settings.builder.as_ref().or(self.builder.as_ref()) {
            args.extend(["--builder".to_owned(), builder.clone()]);
        }
        args.extend(["--network".to_owned(), settings.network.clone()]);
        if !settings.platforms.is_empty() {
            args.extend(["--platform".to_owned(), settings.platforms.join(",")]);
        }
        for tag in &request.tags {
            args.extend(["--tag".to_owned(), tag.clone()]);
        }
        for (key, value) in &request.labels {
            args.extend(["--label".to_owned(), format!("{key}={value}")]);
        }
        for id in request.secrets.keys() {
            args.extend([
                "--secret".to_owned(),
                format!("id={id},env={}", secret_env(id)),
            ]);
        }
        for (enabled, flag) in [
            (request.no_cache, "--no-cache"),
            (settings.pull, "--pull"),
            (settings.push, "--push"),
            (settings.load, "--load"),
        ] {
            if enabled {
                args.push(flag.to_owned());
            }
        }
        for (flag, values) in [
            ("--output", &settings.exports),
            ("--ssh", &settings.ssh),
            ("--cache-from", &request.cache_from),
            ("--cache-to", &request.cache_to),
        ] {
            for value in values {
                args.extend([flag.to_owned(), value.clone()]);
            }
        }
        args.extend([
            "--metadata-file".to_owned(),
            metadata_file.display().to_string(),
            request.context.display().to_string(),
        ]);
        args
    }

    async fn login(&self, registry: &Registry) -> Result<(), EngineError> {
        let (Some(username), Some(variable)) = (&registry.username, &registry.password_env) else {
            debug!(address = %registry.address, "no credentials configured, relying on existing login");
            return Ok(());
        };
        let password =
            std::env::var(variable).map_err(|_| EngineError::MissingCredential {
                address: registry.address.clone(),
                variable: variable.clone(),
            })?;

        self.executor
            .exec(
                &self.program,
                &args([
                    "login",
                    registry.address.as_str(),
                    "--username",
                    username.as_str(),
                    "--password-stdin",
                ]),
                &[],
                password.as_bytes(),
            )
            .await
            .map_err(|e| EngineError::Login {
                address: registry.address.clone(),
                source: e,
            })?;
        Ok(())
    }
}

impl<E: CommandExecutor> BuildEngine for DockerBuildx<E> {
    async fn build(&self, request: &BuildRequest) -> Result<BuiltImage, EngineError> {
        for registry in &request.settings.registries {
            self.login(registry).await?;
        }

        let workdir = tempfile::Builder::new()
            .prefix("infuse-buildx-")
            .tempdir()
            .map_err(|e| EngineError::MetadataFile { source: e })?;
        let metadata_file = workdir.path().join("metadata.json");

        let envs: Vec<(String, SecretString)> = request
            .secrets
            .iter()
            .map(|(id, value)| {
                let value = SecretString::from(value.expose_secret().to_owned());
                (secret_env(id), value)
            })
            .collect();

        info!(context = %request.context.display(), tags = ?request.tags, "building image");
        self.executor
            .exec(
                &self.program,
                &self.build_args(request, &metadata_file),
                &envs,
                request.dockerfile.as_bytes(),
            )
            .await
            .map_err(|e| EngineError::Build { source: e })?;

        let digest = read_digest(&metadata_file).await?;
        let reference = match request.tags.first() {
            Some(tag) => format!("{tag}@{digest}"),
            None => digest.clone(),
        };
        Ok(BuiltImage { reference, digest })
    }
}

async fn read_digest(path: &Path) -> Result<String, EngineError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| EngineError::MetadataRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    let metadata: serde_json::Value =
        serde_json::from_slice(&content).map_err(|e| EngineError::MetadataParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    metadata
        .get(DIGEST_KEY)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| EngineError::MissingDigest {
            path: path.to_path_buf(),
        })
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
