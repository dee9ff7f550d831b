mod inject;
mod render;

use std::path::{Path, PathBuf};

use infuse_core::InfuseConfig;

pub use inject::inject;
pub use render::render;

/// Configuration file selection and per-invocation overrides.
#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Configuration file (default: ./infuse.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Tag suffix template, `{idx}` being the injection index
    #[arg(long, global = true)]
    suffix: Option<String>,
    /// Stack organization
    #[arg(long, global = true)]
    stack_org: Option<String>,
    /// Stack project
    #[arg(long, global = true)]
    stack_project: Option<String>,
    /// Stack name
    #[arg(long, global = true)]
    stack_name: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> anyhow::Result<InfuseConfig> {
        let mut config = match &self.config {
            Some(path) => InfuseConfig::load_file(path)?,
            None => InfuseConfig::load(Path::new("."))?,
        };

        if let Some(suffix) = &self.suffix {
            config.inject.suffix = suffix.clone();
        }
        if let Some(org) = &self.stack_org {
            config.stack.organization = org.clone();
        }
        if let Some(project) = &self.stack_project {
            config.stack.project = project.clone();
        }
        if let Some(name) = &self.stack_name {
            config.stack.name = name.clone();
        }
        Ok(config)
    }
}
