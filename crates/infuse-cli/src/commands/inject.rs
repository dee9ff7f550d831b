use std::path::Path;

use anyhow::Context;
use infuse_build::Janitor;
use infuse_core::{AssetManifest, Image, InfuseConfig};
use infuse_engine::{DockerBuildx, InjectOptions, Injector};
use tracing::warn;

pub async fn inject(
    config: &InfuseConfig,
    image_path: &Path,
    assets_path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let image = Image::load(image_path)?;
    let manifest = AssetManifest::load(assets_path)?;
    let options = InjectOptions::from_config(config)?;

    let janitor = Janitor::new();
    let injector = Injector::new(DockerBuildx::new(&config.engine), options, &janitor);
    let result = injector
        .inject(&image, &manifest.assets)
        .await
        .with_context(|| format!("failed to inject assets into {}", image.reference));
    if let Err(e) = janitor.teardown() {
        warn!(error = %e, "failed to clean up build directories");
    }
    let injection = result?;

    let descriptor = injection.image.to_toml()?;
    match output {
        Some(path) => {
            std::fs::write(path, &descriptor)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Injected {} asset(s): {}",
                manifest.assets.len(),
                injection.image.reference
            );
        }
        None => print!("{descriptor}"),
    }
    Ok(())
}
