use std::path::Path;

use anyhow::Context;
use infuse_build::Janitor;
use infuse_core::{AssetManifest, Image, InfuseConfig};
use infuse_engine::{CapacityWarning, DockerBuildx, InjectOptions, Injector};
use tracing::warn;

pub async fn render(
    config: &InfuseConfig,
    image_path: &Path,
    assets_path: &Path,
) -> anyhow::Result<()> {
    let image = Image::load(image_path)?;
    let manifest = AssetManifest::load(assets_path)?;
    let options = InjectOptions::from_config(config)?;

    if let Some(warning) =
        CapacityWarning::check(manifest.assets.len(), options.max_assets_advisory)
    {
        warn!("{warning}");
    }

    let janitor = Janitor::new();
    let injector = Injector::new(DockerBuildx::new(&config.engine), options, &janitor);
    let request = injector
        .prepare(&image, &manifest.assets)
        .await
        .with_context(|| format!("failed to prepare injection into {}", image.reference))?;

    println!("# context: {}", request.context.display());
    for tag in &request.tags {
        println!("# tag: {tag}");
    }
    for id in request.secrets.keys() {
        println!("# secret: {id}");
    }
    println!("{}", request.dockerfile);

    janitor
        .teardown()
        .context("failed to clean up build directories")?;
    Ok(())
}
