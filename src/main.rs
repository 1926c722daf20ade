use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use rainscape::app::{self, WindowInitError};
use rainscape::render::SHADOW_RESOLUTION;
use rainscape::scene::{SceneAssets, SceneManifest};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let manifest = SceneManifest::load(&options.path)
        .with_context(|| format!("failed to load scene {}", options.path.display()))?;
    // Mesh paths in the manifest are relative to the manifest itself.
    let base = options.path.parent().unwrap_or(Path::new("."));
    let assets = SceneAssets::load(&manifest, base).context("failed to load scene meshes")?;

    print_summary(&assets);

    if options.summary_only {
        return Ok(());
    }
    match app::run(assets) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn print_summary(assets: &SceneAssets) {
    println!(
        "Loaded scene with {} objects ({} raindrops, seed {})",
        assets.objects.len(),
        assets.settings.rain_count,
        assets.settings.rain_seed
    );
    for loaded in &assets.objects {
        println!(
            " - {} ({}, {} vertices, {} triangles)",
            loaded.object.name,
            loaded.object.role,
            loaded.mesh.vertices.len(),
            loaded.mesh.triangle_count()
        );
    }
    println!("Shadow map: {SHADOW_RESOLUTION}x{SHADOW_RESOLUTION}");
}

struct CliOptions {
    path: PathBuf,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut path = None;
        let mut summary_only = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                other if other.starts_with('-') => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: rainscape [scene.xml] [--summary-only]"
                    ));
                }
                _ => {
                    if path.replace(PathBuf::from(&arg)).is_some() {
                        return Err(anyhow!(
                            "Unexpected extra argument: {arg}. Usage: rainscape [scene.xml] [--summary-only]"
                        ));
                    }
                }
            }
        }
        Ok(Self {
            path: path.unwrap_or_else(|| PathBuf::from("assets/scene.xml")),
            summary_only,
        })
    }
}
