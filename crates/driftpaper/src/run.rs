use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use engine::{
    AberrationSettings, BlendMode, Color, DuotoneSettings, EngineConfig, GrainSettings,
    ImageSource, TargetState,
};
use paperconfig::Settings;
use rotation::Rotation;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const DEFAULT_CONFIG_NAME: &str = "driftpaper.toml";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

pub fn initialise_tracing() {
    let default_filter =
        "warn,driftpaper=info,engine=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let images = scan_folder(&settings.folder)?;
    tracing::info!(
        folder = %settings.folder.display(),
        images = images.len(),
        "scanned wallpaper folder"
    );

    let seed = cli.seed.unwrap_or_else(random_seed);
    let rotation = Rotation::new(images, settings.rotation.mode, seed)
        .context("building rotation order")?;

    let config = EngineConfig {
        surface_size: cli.size,
        effects: effects_from_settings(&settings),
        transition: settings.transition,
        max_blur_radius: settings.blur.max_radius,
        rotation_interval: settings.rotation.interval,
    };
    engine::window::run(config, Box::new(FolderSource { rotation }))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_NAME);
            default.exists().then_some(default)
        }
    };

    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Settings::from_toml_str(&raw)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => {
            let folder = cli
                .folder
                .clone()
                .context("no config file found; pass --config or --folder")?;
            Settings::with_folder(folder)
        }
    };

    if let Some(folder) = &cli.folder {
        settings.folder = folder.clone();
    }
    if let Some(interval) = cli.interval {
        settings.rotation.interval = interval;
    }
    settings.validate().context("validating settings")?;
    Ok(settings)
}

/// Collects image files directly under `folder`, sorted by name so
/// continuous rotation order is stable across runs.
fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("reading image folder {}", folder.display()))?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    images.sort();
    if images.is_empty() {
        bail!("no images found in {}", folder.display());
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn effects_from_settings(settings: &Settings) -> TargetState {
    TargetState {
        blur: settings.blur.amount,
        dim: settings.dim.amount,
        duotone: DuotoneSettings {
            light: convert_color(settings.duotone.light),
            dark: convert_color(settings.duotone.dark),
            opacity: settings.duotone.opacity,
            blend: match settings.duotone.blend {
                paperconfig::DuotoneBlend::Normal => BlendMode::Normal,
                paperconfig::DuotoneBlend::SoftLight => BlendMode::SoftLight,
                paperconfig::DuotoneBlend::Screen => BlendMode::Screen,
            },
            always_on: settings.duotone.always_on,
        },
        grain: GrainSettings {
            enabled: settings.grain.enabled,
            amount: settings.grain.amount,
            scale: settings.grain.scale,
        },
        aberration: AberrationSettings {
            enabled: settings.touch.enabled,
            strength: settings.touch.strength,
            fade: settings.touch.fade,
        },
        ..TargetState::default()
    }
}

fn convert_color(color: paperconfig::Color) -> Color {
    Color::new(color.r, color.g, color.b)
}

fn random_seed() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

struct FolderSource {
    rotation: Rotation,
}

impl ImageSource for FolderSource {
    fn next(&mut self) -> Option<PathBuf> {
        Some(self.rotation.advance().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn folder_scan_keeps_only_images_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.jpg", "notes.txt", "c.JPEG", "noext"] {
            File::create(dir.path().join(name)).expect("create file");
        }
        fs::create_dir(dir.path().join("sub.png")).expect("subdir");

        let images = scan_folder(dir.path()).expect("scan");
        let names: Vec<_> = images
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png", "c.JPEG"]);
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(scan_folder(dir.path()).is_err());
    }

    #[test]
    fn settings_map_onto_effect_targets() {
        let settings = Settings::from_toml_str(
            r##"
            version = 1
            folder = "/data/wallpapers"

            [blur]
            amount = 0.25

            [dim]
            amount = 0.4

            [duotone]
            light = "#ffffff"
            dark = "#000000"
            opacity = 0.5
            blend = "screen"

            [touch]
            enabled = true
            strength = 0.7
            "##,
        )
        .expect("settings");
        let effects = effects_from_settings(&settings);
        assert_eq!(effects.blur, 0.25);
        assert_eq!(effects.dim, 0.4);
        assert_eq!(effects.duotone.blend, BlendMode::Screen);
        assert!(effects.aberration.enabled);
        assert_eq!(effects.aberration.strength, 0.7);
    }
}
