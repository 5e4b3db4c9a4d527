use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Animated wallpaper daemon: rotates images from a folder with blur,
/// duotone, dim, grain, and touch effects.
#[derive(Debug, Parser)]
#[command(name = "driftpaper", version, about)]
pub struct Cli {
    /// Path to the settings file; defaults to ./driftpaper.toml when present.
    #[arg(long, env = "DRIFTPAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image folder; overrides the settings file.
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Rotation interval; overrides the settings file.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Initial window size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1920x1080", value_parser = parse_surface_size)]
    pub size: (u32, u32),

    /// Shuffle seed; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_surface_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let parse = |part: &str, axis: &str| {
        part.trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| format!("invalid {axis} in size '{raw}'"))
    };
    Ok((parse(width, "width")?, parse(height, "height")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_size_accepts_both_separators() {
        assert_eq!(parse_surface_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_surface_size("800X600").unwrap(), (800, 600));
    }

    #[test]
    fn surface_size_rejects_garbage() {
        for raw in ["1920", "0x100", "axb", "100x"] {
            assert!(parse_surface_size(raw).is_err(), "accepted {raw}");
        }
    }
}
