//! TOML settings for the wallpaper engine.
//!
//! Every effect section is optional and defaults to "off"; a minimal config
//! only names the image folder. Durations accept either bare seconds or
//! humantime strings ("5m", "750ms").

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    Continuous,
    Shuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuotoneBlend {
    Normal,
    SoftLight,
    Screen,
}

/// An sRGB color written as `"#rrggbb"` (the `#` is optional).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };
}

fn parse_color(raw: &str) -> Result<Color, String> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid color '{raw}'; expected '#rrggbb'"));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|err| format!("invalid color '{raw}': {err}"))
    };
    Ok(Color {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_color(&raw).map_err(de::Error::custom)
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    pub version: u32,
    /// Directory scanned for wallpaper images.
    pub folder: PathBuf,
    #[serde(
        default = "default_transition",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub transition: Duration,
    #[serde(default)]
    pub rotation: RotationSettings,
    #[serde(default)]
    pub blur: BlurSettings,
    #[serde(default)]
    pub dim: DimSettings,
    #[serde(default)]
    pub duotone: DuotoneSection,
    #[serde(default)]
    pub grain: GrainSection,
    #[serde(default)]
    pub touch: TouchSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RotationSettings {
    #[serde(
        default = "default_rotation_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    #[serde(default = "default_rotation_mode")]
    pub mode: RotationMode,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            interval: default_rotation_interval(),
            mode: default_rotation_mode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlurSettings {
    /// Blur fraction applied at rest, 0 for a sharp wallpaper.
    #[serde(default)]
    pub amount: f32,
    /// Radius in pixels the blur reaches at fraction 1.
    #[serde(default = "default_max_radius")]
    pub max_radius: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            amount: 0.0,
            max_radius: default_max_radius(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DimSettings {
    #[serde(default)]
    pub amount: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DuotoneSection {
    #[serde(default = "Color::white")]
    pub light: Color,
    #[serde(default = "Color::black")]
    pub dark: Color,
    #[serde(default)]
    pub opacity: f32,
    #[serde(default = "default_duotone_blend")]
    pub blend: DuotoneBlend,
    #[serde(default)]
    pub always_on: bool,
}

impl Color {
    fn white() -> Self {
        Self::WHITE
    }

    fn black() -> Self {
        Self::BLACK
    }
}

impl Default for DuotoneSection {
    fn default() -> Self {
        Self {
            light: Color::WHITE,
            dark: Color::BLACK,
            opacity: 0.0,
            blend: default_duotone_blend(),
            always_on: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GrainSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_grain_amount")]
    pub amount: f32,
    #[serde(default = "default_grain_scale")]
    pub scale: f32,
}

impl Default for GrainSection {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: default_grain_amount(),
            scale: default_grain_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TouchSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_touch_strength")]
    pub strength: f32,
    #[serde(
        default = "default_touch_fade",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub fade: Duration,
}

impl Default for TouchSection {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: default_touch_strength(),
            fade: default_touch_fade(),
        }
    }
}

fn default_transition() -> Duration {
    Duration::from_millis(600)
}

fn default_rotation_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_rotation_mode() -> RotationMode {
    RotationMode::Shuffle
}

fn default_max_radius() -> f32 {
    120.0
}

fn default_duotone_blend() -> DuotoneBlend {
    DuotoneBlend::Normal
}

fn default_grain_amount() -> f32 {
    0.08
}

fn default_grain_scale() -> f32 {
    2.0
}

fn default_touch_strength() -> f32 {
    0.6
}

fn default_touch_fade() -> Duration {
    Duration::from_millis(900)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Settings {
    /// Settings with every effect at its default, rotating images from
    /// `folder`.
    pub fn with_folder(folder: PathBuf) -> Self {
        Self {
            version: 1,
            folder,
            rotation: RotationSettings::default(),
            transition: default_transition(),
            blur: BlurSettings::default(),
            dim: DimSettings::default(),
            duotone: DuotoneSection::default(),
            grain: GrainSection::default(),
            touch: TouchSection::default(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("folder must not be empty".into()));
        }

        if self.rotation.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "rotation.interval must be greater than zero".into(),
            ));
        }

        check_unit("blur.amount", self.blur.amount)?;
        if !(self.blur.max_radius.is_finite() && self.blur.max_radius >= 0.0) {
            return Err(ConfigError::Invalid(
                "blur.max_radius must be a non-negative number".into(),
            ));
        }
        check_unit("dim.amount", self.dim.amount)?;
        check_unit("duotone.opacity", self.duotone.opacity)?;
        check_unit("grain.amount", self.grain.amount)?;
        if !(self.grain.scale.is_finite() && self.grain.scale >= 0.5) {
            return Err(ConfigError::Invalid(
                "grain.scale must be at least 0.5".into(),
            ));
        }
        check_unit("touch.strength", self.touch.strength)?;

        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be between 0 and 1"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            version = 1
            folder = "/data/wallpapers"
            "#,
        )
        .expect("minimal config");
        assert_eq!(settings.rotation.interval, Duration::from_secs(300));
        assert_eq!(settings.rotation.mode, RotationMode::Shuffle);
        assert_eq!(settings.transition, Duration::from_millis(600));
        assert_eq!(settings.blur.amount, 0.0);
        assert!(!settings.grain.enabled);
        assert!(!settings.touch.enabled);
    }

    #[test]
    fn full_config_round_trips_every_section() {
        let settings = Settings::from_toml_str(
            r##"
            version = 1
            folder = "/data/wallpapers"
            transition = "750ms"

            [rotation]
            interval = "5m"
            mode = "continuous"

            [blur]
            amount = 0.4
            max_radius = 200.0

            [dim]
            amount = 0.3

            [duotone]
            light = "#ffd9a0"
            dark = "#102030"
            opacity = 0.5
            blend = "softlight"
            always_on = true

            [grain]
            enabled = true
            amount = 0.1
            scale = 3.0

            [touch]
            enabled = true
            strength = 0.8
            fade = "1s"
            "##,
        )
        .expect("full config");
        assert_eq!(settings.transition, Duration::from_millis(750));
        assert_eq!(settings.rotation.interval, Duration::from_secs(300));
        assert_eq!(settings.rotation.mode, RotationMode::Continuous);
        assert_eq!(settings.blur.max_radius, 200.0);
        assert_eq!(
            settings.duotone.light,
            Color {
                r: 0xff,
                g: 0xd9,
                b: 0xa0
            }
        );
        assert_eq!(settings.duotone.blend, DuotoneBlend::SoftLight);
        assert!(settings.duotone.always_on);
        assert_eq!(settings.touch.fade, Duration::from_secs(1));

        // Serializing and re-parsing must reproduce the settings exactly,
        // durations included.
        let serialized = toml::to_string(&settings).expect("serialize settings");
        let reparsed = Settings::from_toml_str(&serialized).expect("re-parse settings");
        assert_eq!(reparsed, settings);
    }

    #[test]
    fn bare_seconds_parse_as_durations() {
        let settings = Settings::from_toml_str(
            r#"
            version = 1
            folder = "/data/wallpapers"
            transition = 2

            [rotation]
            interval = 90
            "#,
        )
        .expect("numeric durations");
        assert_eq!(settings.transition, Duration::from_secs(2));
        assert_eq!(settings.rotation.interval, Duration::from_secs(90));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let err = Settings::from_toml_str("version = 2\nfolder = \"/x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        let err = Settings::from_toml_str(
            r#"
            version = 1
            folder = "/x"

            [dim]
            amount = 1.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dim.amount"));
    }

    #[test]
    fn zero_rotation_interval_is_rejected() {
        let err = Settings::from_toml_str(
            r#"
            version = 1
            folder = "/x"

            [rotation]
            interval = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("rotation.interval"));
    }

    #[test]
    fn malformed_colors_are_rejected() {
        for raw in ["#12345", "zzzzzz", "#1234567"] {
            let input = format!(
                "version = 1\nfolder = \"/x\"\n[duotone]\nlight = \"{raw}\"\n"
            );
            assert!(Settings::from_toml_str(&input).is_err(), "accepted {raw}");
        }
    }
}
