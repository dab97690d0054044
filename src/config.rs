use crate::ghostscript;
use crate::raster::{self, DEFAULT_DPI};
use anyhow::{Context, Result, anyhow};
use ratatui::style::Color;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub options: RasterOptions,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterOptions {
    pub dpi: u32,
    pub output_dir: Option<PathBuf>,
    pub ghostscript: String,
    pub strip_metadata: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            output_dir: None,
            ghostscript: ghostscript::default_program().to_string(),
            strip_metadata: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub primary: Color,
    pub accent: Color,
    pub muted: Color,
    pub good: Color,
    pub bad: Color,
    pub console: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            accent: Color::Yellow,
            muted: Color::DarkGray,
            good: Color::Green,
            bad: Color::Red,
            console: Color::Green,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    default: Profile,
    #[serde(default)]
    theme: ThemeFile,
    #[serde(default)]
    profile: HashMap<String, Profile>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
struct Profile {
    dpi: Option<u32>,
    output_dir: Option<PathBuf>,
    ghostscript: Option<String>,
    strip_metadata: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ThemeFile {
    primary: Option<String>,
    accent: Option<String>,
    muted: Option<String>,
    good: Option<String>,
    bad: Option<String>,
    console: Option<String>,
}

/// Loads the config file, falling back to defaults when the default path
/// does not exist. An explicit `path` must exist.
pub fn load(path: Option<&Path>, profile: Option<&str>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        if path.is_some() {
            anyhow::bail!("config file not found: {}", config_path.display());
        }
        if let Some(name) = profile {
            anyhow::bail!("profile not found in config: {}", name);
        }
        return Ok(AppConfig {
            options: RasterOptions::default(),
            theme: Theme::default(),
        });
    }

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("read {}", config_path.display()))?;
    parse(&contents, profile).with_context(|| format!("parse {}", config_path.display()))
}

fn parse(contents: &str, profile: Option<&str>) -> Result<AppConfig> {
    let parsed: ConfigFile = toml::from_str(contents)?;

    let mut options = RasterOptions::default();
    apply_profile(&parsed.default, &mut options)?;
    if let Some(name) = profile {
        let profile = parsed
            .profile
            .get(name)
            .ok_or_else(|| anyhow!("profile not found in config: {}", name))?;
        apply_profile(profile, &mut options)?;
    }

    let theme = apply_theme(&parsed.theme)?;
    Ok(AppConfig { options, theme })
}

fn apply_profile(profile: &Profile, options: &mut RasterOptions) -> Result<()> {
    if let Some(value) = profile.dpi {
        options.dpi = check_dpi(value)?;
    }
    if let Some(value) = profile.output_dir.as_ref() {
        options.output_dir = Some(value.clone());
    }
    if let Some(value) = profile.ghostscript.as_deref() {
        if value.trim().is_empty() {
            anyhow::bail!("ghostscript must be a non-empty string");
        }
        options.ghostscript = value.to_string();
    }
    if let Some(value) = profile.strip_metadata {
        options.strip_metadata = value;
    }
    Ok(())
}

fn apply_theme(file: &ThemeFile) -> Result<Theme> {
    let mut theme = Theme::default();
    let slots = [
        (&file.primary, &mut theme.primary, "primary"),
        (&file.accent, &mut theme.accent, "accent"),
        (&file.muted, &mut theme.muted, "muted"),
        (&file.good, &mut theme.good, "good"),
        (&file.bad, &mut theme.bad, "bad"),
        (&file.console, &mut theme.console, "console"),
    ];
    for (value, slot, name) in slots {
        if let Some(value) = value.as_deref() {
            *slot = value
                .parse::<Color>()
                .map_err(|_| anyhow!("invalid {name} color: {value}"))?;
        }
    }
    Ok(theme)
}

pub fn check_dpi(dpi: u32) -> Result<u32> {
    raster::validate_dpi(dpi).map_err(|err| anyhow!("{err}"))?;
    Ok(dpi)
}

fn default_config_path() -> Result<PathBuf> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(path) => PathBuf::from(path),
        Err(_) => {
            let home = std::env::var("HOME").context("HOME not set")?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(base.join("pdfraster").join("config.toml"))
}
