use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Defaults that can be saved to a file and overridden on the command line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clobber: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_hmmss: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_shift: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format_width: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remap: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_secs: Option<u64>,
}

impl Config {
    /// Create a new empty config
    pub fn new() -> Self {
        Config {
            output_dir: None,
            clobber: None,
            show_hmmss: None,
            order: None,
            pad: None,
            fix_shift: None,
            hash: None,
            name_template: None,
            number_format_width: None,
            remap: None,
            shift_secs: None,
        }
    }

    /// Get the config file path (~/.state/wavekit/defaults.toml)
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME environment variable not set"))?;

        let config_dir = Path::new(&home).join(".state").join("wavekit");
        Ok(config_dir.join("defaults.toml"))
    }

    /// Load config from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load config from `path`, or an empty config if there is none
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    /// Merge this config with another, preferring values from other
    pub fn merge(&mut self, other: &Config) {
        if other.output_dir.is_some() {
            self.output_dir = other.output_dir.clone();
        }
        if other.clobber.is_some() {
            self.clobber = other.clobber;
        }
        if other.show_hmmss.is_some() {
            self.show_hmmss = other.show_hmmss;
        }
        if other.order.is_some() {
            self.order = other.order.clone();
        }
        if other.pad.is_some() {
            self.pad = other.pad.clone();
        }
        if other.fix_shift.is_some() {
            self.fix_shift = other.fix_shift.clone();
        }
        if other.hash.is_some() {
            self.hash = other.hash.clone();
        }
        if other.name_template.is_some() {
            self.name_template = other.name_template.clone();
        }
        if other.number_format_width.is_some() {
            self.number_format_width = other.number_format_width;
        }
        if other.remap.is_some() {
            self.remap = other.remap.clone();
        }
        if other.shift_secs.is_some() {
            self.shift_secs = other.shift_secs;
        }
    }

    /// Reject values the modes would refuse later anyway
    pub fn validate(&self) -> Result<()> {
        if let Some(order) = &self.order {
            order.parse::<crate::stream::FileOrder>()?;
        }
        if let Some(pad) = &self.pad {
            pad.parse::<crate::pad::PadMode>()?;
        }
        if let Some(shift) = &self.fix_shift {
            shift.parse::<crate::fix::FixShift>()?;
        }
        if let Some(hash) = &self.hash {
            hash.parse::<crate::hash::HashAlgorithm>()?;
        }
        if let Some(remap) = &self.remap {
            if remap.chars().count() % 2 != 0 {
                return Err(Error::Config(format!(
                    "remap needs pairs of characters, got [{}]",
                    remap
                )));
            }
        }
        if self.shift_secs == Some(0) {
            return Err(Error::Config("shift_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Print the config in a human-readable format
    pub fn print(&self, title: &str) {
        println!("{}:", title);

        if let Some(dir) = &self.output_dir {
            println!("  Output directory:   {}", dir.display());
        }
        if let Some(clobber) = self.clobber {
            println!("  Overwrite files:    {}", if clobber { "yes" } else { "no" });
        }
        if let Some(show_hmmss) = self.show_hmmss {
            println!("  Show h:mm:ss:       {}", if show_hmmss { "yes" } else { "no" });
        }
        if let Some(order) = &self.order {
            println!("  File order:         {}", order);
        }
        if let Some(pad) = &self.pad {
            println!("  Pad type:           {}", pad);
        }
        if let Some(shift) = &self.fix_shift {
            println!("  Fix shift:          {}", shift);
        }
        if let Some(hash) = &self.hash {
            println!("  Hash algorithm:     {}", hash);
        }
        if let Some(template) = &self.name_template {
            println!("  Name template:      {}", template);
        }
        if let Some(width) = self.number_format_width {
            println!("  Number width:       {}", width);
        }
        if let Some(remap) = &self.remap {
            println!("  Character remap:    {}", remap);
        }
        if let Some(secs) = self.shift_secs {
            println!("  Shift search:       {} seconds", secs);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
