//! Configuration for the compiler.
//!
//! Two layers:
//!
//! | Layer                         | Scope          | Format                |
//! |-------------------------------|----------------|-----------------------|
//! | [`SiteConfig`]                | whole run      | `staticweb.toml`      |
//! | [`PageConfig`]                | one directory  | `layout.yml`, front matter |
//!
//! `staticweb.toml` is optional and lives next to the source root. CLI flags
//! override it.
//!
//! ```toml
//! [build]
//! minify = true
//! flatten = false
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 3000
//! ```

pub mod defaults;
mod error;
mod page;

pub use error::{CompileError, ConfigError};
pub use page::{LAYOUT_BLOCK, LAYOUT_FILES, PageConfig, RESERVED_META, Script, Style};

use crate::cli::Cli;
use anyhow::{Context, Result};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Lowest port accepted for the development server.
pub const MIN_PORT: u16 = 3000;

// ============================================================================
// Build Options
// ============================================================================

/// `[build]` section: how pages are produced.
///
/// Threaded explicitly through every compile call.
#[derive(Debug, Clone, PartialEq, Eq, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildOptions {
    /// Minify templates and blocks, and allow gzip output.
    ///
    /// `false` is the debug mode: readable output, one head element per line,
    /// no `.gz` files.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Write childless pages as `<dir>.html` instead of `<dir>/index.html`.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub flatten: bool,
}

impl BuildOptions {
    /// Options for readable, unminified output.
    pub fn debug() -> Self {
        Self {
            minify: false,
            ..Self::default()
        }
    }
}

/// `[serve]` section: development server settings.
#[derive(Debug, Clone, PartialEq, Eq, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeOptions {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number.
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `staticweb.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Source content tree (set from the CLI).
    #[serde(skip)]
    pub src: PathBuf,

    /// Output tree (set from the CLI).
    #[serde(skip)]
    pub out: PathBuf,

    /// Serve and watch instead of compiling once.
    #[serde(skip)]
    pub live: bool,

    #[serde(default)]
    pub build: BuildOptions,

    #[serde(default)]
    pub serve: ServeOptions,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in `{}`", path.display()))
    }

    /// Load `staticweb.toml` for a CLI invocation, then apply CLI overrides.
    ///
    /// The config file is looked up at `--config` if given, otherwise next to
    /// the source root. A missing default file means default settings.
    pub fn load(cli: &Cli) -> Result<Self> {
        let src = cli.source().context("no source directory given")?;

        let path = match &cli.config {
            Some(path) => Some(path.clone()),
            None => Some(src.join(defaults::CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = match path {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.update_with_cli(cli, src)?;
        config.validate()?;
        Ok(config)
    }

    /// Update configuration with CLI arguments
    fn update_with_cli(&mut self, cli: &Cli, src: PathBuf) -> Result<()> {
        self.out = match &cli.out {
            Some(out) => out.clone(),
            None => default_output(&src),
        };
        self.src = src;

        Self::update_option(&mut self.build.minify, cli.minify.as_ref());
        Self::update_option(&mut self.build.flatten, cli.flatten.as_ref());

        if let Some(port) = cli.port_setting()? {
            self.live = true;
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
        Ok(())
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.live && self.serve.port < MIN_PORT {
            return Err(ConfigError::Validation(format!(
                "Cannot Listen On Port {} (expected {MIN_PORT}-65535)",
                self.serve.port
            ))
            .into());
        }
        Ok(())
    }
}

/// `dist` next to the source directory.
fn default_output(src: &Path) -> PathBuf {
    let src = crate::utils::category::normalize_path(src);
    src.parent().unwrap_or(&src).join("dist")
}
