//! Command-line interface definitions.
//!
//! ```text
//! staticweb ./src                 compile ./src into ./dist once
//! staticweb ./src -o public       compile into ./public
//! staticweb ./src --live          compile, then serve on 3000 and rebuild on change
//! staticweb ./src --port 8080     same, on port 8080
//! ```

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// staticweb: compile a content tree into a static site
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Source directory
    #[arg(value_name = "SRC")]
    pub src_arg: Option<PathBuf>,

    /// Source directory (same as the positional argument)
    #[arg(long = "src", visible_alias = "root", value_name = "DIR")]
    pub src: Option<PathBuf>,

    /// Output directory (default: `dist` next to the source directory)
    #[arg(short, long, visible_alias = "output")]
    pub out: Option<PathBuf>,

    /// Serve the output and rebuild on change. A bare flag uses the configured port
    #[arg(
        short,
        long,
        visible_aliases = ["live", "listen"],
        short_alias = 'l',
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = false
    )]
    pub port: Option<String>,

    /// Config file (default: `staticweb.toml` in the source directory)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Write pages without subpages as `<name>.html`
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub flatten: Option<bool>,
}

impl Cli {
    /// Source directory from either the flag or the positional argument.
    pub fn source(&self) -> Option<PathBuf> {
        self.src.clone().or_else(|| self.src_arg.clone())
    }

    /// Live mode request.
    ///
    /// `None`: compile once. `Some(None)`: live on the configured port.
    /// `Some(Some(port))`: live on `port`.
    pub fn port_setting(&self) -> Result<Option<Option<u16>>> {
        match self.port.as_deref() {
            None | Some("false") => Ok(None),
            Some("true") => Ok(Some(None)),
            Some(port) => match port.parse::<u16>() {
                Ok(port) => Ok(Some(Some(port))),
                Err(_) => bail!("Cannot Listen On Port {port}"),
            },
        }
    }
}
