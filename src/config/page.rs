//! Per-directory page configuration and its cascade.
//!
//! Each source directory sees the configuration of its ancestors with its own
//! `layout.yml` and content blocks layered on top. Values flow strictly
//! downward: every level works on its own snapshot, so nothing a directory
//! sets is visible to its parent or its siblings.
//!
//! # Example
//!
//! ```yaml
//! opts: { gzip: true }
//! vars: { brand: Acme }
//! meta: { sitetitle: Acme, description: Widgets }
//! styles:
//!   - url: /main.css
//!   - { url: /print.css, print: true }
//! scripts:
//!   - { url: /app.js, module: true, defer: true }
//! title: Home        # shorthand for meta.title
//! ```

use super::error::CompileError;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Layout config file names, in lookup order.
pub const LAYOUT_FILES: &[&str] = &["layout.yml", "layout.yaml", "layout.json"];

/// Block holding the body template of a page.
pub const LAYOUT_BLOCK: &str = "layout";

/// Metadata keys with dedicated template slots, never emitted as `<meta>` tags.
pub const RESERVED_META: &[&str] = &["sitetitle", "apptitle", "title", "page"];

/// A stylesheet linked from the page head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Style {
    pub url: String,
    /// Only applies to print media.
    pub print: bool,
    /// Loaded without blocking render, swapped to all media once loaded.
    pub lazy: bool,
}

/// A script loaded from the page head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Script {
    pub url: String,
    pub module: bool,
    pub defer: bool,
    #[serde(rename = "async")]
    pub is_async: bool,
    /// Emitted as `type="wasm/<kind>"` for non-module scripts.
    pub wasm: Option<String>,
}

/// Configuration for one directory level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageConfig {
    pub opts: BTreeMap<String, bool>,
    pub vars: BTreeMap<String, String>,
    pub meta: BTreeMap<String, String>,
    pub styles: Vec<Style>,
    pub scripts: Vec<Script>,
    /// Named blocks, rendered HTML keyed by content file basename.
    pub blocks: BTreeMap<String, Vec<u8>>,
    pub is_home_page: bool,
}

/// On-disk shape of `layout.yml` and front matter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    opts: BTreeMap<String, bool>,
    vars: BTreeMap<String, String>,
    meta: BTreeMap<String, String>,
    styles: Vec<Style>,
    scripts: Vec<Script>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

impl From<RawConfig> for PageConfig {
    fn from(raw: RawConfig) -> Self {
        let mut meta = raw.meta;
        for (key, value) in raw.rest {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            meta.entry(key).or_insert(value);
        }

        Self {
            opts: raw.opts,
            vars: raw.vars,
            meta,
            styles: raw.styles,
            scripts: raw.scripts,
            ..Self::default()
        }
    }
}

impl PageConfig {
    /// Configuration of the source root, seeded with the default body template.
    pub fn root(body_template: &[u8]) -> Self {
        let mut config = Self {
            is_home_page: true,
            ..Self::default()
        };
        config
            .blocks
            .insert(LAYOUT_BLOCK.to_owned(), body_template.to_vec());
        config
    }

    /// Independent snapshot handed to a child directory.
    pub fn child(&self) -> Self {
        Self {
            is_home_page: false,
            ..self.clone()
        }
    }

    /// Parse a front matter block.
    pub fn from_front_matter(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<RawConfig>(yaml).map(Self::from)
    }

    /// Read the directory's layout config file, if it has one.
    pub fn load_layout(dir: &Path) -> Result<Option<Self>, CompileError> {
        let Some(path) = LAYOUT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        else {
            return Ok(None);
        };

        let parse = |path: &PathBuf| -> anyhow::Result<Self> {
            let content = fs::read_to_string(path)?;
            let raw: RawConfig = if path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_str(&content)?
            } else if content.trim().is_empty() {
                RawConfig::default()
            } else {
                serde_yaml::from_str(&content)?
            };
            Ok(raw.into())
        };

        parse(&path)
            .map(Some)
            .map_err(|source| CompileError::LayoutConfig { path, source })
    }

    /// Layer `overlay` on top of this config.
    ///
    /// Map entries from `overlay` win; styles and scripts are appended.
    pub fn merge(&mut self, overlay: Self) {
        self.opts.extend(overlay.opts);
        self.vars.extend(overlay.vars);
        self.meta.extend(overlay.meta);
        self.styles.extend(overlay.styles);
        self.scripts.extend(overlay.scripts);
        self.blocks.extend(overlay.blocks);
    }

    /// Derive the `page` and `title` metadata slots.
    ///
    /// `page` falls back to the bare title. `title` falls back to the site
    /// title, or gets it appended as `"Title | Site"` when both differ.
    pub fn apply_title_defaults(&mut self) {
        let title = self.meta_value("title").to_owned();
        let site = self.meta_value("sitetitle").to_owned();

        if self.meta_value("page").is_empty() {
            self.meta.insert("page".to_owned(), title.clone());
        }

        if !title.is_empty() && !site.is_empty() && title != site {
            self.meta.insert("title".to_owned(), format!("{title} | {site}"));
        } else if title.is_empty() {
            self.meta.insert("title".to_owned(), site);
        }
    }

    /// Value of a boolean option, `false` when unset.
    pub fn opt(&self, name: &str) -> bool {
        self.opts.get(name).copied().unwrap_or(false)
    }

    fn meta_value(&self, key: &str) -> &str {
        self.meta.get(key).map_or("", String::as_str)
    }
}
