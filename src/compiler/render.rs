//! Page assembly.
//!
//! A page is built in memory from the layout template by ordered passes:
//!
//! 1. `{name}` / `{name:default}` tokens: vars, then meta, then the default
//! 2. `<meta>` tags for meta keys no token consumed
//! 3. stylesheets, then scripts
//! 4. the first `{@body}` becomes the `layout` block
//! 5. `{@name}` tokens: local `@name` override file, then inherited block
//! 6. `{name}` tokens again, for tokens the blocks brought in
//!
//! Head elements accumulate in order in front of the `{@head}` marker, which
//! pass 5 then resolves like any other block token.

use super::blocks;
use crate::config::{BuildOptions, LAYOUT_BLOCK, PageConfig, RESERVED_META};
use crate::template::Templates;
use crate::utils::escape_attr;
use regex::bytes::{Captures, Regex};
use std::{collections::BTreeSet, path::Path, sync::LazyLock};

/// `{name}` or `{name:default text}`.
static VAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9]+)(:[^}\n]*|)\}").expect("valid regex"));

/// `{@name}` with an optional trailing line break.
static BLOCK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{@([A-Za-z0-9]+)\}\r?\n?").expect("valid regex"));

const HEAD_MARKER: &[u8] = b"{@head}";
const BODY_MARKER: &[u8] = b"{@body}";

/// Render the page of `src_dir` with its effective configuration.
pub fn render_page(
    src_dir: &Path,
    page: &PageConfig,
    templates: &Templates,
    options: &BuildOptions,
) -> Vec<u8> {
    let mut used: BTreeSet<String> = RESERVED_META.iter().map(|&key| key.to_owned()).collect();
    let html = substitute_vars(&templates.layout, page, Some(&mut used));

    let mut head = String::new();
    for element in head_elements(page, &used) {
        head.push_str(&element);
        if !options.minify {
            head.push('\n');
        }
    }
    let html = insert_before(html, HEAD_MARKER, head.as_bytes());

    let layout = page.blocks.get(LAYOUT_BLOCK).map_or(&[][..], Vec::as_slice);
    let html = replace_first(html, BODY_MARKER, layout);

    let html = substitute_blocks(&html, src_dir, page, options.minify);
    substitute_vars(&html, page, None)
}

// ============================================================================
// Token Passes
// ============================================================================

/// Resolve `{name}` tokens, recording meta keys consumed into `used`.
fn substitute_vars(html: &[u8], page: &PageConfig, mut used: Option<&mut BTreeSet<String>>) -> Vec<u8> {
    VAR_TOKEN
        .replace_all(html, |caps: &Captures| -> Vec<u8> {
            let name = String::from_utf8_lossy(&caps[1]);
            if let Some(value) = page.vars.get(&*name) {
                return value.as_bytes().to_vec();
            }
            if let Some(value) = page.meta.get(&*name) {
                if let Some(used) = used.as_deref_mut() {
                    used.insert(name.into_owned());
                }
                return value.as_bytes().to_vec();
            }
            caps[2].get(1..).unwrap_or_default().to_vec()
        })
        .into_owned()
}

/// Resolve `{@name}` tokens against override files and inherited blocks.
fn substitute_blocks(html: &[u8], src_dir: &Path, page: &PageConfig, minify: bool) -> Vec<u8> {
    BLOCK_TOKEN
        .replace_all(html, |caps: &Captures| -> Vec<u8> {
            let name = String::from_utf8_lossy(&caps[1]);
            blocks::load_override(src_dir, &name, minify)
                .or_else(|| page.blocks.get(&*name).cloned())
                .unwrap_or_default()
        })
        .into_owned()
}

// ============================================================================
// Head Elements
// ============================================================================

/// `<meta>`, `<link>` and `<script>` tags, in emission order.
fn head_elements(page: &PageConfig, used: &BTreeSet<String>) -> Vec<String> {
    let meta = page
        .meta
        .iter()
        .filter(|(key, _)| !used.contains(key.as_str()))
        .map(|(key, value)| {
            format!(
                r#"<meta name="{}" content="{}"/>"#,
                escape_attr(key),
                escape_attr(value)
            )
        });

    let styles = page.styles.iter().map(|style| {
        let media = if style.lazy {
            r#" media="print" onload="this.media='all'""#
        } else if style.print {
            r#" media="print""#
        } else {
            ""
        };
        format!(r#"<link rel="stylesheet" href="{}"{media}/>"#, escape_attr(&style.url))
    });

    let scripts = page.scripts.iter().map(|script| {
        let mut tag = format!(r#"<script src="{}""#, escape_attr(&script.url));
        if script.module {
            tag.push_str(r#" type="module""#);
        } else if let Some(kind) = script.wasm.as_deref().filter(|kind| !kind.is_empty()) {
            tag.push_str(&format!(r#" type="wasm/{}""#, escape_attr(kind)));
        }
        if script.defer {
            tag.push_str(" defer");
        }
        if script.is_async {
            tag.push_str(" async");
        }
        tag.push_str("></script>");
        tag
    });

    meta.chain(styles).chain(scripts).collect()
}

// ============================================================================
// Byte Helpers
// ============================================================================

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Insert `content` in front of the first `marker`, keeping the marker.
fn insert_before(mut html: Vec<u8>, marker: &[u8], content: &[u8]) -> Vec<u8> {
    if let Some(at) = find(&html, marker) {
        html.splice(at..at, content.iter().copied());
    }
    html
}

/// Replace the first `marker` with `content`.
fn replace_first(mut html: Vec<u8>, marker: &[u8], content: &[u8]) -> Vec<u8> {
    if let Some(at) = find(&html, marker) {
        html.splice(at..at + marker.len(), content.iter().copied());
    }
    html
}
