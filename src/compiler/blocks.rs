//! Content blocks of a source directory.
//!
//! A directory is enumerated once. Subdirectories are returned for descent;
//! every `.html`/`.md` file not starting with `@` becomes a named block:
//!
//! ```text
//! src/blog/
//! ├── home.md        → blocks["home"]   (front matter → page config)
//! ├── sidebar.html   → blocks["sidebar"]
//! ├── @footer.md       local override, read at render time
//! └── 2024/          → subdirectory
//! ```

use crate::config::{CompileError, PageConfig};
use crate::utils::{markdown, minify::minify_html};
use regex::Regex;
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs,
    path::Path,
    sync::LazyLock,
};

/// A leading `---` fenced block, captured without its fences.
static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---+[ \t]*\r?\n(.*?)\r?\n---+[ \t]*(?:\r?\n|\z)").expect("valid regex")
});

/// Everything found in one source directory.
#[derive(Debug, Default)]
pub struct DirContents {
    /// Subdirectory names, sorted.
    pub subdirs: Vec<String>,
    /// Rendered, minified blocks keyed by file basename.
    pub blocks: BTreeMap<String, Vec<u8>>,
    /// Front matter of all content files, merged in file name order.
    pub front_matter: PageConfig,
    /// Front matter that failed to parse.
    pub errors: Vec<CompileError>,
}

/// Split a leading front matter block from the content that follows it.
pub fn split_front_matter(input: &str) -> (Option<&str>, &str) {
    match FRONT_MATTER.captures(input) {
        Some(caps) => {
            let (Some(whole), Some(yaml)) = (caps.get(0), caps.get(1)) else {
                return (None, input);
            };
            (Some(yaml.as_str()), &input[whole.end()..])
        }
        None => (None, input),
    }
}

/// Enumerate `dir` and load its content blocks.
///
/// With `only_subdir`, the only subdirectory returned is the one with that
/// name. A directory that can't be read yields no content.
pub fn load_dir(dir: &Path, only_subdir: Option<&OsStr>, minify: bool) -> DirContents {
    let mut contents = DirContents::default();

    let Ok(entries) = fs::read_dir(dir) else {
        return contents;
    };
    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let os_name = entry.file_name();
        let Some(name) = os_name.to_str() else {
            continue;
        };
        if name.starts_with('.') || name.starts_with('@') {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            if only_subdir.is_none_or(|only| only == os_name.as_os_str()) {
                contents.subdirs.push(name.to_owned());
            }
        } else if let Some((stem, is_markdown)) = block_name(name) {
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            let source = String::from_utf8_lossy(&bytes);
            let (yaml, body) = split_front_matter(&source);

            if let Some(yaml) = yaml {
                match PageConfig::from_front_matter(yaml) {
                    Ok(config) => contents.front_matter.merge(config),
                    Err(source) => contents.errors.push(CompileError::FrontMatter {
                        path: path.clone(),
                        source,
                    }),
                }
            }

            let html = if is_markdown {
                markdown::to_html(body).into_bytes()
            } else {
                body.as_bytes().to_vec()
            };
            contents
                .blocks
                .insert(stem.to_owned(), minify_html(&html, minify).into_owned());
        }
    }

    contents
}

/// Read a local `@name.html` (or `@name.md`) override from `dir`.
pub fn load_override(dir: &Path, name: &str, minify: bool) -> Option<Vec<u8>> {
    let html = match fs::read(dir.join(format!("@{name}.html"))) {
        Ok(html) => html,
        Err(_) => markdown::bytes_to_html(&fs::read(dir.join(format!("@{name}.md"))).ok()?),
    };
    Some(minify_html(&html, minify).into_owned())
}

/// Block name and markdown flag for a content file name.
fn block_name(file_name: &str) -> Option<(&str, bool)> {
    if let Some(stem) = file_name.strip_suffix(".md") {
        Some((stem, true))
    } else {
        file_name.strip_suffix(".html").map(|stem| (stem, false))
    }
    .filter(|(stem, _)| !stem.is_empty())
}
