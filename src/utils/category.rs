//! Path classification for watch mode.
//!
//! Maps a filesystem event path back to the compilation scope it affects.
//!
//! | Event path                    | Scope                           |
//! |-------------------------------|---------------------------------|
//! | `src/index.md`                | [`WatchScope::Full`]            |
//! | `src/blog/post.md`            | [`WatchScope::Dir`] `blog`      |
//! | `src/blog/2024/` (new dir)    | [`WatchScope::Dir`] `blog/2024` |
//! | outside `src`                 | none                            |

use std::{
    env,
    path::{Path, PathBuf},
};

/// Extensions whose removal changes a page rather than a mirrored asset.
const CONTENT_EXTENSIONS: &[&str] = &["html", "md", "yml", "yaml", "json", "cson"];

/// Portion of the source tree a change needs recompiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchScope {
    /// Recompile from the source root.
    Full,
    /// Recompile the subtree rooted at this path, relative to the source root.
    Dir(PathBuf),
}

impl WatchScope {
    fn from_relative(rel: &Path) -> Self {
        if rel.as_os_str().is_empty() {
            Self::Full
        } else {
            Self::Dir(rel.to_path_buf())
        }
    }

    /// The relative path handed to the compiler as its page scope.
    pub fn as_page_scope(&self) -> Option<&Path> {
        match self {
            Self::Full => None,
            Self::Dir(rel) => Some(rel),
        }
    }
}

/// Scope owning a changed file: the file's parent directory.
pub fn file_scope(path: &Path, src: &Path) -> Option<WatchScope> {
    let rel = path.strip_prefix(src).ok()?;
    Some(WatchScope::from_relative(rel.parent().unwrap_or(Path::new(""))))
}

/// Scope of a directory: the directory itself.
pub fn dir_scope(path: &Path, src: &Path) -> Option<WatchScope> {
    let rel = path.strip_prefix(src).ok()?;
    Some(WatchScope::from_relative(rel))
}

/// Output path mirroring a source path, if the source path is inside `src`.
pub fn mirror_path(path: &Path, src: &Path, out: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(src).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(out.join(rel))
}

/// Page sources and layout configuration files.
pub fn has_content_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext))
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Normalize a path to absolute form for reliable comparison.
///
/// Does not touch the filesystem, so it also works for paths that were just
/// removed.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_scope_root() {
        let src = Path::new("/site/src");
        assert_eq!(
            file_scope(Path::new("/site/src/index.md"), src),
            Some(WatchScope::Full)
        );
    }

    #[test]
    fn test_file_scope_nested() {
        let src = Path::new("/site/src");
        assert_eq!(
            file_scope(Path::new("/site/src/blog/2024/post.md"), src),
            Some(WatchScope::Dir(PathBuf::from("blog/2024")))
        );
    }

    #[test]
    fn test_file_scope_outside_source() {
        let src = Path::new("/site/src");
        assert_eq!(file_scope(Path::new("/site/dist/index.html"), src), None);
    }

    #[test]
    fn test_dir_scope() {
        let src = Path::new("/site/src");
        assert_eq!(
            dir_scope(Path::new("/site/src/docs"), src),
            Some(WatchScope::Dir(PathBuf::from("docs")))
        );
        assert_eq!(dir_scope(src, src), Some(WatchScope::Full));
    }

    #[test]
    fn test_page_scope() {
        assert_eq!(WatchScope::Full.as_page_scope(), None);
        assert_eq!(
            WatchScope::Dir(PathBuf::from("a/b")).as_page_scope(),
            Some(Path::new("a/b"))
        );
    }

    #[test]
    fn test_mirror_path() {
        let src = Path::new("/site/src");
        let out = Path::new("/site/dist");
        assert_eq!(
            mirror_path(Path::new("/site/src/img/logo.png"), src, out),
            Some(PathBuf::from("/site/dist/img/logo.png"))
        );
        assert_eq!(mirror_path(src, src, out), None);
        assert_eq!(mirror_path(Path::new("/other/x"), src, out), None);
    }

    #[test]
    fn test_has_content_ext() {
        for name in ["a.html", "a.md", "layout.yml", "layout.yaml", "layout.json", "x.cson"] {
            assert!(has_content_ext(Path::new(name)), "{name}");
        }
        assert!(!has_content_ext(Path::new("logo.png")));
        assert!(!has_content_ext(Path::new("docs")));
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("/src/index.md~")));
        assert!(is_temp_file(Path::new("/src/.index.md.swp")));
        assert!(is_temp_file(Path::new("/src/4913.tmp")));
        assert!(!is_temp_file(Path::new("/src/index.md")));
    }
}
