//! Output paths and page writes.
//!
//! | Source dir             | default                    | flattened              |
//! |------------------------|----------------------------|------------------------|
//! | root                   | `out/index.html`           | `out/index.html`       |
//! | `blog/` (has children) | `out/blog/index.html`      | `out/blog/index.html`  |
//! | `blog/post/` (leaf)    | `out/blog/post/index.html` | `out/blog/post.html`   |

use crate::config::{BuildOptions, CompileError, PageConfig};
use flate2::{Compression, GzBuilder};
use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Compression level of `.gz` siblings.
const GZIP_LEVEL: u32 = 6;

/// Where the page mirroring `out_dir` is written.
pub fn page_path(out_dir: &Path, is_root: bool, has_children: bool, flatten: bool) -> PathBuf {
    if flatten && !is_root && !has_children {
        let mut file = out_dir.as_os_str().to_owned();
        file.push(".html");
        PathBuf::from(file)
    } else {
        out_dir.join("index.html")
    }
}

/// `<path>.gz`.
pub fn gzip_path(path: &Path) -> PathBuf {
    let mut gz: OsString = path.as_os_str().to_owned();
    gz.push(".gz");
    PathBuf::from(gz)
}

/// Write a rendered page, plus its gzip sibling when the page asks for one.
///
/// Compression only happens with minification on; `gziponly` leaves just the
/// `.gz` file behind.
pub fn write_page(
    path: &Path,
    html: &[u8],
    page: &PageConfig,
    options: &BuildOptions,
) -> Result<(), CompileError> {
    let file_error = |source: io::Error| CompileError::FileOpen {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(file_error)?;
    }

    let gzip_only = page.opt("gziponly");
    let compress = options.minify && (gzip_only || page.opt("gzip"));

    if !(compress && gzip_only) {
        fs::write(path, html).map_err(file_error)?;
    }

    if compress {
        let gz = gzip_path(path);
        write_gzip(&gz, html).map_err(|source| CompileError::Compression { path: gz, source })?;

        if gzip_only {
            match fs::remove_file(path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(file_error(err)),
                _ => {}
            }
        }
    }

    Ok(())
}

fn write_gzip(path: &Path, data: &[u8]) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(file, Compression::new(GZIP_LEVEL));
    encoder.write_all(data)?;
    encoder.finish()?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn gunzip(path: &Path) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(fs::File::open(path).unwrap())
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_page_path_policy() {
        let out = Path::new("/dist/blog");
        assert_eq!(page_path(out, false, false, false), Path::new("/dist/blog/index.html"));
        assert_eq!(page_path(out, false, false, true), Path::new("/dist/blog.html"));
        assert_eq!(page_path(out, false, true, true), Path::new("/dist/blog/index.html"));
        assert_eq!(page_path(Path::new("/dist"), true, false, true), Path::new("/dist/index.html"));
    }

    #[test]
    fn test_write_page_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/index.html");

        write_page(&path, b"<p>x</p>", &PageConfig::default(), &BuildOptions::default()).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"<p>x</p>");
        assert!(!gzip_path(&path).exists());
    }

    #[test]
    fn test_gzip_sibling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        let page = PageConfig::from_front_matter("opts: { gzip: true }").unwrap();

        write_page(&path, b"<p>zipped</p>", &page, &BuildOptions::default()).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"<p>zipped</p>");
        assert_eq!(gunzip(&gzip_path(&path)), b"<p>zipped</p>");
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        let page = PageConfig::from_front_matter("opts: { gzip: true }").unwrap();

        write_page(&path, b"same", &page, &BuildOptions::default()).unwrap();
        let first = fs::read(gzip_path(&path)).unwrap();
        write_page(&path, b"same", &page, &BuildOptions::default()).unwrap();

        assert_eq!(first, fs::read(gzip_path(&path)).unwrap());
        assert_eq!(&first[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_gziponly_removes_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "stale").unwrap();
        let page = PageConfig::from_front_matter("opts: { gziponly: true }").unwrap();

        write_page(&path, b"<p>only</p>", &page, &BuildOptions::default()).unwrap();

        assert!(!path.exists());
        assert_eq!(gunzip(&gzip_path(&path)), b"<p>only</p>");
    }

    #[test]
    fn test_no_gzip_in_debug_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        let page = PageConfig::from_front_matter("opts: { gzip: true, gziponly: true }").unwrap();

        write_page(&path, b"<p>debug</p>", &page, &BuildOptions::debug()).unwrap();

        assert!(path.exists());
        assert!(!gzip_path(&path).exists());
    }
}
