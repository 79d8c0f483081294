//! Source tree compilation.
//!
//! - **blocks**: load a directory's content blocks and front matter
//! - **render**: assemble a page from the templates and its config
//! - **output**: output path policy, page and gzip writes
//! - **walk**: the cascade-carrying traversal
//!
//! ```text
//! src/                        dist/
//! ├── layout.yml              ├── index.html
//! ├── home.md          ──►    ├── about/index.html
//! ├── about/home.md           └── blog/index.html
//! └── blog/home.md
//! ```

pub mod blocks;
pub mod output;
pub mod render;
pub mod walk;

use crate::config::{BuildOptions, CompileError, PageConfig};
use crate::log;
use crate::template::templates;
use crate::utils::category::normalize_path;
use std::{
    ffi::OsString,
    fs,
    path::{Component, Path},
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};
use walk::{ErrorSink, Walker};

/// Compile the tree under `src` into `out`.
///
/// With `scope`, a path relative to `src`, only that directory and its
/// subtree are written; its ancestors still contribute layout and blocks. A
/// scope that doesn't exist writes nothing.
///
/// Only an invalid source root stops the run up front. Every other failure is
/// collected while the remaining pages compile, and returned together.
pub fn compile(
    src: impl AsRef<Path>,
    out: impl AsRef<Path>,
    scope: Option<&Path>,
    options: &BuildOptions,
) -> Result<(), CompileError> {
    let started = Instant::now();
    let src = normalize_path(src.as_ref());
    let out = normalize_path(out.as_ref());

    if !src.is_dir() {
        return Err(CompileError::InvalidSourceRoot(src));
    }

    let errors = ErrorSink::default();
    if let Err(source) = fs::create_dir_all(&out) {
        errors.push(CompileError::FileOpen {
            path: out.clone(),
            source,
        });
    }

    let scope = scope.map(scope_segments).unwrap_or_default();
    let templates = templates(options.minify);
    let written = AtomicUsize::new(0);
    let walker = Walker {
        options,
        templates,
        errors: &errors,
        written: &written,
    };

    rayon::scope(|pool| {
        walker.walk(pool, src, out, PageConfig::root(&templates.body), &scope);
    });

    let written = written.load(Ordering::Relaxed);
    log!("compile"; "{written} page{} in {:.0?}", if written == 1 { "" } else { "s" }, started.elapsed());

    errors.into_result()
}

/// Normal components of a scope path, so `/blog/` and `blog` are the same.
fn scope_segments(scope: &Path) -> Vec<OsString> {
    scope
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_os_string()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Site {
        _dir: TempDir,
        src: PathBuf,
        out: PathBuf,
    }

    impl Site {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("src");
            let out = dir.path().join("dist");
            fs::create_dir_all(&src).unwrap();
            for (path, content) in files {
                let path = src.join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            Self { _dir: dir, src, out }
        }

        fn compile(&self, options: &BuildOptions) -> Result<(), CompileError> {
            compile(&self.src, &self.out, None, options)
        }

        fn read(&self, path: &str) -> String {
            fs::read_to_string(self.out.join(path)).unwrap()
        }

        fn files(&self) -> Vec<String> {
            let mut files: Vec<_> = walkdir::WalkDir::new(&self.out)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    e.path()
                        .strip_prefix(&self.out)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/")
                })
                .collect();
            files.sort();
            files
        }
    }

    fn title(html: &str) -> &str {
        let start = html.find("<title>").unwrap() + "<title>".len();
        let end = html[start..].find("</title>").unwrap() + start;
        &html[start..end]
    }

    #[test]
    fn test_output_tree_mirrors_source_dirs() {
        let site = Site::new(&[
            ("home.md", "# Home"),
            ("about/home.md", "# About"),
            ("blog/2024/home.md", "# Post"),
            ("blog/@partial/home.md", "skipped"),
            ("logo.png", "png"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();

        assert_eq!(
            site.files(),
            ["about/index.html", "blog/2024/index.html", "blog/index.html", "index.html"]
        );
    }

    #[test]
    fn test_child_layout_overrides_title() {
        let site = Site::new(&[
            ("layout.yml", "meta: { sitetitle: Acme }\n"),
            ("about/layout.yml", "meta: { title: About }\n"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();

        assert_eq!(title(&site.read("index.html")), "Acme");
        assert_eq!(title(&site.read("about/index.html")), "About | Acme");
    }

    #[test]
    fn test_token_defaults_without_any_config() {
        let site = Site::new(&[]);
        site.compile(&BuildOptions::debug()).unwrap();

        let html = site.read("index.html");
        assert!(html.contains(r#"<html lang="en">"#));
        assert!(html.contains("<title></title>"));
        assert!(!html.contains('{'));
    }

    #[test]
    fn test_local_override_beats_inherited_block() {
        let site = Site::new(&[
            ("footer.html", "<footer>site</footer>"),
            ("docs/@footer.md", "docs footer"),
            ("docs/api/home.md", "api"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();

        assert!(site.read("index.html").contains("<footer>site</footer>"));
        assert!(site.read("docs/index.html").contains("docs footer"));
        assert!(site.read("docs/api/index.html").contains("<footer>site</footer>"));
    }

    #[test]
    fn test_blocks_cascade_without_leaking_upward() {
        let site = Site::new(&[
            ("home.md", "root home"),
            ("blog/header.html", "<header>blog</header>"),
            ("blog/post/home.md", "post"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();

        assert!(!site.read("index.html").contains("<header>"));
        assert!(site.read("blog/index.html").contains("<header>blog</header>"));
        assert!(site.read("blog/index.html").contains("root home"));
        assert!(site.read("blog/post/index.html").contains("<header>blog</header>"));
        assert!(site.read("blog/post/index.html").contains("post"));
    }

    #[test]
    fn test_front_matter_is_page_local() {
        let site = Site::new(&[
            ("layout.yml", "meta: { sitetitle: Acme }\n"),
            ("blog/home.md", "---\ntitle: Blog\nvars: { x: local }\n---\n{x:none}"),
            ("blog/post/home.md", "{x:none}"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();

        let blog = site.read("blog/index.html");
        assert_eq!(title(&blog), "Blog | Acme");
        assert!(blog.contains("local"));
        let post = site.read("blog/post/index.html");
        assert_eq!(title(&post), "Acme");
        assert!(post.contains("none"));
    }

    #[test]
    fn test_recompile_is_idempotent() {
        let site = Site::new(&[
            ("layout.yml", "meta: { sitetitle: Acme, description: Widgets }\nopts: { gzip: true }\n"),
            ("home.md", "# Welcome"),
            ("blog/home.md", "# Blog"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();
        let first: Vec<_> = site.files().iter().map(|f| fs::read(site.out.join(f)).unwrap()).collect();
        site.compile(&BuildOptions::default()).unwrap();
        let second: Vec<_> = site.files().iter().map(|f| fs::read(site.out.join(f)).unwrap()).collect();

        assert_eq!(first, second);
        assert_eq!(
            site.files(),
            ["blog/index.html", "blog/index.html.gz", "index.html", "index.html.gz"]
        );
    }

    #[test]
    fn test_malformed_front_matter_is_aggregated() {
        let site = Site::new(&[
            ("home.md", "fine"),
            ("a/home.md", "---\nvars: [oops\n---\nbody a"),
            ("b/home.md", "---\nmeta: nope\n---\nbody b"),
        ]);

        let err = site.compile(&BuildOptions::default()).unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, CompileError::FrontMatter { .. })));
        assert!(site.read("index.html").contains("fine"));
        assert!(site.read("a/index.html").contains("body a"));
        assert!(site.read("b/index.html").contains("body b"));
    }

    #[test]
    fn test_malformed_layout_uses_inherited_config() {
        let site = Site::new(&[
            ("layout.yml", "meta: { sitetitle: Acme }\n"),
            ("bad/layout.yml", "vars: [oops\n"),
        ]);

        let err = site.compile(&BuildOptions::default()).unwrap_err();

        assert!(matches!(err.errors().as_slice(), [CompileError::LayoutConfig { .. }]));
        assert_eq!(title(&site.read("bad/index.html")), "Acme");
    }

    #[test]
    fn test_invalid_source_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "").unwrap();

        for src in [dir.path().join("missing"), file] {
            let err = compile(&src, dir.path().join("dist"), None, &BuildOptions::default()).unwrap_err();
            assert!(matches!(err, CompileError::InvalidSourceRoot(_)));
        }
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_acme_site() {
        let site = Site::new(&[
            (
                "layout.yml",
                "vars: { brand: Acme }\n\
                 meta: { sitetitle: Acme Inc, description: Widgets }\n\
                 styles: [{ url: /main.css }]\n",
            ),
            ("header.html", "<header>{brand}</header>"),
            ("home.md", "---\ntitle: Welcome\n---\n# Hello from {brand}\n"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();
        let html = site.read("index.html");

        assert_eq!(title(&html), "Welcome | Acme Inc");
        assert!(html.contains(r#"<meta name="description" content="Widgets"/>"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="/main.css"/>"#));
        assert!(html.contains("<header>Acme</header>"));
        assert!(html.contains("Hello from Acme</h1>"));
        assert!(!html.contains("{@"));
    }

    #[test]
    fn test_markdown_url_tokens_resolve() {
        let site = Site::new(&[
            ("layout.yml", "vars: { base: /v2, lang: en us }\n"),
            ("home.md", "[docs]({base}/docs) ![img]({base}/a.png)\n\n<a href=\"/{lang}/x\">l</a>\n"),
        ]);

        site.compile(&BuildOptions::default()).unwrap();
        let html = site.read("index.html");

        assert!(html.contains(r#"href="/v2/docs""#));
        assert!(html.contains(r#"src="/v2/a.png""#));
        assert!(html.contains(r#"href="/en us/x""#));
        assert!(!html.contains("%7B"));
    }

    #[test]
    fn test_flattened_output() {
        let site = Site::new(&[
            ("about/home.md", "about"),
            ("blog/post/home.md", "post"),
        ]);

        site.compile(&BuildOptions {
            flatten: true,
            ..BuildOptions::default()
        })
        .unwrap();

        assert_eq!(
            site.files(),
            ["about.html", "blog/index.html", "blog/post.html", "index.html"]
        );
    }

    #[test]
    fn test_gziponly_leaves_only_compressed_pages() {
        let site = Site::new(&[("layout.yml", "opts: { gziponly: true }\n"), ("a/home.md", "a")]);

        site.compile(&BuildOptions::default()).unwrap();
        assert_eq!(site.files(), ["a/index.html.gz", "index.html.gz"]);

        site.compile(&BuildOptions::debug()).unwrap();
        assert!(site.out.join("index.html").exists());
    }

    #[test]
    fn test_scoped_compile_writes_only_subtree() {
        let site = Site::new(&[
            ("layout.yml", "meta: { sitetitle: Acme }\n"),
            ("header.html", "<header>root</header>"),
            ("blog/layout.yml", "vars: { section: Blog }\n"),
            ("blog/post/home.md", "{section}"),
            ("about/home.md", "about"),
        ]);

        compile(&site.src, &site.out, Some(Path::new("/blog/post/")), &BuildOptions::default()).unwrap();

        assert_eq!(site.files(), ["blog/post/index.html"]);
        let post = site.read("blog/post/index.html");
        assert_eq!(title(&post), "Acme");
        assert!(post.contains("<header>root</header>"));
        assert!(post.contains("Blog"));

        compile(&site.src, &site.out, Some(Path::new("blog")), &BuildOptions::default()).unwrap();
        assert_eq!(site.files(), ["blog/index.html", "blog/post/index.html"]);
    }

    #[test]
    fn test_scoped_compile_of_missing_dir_is_noop() {
        let site = Site::new(&[("home.md", "x")]);

        compile(&site.src, &site.out, Some(Path::new("nope")), &BuildOptions::default()).unwrap();

        assert!(site.files().is_empty());
    }

    #[test]
    fn test_scope_segments() {
        assert_eq!(scope_segments(Path::new("/blog/post/")), ["blog", "post"]);
        assert_eq!(scope_segments(Path::new("./blog")), ["blog"]);
        assert!(scope_segments(Path::new("")).is_empty());
    }
}
