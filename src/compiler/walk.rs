//! Source tree traversal.
//!
//! The walk runs synchronously on the scope thread: it loads each
//! directory, settles the page config snapshot, and spawns the page write
//! onto the rayon pool before descending. The enclosing `rayon::scope` is the
//! completion barrier for every spawned write.
//!
//! ```text
//! walk(root, inherited = root config)
//!   ├── merge layout.yml        ─┐
//!   ├── load blocks             ─┴─► inherited ──► children
//!   ├── page = inherited + front matter + title defaults
//!   └── spawn(render + write page)
//! ```

use super::{blocks, output, render};
use crate::config::{BuildOptions, CompileError, PageConfig};
use crate::template::Templates;
use std::{
    ffi::OsString,
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

// ============================================================================
// Error Sink
// ============================================================================

/// Errors collected across the walk and its spawned writes.
#[derive(Debug, Default)]
pub struct ErrorSink(Mutex<Vec<CompileError>>);

impl ErrorSink {
    pub fn push(&self, error: CompileError) {
        self.extend([error]);
    }

    pub fn extend(&self, errors: impl IntoIterator<Item = CompileError>) {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.extend(errors);
    }

    /// `Ok` if nothing was collected, otherwise every error as one aggregate.
    pub fn into_result(self) -> Result<(), CompileError> {
        let errors = match self.0.into_inner() {
            Ok(errors) => errors,
            Err(poisoned) => poisoned.into_inner(),
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Aggregate(errors))
        }
    }
}

// ============================================================================
// Walker
// ============================================================================

/// Shared, read-only state of one compile run.
pub struct Walker<'a> {
    pub options: &'a BuildOptions,
    pub templates: &'static Templates,
    pub errors: &'a ErrorSink,
    pub written: &'a AtomicUsize,
}

impl<'a> Walker<'a> {
    /// Visit `src` with the config snapshot it inherits.
    ///
    /// `scope` holds the remaining path segments down to the directory whose
    /// subtree gets written. Directories along the way are loaded for their
    /// layout and blocks but produce no page.
    pub fn walk<'s>(
        &'s self,
        pool: &rayon::Scope<'s>,
        src: PathBuf,
        out: PathBuf,
        mut inherited: PageConfig,
        scope: &[OsString],
    ) {
        match PageConfig::load_layout(&src) {
            Ok(Some(layout)) => inherited.merge(layout),
            Ok(None) => {}
            Err(err) => self.errors.push(err),
        }

        let (next, rest) = match scope.split_first() {
            Some((next, rest)) => (Some(next.as_os_str()), rest),
            None => (None, scope),
        };

        let contents = blocks::load_dir(&src, next, self.options.minify);
        self.errors.extend(contents.errors);
        inherited.blocks.extend(contents.blocks);

        if next.is_none() {
            let mut page = inherited.clone();
            page.merge(contents.front_matter);
            page.apply_title_defaults();

            let target = output::page_path(
                &out,
                page.is_home_page,
                !contents.subdirs.is_empty(),
                self.options.flatten,
            );
            let src = src.clone();

            pool.spawn(move |_| {
                let html = render::render_page(&src, &page, self.templates, self.options);
                match output::write_page(&target, &html, &page, self.options) {
                    Ok(()) => {
                        self.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => self.errors.push(err),
                }
            });
        }

        for dir in contents.subdirs {
            self.walk(pool, src.join(&dir), out.join(&dir), inherited.child(), rest);
        }
    }
}
