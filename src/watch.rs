//! File system watcher for live rebuilds.
//!
//! Every source directory is watched on its own (non-recursively), so new
//! directories are picked up as they appear and removed ones are dropped.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  Message   ┌──────────────────────── worker thread ────────┐
//! │ notify   │──────────▶│  classify() ──▶ Session ──▶ compile(scope)    │
//! │ watcher  │            │                  │                            │
//! └──────────┘            │     watch / unwatch directives ──▶ watcher    │
//!       ▲                 └───────────────────────────────────────────────┘
//!       └── LiveHandle::stop() sends Message::Stop and joins
//! ```
//!
//! | Change                         | Rebuild                               |
//! |--------------------------------|---------------------------------------|
//! | file in `src/`                 | whole site                            |
//! | file in `src/blog/`            | `blog/` and its subtree               |
//! | new directory `src/blog/2024/` | `blog/2024/` and its subtree          |
//! | removed `*.md`, `layout.yml`.. | owning directory                      |
//! | other removed path             | mirrored output path is deleted       |

use crate::{
    compiler::{compile, output::gzip_path},
    config::{BuildOptions, CompileError},
    log,
    utils::category::{
        WatchScope, dir_scope, file_scope, has_content_ext, is_temp_file, mirror_path,
        normalize_path,
    },
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::ModifyKind,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use walkdir::WalkDir;

// =============================================================================
// Constants
// =============================================================================

/// Events closer than this to the last handled one are dropped.
const DEBOUNCE_MS: u64 = 10;

// =============================================================================
// Debounce State
// =============================================================================

/// Drops events that follow the last accepted one too closely.
///
/// Dropped events are not replayed.
#[derive(Debug)]
struct Debouncer {
    threshold: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_accepted: None,
        }
    }

    fn accept(&mut self) -> bool {
        self.accept_at(Instant::now())
    }

    fn accept_at(&mut self, now: Instant) -> bool {
        if self
            .last_accepted
            .is_some_and(|last| now.saturating_duration_since(last) < self.threshold)
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

// =============================================================================
// Session
// =============================================================================

/// Receives every compile error of a live session.
pub type ErrorHandler = Box<dyn Fn(CompileError) + Send>;

/// Maps source tree changes to scoped recompiles.
pub struct Session {
    src: PathBuf,
    out: PathBuf,
    options: BuildOptions,
    debouncer: Debouncer,
    on_error: ErrorHandler,
}

impl Session {
    pub fn new(
        src: &Path,
        out: &Path,
        options: BuildOptions,
        on_error: impl Fn(CompileError) + Send + 'static,
    ) -> Self {
        Self {
            src: normalize_path(src),
            out: normalize_path(out),
            options,
            debouncer: Debouncer::new(Duration::from_millis(DEBOUNCE_MS)),
            on_error: Box::new(on_error),
        }
    }

    /// Compile `scope`, handing any error to the error handler.
    pub fn compile(&self, scope: &WatchScope) {
        if let Err(err) = compile(&self.src, &self.out, scope.as_page_scope(), &self.options) {
            (self.on_error)(err);
        }
    }

    /// A file was created or modified: recompile its directory.
    pub fn on_file_change(&mut self, path: &Path) {
        if !self.debouncer.accept() {
            return;
        }
        if let Some(scope) = file_scope(path, &self.src) {
            log!("watch"; "{} changed", self.rel(path));
            self.compile(&scope);
        }
    }

    /// A directory appeared: compile it. Returns whether to watch it.
    pub fn on_dir_add(&mut self, path: &Path) -> bool {
        if !self.debouncer.accept() {
            return false;
        }
        let Some(scope) = dir_scope(path, &self.src) else {
            return false;
        };
        log!("watch"; "{}/ added", self.rel(path));
        self.compile(&scope);
        true
    }

    /// A path disappeared. Returns whether to stop watching it.
    ///
    /// Content and layout files recompile their directory. Anything else is
    /// taken to be a directory and its output is deleted.
    pub fn on_remove(&mut self, path: &Path) -> bool {
        if !self.debouncer.accept() {
            return false;
        }
        log!("watch"; "{} removed", self.rel(path));

        if has_content_ext(path) {
            if let Some(scope) = file_scope(path, &self.src) {
                self.compile(&scope);
            }
        } else if let Some(mirror) = mirror_path(path, &self.src, &self.out) {
            if let Err(err) = remove_output(&mirror) {
                (self.on_error)(err);
            }
        }
        true
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.src).unwrap_or(path).display().to_string()
    }
}

/// Delete the output mirroring a removed source path, including a flattened
/// `<path>.html` page and its `.gz` sibling.
fn remove_output(mirror: &Path) -> Result<(), CompileError> {
    let mut flattened = mirror.as_os_str().to_owned();
    flattened.push(".html");
    let flattened = PathBuf::from(flattened);
    let gz = gzip_path(&flattened);

    let result = if mirror.is_dir() {
        fs::remove_dir_all(mirror)
    } else {
        fs::remove_file(mirror)
    };

    for (path, result) in [
        (mirror, result),
        (flattened.as_path(), fs::remove_file(&flattened)),
        (gz.as_path(), fs::remove_file(&gz)),
    ] {
        match result {
            Err(source) if source.kind() != io::ErrorKind::NotFound => {
                return Err(CompileError::FileOpen {
                    path: path.to_path_buf(),
                    source,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// Event Mapping
// =============================================================================

/// A source tree change, as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    File(PathBuf),
    DirAdd(PathBuf),
    Remove(PathBuf),
}

/// Turn a notify event into session changes.
///
/// Renames are resolved by whether the path still exists: the new name acts
/// like a create, the old name like a remove.
fn classify(event: &Event) -> Vec<Change> {
    let created = |path: &PathBuf| {
        if path.is_dir() {
            Change::DirAdd(path.clone())
        } else {
            Change::File(path.clone())
        }
    };

    let paths = event.paths.iter().filter(|path| !is_temp_file(path));

    match event.kind {
        EventKind::Create(_) => paths.map(created).collect(),
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| {
                if path.exists() {
                    created(path)
                } else {
                    Change::Remove(path.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths
            .filter(|path| !path.is_dir())
            .map(|path| Change::File(path.clone()))
            .collect(),
        EventKind::Remove(_) => paths.map(|path| Change::Remove(path.clone())).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Watch `root` and every directory below it, skipping hidden ones.
fn watch_tree(watcher: &mut impl Watcher, root: &Path) -> Result<()> {
    let dirs = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir());

    for dir in dirs {
        watcher
            .watch(dir.path(), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.path().display()))?;
    }
    Ok(())
}

fn apply(session: &mut Session, watcher: &mut impl Watcher, change: Change) {
    match change {
        Change::File(path) => session.on_file_change(&path),
        Change::DirAdd(path) => {
            if session.on_dir_add(&path)
                && let Err(err) = watch_tree(watcher, &path)
            {
                log!("watch"; "{err:#}");
            }
        }
        Change::Remove(path) => {
            if session.on_remove(&path) {
                // inotify drops watches of deleted directories on its own
                let _ = watcher.unwatch(&path);
            }
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

enum Message {
    Event(notify::Result<Event>),
    Stop,
}

/// A running live session. Stops when dropped.
pub struct LiveHandle {
    sender: Sender<Message>,
    worker: Option<JoinHandle<()>>,
}

impl LiveHandle {
    /// End the session and wait for the worker to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.sender.send(Message::Stop);
            let _ = worker.join();
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Compile the whole site, then keep recompiling whatever changes.
pub fn start_live(
    src: impl AsRef<Path>,
    out: impl AsRef<Path>,
    options: BuildOptions,
    on_error: impl Fn(CompileError) + Send + 'static,
) -> Result<LiveHandle> {
    let session = Session::new(src.as_ref(), out.as_ref(), options, on_error);
    if !session.src.is_dir() {
        return Err(CompileError::InvalidSourceRoot(session.src).into());
    }
    session.compile(&WatchScope::Full);

    let (sender, receiver) = mpsc::channel();
    let events = sender.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = events.send(Message::Event(res));
    })
    .context("Failed to create file watcher")?;
    watch_tree(&mut watcher, &session.src)?;
    log!("watch"; "watching {}", session.src.display());

    let worker = thread::Builder::new()
        .name("watch".into())
        .spawn(move || run(session, watcher, receiver))
        .context("Failed to spawn watch thread")?;

    Ok(LiveHandle {
        sender,
        worker: Some(worker),
    })
}

fn run(mut session: Session, mut watcher: impl Watcher, receiver: Receiver<Message>) {
    for message in receiver {
        match message {
            Message::Stop => break,
            Message::Event(Ok(event)) => {
                for change in classify(&event) {
                    apply(&mut session, &mut watcher, change);
                }
            }
            Message::Event(Err(err)) => log!("watch"; "error: {err}"),
        }
    }
}
