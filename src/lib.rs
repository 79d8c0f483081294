//! staticweb: a static site compiler.
//!
//! Every directory of a content tree becomes one HTML page. Configuration
//! (`layout.yml`) and named content blocks (`*.md`, `*.html`) cascade from a
//! directory to all of its descendants, and front matter adds page-local
//! settings on top.
//!
//! ```no_run
//! use staticweb::{BuildOptions, compile};
//!
//! compile("site/src", "site/dist", None, &BuildOptions::default())?;
//! # Ok::<(), staticweb::CompileError>(())
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod serve;
pub mod template;
pub mod utils;
pub mod watch;

pub use compiler::compile;
pub use config::{BuildOptions, CompileError, PageConfig};
pub use watch::{LiveHandle, start_live};
