//! Built-in page templates.
//!
//! - **layout**: the page skeleton. `{@head}` marks where head elements
//!   accumulate, `{@body}` where the body template goes.
//! - **body**: the default `layout` block, inherited by every directory that
//!   doesn't provide its own `layout.html`/`layout.md`.
//!
//! Both are embedded in the binary and prepared once per process, in a
//! minified and a verbatim flavour.

use crate::utils::minify::minify_html;
use std::sync::OnceLock;

const LAYOUT_TEMPLATE: &[u8] = include_bytes!("embed/templates/layout.html");
const BODY_TEMPLATE: &[u8] = include_bytes!("embed/templates/body.html");

static MINIFIED: OnceLock<Templates> = OnceLock::new();
static VERBATIM: OnceLock<Templates> = OnceLock::new();

/// The two immutable templates every page is assembled from.
#[derive(Debug)]
pub struct Templates {
    pub layout: Vec<u8>,
    pub body: Vec<u8>,
}

impl Templates {
    fn prepare(minify: bool) -> Self {
        Self {
            layout: minify_html(LAYOUT_TEMPLATE, minify).into_owned(),
            body: minify_html(BODY_TEMPLATE, minify).into_owned(),
        }
    }
}

/// Process-wide templates for the given minify setting.
pub fn templates(minify: bool) -> &'static Templates {
    let cell = if minify { &MINIFIED } else { &VERBATIM };
    cell.get_or_init(|| Templates::prepare(minify))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_layout_has_markers() {
        for minify in [true, false] {
            let t = templates(minify);
            assert!(contains(&t.layout, "{@head}"));
            assert!(contains(&t.layout, "{@body}"));
            assert!(contains(&t.layout, "{title}"));
            assert!(contains(&t.body, "{@home}"));
        }
    }

    #[test]
    fn test_verbatim_templates_unchanged() {
        let t = templates(false);
        assert_eq!(t.layout, LAYOUT_TEMPLATE);
        assert_eq!(t.body, BODY_TEMPLATE);
    }

    #[test]
    fn test_minified_templates_are_smaller() {
        assert!(templates(true).layout.len() < LAYOUT_TEMPLATE.len());
        assert!(std::ptr::eq(templates(true), templates(true)));
    }
}
