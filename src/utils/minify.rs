//! HTML minification for templates, blocks and override files.
//!
//! The profile keeps everything a later substitution pass may depend on:
//! closing tags and the `<html>`/`<head>` opening tags. Template tokens
//! (`{name}`, `{@name}`) are plain text to the minifier and survive unchanged.
//! Attribute values holding a token get their quotes back, since the
//! substituted value may contain spaces.

use regex::bytes::{Captures, Regex};
use std::{borrow::Cow, sync::LazyLock};

/// An opening tag.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z][^<>]*>").expect("valid regex"));

/// `name=value` inside a tag, `value` running to the next space, quote or `>`.
static UNQUOTED_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([ \t\r\n][^ \t\r\n/>"'=]+)=([^ \t\r\n>"'`]+)"#).expect("valid regex")
});

/// A template token, `{name}`, `{name:default}` or `{@name}`.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{@?[A-Za-z0-9]+(?::[^}\n]*)?\}").expect("valid regex"));

/// Minify HTML content, or borrow it unchanged when minification is off.
///
/// `enabled = false` is the debug mode: output stays readable and diffable.
pub fn minify_html(html: &[u8], enabled: bool) -> Cow<'_, [u8]> {
    if enabled {
        Cow::Owned(minify_html_inner(html))
    } else {
        Cow::Borrowed(html)
    }
}

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = false;
    cfg.minify_js = false;
    requote_tokens(minify_html::minify(html, &cfg))
}

/// Restore quotes around unquoted attribute values that contain a token.
fn requote_tokens(html: Vec<u8>) -> Vec<u8> {
    TAG.replace_all(&html, |tag: &Captures<'_>| requote_tag(&tag[0]))
        .into_owned()
}

fn requote_tag(tag: &[u8]) -> Vec<u8> {
    UNQUOTED_ATTR
        .replace_all(tag, |attr: &Captures<'_>| {
            let end = attr.get(0).map_or(tag.len(), |m| m.end());
            // a quote here means the match sits inside a quoted value
            let unquoted = matches!(tag.get(end), None | Some(b' ' | b'\t' | b'\r' | b'\n' | b'>'));
            if unquoted && TOKEN.is_match(&attr[2]) {
                [&attr[1], &b"=\""[..], &attr[2], &b"\""[..]].concat()
            } else {
                attr[0].to_vec()
            }
        })
        .into_owned()
}
