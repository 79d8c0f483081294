//! Markdown to HTML for content blocks and `@name.md` override files.
//!
//! The profile is fixed for every page:
//!
//! - tables, footnotes, strikethrough, task lists and `{#id}` heading ids
//! - template tokens (`{name}`) survive in text, headings and URLs
//! - headings without an explicit id get one derived from their text
//! - links to absolute URLs open in a new browsing context (`target="_blank"`)

use super::escape_attr;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream, html};
use regex::Regex;
use std::{collections::HashMap, sync::LazyLock};

/// A template token, `{name}` or `{name:default}`.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{@?[A-Za-z0-9]+(?::[^}\n]*)?\}").expect("valid regex"));

/// Explicit heading id at the end of the heading text.
static HEADING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\{#([A-Za-z0-9_-]+)\}[ \t]*\z").expect("valid regex"));

/// Render markdown source to an HTML string.
pub fn to_html(markdown: &str) -> String {
    let events = TextMergeStream::new(Parser::new_ext(markdown, options())).collect();
    let events = convert(events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Render markdown bytes, replacing invalid UTF-8 sequences.
pub fn bytes_to_html(markdown: &[u8]) -> Vec<u8> {
    to_html(&String::from_utf8_lossy(markdown)).into_bytes()
}

/// Heading attribute blocks stay off: `{name}` at the end of a heading is a
/// template token, and only `{#id}` is recognized by [`take_explicit_id`].
fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

/// Rewrite the event stream.
///
/// - headings get their explicit `{#id}` or one derived from their text
/// - external links open in a blank target
/// - link and image URLs holding a template token are written verbatim, since
///   the default renderer percent-encodes the braces
fn convert(mut events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    assign_heading_ids(&mut events);

    let mut out = Vec::with_capacity(events.len());
    let mut events = events.into_iter();
    while let Some(event) = events.next() {
        match event {
            Event::Start(Tag::Link { dest_url, title, .. })
                if is_external(&dest_url) || TOKEN.is_match(&dest_url) =>
            {
                // `End(Link)` still renders the matching `</a>`
                out.push(Event::InlineHtml(CowStr::from(open_link(&dest_url, &title))));
            }
            Event::Start(Tag::Image { dest_url, title, .. }) if TOKEN.is_match(&dest_url) => {
                let alt = image_alt(&mut events);
                out.push(Event::InlineHtml(CowStr::from(image_tag(&dest_url, &title, &alt))));
            }
            other => out.push(other),
        }
    }
    out
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { .. })) {
            continue;
        }
        let anchor = match take_explicit_id(&mut events[i + 1..]) {
            Some(explicit) => {
                seen.entry(explicit.clone()).or_insert(0);
                explicit
            }
            None => unique_anchor(&mut seen, heading_anchor(&events[i + 1..])),
        };
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(anchor));
        }
    }
}

/// Strip a trailing `{#id}` from the heading whose body starts at `rest[0]`.
fn take_explicit_id(rest: &mut [Event<'_>]) -> Option<String> {
    let end = rest
        .iter()
        .position(|event| matches!(event, Event::End(TagEnd::Heading(_))))?;
    let Event::Text(text) = rest.get_mut(end.checked_sub(1)?)? else {
        return None;
    };

    let caps = HEADING_ID.captures(&**text)?;
    let id = caps[1].to_owned();
    let start = caps.get(0)?.start();
    let stripped = text[..start].to_owned();
    *text = CowStr::from(stripped);
    Some(id)
}

fn open_link(dest: &str, title: &str) -> String {
    let mut open = format!(r#"<a href="{}""#, escape_attr(dest));
    if !title.is_empty() {
        open.push_str(&format!(r#" title="{}""#, escape_attr(title)));
    }
    if is_external(dest) {
        open.push_str(r#" target="_blank""#);
    }
    open.push('>');
    open
}

/// Consume an image's alt text up to its `End(Image)`.
fn image_alt<'a>(events: &mut impl Iterator<Item = Event<'a>>) -> String {
    let mut alt = String::new();
    let mut depth = 1usize;
    for event in events {
        match event {
            Event::Start(Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Image) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(t) | Event::Code(t) => alt.push_str(&t),
            Event::SoftBreak | Event::HardBreak => alt.push(' '),
            _ => {}
        }
    }
    alt
}

fn image_tag(dest: &str, title: &str, alt: &str) -> String {
    let mut tag = format!(
        r#"<img src="{}" alt="{}""#,
        escape_attr(dest),
        escape_attr(alt)
    );
    if !title.is_empty() {
        tag.push_str(&format!(r#" title="{}""#, escape_attr(title)));
    }
    tag.push_str(" />");
    tag
}

/// Anchor text for the heading whose body starts at `rest[0]`.
fn heading_anchor(rest: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in rest {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    sanitize_anchor(&text)
}

/// Lowercase letters and digits, with every other run collapsed to one `-`.
fn sanitize_anchor(text: &str) -> String {
    let mut anchor = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !anchor.is_empty() {
                anchor.push('-');
            }
            pending_dash = false;
            anchor.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    anchor
}

fn unique_anchor(seen: &mut HashMap<String, usize>, anchor: String) -> String {
    let anchor = if anchor.is_empty() { "section".to_owned() } else { anchor };
    match seen.get_mut(&anchor) {
        None => {
            seen.insert(anchor.clone(), 0);
            anchor
        }
        Some(count) => {
            *count += 1;
            let suffixed = format!("{anchor}-{count}");
            seen.insert(suffixed.clone(), 0);
            suffixed
        }
    }
}

/// Absolute URLs with a scheme (`https://`) or protocol-relative (`//host`).
fn is_external(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    match url.find("://") {
        Some(i) if i > 0 => url[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}
