//! Markdown rendering for item content.
//!
//! Output is restricted to a fixed tag allowlist: `p`, `br`, `strong`, `em`,
//! `code`, `pre`, `blockquote`, `ul`, `ol`, `li`, `a` (href/title only) and
//! `h1`–`h6`. Anything the parser produces outside that set — raw HTML,
//! images, thematic breaks — is filtered out before serialization, so the
//! result is safe to embed without a second sanitization pass.

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

/// Render untrusted markdown to sanitized HTML.
///
/// Soft line breaks become `<br>`, matching how short user-submitted
/// documents are written (one thought per line, no double spacing).
pub fn render_markdown(raw: &str) -> String {
    let parser = Parser::new_ext(raw, Options::empty());

    let mut events: Vec<Event> = Vec::new();
    let mut image_depth = 0usize;
    for event in parser {
        match event {
            // Images are dropped wholesale, alt text included.
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth -= 1,
            _ if image_depth > 0 => {}

            // Raw HTML never passes through; surrounding text survives as
            // its own events, so stripping a tag keeps its inner content.
            Event::Html(_) | Event::InlineHtml(_) => {}

            // <hr> is not in the allowlist.
            Event::Rule => {}

            Event::SoftBreak => events.push(Event::HardBreak),

            other => events.push(other),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}
