//! # Inline Markup
//!
//! Paragraph text carries a small XML-like vocabulary: `<b>`, `<i>`,
//! `<font color="..">`, `<br/>` and the usual character entities. This module
//! turns it into a flat list of styled runs and forced breaks.
//!
//! Markup is content, not configuration, so nothing here is fatal. On a
//! syntax error the unparsed remainder is kept verbatim as plain text; an
//! emphasis tag that is never closed is demoted to the emphasis in effect
//! before it. Either way the problem is reported in [`ParsedMarkup::error`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::LayoutError;
use crate::font::SpanStyle;
use crate::style::Color;

/// One item of parsed paragraph content.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text { text: String, style: SpanStyle },
    /// Forced line break (`<br/>` or a newline in the text).
    Break,
}

#[derive(Debug)]
pub struct ParsedMarkup {
    pub items: Vec<Inline>,
    /// The first problem found, if any. The items are still usable.
    pub error: Option<LayoutError>,
}

impl ParsedMarkup {
    /// The text of all runs, with breaks as `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                Inline::Text { text, .. } => out.push_str(text),
                Inline::Break => out.push('\n'),
            }
        }
        out
    }
}

/// An element that has been opened but not yet closed.
struct OpenTag {
    name: String,
    offset: usize,
    style_before: SpanStyle,
    first_item: usize,
    /// Length of the preceding text run, which later text may extend.
    run_len: usize,
}

/// Parse paragraph markup, starting from the paragraph's base span style.
pub fn parse_markup(markup: &str, base: &SpanStyle) -> ParsedMarkup {
    let mut reader = Reader::from_str(markup);
    let mut items: Vec<Inline> = Vec::new();
    let mut open: Vec<OpenTag> = Vec::new();
    let mut current = base.clone();
    let mut error: Option<LayoutError> = None;
    let mut buf = Vec::new();

    loop {
        let offset = reader.buffer_position() as usize;
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = tag_name(&e);
                let style_before = current.clone();
                apply_tag(&name, &e, &mut current);
                let run_len = match items.last() {
                    Some(Inline::Text { text, .. }) => text.len(),
                    _ => 0,
                };
                open.push(OpenTag {
                    name,
                    offset,
                    style_before,
                    first_item: items.len(),
                    run_len,
                });
            }
            Ok(Event::Empty(e)) => {
                let name = tag_name(&e);
                if name == "br" {
                    items.push(Inline::Break);
                } else {
                    log::debug!("ignoring empty <{name}/> in paragraph markup");
                }
            }
            Ok(Event::End(_)) => {
                // quick-xml has already checked the name matches.
                if let Some(tag) = open.pop() {
                    current = tag.style_before;
                }
            }
            Ok(Event::Text(e)) => match e.unescape_with(resolve_entity) {
                Ok(text) => push_text(&mut items, &text, &current),
                Err(err) => {
                    recover(markup, offset, &err.to_string(), &mut items, base, &mut error);
                    break;
                }
            },
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&mut items, &text, &current);
            }
            Ok(Event::Eof) => break,
            // Comments, processing instructions and declarations carry no text.
            Ok(_) => {}
            Err(err) => {
                recover(markup, offset, &err.to_string(), &mut items, base, &mut error);
                break;
            }
        }
    }

    if let Some(outermost) = open.first() {
        log::warn!(
            "unterminated <{}> at byte {} in paragraph markup; treating the rest as plain text",
            outermost.name,
            outermost.offset
        );
        if open.iter().all(|tag| is_inline_tag(&tag.name)) {
            for item in &mut items[outermost.first_item..] {
                if let Inline::Text { style, .. } = item {
                    *style = outermost.style_before.clone();
                }
            }
            merge_runs(&mut items);
        } else {
            // An unclosed tag we don't know is probably text that looks
            // like a tag ("<3"): keep the raw remainder.
            items.truncate(outermost.first_item);
            if let Some(Inline::Text { text, .. }) = items.last_mut() {
                text.truncate(outermost.run_len);
            }
            let rest = markup.get(outermost.offset..).unwrap_or_default();
            push_text(&mut items, rest, &outermost.style_before);
        }
        if error.is_none() {
            error = Some(LayoutError::MalformedMarkup {
                offset: outermost.offset,
                reason: format!("unterminated <{}>", outermost.name),
            });
        }
    }

    ParsedMarkup { items, error }
}

/// Keep everything from `offset` on as plain text in the base style.
fn recover(
    markup: &str,
    offset: usize,
    reason: &str,
    items: &mut Vec<Inline>,
    base: &SpanStyle,
    error: &mut Option<LayoutError>,
) {
    log::warn!("malformed paragraph markup at byte {offset}: {reason}; keeping the rest verbatim");
    let rest = markup.get(offset..).unwrap_or_default();
    push_text(items, rest, base);
    *error = Some(LayoutError::MalformedMarkup {
        offset,
        reason: reason.to_string(),
    });
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn get_attr(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref().eq_ignore_ascii_case(name.as_bytes()) {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

fn is_inline_tag(name: &str) -> bool {
    matches!(name, "b" | "strong" | "i" | "em" | "font")
}

fn apply_tag(name: &str, e: &BytesStart, style: &mut SpanStyle) {
    match name {
        "b" | "strong" => style.bold = true,
        "i" | "em" => style.italic = true,
        "font" => {
            if let Some(value) = get_attr(e, "color") {
                match parse_color(&value) {
                    Some(color) => style.color = color,
                    None => log::warn!("ignoring unknown font color {value:?}"),
                }
            }
            if let Some(size) = get_attr(e, "size").and_then(|s| s.trim().parse::<f64>().ok()) {
                if size.is_finite() && size > 0.0 {
                    style.size = size;
                }
            }
            if let Some(face) = get_attr(e, "face").or_else(|| get_attr(e, "name")) {
                style.font = face;
            }
        }
        other => log::debug!("unknown inline tag <{other}>; keeping its content"),
    }
}

fn parse_color(value: &str) -> Option<Color> {
    match value.trim().to_ascii_lowercase().as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::rgb(1.0, 0.0, 0.0)),
        "green" => Some(Color::rgb(0.0, 0.5, 0.0)),
        "blue" => Some(Color::rgb(0.0, 0.0, 1.0)),
        "gray" | "grey" => Some(Color::rgb(0.5, 0.5, 0.5)),
        other => Color::parse_hex(other),
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{00A0}",
        "bull" => "\u{2022}",
        "middot" => "\u{00B7}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "copy" => "\u{00A9}",
        "reg" => "\u{00AE}",
        "trade" => "\u{2122}",
        "rarr" => "\u{2192}",
        _ => return None,
    })
}

/// Append text, turning newlines into breaks and merging with a preceding
/// run of the same style.
fn push_text(items: &mut Vec<Inline>, text: &str, style: &SpanStyle) {
    let text = text.replace("\r\n", "\n");
    for (i, piece) in text.split(['\n', '\u{2028}']).enumerate() {
        if i > 0 {
            items.push(Inline::Break);
        }
        if piece.is_empty() {
            continue;
        }
        if let Some(Inline::Text { text, style: last }) = items.last_mut() {
            if last == style {
                text.push_str(piece);
                continue;
            }
        }
        items.push(Inline::Text {
            text: piece.to_string(),
            style: style.clone(),
        });
    }
}

fn merge_runs(items: &mut Vec<Inline>) {
    let mut merged: Vec<Inline> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        match item {
            Inline::Text { text, style } => push_text_raw(&mut merged, text, style),
            Inline::Break => merged.push(Inline::Break),
        }
    }
    *items = merged;
}

fn push_text_raw(items: &mut Vec<Inline>, piece: String, style: SpanStyle) {
    if let Some(Inline::Text { text, style: last }) = items.last_mut() {
        if *last == style {
            text.push_str(&piece);
            return;
        }
    }
    items.push(Inline::Text { text: piece, style });
}
