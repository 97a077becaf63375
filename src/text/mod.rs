//! # Line Wrapping
//!
//! Turns parsed paragraph markup into positioned lines for a given width.
//!
//! Break opportunities come from UAX#14, so Latin text wraps at spaces and
//! CJK text wraps between characters. Placement is greedy: words are added
//! to the current line while they fit, and a word that overflows starts the
//! next line. A word wider than the whole line sits on a line by itself.
//!
//! The result is a pure function of (markup, style, width) and the
//! measurer, so wrapping the same paragraph twice yields the same lines.

pub mod markup;

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::error::LayoutError;
use crate::font::{MeasureCache, SpanStyle};
use crate::style::{Alignment, Style};

pub use markup::{parse_markup, Inline, ParsedMarkup};

/// Tolerance for floating-point width comparisons.
const EPSILON: f64 = 1e-6;

/// A run of same-styled text placed on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpan {
    pub text: String,
    /// Offset from the left edge of the paragraph frame.
    pub x: f64,
    pub width: f64,
    pub style: SpanStyle,
}

/// One wrapped line. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    /// Width of the glyph run, including any justification stretch.
    pub width: f64,
    /// Distance from the top of the paragraph to this line's baseline.
    pub baseline_y_offset: f64,
    /// Vertical pitch this line occupies.
    pub height: f64,
    /// Extra space added to each inter-word gap. Zero unless justified.
    pub stretch: f64,
    pub spans: Vec<LineSpan>,
}

impl LaidOutLine {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Total height of a sequence of lines.
pub fn lines_height(lines: &[LaidOutLine]) -> f64 {
    lines.iter().map(|l| l.height).sum()
}

/// A measured fragment of a word, in one span style.
#[derive(Debug, Clone)]
struct Piece {
    text: String,
    style: SpanStyle,
    width: f64,
    line_height: f64,
}

/// An unbreakable unit plus the whitespace that follows it.
#[derive(Debug, Clone, Default)]
struct Word {
    content: Vec<Piece>,
    gap: Vec<Piece>,
    /// A forced break follows this word.
    break_after: bool,
}

impl Word {
    fn width(&self) -> f64 {
        self.content.iter().map(|p| p.width).sum()
    }

    fn gap_width(&self) -> f64 {
        self.gap.iter().map(|p| p.width).sum()
    }

    /// Followed by whitespace, so justification may widen the gap.
    fn is_spaced(&self) -> bool {
        !self.gap.is_empty()
    }
}

/// Parse and wrap a paragraph's markup. Markup problems are recovered by the
/// parser; callers that want to report them should call
/// [`parse_markup`] themselves.
pub fn layout_paragraph(
    markup: &str,
    style: &Style,
    width: f64,
    cache: &MeasureCache,
) -> Result<Vec<LaidOutLine>, LayoutError> {
    let parsed = parse_markup(markup, &SpanStyle::from_style(style));
    wrap(&parsed.items, style, width, cache)
}

/// Wrap inline items into lines no wider than `width` (except for single
/// words that cannot fit anywhere).
pub fn wrap(
    items: &[Inline],
    style: &Style,
    width: f64,
    cache: &MeasureCache,
) -> Result<Vec<LaidOutLine>, LayoutError> {
    let words = split_words(items, cache)?;

    let mut lines: Vec<LaidOutLine> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut current_width = 0.0;
    let mut top = 0.0;

    for word in words {
        let indent = if lines.is_empty() {
            style.first_line_indent
        } else {
            0.0
        };
        let available = width - indent;
        let word_width = word.width();

        if let Some(prev) = current.last() {
            let needed = current_width + prev.gap_width() + word_width;
            if needed > available + EPSILON {
                let line = close_line(&current, style, width, indent, top, false);
                top += line.height;
                lines.push(line);
                current.clear();
                current_width = 0.0;
            }
        }

        if let Some(prev) = current.last() {
            current_width += prev.gap_width();
        }
        current_width += word_width;
        let forced = word.break_after;
        current.push(word);

        if forced {
            let indent = if lines.is_empty() {
                style.first_line_indent
            } else {
                0.0
            };
            let line = close_line(&current, style, width, indent, top, true);
            top += line.height;
            lines.push(line);
            current.clear();
            current_width = 0.0;
        }
    }

    if !current.is_empty() {
        let indent = if lines.is_empty() {
            style.first_line_indent
        } else {
            0.0
        };
        lines.push(close_line(&current, style, width, indent, top, true));
    }

    Ok(lines)
}

/// Build a positioned line from its words. `last` marks the end of the
/// paragraph or a forced break, neither of which is justified.
fn close_line(
    words: &[Word],
    style: &Style,
    width: f64,
    indent: f64,
    top: f64,
    last: bool,
) -> LaidOutLine {
    let available = (width - indent).max(0.0);
    let natural: f64 = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i + 1 < words.len() {
                w.width() + w.gap_width()
            } else {
                w.width()
            }
        })
        .sum();
    // Only whitespace stretches; segments joined without a space (after a
    // hyphen, between ideographs) stay together.
    let gaps = words[..words.len().saturating_sub(1)]
        .iter()
        .filter(|w| w.is_spaced())
        .count();

    let stretch = if style.alignment == Alignment::Justify
        && !last
        && gaps > 0
        && natural + EPSILON < available
    {
        (available - natural) / gaps as f64
    } else {
        0.0
    };

    let slack = (available - natural).max(0.0);
    let start = indent
        + match style.alignment {
            Alignment::Left | Alignment::Justify => 0.0,
            Alignment::Center => slack / 2.0,
            Alignment::Right => slack,
        };

    let mut spans: Vec<LineSpan> = Vec::new();
    let mut x = start;
    let mut tallest: f64 = 0.0;
    let mut largest_size = style.size;

    for (i, word) in words.iter().enumerate() {
        for piece in &word.content {
            push_span(&mut spans, piece, x);
            x += piece.width;
            tallest = tallest.max(piece.line_height);
            largest_size = largest_size.max(piece.style.size);
        }
        if i + 1 < words.len() {
            if stretch > 0.0 && word.is_spaced() {
                x += word.gap_width() + stretch;
            } else {
                for piece in &word.gap {
                    push_span(&mut spans, piece, x);
                    x += piece.width;
                }
            }
        }
    }

    let height = style.leading.max(tallest);
    LaidOutLine {
        width: natural + stretch * gaps as f64,
        baseline_y_offset: top + largest_size,
        height,
        stretch,
        spans,
    }
}

/// Append a piece, extending the previous span when it continues it exactly.
/// Justification stretch leaves a hole, so stretched words stay separate.
fn push_span(spans: &mut Vec<LineSpan>, piece: &Piece, x: f64) {
    if piece.text.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.style == piece.style && (last.x + last.width - x).abs() < EPSILON {
            last.text.push_str(&piece.text);
            last.width += piece.width;
            return;
        }
    }
    spans.push(LineSpan {
        text: piece.text.clone(),
        x,
        width: piece.width,
        style: piece.style.clone(),
    });
}

/// Characters that end a line by themselves (UAX#14 classes BK, CR, LF, NL).
fn is_hard_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

/// Korean wraps at spaces only: UAX#14 allows a break on either side of
/// every Hangul syllable, which would cut words apart.
fn joins_korean(before: &str, after: &str) -> bool {
    match (before.chars().next_back(), after.chars().next()) {
        (Some(a), Some(b)) => {
            !a.is_whitespace() && !b.is_whitespace() && (is_hangul(a) || is_hangul(b))
        }
        _ => false,
    }
}

fn is_hangul(ch: char) -> bool {
    matches!(
        ch,
        '\u{1100}'..='\u{11FF}'
            | '\u{3130}'..='\u{318F}'
            | '\u{A960}'..='\u{A97F}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{D7B0}'..='\u{D7FF}'
    )
}

/// Split inline items into measured words.
fn split_words(items: &[Inline], cache: &MeasureCache) -> Result<Vec<Word>, LayoutError> {
    let mut words: Vec<Word> = Vec::new();
    let mut segment: Vec<(&str, &SpanStyle)> = Vec::new();

    for item in items {
        match item {
            Inline::Text { text, style } => segment.push((text.as_str(), style)),
            Inline::Break => {
                words_from_runs(&segment, cache, &mut words)?;
                segment.clear();
                match words.last_mut() {
                    Some(last) if !last.break_after => last.break_after = true,
                    // Consecutive breaks produce empty lines.
                    _ => words.push(Word {
                        break_after: true,
                        ..Word::default()
                    }),
                }
            }
        }
    }
    words_from_runs(&segment, cache, &mut words)?;
    Ok(words)
}

/// Segment a run of styled text (with no forced breaks between items) at
/// UAX#14 opportunities.
fn words_from_runs(
    runs: &[(&str, &SpanStyle)],
    cache: &MeasureCache,
    words: &mut Vec<Word>,
) -> Result<(), LayoutError> {
    if runs.is_empty() {
        return Ok(());
    }

    // Plain text plus the byte range each style covers.
    let mut plain = String::new();
    let mut bounds: Vec<(usize, usize, &SpanStyle)> = Vec::with_capacity(runs.len());
    for (text, style) in runs {
        let start = plain.len();
        plain.push_str(text);
        bounds.push((start, plain.len(), style));
    }

    let mut seg_start = 0;
    for (seg_end, opportunity) in linebreaks(&plain) {
        let segment = &plain[seg_start..seg_end];
        let hard = opportunity == BreakOpportunity::Mandatory && seg_end < plain.len();
        if !hard && joins_korean(segment, &plain[seg_end..]) {
            continue;
        }

        let body = segment.trim_end_matches(is_hard_break);
        let content_len = body.trim_end_matches([' ', '\t']).len();
        let content_end = seg_start + content_len;
        let body_end = seg_start + body.len();

        let word = Word {
            content: pieces(&plain, seg_start, content_end, &bounds, cache)?,
            gap: pieces(&plain, content_end, body_end, &bounds, cache)?,
            break_after: hard,
        };
        words.push(word);
        seg_start = seg_end;
    }
    Ok(())
}

/// Measure the styled pieces of `plain[start..end]`.
fn pieces(
    plain: &str,
    start: usize,
    end: usize,
    bounds: &[(usize, usize, &SpanStyle)],
    cache: &MeasureCache,
) -> Result<Vec<Piece>, LayoutError> {
    let mut out = Vec::new();
    for &(b0, b1, style) in bounds {
        let s = start.max(b0);
        let e = end.min(b1);
        if s >= e {
            continue;
        }
        let text = &plain[s..e];
        let metrics = cache.measure(text, style)?;
        out.push(Piece {
            text: text.to_string(),
            style: style.clone(),
            width: metrics.width,
            line_height: metrics.line_height,
        });
    }
    Ok(out)
}
