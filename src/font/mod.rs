//! # Text Measurement
//!
//! The engine does not read font files. Glyph metrics come from a
//! [`TextMeasurer`] supplied by the caller, which answers one question: how
//! wide and how tall is this string in this span style?
//!
//! Every layout pass wraps the measurer in a [`MeasureCache`] so an
//! identical (text, style) pair is measured at most once per pass, and so
//! nonsense answers (NaN, negative sizes) are caught before they poison
//! layout.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::style::{Color, Style};

/// Everything about a run of text that can change its rendered size or look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanStyle {
    pub font: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
}

impl SpanStyle {
    /// The span style of un-emphasized text in a paragraph style.
    pub fn from_style(style: &Style) -> Self {
        Self {
            font: style.font.clone(),
            size: style.size,
            bold: style.bold,
            italic: style.italic,
            color: style.color,
        }
    }
}

/// Size of a measured run of text, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub line_height: f64,
}

/// The glyph-metrics collaborator.
///
/// Implementations must be pure: the same text and style always produce the
/// same metrics within a pass.
pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &SpanStyle) -> TextMetrics;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct MeasureKey {
    text: String,
    font: String,
    size_bits: u64,
    bold: bool,
    italic: bool,
}

impl MeasureKey {
    fn new(text: &str, style: &SpanStyle) -> Self {
        Self {
            text: text.to_string(),
            font: style.font.clone(),
            size_bits: style.size.to_bits(),
            bold: style.bold,
            italic: style.italic,
        }
    }
}

/// Per-pass memoizing front for a [`TextMeasurer`].
pub struct MeasureCache<'m> {
    measurer: &'m dyn TextMeasurer,
    entries: RefCell<HashMap<MeasureKey, TextMetrics>>,
}

impl<'m> MeasureCache<'m> {
    pub fn new(measurer: &'m dyn TextMeasurer) -> Self {
        Self {
            measurer,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Measure `text`, consulting the cache first.
    ///
    /// Fails with [`LayoutError::UnmeasurableContent`] when the measurer
    /// reports a non-finite or negative size.
    pub fn measure(&self, text: &str, style: &SpanStyle) -> Result<TextMetrics, LayoutError> {
        let key = MeasureKey::new(text, style);
        if let Some(metrics) = self.entries.borrow().get(&key) {
            return Ok(*metrics);
        }

        log::trace!("measuring {:?} in {} {}pt", text, style.font, style.size);
        let metrics = self.measurer.measure(text, style);
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(metrics.width) || !valid(metrics.line_height) {
            return Err(LayoutError::UnmeasurableContent {
                text: text.to_string(),
                width: metrics.width,
                line_height: metrics.line_height,
            });
        }

        self.entries.borrow_mut().insert(key, metrics);
        Ok(metrics)
    }

    /// Number of distinct (text, style) pairs measured so far.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn measurer(&self) -> &'m dyn TextMeasurer {
        self.measurer
    }
}

/// Every character advances by the same fraction of the font size. Exact and
/// predictable, which makes it the measurer of choice in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasurer {
    /// Advance per character, in ems.
    pub advance: f64,
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self { advance: 0.5 }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str, style: &SpanStyle) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * self.advance * style.size,
            line_height: style.size,
        }
    }
}

/// Rough proportional metrics in the spirit of Helvetica's width table:
/// narrow punctuation, wide capitals, full-width CJK. Good enough for
/// previews when no real font metrics are available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMeasurer;

impl ApproximateMeasurer {
    fn char_em(ch: char) -> f64 {
        match ch {
            ' ' | '\u{00A0}' => 0.278,
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '|' | '\'' => 0.222,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.333,
            'm' | 'w' => 0.833,
            'M' | 'W' => 0.889,
            '0'..='9' => 0.556,
            'A'..='Z' => 0.667,
            '\u{1100}'..='\u{11FF}'
            | '\u{2E80}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FF60}' => 1.0,
            _ => 0.5,
        }
    }
}

impl TextMeasurer for ApproximateMeasurer {
    fn measure(&self, text: &str, style: &SpanStyle) -> TextMetrics {
        let em: f64 = text.chars().map(Self::char_em).sum();
        let weight = if style.bold { 1.05 } else { 1.0 };
        TextMetrics {
            width: em * style.size * weight,
            line_height: style.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingMeasurer {
        calls: Cell<usize>,
    }

    impl TextMeasurer for CountingMeasurer {
        fn measure(&self, text: &str, style: &SpanStyle) -> TextMetrics {
            self.calls.set(self.calls.get() + 1);
            MonospaceMeasurer::default().measure(text, style)
        }
    }

    struct BrokenMeasurer;

    impl TextMeasurer for BrokenMeasurer {
        fn measure(&self, _text: &str, _style: &SpanStyle) -> TextMetrics {
            TextMetrics {
                width: f64::NAN,
                line_height: 10.0,
            }
        }
    }

    fn span() -> SpanStyle {
        SpanStyle::from_style(&Style::default())
    }

    #[test]
    fn identical_pairs_are_measured_once() {
        let measurer = CountingMeasurer { calls: Cell::new(0) };
        let cache = MeasureCache::new(&measurer);
        let style = span();
        for _ in 0..5 {
            cache.measure("hello", &style).unwrap();
        }
        let bold = SpanStyle { bold: true, ..span() };
        cache.measure("hello", &bold).unwrap();
        assert_eq!(measurer.calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn non_finite_metrics_are_rejected() {
        let cache = MeasureCache::new(&BrokenMeasurer);
        let err = cache.measure("x", &span()).unwrap_err();
        assert!(matches!(err, LayoutError::UnmeasurableContent { .. }));
    }

    #[test]
    fn monospace_width_is_exact() {
        let m = MonospaceMeasurer::default();
        let metrics = m.measure("abcd", &span());
        assert_eq!(metrics.width, 4.0 * 0.5 * 10.0);
        assert_eq!(metrics.line_height, 10.0);
    }

    #[test]
    fn approximate_measurer_orders_widths_sensibly() {
        let m = ApproximateMeasurer;
        let style = span();
        let narrow = m.measure("iiii", &style).width;
        let wide = m.measure("MMMM", &style).width;
        let hangul = m.measure("한글", &style).width;
        assert!(narrow < wide);
        assert_eq!(hangul, 2.0 * style.size);
    }
}
