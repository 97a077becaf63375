//! # Style Registry
//!
//! Named, immutable paragraph styles. A style is registered once under a
//! name, blocks refer to it by that name, and layout resolves the name to
//! the concrete attributes.
//!
//! The registry has an explicit freeze point. Before the first layout pass
//! styles may be added or replaced; [`StyleRegistry::freeze`] then hands out
//! a [`FrozenStyles`] snapshot, which is the only form the layout engine
//! accepts. The snapshot is cheap to clone and safe to share between threads
//! running independent passes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Visual attributes of a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Style {
    /// Font reference handed to the text measurer and the rendering sink.
    pub font: String,
    /// Font size in points.
    pub size: f64,
    /// Text color.
    pub color: Color,
    /// Distance between consecutive baselines, in points.
    pub leading: f64,
    /// Horizontal alignment of each line.
    pub alignment: Alignment,
    /// Vertical space above the paragraph.
    pub space_before: f64,
    /// Vertical space below the paragraph.
    pub space_after: f64,
    /// Base weight. Inline `<b>` makes text bold regardless.
    pub bold: bool,
    /// Base slant. Inline `<i>` makes text italic regardless.
    pub italic: bool,
    /// Extra indent applied to the first line only.
    pub first_line_indent: f64,
    /// Minimum number of lines left at the bottom of a page when the
    /// paragraph splits (orphan control). 1 disables the check.
    pub orphans: u32,
    /// Minimum number of lines carried to the next page (widow control).
    pub widows: u32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font: "Helvetica".to_string(),
            size: 10.0,
            color: Color::BLACK,
            leading: 12.0,
            alignment: Alignment::Left,
            space_before: 0.0,
            space_after: 0.0,
            bold: false,
            italic: false,
            first_line_indent: 0.0,
            orphans: 1,
            widows: 1,
        }
    }
}

impl Style {
    /// Check the attribute constraints every registered style must meet.
    pub fn validate(&self, name: &str) -> Result<(), LayoutError> {
        let invalid = |reason: String| LayoutError::InvalidStyle {
            name: name.to_string(),
            reason,
        };
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(invalid(format!("size must be > 0, got {}", self.size)));
        }
        if !(self.leading.is_finite() && self.leading > 0.0) {
            return Err(invalid(format!("leading must be > 0, got {}", self.leading)));
        }
        for (field, value) in [
            ("spaceBefore", self.space_before),
            ("spaceAfter", self.space_after),
            ("firstLineIndent", self.first_line_indent),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{field} must be >= 0, got {value}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64, // 0.0 - 1.0
    pub g: f64,
    pub b: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

fn opaque() -> f64 {
    1.0
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rgb` or `#rrggbb`. Anything else yields black.
    pub fn hex(hex: &str) -> Self {
        Self::parse_hex(hex).unwrap_or(Color::BLACK)
    }

    /// Strict variant of [`Color::hex`], used where bad input must be noticed.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let (r, g, b) = match hex.len() {
            3 => (
                u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?,
                u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?,
                u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?,
            ),
            6 => (
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            ),
            _ => return None,
        };
        Some(Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: 1.0,
        })
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// The brochure palette the default style set is built from.
pub mod palette {
    use super::Color;

    pub fn dark() -> Color {
        Color::hex("#0f172a")
    }
    pub fn blue() -> Color {
        Color::hex("#2563eb")
    }
    pub fn blue_light() -> Color {
        Color::hex("#eff6ff")
    }
    pub fn blue_mid() -> Color {
        Color::hex("#3b82f6")
    }
    pub fn slate() -> Color {
        Color::hex("#475569")
    }
    pub fn slate_light() -> Color {
        Color::hex("#94a3b8")
    }
    pub fn slate_bg() -> Color {
        Color::hex("#f8fafc")
    }
    pub fn green() -> Color {
        Color::hex("#059669")
    }
    pub fn purple() -> Color {
        Color::hex("#7c3aed")
    }
    pub fn orange() -> Color {
        Color::hex("#ea580c")
    }
    pub fn border() -> Color {
        Color::hex("#e2e8f0")
    }
}

/// Mutable registry used while a document's styles are being defined.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: HashMap<String, Style>,
    frozen: bool,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the brochure style set: cover, heading,
    /// body, bullet, caption and table styles.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, style) in default_styles() {
            // Defaults are known-valid and the registry is fresh.
            registry.styles.insert(name.to_string(), style);
        }
        registry
    }

    /// Register `style` under `name`, replacing any earlier definition.
    pub fn register(&mut self, name: impl Into<String>, style: Style) -> Result<(), LayoutError> {
        let name = name.into();
        if self.frozen {
            return Err(LayoutError::RegistryFrozen { name });
        }
        style.validate(&name)?;
        self.styles.insert(name, style);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Style, LayoutError> {
        self.styles
            .get(name)
            .ok_or_else(|| LayoutError::UnknownStyle {
                name: name.to_string(),
            })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stop accepting registrations and return the read-only view used by
    /// layout passes. Calling it again returns an equal snapshot.
    pub fn freeze(&mut self) -> FrozenStyles {
        self.frozen = true;
        FrozenStyles {
            styles: Arc::new(self.styles.clone()),
        }
    }
}

/// Read-only style lookup shared by layout passes.
#[derive(Debug, Clone)]
pub struct FrozenStyles {
    styles: Arc<HashMap<String, Style>>,
}

impl FrozenStyles {
    pub fn resolve(&self, name: &str) -> Result<&Style, LayoutError> {
        self.styles
            .get(name)
            .ok_or_else(|| LayoutError::UnknownStyle {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn make_style(
    size: f64,
    color: Color,
    leading: f64,
    alignment: Alignment,
    space_before: f64,
    space_after: f64,
    bold: bool,
) -> Style {
    Style {
        font: if bold { "Helvetica-Bold" } else { "Helvetica" }.to_string(),
        size,
        color,
        leading,
        alignment,
        space_before,
        space_after,
        bold,
        ..Style::default()
    }
}

fn default_styles() -> Vec<(&'static str, Style)> {
    use palette::*;
    use Alignment::*;
    vec![
        ("CoverTitle", make_style(28.0, dark(), 36.0, Center, 0.0, 0.0, true)),
        ("CoverSub", make_style(14.0, blue(), 20.0, Center, 0.0, 0.0, false)),
        ("CoverDesc", make_style(11.0, slate(), 18.0, Center, 0.0, 0.0, false)),
        ("H1", make_style(20.0, dark(), 28.0, Left, 10.0, 8.0, true)),
        ("H2", make_style(14.0, blue(), 20.0, Left, 16.0, 6.0, true)),
        ("H3", make_style(12.0, dark(), 18.0, Left, 10.0, 4.0, true)),
        ("Body", make_style(10.0, slate(), 17.0, Justify, 0.0, 4.0, false)),
        ("BodyDark", make_style(10.0, dark(), 17.0, Justify, 0.0, 4.0, false)),
        ("Bullet", make_style(10.0, slate(), 17.0, Left, 0.0, 2.0, false)),
        ("Small", make_style(9.0, slate_light(), 14.0, Left, 0.0, 0.0, false)),
        ("Badge", make_style(9.0, blue(), 14.0, Left, 0.0, 0.0, true)),
        ("Footer", make_style(8.0, slate_light(), 12.0, Center, 0.0, 0.0, false)),
        ("Caption", make_style(9.0, slate(), 14.0, Center, 4.0, 0.0, false)),
        ("TableHeader", make_style(9.0, Color::WHITE, 14.0, Center, 0.0, 0.0, true)),
        ("TableBody", make_style(9.0, dark(), 14.0, Left, 0.0, 0.0, false)),
    ]
}
