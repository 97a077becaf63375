//! # Document Model
//!
//! The input to a layout pass: an ordered sequence of [`Block`]s plus the
//! page geometry they flow into. The block set is closed (paragraph, spacer,
//! table, rule, explicit page break) so every stage of the engine can match
//! exhaustively instead of dispatching through trait objects.
//!
//! Blocks are plain data. The engine borrows them for the duration of a pass
//! and never mutates them; when a block has to be split across pages the
//! pieces are new blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::style::{Color, Style};
use crate::text::LaidOutLine;

/// Points per millimetre.
pub const MM: f64 = 72.0 / 25.4;

/// Convert millimetres to points.
pub fn mm(v: f64) -> f64 {
    v * MM
}

/// A complete document as read from JSON: geometry, named styles, content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Page size and margins shared by every page.
    #[serde(default)]
    pub page: PageGeometry,

    /// Styles to register before layout, by name.
    #[serde(default)]
    pub styles: BTreeMap<String, Style>,

    /// Start from the built-in brochure style set before adding `styles`.
    #[serde(default)]
    pub default_styles: bool,

    /// The content, in reading order.
    pub blocks: Vec<Block>,
}

/// Fixed page geometry for a pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Page size. Defaults to A4.
    #[serde(default)]
    pub size: PageSize,

    /// Page margins in points (1/72 inch).
    #[serde(default = "default_margins")]
    pub margins: Edges,
}

fn default_margins() -> Edges {
    Edges::uniform(54.0) // ~0.75 inch
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margins: default_margins(),
        }
    }
}

impl PageGeometry {
    pub fn new(size: PageSize, margins: Edges) -> Self {
        Self { size, margins }
    }

    pub fn content_width(&self) -> f64 {
        self.size.dimensions().0 - self.margins.horizontal()
    }

    pub fn content_height(&self) -> f64 {
        self.size.dimensions().1 - self.margins.vertical()
    }

    /// Reject pages with no usable area.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let (w, h) = self.size.dimensions();
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(LayoutError::InvalidGeometry(format!(
                "page size must be positive, got {w} x {h}"
            )));
        }
        let m = &self.margins;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(LayoutError::InvalidGeometry(format!(
                "margins must be non-negative, got {m:?}"
            )));
        }
        if self.content_width() <= 0.0 || self.content_height() <= 0.0 {
            return Err(LayoutError::InvalidGeometry(format!(
                "margins leave no usable area: {} x {}",
                self.content_width(),
                self.content_height()
            )));
        }
        Ok(())
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for margins and cell padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// One unit of flowing content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    /// Wrapped text with inline markup.
    Paragraph(Paragraph),
    /// Empty vertical space.
    Spacer(Spacer),
    /// A grid of cells, each holding its own block sequence.
    Table(Table),
    /// A horizontal divider.
    Rule(Rule),
    /// Ends the current page immediately.
    #[serde(alias = "ExplicitBreak")]
    PageBreak,
}

impl Block {
    pub fn paragraph(markup: impl Into<String>, style: impl Into<String>) -> Self {
        Block::Paragraph(Paragraph::new(markup, style))
    }

    pub fn spacer(height: f64) -> Self {
        Block::Spacer(Spacer { height })
    }

    pub fn rule(width_fraction: f64, thickness: f64, color: Color) -> Self {
        Block::Rule(Rule {
            width_fraction,
            thickness,
            color,
            space_before: 0.0,
            space_after: 0.0,
        })
    }

    pub fn page_break() -> Self {
        Block::PageBreak
    }

    /// Short name for log messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::Paragraph(_) => "Paragraph",
            Block::Spacer(_) => "Spacer",
            Block::Table(_) => "Table",
            Block::Rule(_) => "Rule",
            Block::PageBreak => "PageBreak",
        }
    }
}

/// A paragraph of inline markup in a named style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// Text with optional `<b>`, `<i>`, `<font color>`, `<br/>` and entities.
    pub markup: String,
    /// Name of a registered [`Style`].
    pub style: String,
    /// Lines already wrapped for this paragraph. Set on split pieces (which
    /// must render exactly their own lines) and on paragraphs prepared by the
    /// flow engine so one pass wraps each paragraph once.
    #[serde(skip)]
    pub(crate) wrapped: Option<WrappedLines>,
}

#[derive(Debug, Clone)]
pub(crate) struct WrappedLines {
    pub lines: Arc<[LaidOutLine]>,
    /// Width the lines were wrapped at.
    pub width: f64,
    /// Only part of the paragraph: the markup no longer describes these lines.
    pub partial: bool,
}

impl Paragraph {
    pub fn new(markup: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            wrapped: None,
        }
    }

    /// Whether this paragraph is one piece of a split.
    pub fn is_split_piece(&self) -> bool {
        self.wrapped.as_ref().is_some_and(|w| w.partial)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Spacer {
    pub height: f64,
}

/// A horizontal divider, centered in the frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Share of the available width, in (0, 1].
    #[serde(default = "full_width")]
    pub width_fraction: f64,
    pub thickness: f64,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub space_before: f64,
    #[serde(default)]
    pub space_after: f64,
}

fn full_width() -> f64 {
    1.0
}

/// A table cell: its own block sequence.
pub type Cell = Vec<Block>;

/// A table row: cells in column order. Missing trailing cells are empty.
pub type Row = Vec<Cell>;

/// A grid with caller-fixed column widths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub rows: Vec<Row>,
    /// Width of each column in points. Never derived from content.
    pub column_widths: Vec<f64>,
    /// Background, grid, padding and alignment instructions, applied in order.
    #[serde(default)]
    pub style_rules: Vec<TableRule>,
    /// Leading rows repeated at the top of every continuation of the table.
    #[serde(default)]
    pub repeat_rows: usize,
    /// Placement of the table within the frame when narrower than it.
    #[serde(default)]
    pub align: HAlign,
}

impl Table {
    pub fn new(rows: Vec<Row>, column_widths: Vec<f64>) -> Self {
        Self {
            rows,
            column_widths,
            style_rules: Vec::new(),
            repeat_rows: 0,
            align: HAlign::Center,
        }
    }

    pub fn with_rules(mut self, rules: Vec<TableRule>) -> Self {
        self.style_rules = rules;
        self
    }

    pub fn with_repeat_rows(mut self, rows: usize) -> Self {
        self.repeat_rows = rows;
        self
    }

    pub fn total_width(&self) -> f64 {
        self.column_widths.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// One styling instruction over a rectangular range of cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRule {
    pub range: CellRange,
    pub op: TableOp,
}

impl TableRule {
    pub fn new(range: CellRange, op: TableOp) -> Self {
        Self { range, op }
    }
}

/// An inclusive `(column, row)` rectangle. Negative indices count from the
/// end, so `(0, 0)..(-1, -1)` covers the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl CellRange {
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        Self { start, end }
    }

    /// Every cell.
    pub fn all() -> Self {
        Self::new((0, 0), (-1, -1))
    }

    /// Every cell of one row.
    pub fn row(row: i32) -> Self {
        Self::new((0, row), (-1, row))
    }

    /// Every row from `row` to the end.
    pub fn rows_from(row: i32) -> Self {
        Self::new((0, row), (-1, -1))
    }

    /// Resolve to absolute inclusive bounds `(c0, r0, c1, r1)` for a grid of
    /// the given shape. `None` when the range selects nothing.
    pub fn resolve(&self, columns: usize, rows: usize) -> Option<(usize, usize, usize, usize)> {
        let abs = |i: i32, n: usize| -> i64 {
            if i < 0 {
                n as i64 + i as i64
            } else {
                i as i64
            }
        };
        let (c0, c1) = (abs(self.start.0, columns), abs(self.end.0, columns));
        let (r0, r1) = (abs(self.start.1, rows), abs(self.end.1, rows));
        let (c0, c1) = (c0.min(c1).max(0), c0.max(c1).min(columns as i64 - 1));
        let (r0, r1) = (r0.min(r1).max(0), r0.max(r1).min(rows as i64 - 1));
        if c0 > c1 || r0 > r1 {
            return None;
        }
        Some((c0 as usize, r0 as usize, c1 as usize, r1 as usize))
    }
}

/// What a [`TableRule`] does to its range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableOp {
    /// Fill every cell in the range.
    Background { color: Color },
    /// Fill rows in the range with the colors in turn.
    RowBackgrounds { colors: Vec<Color> },
    /// Inner grid plus outer box.
    Grid { width: f64, color: Color },
    /// Lines between cells only.
    InnerGrid { width: f64, color: Color },
    /// Outline of the range.
    Box { width: f64, color: Color },
    /// Line along the top edge of each row in the range.
    LineAbove { width: f64, color: Color },
    /// Line along the bottom edge of each row in the range.
    LineBelow { width: f64, color: Color },
    /// Override cell padding; unset edges keep their current value.
    Padding {
        #[serde(default)]
        top: Option<f64>,
        #[serde(default)]
        right: Option<f64>,
        #[serde(default)]
        bottom: Option<f64>,
        #[serde(default)]
        left: Option<f64>,
    },
    /// Vertical placement of cell content within the row.
    VAlign { align: VAlign },
}

impl TableOp {
    /// Shorthand for a padding override of all four edges.
    pub fn padding(all: f64) -> Self {
        TableOp::Padding {
            top: Some(all),
            right: Some(all),
            bottom: Some(all),
            left: Some(all),
        }
    }
}
