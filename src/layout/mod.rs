//! # Page Flow Engine
//!
//! The page is the unit of layout. The engine never lays content out on an
//! infinitely tall canvas and slices it afterwards; it walks the blocks in
//! order against a cursor on a page of known size:
//!
//! 1. Open a page with known dimensions and remaining space
//! 2. Before placing each block, ask: "does this fit?"
//! 3. If it fits: place it, reduce remaining space
//! 4. If it doesn't: ask the block to split at a line or row boundary, place
//!    what fits, and carry the rest to a fresh page
//! 5. If nothing fits on a fresh page: force the smallest piece onto it so
//!    layout always makes progress
//! 6. On every finished page: run the decoration callback, then hand the
//!    page to the sink
//!
//! An explicit page break finishes the current page no matter how much room
//! is left. Configuration problems (unknown styles, bad geometry, misshapen
//! tables) are found by a validation pass before the first page exists.

pub mod block;
pub mod decoration;
pub mod page_break;
pub mod table;

use std::borrow::Cow;
use std::collections::VecDeque;

use serde::Serialize;

use crate::error::LayoutError;
use crate::font::{MeasureCache, SpanStyle, TextMeasurer};
use crate::model::{Block, PageGeometry, TableOp};
use crate::style::{Color, FrozenStyles};
use crate::text::parse_markup;

use decoration::{Canvas, DecorationLayer, PageContext, PageDecorator, PageKind};
use page_break::fits;

/// A positioned drawing primitive in page coordinates (origin top-left,
/// y grows downward).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DrawCommand {
    /// A run of text. `y` is the baseline.
    Text {
        x: f64,
        y: f64,
        text: String,
        style: SpanStyle,
    },
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
        color: Color,
    },
}

/// Where a block (or a piece of one) landed on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Position of the block in the input sequence.
    pub block_index: usize,
    pub kind: &'static str,
    /// Top of the block's content, relative to the top margin.
    pub y: f64,
    pub height: f64,
    /// Lines or rows of the block carried on this page (0 for atomic blocks).
    pub units: usize,
    /// Placed on a fresh page despite not fitting.
    pub forced: bool,
}

/// A finished page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based, strictly increasing.
    pub number: usize,
    pub width: f64,
    pub height: f64,
    /// Vertical space consumed by content and spacing.
    pub used_height: f64,
    pub placements: Vec<Placement>,
    /// Content and decoration in paint order.
    pub commands: Vec<DrawCommand>,
}

impl Page {
    /// Whether any block on this page was forced past the bottom margin.
    pub fn has_forced_placement(&self) -> bool {
        self.placements.iter().any(|p| p.forced)
    }

    /// All text on the page in paint order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            if let DrawCommand::Text { text, .. } = command {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// Consumer of finished pages, e.g. a PDF writer.
pub trait PageSink {
    fn emit(&mut self, page: Page) -> Result<(), LayoutError>;
}

impl PageSink for Vec<Page> {
    fn emit(&mut self, page: Page) -> Result<(), LayoutError> {
        self.push(page);
        Ok(())
    }
}

/// What every block operation needs during one pass.
pub struct LayoutContext<'a> {
    pub styles: &'a FrozenStyles,
    pub cache: MeasureCache<'a>,
}

impl<'a> LayoutContext<'a> {
    pub fn new(styles: &'a FrozenStyles, measurer: &'a dyn TextMeasurer) -> Self {
        Self {
            styles,
            cache: MeasureCache::new(measurer),
        }
    }
}

/// Tracks where we are on the current page during layout.
#[derive(Debug, Clone)]
struct PageCursor {
    geometry: PageGeometry,
    number: usize,
    content_width: f64,
    content_height: f64,
    content_x: f64,
    content_y: f64,
    y: f64,
    /// Space-after of the last block placed, for collapsing with the next
    /// block's space-before.
    trailing_space: f64,
    placements: Vec<Placement>,
    commands: Vec<DrawCommand>,
}

impl PageCursor {
    fn new(geometry: &PageGeometry, number: usize) -> Self {
        Self {
            geometry: *geometry,
            number,
            content_width: geometry.content_width(),
            content_height: geometry.content_height(),
            content_x: geometry.margins.left,
            content_y: geometry.margins.top,
            y: 0.0,
            trailing_space: 0.0,
            placements: Vec::new(),
            commands: Vec::new(),
        }
    }

    fn remaining_height(&self) -> f64 {
        (self.content_height - self.y).max(0.0)
    }

    fn is_fresh(&self) -> bool {
        self.placements.is_empty()
    }

    fn new_page(&self) -> Self {
        PageCursor::new(&self.geometry, self.number + 1)
    }

    fn context(&self) -> PageContext {
        PageContext {
            page_number: self.number,
            page_size: self.geometry.size,
            margins: self.geometry.margins,
        }
    }

    fn finalize(self, furniture: Vec<DrawCommand>, layer: DecorationLayer) -> Page {
        let (width, height) = self.geometry.size.dimensions();
        let commands = match layer {
            DecorationLayer::Below => furniture.into_iter().chain(self.commands).collect(),
            DecorationLayer::Above => self.commands.into_iter().chain(furniture).collect(),
        };
        Page {
            number: self.number,
            width,
            height,
            used_height: self.y,
            placements: self.placements,
            commands,
        }
    }
}

/// The main layout engine.
pub struct LayoutEngine {
    geometry: PageGeometry,
}

impl LayoutEngine {
    pub fn new(geometry: PageGeometry) -> Self {
        Self { geometry }
    }

    /// Lay out `blocks` and collect the pages.
    pub fn layout(
        &self,
        blocks: &[Block],
        styles: &FrozenStyles,
        measurer: &dyn TextMeasurer,
        decorator: &mut dyn PageDecorator,
    ) -> Result<Vec<Page>, LayoutError> {
        let mut pages = Vec::new();
        self.layout_into(blocks, styles, measurer, decorator, &mut pages)?;
        Ok(pages)
    }

    /// Lay out `blocks`, handing each page to `sink` as soon as it is
    /// decorated. Returns the number of pages emitted.
    pub fn layout_into(
        &self,
        blocks: &[Block],
        styles: &FrozenStyles,
        measurer: &dyn TextMeasurer,
        decorator: &mut dyn PageDecorator,
        sink: &mut dyn PageSink,
    ) -> Result<usize, LayoutError> {
        validate(blocks, styles, &self.geometry)?;

        let ctx = LayoutContext::new(styles, measurer);
        let mut cursor = PageCursor::new(&self.geometry, 1);
        let mut queue: VecDeque<(usize, Cow<Block>)> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (i, Cow::Borrowed(b)))
            .collect();

        while let Some((index, block)) = queue.pop_front() {
            if let Block::PageBreak = *block {
                log::debug!("explicit break on page {}", cursor.number);
                let next = cursor.new_page();
                self.finish_page(cursor, &ctx, decorator, sink)?;
                cursor = next;
                continue;
            }

            let width = cursor.content_width;
            let block = match block.prepare(width, &ctx)? {
                Some(prepared) => Cow::Owned(prepared),
                None => block,
            };

            let (space_before, space_after) = block.spacing(&ctx)?;
            let gap = if cursor.is_fresh() {
                0.0
            } else {
                (space_before - cursor.trailing_space).max(0.0)
            };
            let available = cursor.remaining_height() - gap;
            let height = block.measure(width, &ctx)?;

            if fits(height, available) {
                place(&mut cursor, index, &block, gap, height, false, &ctx)?;
                let after = space_after.min(cursor.remaining_height());
                cursor.y += after;
                cursor.trailing_space = space_after;
                continue;
            }

            let (head, tail) = block.split(width, available, &ctx)?;
            if let Some(head) = head {
                let head_height = head.measure(width, &ctx)?;
                log::debug!(
                    "split {} #{} on page {}: {:.1}pt placed, rest carried over",
                    block.kind_name(),
                    index,
                    cursor.number,
                    head_height
                );
                place(&mut cursor, index, &head, gap, head_height, false, &ctx)?;
                match tail {
                    Some(tail) => {
                        let next = cursor.new_page();
                        self.finish_page(cursor, &ctx, decorator, sink)?;
                        cursor = next;
                        queue.push_front((index, Cow::Owned(tail)));
                    }
                    None => {
                        cursor.y += space_after.min(cursor.remaining_height());
                        cursor.trailing_space = space_after;
                    }
                }
                continue;
            }

            if !cursor.is_fresh() {
                let next = cursor.new_page();
                self.finish_page(cursor, &ctx, decorator, sink)?;
                cursor = next;
                queue.push_front((index, block));
                continue;
            }

            // Nothing fits even on an empty page: force progress.
            let (head, tail) = block.split_forced(width, cursor.remaining_height(), &ctx)?;
            let head_height = head.measure(width, &ctx)?;
            log::warn!(
                "{} #{} needs {:.1}pt but page {} has {:.1}pt; forcing {:.1}pt onto it",
                block.kind_name(),
                index,
                height,
                cursor.number,
                cursor.content_height,
                head_height
            );
            place(&mut cursor, index, &head, 0.0, head_height, true, &ctx)?;
            match tail {
                Some(tail) => {
                    let next = cursor.new_page();
                    self.finish_page(cursor, &ctx, decorator, sink)?;
                    cursor = next;
                    queue.push_front((index, Cow::Owned(tail)));
                }
                None => {
                    cursor.y += space_after.min(cursor.remaining_height());
                    cursor.trailing_space = space_after;
                }
            }
        }

        let count = cursor.number;
        self.finish_page(cursor, &ctx, decorator, sink)?;
        log::debug!("layout finished: {count} page(s), {} measurements", ctx.cache.len());
        Ok(count)
    }

    fn finish_page(
        &self,
        cursor: PageCursor,
        ctx: &LayoutContext,
        decorator: &mut dyn PageDecorator,
        sink: &mut dyn PageSink,
    ) -> Result<(), LayoutError> {
        let page_ctx = cursor.context();
        let kind = if page_ctx.page_number == 1 {
            PageKind::First
        } else {
            PageKind::Later
        };
        let mut canvas = Canvas::new(ctx.cache.measurer());
        match kind {
            PageKind::First => decorator.on_first_page(&page_ctx, &mut canvas),
            PageKind::Later => decorator.on_later_pages(&page_ctx, &mut canvas),
        }
        let page = cursor.finalize(canvas.into_commands(), decorator.layer(kind));
        log::debug!(
            "page {} finalized: {} placement(s), {:.1}pt used",
            page.number,
            page.placements.len(),
            page.used_height
        );
        sink.emit(page)
    }
}

/// Draw a block at the cursor and record it.
fn place(
    cursor: &mut PageCursor,
    index: usize,
    block: &Block,
    gap: f64,
    height: f64,
    forced: bool,
    ctx: &LayoutContext,
) -> Result<(), LayoutError> {
    cursor.y += gap;
    let top = cursor.content_y + cursor.y;
    let commands = block.draw(cursor.content_x, top, cursor.content_width, ctx)?;
    cursor.commands.extend(commands);
    cursor.placements.push(Placement {
        block_index: index,
        kind: block.kind_name(),
        y: cursor.y,
        height,
        units: block.unit_count(cursor.content_width, ctx)?,
        forced,
    });
    cursor.y += height;
    cursor.trailing_space = 0.0;
    Ok(())
}

/// Check everything that can be checked before layout starts, so
/// configuration errors surface before the first page is emitted.
pub fn validate(
    blocks: &[Block],
    styles: &FrozenStyles,
    geometry: &PageGeometry,
) -> Result<(), LayoutError> {
    geometry.validate()?;
    validate_blocks(blocks, styles, false)
}

fn validate_blocks(blocks: &[Block], styles: &FrozenStyles, in_cell: bool) -> Result<(), LayoutError> {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                let style = styles.resolve(&p.style)?;
                // Markup errors are recoverable; report them once per pass.
                let parsed = parse_markup(&p.markup, &SpanStyle::from_style(style));
                if let Some(err) = parsed.error {
                    log::warn!("paragraph in style `{}`: {err}", p.style);
                }
            }
            Block::Spacer(s) => {
                if !(s.height.is_finite() && s.height >= 0.0) {
                    return Err(LayoutError::InvalidGeometry(format!(
                        "spacer height must be >= 0, got {}",
                        s.height
                    )));
                }
            }
            Block::Rule(r) => {
                if !(r.width_fraction > 0.0 && r.width_fraction <= 1.0) {
                    return Err(LayoutError::InvalidGeometry(format!(
                        "rule width fraction must be in (0, 1], got {}",
                        r.width_fraction
                    )));
                }
                if !(r.thickness.is_finite() && r.thickness > 0.0) {
                    return Err(LayoutError::InvalidGeometry(format!(
                        "rule thickness must be > 0, got {}",
                        r.thickness
                    )));
                }
                if !(r.space_before >= 0.0 && r.space_after >= 0.0) {
                    return Err(LayoutError::InvalidGeometry(
                        "rule spacing must be >= 0".to_string(),
                    ));
                }
            }
            Block::Table(t) => {
                if t.column_widths.is_empty() && !t.rows.is_empty() {
                    return Err(LayoutError::InvalidGeometry(
                        "table has rows but no column widths".to_string(),
                    ));
                }
                if let Some(w) = t
                    .column_widths
                    .iter()
                    .find(|w| !(w.is_finite() && **w > 0.0))
                {
                    return Err(LayoutError::InvalidGeometry(format!(
                        "table column widths must be > 0, got {w}"
                    )));
                }
                for (r, row) in t.rows.iter().enumerate() {
                    if row.len() > t.column_widths.len() {
                        return Err(LayoutError::InvalidTable(format!(
                            "row {r} has {} cells but only {} columns are defined",
                            row.len(),
                            t.column_widths.len()
                        )));
                    }
                    for cell in row {
                        validate_blocks(cell, styles, true)?;
                    }
                }
                for rule in &t.style_rules {
                    validate_table_op(&rule.op)?;
                }
                table::validate(t)?;
            }
            Block::PageBreak if in_cell => {
                log::warn!("page break inside a table cell is ignored");
            }
            Block::PageBreak => {}
        }
    }
    Ok(())
}

fn validate_table_op(op: &TableOp) -> Result<(), LayoutError> {
    let non_negative = |what: &str, v: f64| {
        if v.is_finite() && v >= 0.0 {
            Ok(())
        } else {
            Err(LayoutError::InvalidTable(format!("{what} must be >= 0, got {v}")))
        }
    };
    match op {
        TableOp::RowBackgrounds { colors } if colors.is_empty() => Err(LayoutError::InvalidTable(
            "RowBackgrounds needs at least one color".to_string(),
        )),
        TableOp::Grid { width, .. }
        | TableOp::InnerGrid { width, .. }
        | TableOp::Box { width, .. }
        | TableOp::LineAbove { width, .. }
        | TableOp::LineBelow { width, .. } => non_negative("line width", *width),
        TableOp::Padding {
            top,
            right,
            bottom,
            left,
        } => {
            for v in [top, right, bottom, left].into_iter().flatten() {
                non_negative("padding", *v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
