//! The measure / split / draw contract every block variant implements.
//!
//! All operations are pure functions of the block, the width and the pass's
//! [`LayoutContext`]; none of them mutate the block. Splitting produces new
//! blocks of the same variant.

use std::sync::Arc;

use super::page_break::{decide_break, fits, BreakDecision};
use super::{table, DrawCommand, LayoutContext};
use crate::error::LayoutError;
use crate::model::{Block, Paragraph, Rule, Spacer, WrappedLines};
use crate::text::{layout_paragraph, lines_height, LaidOutLine};

/// Result of a split: the piece placed on the current page (if any) and the
/// piece carried to the next (if any).
pub type SplitResult = (Option<Block>, Option<Block>);

impl Block {
    /// Height of the block if placed whole at `width`, excluding spacing.
    pub fn measure(&self, width: f64, ctx: &LayoutContext) -> Result<f64, LayoutError> {
        match self {
            Block::Paragraph(p) => Ok(lines_height(&p.lines(width, ctx)?)),
            Block::Spacer(s) => Ok(s.height),
            Block::Table(t) => table::measure(t, ctx),
            Block::Rule(r) => Ok(r.thickness),
            Block::PageBreak => Ok(0.0),
        }
    }

    /// Space above and below the block.
    pub fn spacing(&self, ctx: &LayoutContext) -> Result<(f64, f64), LayoutError> {
        match self {
            Block::Paragraph(p) => {
                let style = ctx.styles.resolve(&p.style)?;
                Ok((style.space_before, style.space_after))
            }
            Block::Rule(r) => Ok((r.space_before, r.space_after)),
            Block::Spacer(_) | Block::Table(_) | Block::PageBreak => Ok((0.0, 0.0)),
        }
    }

    /// Fit as much of the block as possible into `available` height.
    ///
    /// Paragraphs split between lines and tables between rows. Spacers and
    /// rules are atomic: they are either placed whole or deferred whole.
    pub fn split(
        &self,
        width: f64,
        available: f64,
        ctx: &LayoutContext,
    ) -> Result<SplitResult, LayoutError> {
        match self {
            Block::Paragraph(p) => p.split(width, available, ctx),
            Block::Table(t) => table::split(t, available, ctx),
            Block::Spacer(_) | Block::Rule(_) => {
                if fits(self.measure(width, ctx)?, available) {
                    Ok((Some(self.clone()), None))
                } else {
                    Ok((None, Some(self.clone())))
                }
            }
            Block::PageBreak => Ok((Some(Block::PageBreak), None)),
        }
    }

    /// Split for a block that does not fit even on an empty page. Always
    /// places something, ignoring orphan and widow minimums: the first line
    /// of a paragraph, the header rows plus one body row of a table.
    pub fn split_forced(
        &self,
        width: f64,
        available: f64,
        ctx: &LayoutContext,
    ) -> Result<(Block, Option<Block>), LayoutError> {
        match self {
            Block::Paragraph(p) => p.split_forced(width, available, ctx),
            Block::Table(t) => table::split_forced(t, available, ctx),
            Block::Spacer(s) => Ok((
                Block::Spacer(Spacer {
                    height: s.height.min(available),
                }),
                None,
            )),
            Block::Rule(_) | Block::PageBreak => Ok((self.clone(), None)),
        }
    }

    /// Draw commands for the block with its top-left corner at `(x, y)`.
    pub fn draw(
        &self,
        x: f64,
        y: f64,
        width: f64,
        ctx: &LayoutContext,
    ) -> Result<Vec<DrawCommand>, LayoutError> {
        match self {
            Block::Paragraph(p) => Ok(draw_lines(&p.lines(width, ctx)?, x, y)),
            Block::Table(t) => table::draw(t, x, y, width, ctx),
            Block::Rule(r) => Ok(vec![draw_rule(r, x, y, width)]),
            Block::Spacer(_) | Block::PageBreak => Ok(Vec::new()),
        }
    }

    /// Number of lines (paragraph) or rows (table) the block holds.
    pub fn unit_count(&self, width: f64, ctx: &LayoutContext) -> Result<usize, LayoutError> {
        match self {
            Block::Paragraph(p) => Ok(p.lines(width, ctx)?.len()),
            Block::Table(t) => Ok(t.rows.len()),
            _ => Ok(0),
        }
    }

    /// A copy of the block with its expensive layout done once for this pass,
    /// or `None` if there is nothing to cache.
    pub(crate) fn prepare(&self, width: f64, ctx: &LayoutContext) -> Result<Option<Block>, LayoutError> {
        match self {
            Block::Paragraph(p) if !p.has_lines_for(width) => {
                let lines = p.lines(width, ctx)?;
                Ok(Some(Block::Paragraph(Paragraph {
                    wrapped: Some(WrappedLines {
                        lines,
                        width,
                        partial: false,
                    }),
                    ..p.clone()
                })))
            }
            _ => Ok(None),
        }
    }
}

impl Paragraph {
    fn has_lines_for(&self, width: f64) -> bool {
        self.wrapped
            .as_ref()
            .is_some_and(|w| w.partial || w.width == width)
    }

    /// The wrapped lines, reusing the cached ones when they match `width`.
    fn lines(&self, width: f64, ctx: &LayoutContext) -> Result<Arc<[LaidOutLine]>, LayoutError> {
        if let Some(wrapped) = &self.wrapped {
            if wrapped.partial || wrapped.width == width {
                return Ok(Arc::clone(&wrapped.lines));
            }
        }
        let style = ctx.styles.resolve(&self.style)?;
        Ok(layout_paragraph(&self.markup, style, width, &ctx.cache)?.into())
    }

    fn split(&self, width: f64, available: f64, ctx: &LayoutContext) -> Result<SplitResult, LayoutError> {
        let lines = self.lines(width, ctx)?;
        let heights: Vec<f64> = lines.iter().map(|l| l.height).collect();
        let style = ctx.styles.resolve(&self.style)?;
        match decide_break(
            available,
            &heights,
            true,
            style.orphans as usize,
            style.widows as usize,
        ) {
            BreakDecision::Place => Ok((Some(Block::Paragraph(self.clone())), None)),
            BreakDecision::MoveToNextPage => Ok((None, Some(Block::Paragraph(self.clone())))),
            BreakDecision::Split {
                items_on_current_page,
            } => {
                let (head, tail) = self.split_at(&lines, items_on_current_page, width);
                Ok((Some(head), Some(tail)))
            }
        }
    }

    fn split_forced(
        &self,
        width: f64,
        available: f64,
        ctx: &LayoutContext,
    ) -> Result<(Block, Option<Block>), LayoutError> {
        let lines = self.lines(width, ctx)?;
        let mut running = 0.0;
        let fitting = lines
            .iter()
            .take_while(|l| {
                running += l.height;
                fits(running, available)
            })
            .count();
        let count = fitting.max(1);
        if count >= lines.len() {
            return Ok((Block::Paragraph(self.clone()), None));
        }
        let (head, tail) = self.split_at(&lines, count, width);
        Ok((head, Some(tail)))
    }

    /// Head with the first `count` lines, tail with the rest moved up so its
    /// first line starts at the top.
    fn split_at(&self, lines: &[LaidOutLine], count: usize, width: f64) -> (Block, Block) {
        let shift = lines_height(&lines[..count]);
        let tail: Vec<LaidOutLine> = lines[count..]
            .iter()
            .map(|line| LaidOutLine {
                baseline_y_offset: line.baseline_y_offset - shift,
                ..line.clone()
            })
            .collect();
        (
            Block::Paragraph(self.piece(lines[..count].to_vec(), width)),
            Block::Paragraph(self.piece(tail, width)),
        )
    }

    fn piece(&self, lines: Vec<LaidOutLine>, width: f64) -> Paragraph {
        Paragraph {
            markup: self.markup.clone(),
            style: self.style.clone(),
            wrapped: Some(WrappedLines {
                lines: lines.into(),
                width,
                partial: true,
            }),
        }
    }
}

fn draw_lines(lines: &[LaidOutLine], x: f64, y: f64) -> Vec<DrawCommand> {
    lines
        .iter()
        .flat_map(|line| {
            line.spans.iter().map(move |span| DrawCommand::Text {
                x: x + span.x,
                y: y + line.baseline_y_offset,
                text: span.text.clone(),
                style: span.style.clone(),
            })
        })
        .collect()
}

fn draw_rule(rule: &Rule, x: f64, y: f64, width: f64) -> DrawCommand {
    let length = width * rule.width_fraction;
    let x1 = x + (width - length) / 2.0;
    let mid = y + rule.thickness / 2.0;
    DrawCommand::Line {
        x1,
        y1: mid,
        x2: x1 + length,
        y2: mid,
        width: rule.thickness,
        color: rule.color,
    }
}

/// Vertical positions of a block sequence stacked in a frame of unbounded
/// height (a table cell): `(index, top, height)` per block plus the total.
/// Spacing collapses as on a page; the first block's space-before and the
/// last block's space-after are dropped. Page breaks have no effect here.
pub(crate) fn stack(
    blocks: &[Block],
    width: f64,
    ctx: &LayoutContext,
) -> Result<(Vec<(usize, f64, f64)>, f64), LayoutError> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut y = 0.0;
    let mut previous_after: Option<f64> = None;
    for (i, block) in blocks.iter().enumerate() {
        if let Block::PageBreak = block {
            continue;
        }
        let (before, after) = block.spacing(ctx)?;
        if let Some(prev) = previous_after {
            y += prev + (before - prev).max(0.0);
        }
        let height = block.measure(width, ctx)?;
        out.push((i, y, height));
        y += height;
        previous_after = Some(after);
    }
    Ok((out, y))
}

/// Draw a stacked block sequence with its top-left corner at `(x, y)`.
pub(crate) fn draw_stack(
    blocks: &[Block],
    x: f64,
    y: f64,
    width: f64,
    ctx: &LayoutContext,
) -> Result<Vec<DrawCommand>, LayoutError> {
    let (positions, _) = stack(blocks, width, ctx)?;
    let mut commands = Vec::new();
    for (i, top, _) in positions {
        commands.extend(blocks[i].draw(x, y + top, width, ctx)?);
    }
    Ok(commands)
}
