//! # Table Layout
//!
//! Column widths are fixed by the caller; only row heights are computed.
//! A row is as tall as its tallest cell, where each cell is a block sequence
//! stacked at its column's width minus padding.
//!
//! Style rules are applied in layers: background fills first, then grid
//! lines, then cell content. Within a layer later rules paint over earlier
//! ones, and per-cell settings (padding, vertical alignment) resolve to the
//! last rule covering the cell.
//!
//! Tables split only between rows. Every fragment after the first starts
//! with the table's repeated header rows, and the style rules are re-indexed
//! so each fragment renders like the corresponding part of the whole table.

use super::block::{draw_stack, stack};
use super::page_break::{decide_break, fits, BreakDecision};
use super::{DrawCommand, LayoutContext};
use crate::error::LayoutError;
use crate::model::{Block, CellRange, Edges, HAlign, Table, TableOp, TableRule, VAlign};
use crate::style::Color;

/// Cell padding when no rule sets it.
pub const DEFAULT_PADDING: Edges = Edges {
    top: 3.0,
    right: 6.0,
    bottom: 3.0,
    left: 6.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CellFormat {
    padding: Edges,
    valign: VAlign,
}

impl Default for CellFormat {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            valign: VAlign::Top,
        }
    }
}

/// Header rows actually repeated: never the whole table.
fn repeat_count(table: &Table) -> usize {
    table.repeat_rows.min(table.rows.len().saturating_sub(1))
}

/// Resolve per-cell formats, `[row][column]`, last rule wins.
fn cell_formats(table: &Table) -> Vec<Vec<CellFormat>> {
    let columns = table.column_widths.len();
    let rows = table.rows.len();
    let mut formats = vec![vec![CellFormat::default(); columns]; rows];

    for rule in &table.style_rules {
        let Some((c0, r0, c1, r1)) = rule.range.resolve(columns, rows) else {
            continue;
        };
        for row in &mut formats[r0..=r1] {
            for format in &mut row[c0..=c1] {
                match &rule.op {
                    TableOp::Padding {
                        top,
                        right,
                        bottom,
                        left,
                    } => {
                        let p = &mut format.padding;
                        p.top = top.unwrap_or(p.top);
                        p.right = right.unwrap_or(p.right);
                        p.bottom = bottom.unwrap_or(p.bottom);
                        p.left = left.unwrap_or(p.left);
                    }
                    TableOp::VAlign { align } => format.valign = *align,
                    _ => {}
                }
            }
        }
    }
    formats
}

/// Every cell must keep some width for content once its padding is taken.
pub(crate) fn validate(table: &Table) -> Result<(), LayoutError> {
    for (r, row) in cell_formats(table).iter().enumerate() {
        for (c, format) in row.iter().enumerate() {
            let padding = format.padding.horizontal();
            if table.column_widths[c] <= padding {
                return Err(LayoutError::InvalidGeometry(format!(
                    "column {c} is {}pt wide but the cell in row {r} is padded by {padding}pt",
                    table.column_widths[c]
                )));
            }
        }
    }
    Ok(())
}

/// Height of every row.
pub fn row_heights(table: &Table, ctx: &LayoutContext) -> Result<Vec<f64>, LayoutError> {
    let formats = cell_formats(table);
    let mut heights = Vec::with_capacity(table.rows.len());
    for (r, row) in table.rows.iter().enumerate() {
        let mut height: f64 = 0.0;
        for (c, &column_width) in table.column_widths.iter().enumerate() {
            let format = &formats[r][c];
            let cell = row.get(c).map(Vec::as_slice).unwrap_or(&[]);
            let inner_width = column_width - format.padding.horizontal();
            let (_, content) = stack(cell, inner_width, ctx)?;
            height = height.max(content + format.padding.vertical());
        }
        heights.push(height);
    }
    Ok(heights)
}

pub fn measure(table: &Table, ctx: &LayoutContext) -> Result<f64, LayoutError> {
    Ok(row_heights(table, ctx)?.iter().sum())
}

/// Split between rows so the first fragment fits `available`. The first
/// fragment always carries at least one row beyond the header rows.
pub fn split(
    table: &Table,
    available: f64,
    ctx: &LayoutContext,
) -> Result<(Option<Block>, Option<Block>), LayoutError> {
    let heights = row_heights(table, ctx)?;
    let header = repeat_count(table);
    match decide_break(available, &heights, true, header + 1, 1) {
        BreakDecision::Place => Ok((Some(Block::Table(table.clone())), None)),
        BreakDecision::MoveToNextPage => Ok((None, Some(Block::Table(table.clone())))),
        BreakDecision::Split {
            items_on_current_page,
        } => {
            let (head, tail) = split_at(table, items_on_current_page);
            Ok((Some(Block::Table(head)), Some(Block::Table(tail))))
        }
    }
}

/// Split for a table that does not fit on an empty page: as many rows as
/// fit, but never fewer than the header rows plus one.
pub fn split_forced(
    table: &Table,
    available: f64,
    ctx: &LayoutContext,
) -> Result<(Block, Option<Block>), LayoutError> {
    let heights = row_heights(table, ctx)?;
    let mut running = 0.0;
    let fitting = heights
        .iter()
        .take_while(|h| {
            running += **h;
            fits(running, available)
        })
        .count();
    let count = fitting.max(repeat_count(table) + 1);
    if count >= table.rows.len() {
        return Ok((Block::Table(table.clone()), None));
    }
    let (head, tail) = split_at(table, count);
    Ok((Block::Table(head), Some(Block::Table(tail))))
}

/// First `count` rows, and the header rows followed by the rest.
fn split_at(table: &Table, count: usize) -> (Table, Table) {
    let header = repeat_count(table);
    let head: Vec<usize> = (0..count).collect();
    let tail: Vec<usize> = (0..header).chain(count..table.rows.len()).collect();
    (fragment(table, &head), fragment(table, &tail))
}

/// A table made of the given original rows, with style rules re-indexed.
fn fragment(table: &Table, kept: &[usize]) -> Table {
    Table {
        rows: kept.iter().map(|&r| table.rows[r].clone()).collect(),
        column_widths: table.column_widths.clone(),
        style_rules: remap_rules(table, kept),
        repeat_rows: table.repeat_rows,
        align: table.align,
    }
}

/// Re-express every rule against the rows of a fragment. A rule covering
/// rows that end up in separate runs (header copy and body) becomes one rule
/// per run; row-background cycles keep their phase.
fn remap_rules(table: &Table, kept: &[usize]) -> Vec<TableRule> {
    let columns = table.column_widths.len();
    let rows = table.rows.len();
    let mut out = Vec::new();

    for rule in &table.style_rules {
        let Some((c0, r0, c1, r1)) = rule.range.resolve(columns, rows) else {
            continue;
        };
        let mut i = 0;
        while i < kept.len() {
            if !(r0..=r1).contains(&kept[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i + 1 < kept.len() && kept[i + 1] == kept[i] + 1 && kept[i + 1] <= r1 {
                i += 1;
            }
            let op = match &rule.op {
                TableOp::RowBackgrounds { colors } if !colors.is_empty() => {
                    let mut colors = colors.clone();
                    let phase = (kept[start] - r0) % colors.len();
                    colors.rotate_left(phase);
                    TableOp::RowBackgrounds { colors }
                }
                other => other.clone(),
            };
            out.push(TableRule {
                range: CellRange::new((c0 as i32, start as i32), (c1 as i32, i as i32)),
                op,
            });
            i += 1;
        }
    }
    out
}

/// Column left edges and row top edges in page coordinates, each with a
/// trailing entry for the far edge.
struct Grid {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Grid {
    fn new(x: f64, y: f64, widths: &[f64], heights: &[f64]) -> Self {
        let edges = |start: f64, sizes: &[f64]| {
            let mut edges = Vec::with_capacity(sizes.len() + 1);
            let mut pos = start;
            edges.push(pos);
            for size in sizes {
                pos += size;
                edges.push(pos);
            }
            edges
        };
        Self {
            xs: edges(x, widths),
            ys: edges(y, heights),
        }
    }

    fn rect(&self, c0: usize, r0: usize, c1: usize, r1: usize, color: Color) -> DrawCommand {
        DrawCommand::FillRect {
            x: self.xs[c0],
            y: self.ys[r0],
            width: self.xs[c1 + 1] - self.xs[c0],
            height: self.ys[r1 + 1] - self.ys[r0],
            color,
        }
    }

    fn hline(&self, row_edge: usize, c0: usize, c1: usize, width: f64, color: Color) -> DrawCommand {
        let y = self.ys[row_edge];
        DrawCommand::Line {
            x1: self.xs[c0],
            y1: y,
            x2: self.xs[c1 + 1],
            y2: y,
            width,
            color,
        }
    }

    fn vline(&self, col_edge: usize, r0: usize, r1: usize, width: f64, color: Color) -> DrawCommand {
        let x = self.xs[col_edge];
        DrawCommand::Line {
            x1: x,
            y1: self.ys[r0],
            x2: x,
            y2: self.ys[r1 + 1],
            width,
            color,
        }
    }

    fn inner(&self, c0: usize, r0: usize, c1: usize, r1: usize, w: f64, color: Color) -> Vec<DrawCommand> {
        let mut lines: Vec<DrawCommand> = (r0 + 1..=r1)
            .map(|edge| self.hline(edge, c0, c1, w, color))
            .collect();
        lines.extend((c0 + 1..=c1).map(|edge| self.vline(edge, r0, r1, w, color)));
        lines
    }

    fn outline(&self, c0: usize, r0: usize, c1: usize, r1: usize, w: f64, color: Color) -> Vec<DrawCommand> {
        vec![
            self.hline(r0, c0, c1, w, color),
            self.hline(r1 + 1, c0, c1, w, color),
            self.vline(c0, r0, r1, w, color),
            self.vline(c1 + 1, r0, r1, w, color),
        ]
    }
}

/// Draw the table with its frame's top-left corner at `(x, y)`; the table
/// is positioned horizontally within `width` by its alignment.
pub fn draw(
    table: &Table,
    x: f64,
    y: f64,
    width: f64,
    ctx: &LayoutContext,
) -> Result<Vec<DrawCommand>, LayoutError> {
    let columns = table.column_widths.len();
    let rows = table.rows.len();
    let heights = row_heights(table, ctx)?;
    let formats = cell_formats(table);

    let total = table.total_width();
    let slack = width - total;
    if slack < 0.0 {
        log::debug!("table is {:.1}pt wider than its frame", -slack);
    }
    let left = x + match table.align {
        HAlign::Left => 0.0,
        HAlign::Center => slack.max(0.0) / 2.0,
        HAlign::Right => slack.max(0.0),
    };
    let grid = Grid::new(left, y, &table.column_widths, &heights);

    let mut fills = Vec::new();
    let mut lines = Vec::new();
    for rule in &table.style_rules {
        let Some((c0, r0, c1, r1)) = rule.range.resolve(columns, rows) else {
            continue;
        };
        match &rule.op {
            TableOp::Background { color } => fills.push(grid.rect(c0, r0, c1, r1, *color)),
            TableOp::RowBackgrounds { colors } if !colors.is_empty() => {
                for r in r0..=r1 {
                    fills.push(grid.rect(c0, r, c1, r, colors[(r - r0) % colors.len()]));
                }
            }
            TableOp::Grid { width, color } if *width > 0.0 => {
                lines.extend(grid.inner(c0, r0, c1, r1, *width, *color));
                lines.extend(grid.outline(c0, r0, c1, r1, *width, *color));
            }
            TableOp::InnerGrid { width, color } if *width > 0.0 => {
                lines.extend(grid.inner(c0, r0, c1, r1, *width, *color));
            }
            TableOp::Box { width, color } if *width > 0.0 => {
                lines.extend(grid.outline(c0, r0, c1, r1, *width, *color));
            }
            TableOp::LineAbove { width, color } if *width > 0.0 => {
                lines.extend((r0..=r1).map(|r| grid.hline(r, c0, c1, *width, *color)));
            }
            TableOp::LineBelow { width, color } if *width > 0.0 => {
                lines.extend((r0..=r1).map(|r| grid.hline(r + 1, c0, c1, *width, *color)));
            }
            _ => {}
        }
    }

    let mut commands = fills;
    commands.append(&mut lines);

    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let format = &formats[r][c];
            let pad = &format.padding;
            let inner_width = table.column_widths[c] - pad.horizontal();
            let (_, content) = stack(cell, inner_width, ctx)?;
            let room = heights[r] - pad.vertical();
            let offset = match format.valign {
                VAlign::Top => 0.0,
                VAlign::Middle => ((room - content) / 2.0).max(0.0),
                VAlign::Bottom => (room - content).max(0.0),
            };
            commands.extend(draw_stack(
                cell,
                grid.xs[c] + pad.left,
                grid.ys[r] + pad.top + offset,
                inner_width,
                ctx,
            )?);
        }
    }

    Ok(commands)
}
