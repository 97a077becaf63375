//! Integration tests for the pageflow layout pipeline.
//!
//! These tests exercise the full path from blocks (or JSON) to decorated
//! pages. They verify:
//! - Pages are numbered 1, 2, 3... and nothing is lost or duplicated
//! - Content never runs past the bottom margin unless forced
//! - Paragraphs split between lines and tables between rows
//! - Oversized content still makes progress
//! - Decoration callbacks run once per page, in order
//! - Configuration errors surface before any page is emitted

use pageflow::font::{MonospaceMeasurer, SpanStyle, TextMeasurer, TextMetrics};
use pageflow::layout::decoration::{cover_page, DecorationLayer, PageKind};
use pageflow::layout::LayoutContext;
use pageflow::model::*;
use pageflow::style::*;
use pageflow::*;

// ─── Helpers ────────────────────────────────────────────────────

const MARGIN: f64 = 30.0;
const CONTENT_WIDTH: f64 = 340.0;

/// A page whose usable area is 340pt wide and `content_height` tall.
fn geometry(content_height: f64) -> PageGeometry {
    PageGeometry::new(
        PageSize::Custom {
            width: CONTENT_WIDTH + 2.0 * MARGIN,
            height: content_height + 2.0 * MARGIN,
        },
        Edges::uniform(MARGIN),
    )
}

fn style(leading: f64, alignment: Alignment) -> Style {
    Style {
        size: 10.0,
        leading,
        alignment,
        ..Style::default()
    }
}

/// Body (12pt lines), Justified, Tall (one line = 200pt), Cell, Spaced,
/// Lead (20pt lines after 15pt of space).
fn styles() -> FrozenStyles {
    let mut registry = StyleRegistry::new();
    registry.register("Body", style(12.0, Alignment::Left)).unwrap();
    registry
        .register("Justified", style(12.0, Alignment::Justify))
        .unwrap();
    registry.register("Tall", style(200.0, Alignment::Left)).unwrap();
    registry.register("Cell", style(14.0, Alignment::Left)).unwrap();
    registry
        .register(
            "Spaced",
            Style {
                space_before: 8.0,
                space_after: 6.0,
                ..style(12.0, Alignment::Left)
            },
        )
        .unwrap();
    registry
        .register(
            "Lead",
            Style {
                space_before: 15.0,
                ..style(20.0, Alignment::Left)
            },
        )
        .unwrap();
    registry.freeze()
}

fn make_paragraph(text: &str, style: &str) -> Block {
    Block::paragraph(text, style)
}

/// `n` distinct words, `w0 w1 w2 ...`.
fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

fn make_table(header: &[&str], rows: Vec<Vec<&str>>) -> Table {
    let cell = |t: &str| vec![make_paragraph(t, "Cell")];
    let mut all = vec![header.iter().map(|t| cell(*t)).collect::<Vec<_>>()];
    all.extend(
        rows.into_iter()
            .map(|r| r.into_iter().map(cell).collect::<Vec<_>>()),
    );
    Table::new(all, vec![120.0; header.len()])
        .with_repeat_rows(1)
        .with_rules(vec![
            TableRule::new(
                CellRange::row(0),
                TableOp::Background {
                    color: palette::blue(),
                },
            ),
            TableRule::new(
                CellRange::rows_from(1),
                TableOp::RowBackgrounds {
                    colors: vec![Color::WHITE, palette::slate_bg()],
                },
            ),
            TableRule::new(
                CellRange::all(),
                TableOp::Grid {
                    width: 0.5,
                    color: palette::border(),
                },
            ),
        ])
}

fn layout_blocks(blocks: &[Block], content_height: f64) -> Vec<Page> {
    let measurer = MonospaceMeasurer::default();
    layout(
        blocks,
        &styles(),
        &geometry(content_height),
        &measurer,
        &mut NoDecoration,
    )
    .unwrap()
}

fn all_words(pages: &[Page]) -> Vec<String> {
    pages
        .iter()
        .flat_map(|p| {
            p.text()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn assert_no_overflow(pages: &[Page], content_height: f64) {
    for page in pages.iter().filter(|p| !p.has_forced_placement()) {
        assert!(
            page.used_height <= content_height + 1e-6,
            "page {} uses {} of {}",
            page.number,
            page.used_height,
            content_height
        );
        let placed: f64 = page.placements.iter().map(|p| p.height).sum();
        assert!(placed <= content_height + 1e-6);
    }
}

// ─── Pagination ─────────────────────────────────────────────────

#[test]
fn test_three_tall_paragraphs_on_500pt_pages() {
    let blocks = vec![
        make_paragraph("one", "Tall"),
        make_paragraph("two", "Tall"),
        make_paragraph("three", "Tall"),
    ];
    let measurer = MonospaceMeasurer::default();
    let mut first_calls = 0;
    let mut later_calls = Vec::new();
    let pages = {
        let mut deco = Decorations::new(
            |_: &PageContext, _: &mut Canvas<'_>| first_calls += 1,
            |page: &PageContext, canvas: &mut Canvas<'_>| {
                later_calls.push(page.page_number);
                canvas.draw_string(MARGIN, page.height() - 10.0, "later");
            },
        );
        layout(&blocks, &styles(), &geometry(500.0), &measurer, &mut deco).unwrap()
    };

    assert_eq!(pages.len(), 2);
    let indices = |p: &Page| p.placements.iter().map(|x| x.block_index).collect::<Vec<_>>();
    assert_eq!(indices(&pages[0]), vec![0, 1]);
    assert_eq!(indices(&pages[1]), vec![2]);
    assert_eq!(pages[0].used_height, 400.0);
    assert_eq!(first_calls, 1);
    assert_eq!(later_calls, vec![2], "onLaterPages runs exactly once");
    assert!(
        pages[1].text().contains("later"),
        "furniture is part of page 2 when it is emitted"
    );
}

#[test]
fn test_page_numbers_increase_by_one() {
    let blocks: Vec<Block> = (0..40)
        .map(|i| make_paragraph(&format!("paragraph {i} {}", words(20)), "Body"))
        .collect();
    let pages = layout_blocks(&blocks, 120.0);
    assert!(pages.len() > 3, "expected several pages, got {}", pages.len());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.number, i + 1);
    }
}

#[test]
fn test_content_is_conserved_across_pages() {
    let expected: Vec<String> = words(400).split(' ').map(str::to_string).collect();
    let (first, second) = expected.split_at(200);
    let blocks = vec![
        make_paragraph(&first.join(" "), "Justified"),
        Block::spacer(30.0),
        make_paragraph(&second.join(" "), "Spaced"),
    ];
    let pages = layout_blocks(&blocks, 100.0);
    assert!(pages.len() > 2);
    assert_eq!(all_words(&pages), expected);
}

#[test]
fn test_no_overflow_with_mixed_blocks() {
    let rows: Vec<Vec<&str>> = (0..25).map(|_| vec!["cell", "value"]).collect();
    let mut blocks = Vec::new();
    for i in 0..6 {
        blocks.push(make_paragraph(&words(60 + i * 7), "Spaced"));
        blocks.push(Block::Rule(Rule {
            width_fraction: 0.5,
            thickness: 1.0,
            color: palette::blue(),
            space_before: 4.0,
            space_after: 4.0,
        }));
        blocks.push(Block::spacer(17.0));
    }
    blocks.push(Block::Table(make_table(&["Name", "Value"], rows)));
    let pages = layout_blocks(&blocks, 150.0);
    assert!(pages.len() > 5);
    assert!(pages.iter().all(|p| !p.has_forced_placement()));
    assert_no_overflow(&pages, 150.0);
}

#[test]
fn test_paragraph_splits_only_between_lines() {
    // 30 lines of 12pt on a 100pt page: 8 lines per page.
    let text = (0..30).map(|i| format!("line{i}")).collect::<Vec<_>>().join("<br/>");
    let pages = layout_blocks(&[make_paragraph(&text, "Body")], 100.0);
    assert_eq!(pages.len(), 4);
    assert_eq!(pages[0].placements[0].units, 8);
    assert_eq!(pages[3].placements[0].units, 6);
    // A line is never cut: each page's text is whole lines.
    let page_two: Vec<&str> = pages[1]
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(page_two.first(), Some(&"line8"));
}

#[test]
fn test_space_before_moves_block_when_no_line_fits() {
    // 20pt left: the line alone would fit, but not after 15pt of space.
    let blocks = vec![Block::spacer(80.0), make_paragraph("x", "Lead")];
    let pages = layout_blocks(&blocks, 100.0);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].used_height, 80.0);
    assert_eq!(pages[0].placements.len(), 1);
    let moved = &pages[1].placements[0];
    assert_eq!(moved.block_index, 1);
    assert_eq!(moved.y, 0.0, "space-before is dropped at the top of a page");
    assert!(!moved.forced);
}

// ─── Breaks ─────────────────────────────────────────────────────

#[test]
fn test_lone_explicit_break_yields_two_pages() {
    let measurer = MonospaceMeasurer::default();
    let mut firsts = Vec::new();
    let mut laters = Vec::new();
    let pages = {
        let mut deco = Decorations::new(
            |p: &PageContext, c: &mut Canvas<'_>| {
                firsts.push(p.page_number);
                c.line(0.0, 10.0, p.width(), 10.0);
            },
            |p: &PageContext, c: &mut Canvas<'_>| {
                laters.push(p.page_number);
                c.line(0.0, 10.0, p.width(), 10.0);
            },
        );
        layout(
            &[Block::page_break()],
            &styles(),
            &geometry(100.0),
            &measurer,
            &mut deco,
        )
        .unwrap()
    };
    assert_eq!(pages.len(), 2);
    assert!(pages[0].placements.is_empty(), "first page has no content");
    assert_eq!(pages[0].commands.len(), 1, "but it is decorated");
    assert_eq!(firsts, vec![1]);
    assert_eq!(laters, vec![2]);
}

#[test]
fn test_explicit_break_ignores_remaining_space() {
    let blocks = vec![
        make_paragraph("Page 1", "Body"),
        Block::page_break(),
        make_paragraph("Page 2", "Body"),
        Block::page_break(),
        make_paragraph("Page 3", "Body"),
    ];
    let pages = layout_blocks(&blocks, 500.0);
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].text(), "Page 3");
}

// ─── Forced Progress ────────────────────────────────────────────

#[test]
fn test_word_wider_than_page_still_terminates() {
    let giant = "x".repeat(200); // 1000pt wide
    let pages = layout_blocks(&[make_paragraph(&format!("a {giant} b"), "Body")], 100.0);
    assert_eq!(pages.len(), 1);
    assert_eq!(all_words(&pages), vec!["a".to_string(), giant, "b".to_string()]);
}

#[test]
fn test_line_taller_than_page_is_forced() {
    let blocks = vec![
        make_paragraph("before", "Body"),
        make_paragraph("huge", "Tall"),
        make_paragraph("after", "Body"),
    ];
    let pages = layout_blocks(&blocks, 100.0);
    assert_eq!(pages.len(), 3);
    assert!(!pages[0].has_forced_placement());
    assert!(pages[1].has_forced_placement());
    assert_eq!(pages[1].text(), "huge");
    assert_eq!(pages[2].text(), "after");
}

#[test]
fn test_row_taller_than_page_is_placed_alone() {
    let tall_cell = (0..20).map(|i| format!("r{i}")).collect::<Vec<_>>().join("<br/>");
    let mut table = make_table(&["Head"], vec![vec!["short"]]);
    table.rows.push(vec![vec![make_paragraph(&tall_cell, "Cell")]]);
    table.rows.push(vec![vec![make_paragraph("last", "Cell")]]);
    let pages = layout_blocks(&[Block::Table(table)], 150.0);

    // Row 3 is 20 * 14 + 6 = 286pt: it gets a page of its own (after the
    // repeated header) and the following row moves on.
    assert_eq!(pages.len(), 3);
    assert!(pages[1].has_forced_placement());
    assert!(pages[1].text().starts_with("Head r0"));
    assert_eq!(pages[2].text(), "Head last");
}

// ─── Tables ─────────────────────────────────────────────────────

#[test]
fn test_table_splits_at_row_boundaries() {
    let labels: Vec<String> = (0..30).map(|i| format!("row{i}")).collect();
    let rows: Vec<Vec<&str>> = labels.iter().map(|l| vec![l.as_str(), "v"]).collect();
    let table = make_table(&["Name", "Value"], rows);
    let pages = layout_blocks(&[Block::Table(table.clone())], 200.0);
    assert!(pages.len() > 1);

    // Every row appears exactly once, whole, and every page after the first
    // starts with the repeated header.
    let found: Vec<String> = all_words(&pages)
        .into_iter()
        .filter(|w| w.starts_with("row"))
        .collect();
    assert_eq!(found, labels);
    for page in &pages[1..] {
        assert!(page.text().starts_with("Name Value"), "page {}", page.number);
    }
    assert_no_overflow(&pages, 200.0);

    // The remainder keeps the same column widths.
    let styles = styles();
    let measurer = MonospaceMeasurer::default();
    let ctx = LayoutContext::new(&styles, &measurer);
    let (head, tail) = Block::Table(table.clone()).split(CONTENT_WIDTH, 200.0, &ctx).unwrap();
    assert!(head.is_some());
    match tail {
        Some(Block::Table(rest)) => assert_eq!(rest.column_widths, table.column_widths),
        other => panic!("expected a remainder table, got {other:?}"),
    }
}

#[test]
fn test_table_paints_backgrounds_under_grid_under_text() {
    let table = make_table(&["A", "B"], vec![vec!["1", "2"]]);
    let pages = layout_blocks(&[Block::Table(table)], 300.0);
    let commands = &pages[0].commands;
    let first_line = commands
        .iter()
        .position(|c| matches!(c, DrawCommand::Line { .. }))
        .unwrap();
    let first_text = commands
        .iter()
        .position(|c| matches!(c, DrawCommand::Text { .. }))
        .unwrap();
    let last_fill = commands
        .iter()
        .rposition(|c| matches!(c, DrawCommand::FillRect { .. }))
        .unwrap();
    assert!(last_fill < first_line && first_line < first_text);
}

// ─── Justification ──────────────────────────────────────────────

#[test]
fn test_single_justified_line_is_left_aligned() {
    let pages = layout_blocks(&[make_paragraph("only one short line", "Justified")], 100.0);
    let texts: Vec<(f64, &str)> = pages[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Text { x, text, .. } => Some((*x, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec![(MARGIN, "only one short line")]);
}

#[test]
fn test_justified_lines_reach_the_right_margin() {
    let pages = layout_blocks(&[make_paragraph(&words(80), "Justified")], 400.0);
    let first_baseline = MARGIN + 10.0;
    let right_edge = pages[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Text { x, y, text, style } if *y == first_baseline => {
                Some(x + text.chars().count() as f64 * 0.5 * style.size)
            }
            _ => None,
        })
        .fold(0.0, f64::max);
    assert!((right_edge - (MARGIN + CONTENT_WIDTH)).abs() < 1e-6, "got {right_edge}");
}

// ─── Errors ─────────────────────────────────────────────────────

#[test]
fn test_unknown_style_fails_before_any_page() {
    let measurer = MonospaceMeasurer::default();
    let mut calls = 0;
    let mut sink: Vec<Page> = Vec::new();
    let result = {
        let mut deco = Decorations::new(
            |_: &PageContext, _: &mut Canvas<'_>| calls += 1,
            |_: &PageContext, _: &mut Canvas<'_>| {},
        );
        LayoutEngine::new(geometry(100.0)).layout_into(
            &[make_paragraph("fine", "Body"), make_paragraph("oops", "Heading9")],
            &styles(),
            &measurer,
            &mut deco,
            &mut sink,
        )
    };
    match result {
        Err(LayoutError::UnknownStyle { name }) => assert_eq!(name, "Heading9"),
        other => panic!("expected UnknownStyle, got {other:?}"),
    }
    assert!(sink.is_empty());
    assert_eq!(calls, 0);
}

#[test]
fn test_invalid_geometry_is_rejected() {
    let measurer = MonospaceMeasurer::default();
    let bad = PageGeometry::new(
        PageSize::Custom {
            width: 100.0,
            height: 100.0,
        },
        Edges::uniform(60.0),
    );
    let err = layout(&[], &styles(), &bad, &measurer, &mut NoDecoration).unwrap_err();
    assert!(matches!(err, LayoutError::InvalidGeometry(_)));
}

#[test]
fn test_row_wider_than_columns_is_rejected() {
    let mut table = make_table(&["A"], vec![]);
    table.rows.push(vec![vec![], vec![]]);
    let measurer = MonospaceMeasurer::default();
    let err = layout(
        &[Block::Table(table)],
        &styles(),
        &geometry(100.0),
        &measurer,
        &mut NoDecoration,
    )
    .unwrap_err();
    assert!(matches!(err, LayoutError::InvalidTable(_)));
}

#[test]
fn test_malformed_markup_degrades_gracefully() {
    let pages = layout_blocks(
        &[make_paragraph("start <b>never closed", "Body"), make_paragraph("next", "Body")],
        100.0,
    );
    assert_eq!(all_words(&pages), vec!["start", "never", "closed", "next"]);
    let any_bold = pages[0].commands.iter().any(|c| matches!(
        c,
        DrawCommand::Text { style, .. } if style.bold
    ));
    assert!(!any_bold, "unterminated emphasis is demoted to plain text");
}

struct NanMeasurer;

impl TextMeasurer for NanMeasurer {
    fn measure(&self, _text: &str, _style: &SpanStyle) -> TextMetrics {
        TextMetrics {
            width: f64::NAN,
            line_height: 12.0,
        }
    }
}

#[test]
fn test_unmeasurable_content_aborts() {
    let err = layout(
        &[make_paragraph("anything", "Body")],
        &styles(),
        &geometry(100.0),
        &NanMeasurer,
        &mut NoDecoration,
    )
    .unwrap_err();
    assert!(matches!(err, LayoutError::UnmeasurableContent { .. }));
}

// ─── Decoration ─────────────────────────────────────────────────

#[test]
fn test_cover_page_stays_bare_and_footers_number_later_pages() {
    let styles = StyleRegistry::with_defaults().freeze();
    let measurer = MonospaceMeasurer::default();
    let blocks = vec![
        make_paragraph("Product Overview", "CoverTitle"),
        Block::page_break(),
        make_paragraph("1. Introduction", "H1"),
        make_paragraph(&words(300), "Body"),
    ];
    let mut deco = Decorations::new(cover_page, |page: &PageContext, canvas: &mut Canvas<'_>| {
        canvas.set_stroke_color(palette::blue());
        canvas.set_line_width(2.0);
        canvas.line(0.0, 3.0, page.width(), 3.0);
        canvas.set_font("Helvetica", 8.0);
        canvas.set_fill_color(palette::slate_light());
        canvas.draw_centred_string(
            page.width() / 2.0,
            page.height() - 12.0,
            &format!("Page {}", page.page_number),
        );
    })
    .with_layer(PageKind::Later, DecorationLayer::Above);
    let pages = layout(&blocks, &styles, &geometry(300.0), &measurer, &mut deco).unwrap();

    assert!(pages.len() >= 3);
    assert_eq!(pages[0].text(), "Product Overview");
    for page in &pages[1..] {
        assert!(
            page.text().ends_with(&format!("Page {}", page.number)),
            "footer drawn above content on page {}",
            page.number
        );
    }
}

#[test]
fn test_decoration_below_content_by_default() {
    let measurer = MonospaceMeasurer::default();
    let mut deco = Decorations::new(
        |_: &PageContext, c: &mut Canvas<'_>| c.fill_rect(0.0, 0.0, 10.0, 10.0),
        |_: &PageContext, _: &mut Canvas<'_>| {},
    );
    let pages = layout(
        &[make_paragraph("content", "Body")],
        &styles(),
        &geometry(100.0),
        &measurer,
        &mut deco,
    )
    .unwrap();
    assert!(matches!(pages[0].commands[0], DrawCommand::FillRect { .. }));
    assert!(matches!(pages[0].commands[1], DrawCommand::Text { .. }));
}

// ─── JSON & Concurrency ─────────────────────────────────────────

#[test]
fn test_json_document() {
    let json = r##"{
        "page": {
            "size": { "Custom": { "width": 400, "height": 300 } },
            "margins": { "top": 20, "right": 30, "bottom": 20, "left": 30 }
        },
        "styles": {
            "Body": { "size": 10, "leading": 14, "alignment": "Justify", "spaceAfter": 4 },
            "Head": { "size": 14, "leading": 18, "bold": true }
        },
        "blocks": [
            { "type": "Paragraph", "markup": "Title", "style": "Head" },
            { "type": "Rule", "thickness": 0.5, "widthFraction": 0.8 },
            { "type": "Paragraph", "markup": "Some <b>bold</b> text.", "style": "Body" },
            { "type": "Table", "columnWidths": [100, 100],
              "rows": [
                [[{ "type": "Paragraph", "markup": "k", "style": "Body" }],
                 [{ "type": "Paragraph", "markup": "v", "style": "Body" }]]
              ],
              "styleRules": [
                { "range": { "start": [0, 0], "end": [-1, -1] },
                  "op": { "type": "Box", "width": 1, "color": { "r": 0, "g": 0, "b": 0 } } }
              ] },
            { "type": "PageBreak" },
            { "type": "Spacer", "height": 10 }
        ]
    }"##;
    let measurer = MonospaceMeasurer::default();
    let pages = layout_json(json, &measurer, &mut NoDecoration).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].width, 400.0);
    assert!(pages[0].text().contains("bold"));
    let serialized = serde_json::to_string(&pages).unwrap();
    assert!(serialized.contains("\"usedHeight\""));
}

#[test]
fn test_bad_json_reports_hint() {
    let measurer = MonospaceMeasurer::default();
    let err = layout_json("{ \"blocks\": [ { \"type\": \"Nope\" } ] }", &measurer, &mut NoDecoration)
        .unwrap_err();
    assert!(matches!(err, LayoutError::Parse { .. }));
    assert!(err.to_string().contains("Hint"));
}

#[test]
fn test_frozen_styles_support_parallel_passes() {
    let styles = styles();
    let blocks: Vec<Block> = (0..10).map(|_| make_paragraph(&words(50), "Body")).collect();
    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let styles = styles.clone();
                let blocks = &blocks;
                scope.spawn(move || {
                    let measurer = MonospaceMeasurer::default();
                    layout(blocks, &styles, &geometry(120.0), &measurer, &mut NoDecoration)
                        .unwrap()
                        .len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(counts.windows(2).all(|w| w[0] == w[1]));
}
