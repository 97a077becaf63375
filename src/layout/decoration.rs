//! # Page Decoration
//!
//! Running headers, footers, rules and page numbers are not content: they
//! never take part in flow. Once the engine has fixed a page's content it
//! calls back into a [`PageDecorator`] with the page's [`PageContext`], and
//! whatever the callback draws on the [`Canvas`] is merged into the page,
//! beneath or above the content.
//!
//! The first page and the later pages get separate hooks so a cover page can
//! stay bare.

use serde::Serialize;

use super::DrawCommand;
use crate::font::{SpanStyle, TextMeasurer};
use crate::model::{Edges, PageSize};
use crate::style::{Color, Style};

/// Read-only facts about the page being decorated.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// 1-based.
    pub page_number: usize,
    pub page_size: PageSize,
    pub margins: Edges,
}

impl PageContext {
    pub fn width(&self) -> f64 {
        self.page_size.dimensions().0
    }

    pub fn height(&self) -> f64 {
        self.page_size.dimensions().1
    }
}

/// Which hook a page is decorated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    First,
    Later,
}

/// Where furniture goes relative to the page's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecorationLayer {
    #[default]
    Below,
    Above,
}

/// Per-page furniture callbacks. Each finalized page gets exactly one call:
/// page 1 goes to `on_first_page`, every other page to `on_later_pages`.
pub trait PageDecorator {
    fn on_first_page(&mut self, _page: &PageContext, _canvas: &mut Canvas<'_>) {}

    fn on_later_pages(&mut self, _page: &PageContext, _canvas: &mut Canvas<'_>) {}

    fn layer(&self, _kind: PageKind) -> DecorationLayer {
        DecorationLayer::Below
    }
}

/// Draws nothing on any page.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecoration;

impl PageDecorator for NoDecoration {}

/// A [`PageDecorator`] built from two closures.
pub struct Decorations<F, L> {
    first: F,
    later: L,
    layers: [DecorationLayer; 2],
}

impl<F, L> Decorations<F, L>
where
    F: FnMut(&PageContext, &mut Canvas<'_>),
    L: FnMut(&PageContext, &mut Canvas<'_>),
{
    pub fn new(first: F, later: L) -> Self {
        Self {
            first,
            later,
            layers: [DecorationLayer::Below; 2],
        }
    }

    pub fn with_layer(mut self, kind: PageKind, layer: DecorationLayer) -> Self {
        self.layers[kind as usize] = layer;
        self
    }
}

/// Leave the first page (a cover) undecorated.
pub fn cover_page(_page: &PageContext, _canvas: &mut Canvas<'_>) {}

impl<F, L> PageDecorator for Decorations<F, L>
where
    F: FnMut(&PageContext, &mut Canvas<'_>),
    L: FnMut(&PageContext, &mut Canvas<'_>),
{
    fn on_first_page(&mut self, page: &PageContext, canvas: &mut Canvas<'_>) {
        (self.first)(page, canvas)
    }

    fn on_later_pages(&mut self, page: &PageContext, canvas: &mut Canvas<'_>) {
        (self.later)(page, canvas)
    }

    fn layer(&self, kind: PageKind) -> DecorationLayer {
        self.layers[kind as usize]
    }
}

/// Drawing surface handed to decoration callbacks.
///
/// Coordinates are page coordinates: origin at the top-left corner, y
/// growing downward, text positioned by its baseline. Text is drawn in the
/// fill color, lines in the stroke color.
pub struct Canvas<'a> {
    measurer: &'a dyn TextMeasurer,
    commands: Vec<DrawCommand>,
    stroke_color: Color,
    fill_color: Color,
    line_width: f64,
    font: SpanStyle,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(measurer: &'a dyn TextMeasurer) -> Self {
        Self {
            measurer,
            commands: Vec::new(),
            stroke_color: Color::BLACK,
            fill_color: Color::BLACK,
            line_width: 1.0,
            font: SpanStyle::from_style(&Style::default()),
        }
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.stroke_color = color;
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    /// Select the font for subsequent strings. Weight and slant follow the
    /// usual `-Bold` / `-Oblique` / `-Italic` name suffixes.
    pub fn set_font(&mut self, font: &str, size: f64) {
        self.font = SpanStyle {
            font: font.to_string(),
            size,
            bold: font.contains("Bold"),
            italic: font.contains("Oblique") || font.contains("Italic"),
            color: self.fill_color,
        };
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.commands.push(DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            width: self.line_width,
            color: self.stroke_color,
        });
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            color: self.fill_color,
        });
    }

    /// Width of `text` in the current font.
    pub fn string_width(&self, text: &str) -> f64 {
        let width = self.measurer.measure(text, &self.font).width;
        if width.is_finite() && width >= 0.0 {
            width
        } else {
            log::warn!("measurer returned width {width} for decoration text {text:?}");
            0.0
        }
    }

    /// Draw `text` starting at `x`.
    pub fn draw_string(&mut self, x: f64, y: f64, text: &str) {
        let style = SpanStyle {
            color: self.fill_color,
            ..self.font.clone()
        };
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
            style,
        });
    }

    /// Draw `text` centered on `x`.
    pub fn draw_centred_string(&mut self, x: f64, y: f64, text: &str) {
        let width = self.string_width(text);
        self.draw_string(x - width / 2.0, y, text);
    }

    /// Draw `text` ending at `x`.
    pub fn draw_right_string(&mut self, x: f64, y: f64, text: &str) {
        let width = self.string_width(text);
        self.draw_string(x - width, y, text);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub(crate) fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}
