//! # Pageflow
//!
//! A flow-and-paginate document layout engine.
//!
//! Give it an ordered sequence of content blocks (paragraphs, tables,
//! spacers, rules, explicit page breaks), a fixed page geometry and a way to
//! measure text, and it works out how the blocks wrap and break across
//! pages. The output is one list of positioned draw commands per page, ready
//! for whatever writes the actual page-description bytes.
//!
//! Every decision is made with the page boundary as a hard constraint.
//! Paragraphs split between lines, tables between rows (with header rows
//! repeated), and per-page furniture such as running headers and page
//! numbers is painted by callbacks after a page's content is fixed.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]    — Blocks, tables, page geometry
//!       ↓
//!   [style]    — Named styles, frozen before layout
//!       ↓
//!   [text]     — Inline markup, line wrapping, justification
//!       ↓
//!   [layout]   — Page flow, table layout, decoration callbacks
//!       ↓
//!   Pages of DrawCommands → caller's rendering sink
//! ```
//!
//! Glyph metrics come from a caller-supplied [`font::TextMeasurer`].

pub mod error;
pub mod font;
pub mod layout;
pub mod model;
pub mod style;
pub mod text;

pub use error::LayoutError;
pub use layout::decoration::{Canvas, Decorations, NoDecoration, PageContext, PageDecorator};
pub use layout::{DrawCommand, LayoutEngine, Page, PageSink};
pub use model::{Block, Document, PageGeometry};
pub use style::{FrozenStyles, Style, StyleRegistry};

use font::TextMeasurer;

/// Lay out `blocks` onto pages of the given geometry.
///
/// This is the primary entry point. Configuration errors (unknown styles,
/// invalid geometry, misshapen tables) are reported before any page is
/// produced; `decorator` is called once per page in page order.
pub fn layout(
    blocks: &[Block],
    styles: &FrozenStyles,
    geometry: &PageGeometry,
    measurer: &dyn TextMeasurer,
    decorator: &mut dyn PageDecorator,
) -> Result<Vec<Page>, LayoutError> {
    LayoutEngine::new(*geometry).layout(blocks, styles, measurer, decorator)
}

/// Lay out a self-contained [`Document`]: its styles are registered into a
/// fresh registry, which is frozen before the pass starts.
pub fn layout_document(
    document: &Document,
    measurer: &dyn TextMeasurer,
    decorator: &mut dyn PageDecorator,
) -> Result<Vec<Page>, LayoutError> {
    let mut registry = if document.default_styles {
        StyleRegistry::with_defaults()
    } else {
        StyleRegistry::new()
    };
    for (name, style) in &document.styles {
        registry.register(name.as_str(), style.clone())?;
    }
    let styles = registry.freeze();
    log::debug!(
        "laying out {} block(s) with {} style(s)",
        document.blocks.len(),
        styles.len()
    );
    layout(&document.blocks, &styles, &document.page, measurer, decorator)
}

/// Lay out a document described as JSON.
pub fn layout_json(
    json: &str,
    measurer: &dyn TextMeasurer,
    decorator: &mut dyn PageDecorator,
) -> Result<Vec<Page>, LayoutError> {
    let document: Document = serde_json::from_str(json)?;
    layout_document(&document, measurer, decorator)
}
