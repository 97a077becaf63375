//! Structured error types for the layout engine.
//!
//! Configuration problems (unknown style, bad geometry, malformed tables) are
//! fatal and surface before any page is emitted. Content-local problems such
//! as broken inline markup are recovered where they happen and only logged.

use thiserror::Error;

/// The unified error type returned by all public pageflow API functions.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A block referenced a style name that was never registered.
    #[error("unknown style `{name}`")]
    UnknownStyle { name: String },

    /// A style was registered with attributes outside their valid range.
    #[error("invalid style `{name}`: {reason}")]
    InvalidStyle { name: String, reason: String },

    /// Registration was attempted after the registry was frozen for layout.
    #[error("cannot register style `{name}`: the registry is frozen")]
    RegistryFrozen { name: String },

    /// Page or column dimensions are zero, negative or not finite.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A table whose shape contradicts its column definitions.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Inline markup could not be parsed. Never aborts a layout pass; the
    /// parser recovers and reports this alongside its output.
    #[error("malformed markup at byte {offset}: {reason}")]
    MalformedMarkup { offset: usize, reason: String },

    /// The text measurer returned a size layout cannot work with.
    #[error("unmeasurable content {text:?}: width {width}, line height {line_height}")]
    UnmeasurableContent {
        text: String,
        width: f64,
        line_height: f64,
    },

    /// JSON input failed to parse as a valid document.
    #[error("failed to parse document: {source}{}", format_hint(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the document schema. Check block `type` tags and field names.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        LayoutError::Parse { source: e, hint }
    }
}
