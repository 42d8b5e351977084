use std::fs;
use std::path::Path;

use crate::document::GraphDocument;
use crate::error::ParseError;

/// Text stored for a freshly created canvas.
pub const EMPTY_DOCUMENT: &str = r#"{"nodes":[],"edges":[]}"#;

/// Serialises a document as pretty JSON with a 2-space indent.
///
/// Key order is fixed by the model types (`nodes`, `edges`, `viewport`, and within a node
/// `id`, `type`, `position`, `width`, `height`, `data`). Chart records keep the field order they
/// were loaded with, so a hand-edited document does not get reshuffled on the next save.
pub fn encode(document: &GraphDocument) -> String {
    // Every map key in the model is a String, which is the only way to_string_pretty can fail.
    serde_json::to_string_pretty(document).unwrap_or_else(|_| EMPTY_DOCUMENT.to_string())
}

/// Parses canvas text into a document.
///
/// Missing `nodes` or `edges` arrays are read as empty. Anything that is not a JSON object at
/// the top level, or that does not fit the node/edge shapes, is a [`ParseError`].
pub fn decode(text: &str) -> Result<GraphDocument, ParseError> {
    if let Some((offset, ch)) = text.char_indices().find(|(_, c)| !c.is_whitespace()) {
        if ch != '{' {
            let (line, column) = line_column(text, offset);
            return Err(ParseError {
                line,
                column,
                message: format!("expected a JSON object, found `{ch}`"),
            });
        }
    }
    let document: GraphDocument = serde_json::from_str(text)?;
    Ok(document)
}

fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

/// Writes the encoded document to `path`.
pub fn save_document(document: &GraphDocument, path: impl AsRef<Path>) -> std::io::Result<()> {
    fs::write(path, encode(document))
}

/// Reads and decodes a document from `path`.
pub fn load_document(path: impl AsRef<Path>) -> std::io::Result<GraphDocument> {
    let text = fs::read_to_string(path)?;
    decode(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
