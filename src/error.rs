use std::fmt;

/// Malformed canvas JSON, either typed into the text view or received from the backend.
///
/// Carries the 1-based position reported by the JSON parser so the text view can point
/// at the offending character.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid canvas JSON at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// Rejected graph mutations. The document the mutation was applied to is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("a node with id `{0}` already exists")]
    DuplicateNode(String),
    #[error("an edge with id `{0}` already exists")]
    DuplicateEdge(String),
    #[error("no node with id `{0}`")]
    UnknownNode(String),
    #[error("no edge with id `{0}`")]
    UnknownEdge(String),
    #[error("edge `{edge_id}` references missing node `{node_id}`")]
    MissingEndpoint { edge_id: String, node_id: String },
    #[error("node `{0}` is not a chart")]
    NotAChart(String),
    #[error("node `{0}` is not a text or divider element")]
    NotAnElement(String),
    #[error("node `{0}` would hold a NaN or infinite number")]
    NonFinite(String),
}

/// Failures talking to the canvas backend or the chat service.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered with HTTP {0}")]
    Status(u16),
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response from backend: {0}")]
    InvalidResponse(String),
}

/// Failures while capturing the canvas for download.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("the canvas has no nodes to export")]
    EmptyCanvas,
    #[error("failed to draw canvas: {0}")]
    Draw(String),
    #[error("failed to parse rendered SVG")]
    SvgParse,
    #[error("failed to allocate a {0}x{1} pixmap")]
    PixmapAlloc(u32, u32),
    #[error("failed to encode PNG")]
    PngEncode,
    #[error("failed to convert page to PDF")]
    PdfConvert,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a [`crate::session::CanvasSession`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A transient, user-visible message ("toast"). Nothing here blocks editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}
