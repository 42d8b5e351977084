//! Keeps the structured canvas and its JSON text view consistent.
//!
//! The structured document is the source of truth. Structured edits re-encode the text
//! immediately; text edits are held as a draft and only reach the document through an
//! explicit apply, which must decode cleanly. A document loaded from the backend always wins
//! over whatever the user was typing.

use log::{debug, warn};

use crate::codec;
use crate::document::GraphDocument;
use crate::error::{GraphError, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Document and text agree and match what was last saved.
    Clean,
    /// A structured edit happened since the last save.
    StructuredEdit,
    /// The text view holds a draft that has not been applied.
    TextEdit,
    /// The document was just replaced from the backend.
    ExternalLoad,
}

/// What the caller has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// The document changed locally and should be saved after the quiet interval.
    ArmAutosave,
    /// Nothing to persist.
    NoSave,
}

#[derive(Debug, Clone)]
pub struct Synchronizer {
    document: GraphDocument,
    canonical: String,
    draft: Option<String>,
    state: SyncState,
    last_error: Option<ParseError>,
}

impl Synchronizer {
    pub fn new(document: GraphDocument) -> Self {
        let canonical = codec::encode(&document);
        Synchronizer {
            document,
            canonical,
            draft: None,
            state: SyncState::Clean,
            last_error: None,
        }
    }

    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Content of the text view: the draft while one exists, otherwise the encoded document.
    pub fn text(&self) -> &str {
        self.draft.as_deref().unwrap_or(&self.canonical)
    }

    /// Encoded form of the structured document. This is what gets saved.
    pub fn snapshot(&self) -> &str {
        &self.canonical
    }

    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
    }

    /// The most recent rejected draft, cleared by the next successful apply or load.
    pub fn last_error(&self) -> Option<&ParseError> {
        self.last_error.as_ref()
    }

    /// Applies a structured mutation.
    ///
    /// The new document is re-encoded for the text view; that text is never decoded again.
    /// A pending text draft is replaced by the new encoding. A failing mutation leaves
    /// everything as it was.
    pub fn apply_structured<F>(&mut self, mutation: F) -> Result<SyncEffect, GraphError>
    where
        F: FnOnce(&GraphDocument) -> Result<GraphDocument, GraphError>,
    {
        let next = mutation(&self.document)?;
        if self.draft.take().is_some() {
            debug!("structured edit replaced an unapplied text draft");
        }
        self.adopt(next);
        Ok(SyncEffect::ArmAutosave)
    }

    /// Replaces the whole document as a structured edit.
    pub fn replace_document(&mut self, document: GraphDocument) -> SyncEffect {
        self.draft = None;
        self.adopt(document);
        SyncEffect::ArmAutosave
    }

    /// Records a keystroke in the text view. The structured document is not touched.
    pub fn edit_text(&mut self, text: impl Into<String>) {
        self.draft = Some(text.into());
        self.state = SyncState::TextEdit;
    }

    /// Drops the draft and shows the encoded document again.
    pub fn discard_draft(&mut self) {
        if self.draft.take().is_some() && self.state == SyncState::TextEdit {
            self.state = SyncState::StructuredEdit;
        }
    }

    /// Decodes the draft and adopts it.
    ///
    /// On a parse error the document stays as it was, the draft is kept so the user can fix
    /// it, and the error is both returned and remembered in [`Synchronizer::last_error`].
    pub fn apply_text(&mut self) -> Result<SyncEffect, ParseError> {
        let Some(draft) = self.draft.as_deref() else {
            return Ok(SyncEffect::NoSave);
        };
        match codec::decode(draft) {
            Ok(document) => {
                self.draft = None;
                self.adopt(document);
                Ok(SyncEffect::ArmAutosave)
            }
            Err(err) => {
                warn!("rejected canvas text: {}", err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Leaving the text view applies the draft first.
    pub fn switch_to_structured(&mut self) -> Result<SyncEffect, ParseError> {
        self.apply_text()
    }

    /// Replaces everything with a document that came from the backend.
    ///
    /// Any draft is abandoned. Malformed text yields an empty document together with the
    /// parse error. The result is never written back, so a load does not trigger a save.
    pub fn load_external(&mut self, text: &str) -> Result<(), ParseError> {
        if self.draft.take().is_some() {
            debug!("external load abandoned an unapplied text draft");
        }
        let (document, result) = match codec::decode(text) {
            Ok(document) => (document, Ok(())),
            Err(err) => {
                warn!("loaded canvas is malformed, starting empty: {}", err);
                (GraphDocument::empty(), Err(err))
            }
        };
        self.last_error = result.as_ref().err().cloned();
        self.canonical = codec::encode(&document);
        self.document = document;
        self.state = SyncState::ExternalLoad;
        result
    }

    /// The backend has the current document.
    pub fn mark_saved(&mut self) {
        if matches!(self.state, SyncState::StructuredEdit | SyncState::ExternalLoad) {
            self.state = SyncState::Clean;
        }
    }

    fn adopt(&mut self, document: GraphDocument) {
        self.canonical = codec::encode(&document);
        self.document = document;
        self.last_error = None;
        self.state = SyncState::StructuredEdit;
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Synchronizer::new(GraphDocument::empty())
    }
}
