//! One open canvas: document, text view, autosave, camera and selection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::autosave::{Autosaver, SaveStatus};
use crate::chat::ChatEvent;
use crate::codec;
use crate::document::GraphDocument;
use crate::error::{GraphError, Notice, ParseError, SessionError};
use crate::export::{self, ExportFormat, ExportedFile};
use crate::node::Viewport;
use crate::render::{Scene, plan_scene};
use crate::store::CanvasStore;
use crate::sync::{SyncEffect, SyncState, Synchronizer};

pub struct CanvasSession<S: CanvasStore + 'static> {
    store: Arc<S>,
    owner: String,
    canvas_id: String,
    name: String,
    sync: Synchronizer,
    autosave: Autosaver<S>,
    camera: Viewport,
    selected: Option<String>,
    notices: Vec<Notice>,
}

impl<S: CanvasStore + 'static> CanvasSession<S> {
    /// Loads a canvas from `store`.
    ///
    /// A stored script that does not parse opens as an empty canvas with an error notice;
    /// only a failure to reach the store is an error.
    pub async fn open(
        store: Arc<S>,
        owner: &str,
        canvas_id: &str,
        quiet: Duration,
    ) -> Result<Self, SessionError> {
        let record = store.load(owner, canvas_id).await?;
        let autosave = Autosaver::new(Arc::clone(&store), owner, canvas_id, quiet);
        let mut session = CanvasSession {
            store,
            owner: owner.to_string(),
            canvas_id: canvas_id.to_string(),
            name: record.name.clone(),
            sync: Synchronizer::default(),
            autosave,
            camera: Viewport::default(),
            selected: None,
            notices: Vec::new(),
        };
        session.adopt_external(&record.script);
        info!("opened canvas {} ({})", session.canvas_id, session.name);
        Ok(session)
    }

    /// Replaces the canvas with the stored version, dropping any unsaved draft and countdown.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        self.autosave.cancel();
        let record = self.store.load(&self.owner, &self.canvas_id).await?;
        self.name = record.name.clone();
        self.adopt_external(&record.script);
        Ok(())
    }

    fn adopt_external(&mut self, script: &str) {
        self.autosave.reset();
        if let Err(err) = self.sync.load_external(script) {
            self.notices.push(Notice::error(format!(
                "Canvas data could not be read, showing an empty canvas: {}",
                err
            )));
        }
        self.camera = self.sync.document().viewport.unwrap_or_default();
        if let Some(id) = &self.selected {
            if !self.sync.document().contains_node(id) {
                self.selected = None;
            }
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &GraphDocument {
        self.sync.document()
    }

    /// Content of the JSON text view.
    pub fn text(&self) -> &str {
        self.sync.text()
    }

    /// Synchroniser state, settled against the latest save result.
    pub fn state(&mut self) -> SyncState {
        let status = self.autosave.status();
        if !status.dirty && status.saving == 0 {
            self.sync.mark_saved();
        }
        self.sync.state()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    /// True while local changes are not yet confirmed by the backend.
    pub fn has_unsaved_changes(&self) -> bool {
        self.autosave.status().dirty || self.sync.has_draft()
    }

    /// Applies a structured edit and arms the autosave countdown.
    pub fn edit<F>(&mut self, mutation: F) -> Result<(), GraphError>
    where
        F: FnOnce(&GraphDocument) -> Result<GraphDocument, GraphError>,
    {
        let effect = self.sync.apply_structured(mutation)?;
        self.after(effect);
        Ok(())
    }

    pub fn edit_text(&mut self, text: impl Into<String>) {
        self.sync.edit_text(text);
    }

    /// Applies the text draft. A parse error leaves the document untouched and is returned.
    pub fn apply_text(&mut self) -> Result<(), ParseError> {
        let effect = self.sync.apply_text()?;
        self.after(effect);
        Ok(())
    }

    pub fn last_parse_error(&self) -> Option<&ParseError> {
        self.sync.last_error()
    }

    fn after(&mut self, effect: SyncEffect) {
        if effect == SyncEffect::ArmAutosave {
            self.autosave.schedule(self.sync.snapshot());
        }
        if let Some(id) = &self.selected {
            if !self.sync.document().contains_node(id) {
                self.selected = None;
            }
        }
    }

    /// Saves immediately, skipping the quiet interval.
    pub async fn save_now(&mut self) -> Result<DateTime<Utc>, SessionError> {
        let snapshot = self.sync.snapshot().to_string();
        let saved_at = self.autosave.save_now(snapshot).await?;
        self.sync.mark_saved();
        Ok(saved_at)
    }

    pub fn select(&mut self, node_id: Option<&str>) {
        self.selected = node_id
            .filter(|id| self.sync.document().contains_node(id))
            .map(str::to_string);
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn camera(&self) -> Viewport {
        self.camera
    }

    /// Moves the live camera. Camera moves are not document edits and are never saved.
    pub fn set_camera(&mut self, viewport: Viewport) {
        self.camera = viewport;
    }

    pub fn scene(&self) -> Scene {
        plan_scene(self.sync.document(), self.selected.as_deref())
    }

    /// Builds a download. The live camera is the same before and after, even on failure.
    pub fn export(&mut self, format: ExportFormat) -> Result<ExportedFile, SessionError> {
        let result = export::export(
            self.sync.document(),
            &mut self.camera,
            format,
            &self.name,
            Utc::now(),
        );
        match result {
            Ok(file) => Ok(file),
            Err(err) => {
                self.notices
                    .push(Notice::error(format!("Export failed: {}", err)));
                Err(err.into())
            }
        }
    }

    /// Applies an assistant `canvas_update`: the new document replaces the current one as a
    /// structured edit. Other events are ignored here.
    pub fn apply_chat_event(&mut self, event: &ChatEvent) -> Result<(), ParseError> {
        let ChatEvent::CanvasUpdate {
            canvas,
            explanation,
        } = event
        else {
            return Ok(());
        };
        match codec::decode(canvas) {
            Ok(document) => {
                let effect = self.sync.replace_document(document);
                self.after(effect);
                if !explanation.is_empty() {
                    self.notices.push(Notice::info(explanation.clone()));
                }
                Ok(())
            }
            Err(err) => {
                warn!("assistant sent an invalid canvas: {}", err);
                self.notices.push(Notice::error(format!(
                    "The assistant's canvas could not be applied: {}",
                    err
                )));
                Err(err)
            }
        }
    }

    /// Notices raised since the last call, including failed background saves.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        let mut notices = std::mem::take(&mut self.notices);
        notices.extend(self.autosave.take_notices());
        notices
    }
}
