/*!
# DataBoard Canvas Core

The document engine behind an infinite-canvas dashboard editor, built in Rust.

## Overview

A canvas is a graph of positioned nodes (charts, text blocks, dividers) joined by edges.
The same canvas is shown two ways at once: as a structured, draggable board and as an
editable JSON document. This crate keeps both views consistent, renders every node kind,
saves changes to the backend in the background, and exports the board as PNG, PDF or JSON.

## Architecture

### Document Layer
- **node** / **document**: Node and edge model with validated, non-mutating edit operations
- **codec**: Pretty JSON encoding with a strict round-trip law (`decode(encode(g)) == g`)

### Rendering Layer
- **style**: Per-kind chart defaults, applied at render time
- **chart**: Eleven chart layouts (line, bar, pie, area, composed, radar, radialBar,
  scatter, funnel, treemap, sankey) producing backend-neutral primitives
- **render**: Node dispatch with a placeholder for anything unknown, scene planning,
  in-place title editing

### Editing Layer
- **sync**: Dual-view synchroniser (Clean, StructuredEdit, TextEdit, ExternalLoad)
- **autosave**: Debounced saving with a 2 second quiet interval, last write wins
- **session**: One open canvas tying the above together
- **chat**: Streaming client for the assistant, whose canvas updates land as structured edits

### Persistence and Output
- **store**: `CanvasStore` trait, HTTP client for the REST backend, in-memory store
- **export**: PNG via resvg, single-page A4 PDF via svg2pdf, pretty JSON
- **prefs** / **config**: Durable user preferences and environment configuration

### Backend (feature `web`)
- **app**: axum development server implementing the canvas REST API

## REST API Endpoints

- `GET /canvas/{owner}/{id}` - Loads a canvas record
- `PATCH /canvas/{owner}/{id}/script` - Overwrites the stored document
- `GET /canvas/{owner}`, `POST /canvas/{owner}` - Lists or creates canvases
- `DELETE /canvas/{owner}/{id}` - Deletes a canvas
- `GET /canvas/{owner}/{id}/export/{format}` - Downloads a rendered export
- `GET /health` - Liveness check
*/

pub mod autosave;
pub mod chart;
pub mod chat;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod node;
pub mod prefs;
pub mod render;
pub mod session;
pub mod store;
pub mod style;
pub mod sync;

#[cfg(feature = "web")]
pub mod app;

pub use codec::{decode, encode};
pub use document::{Bounds, GraphDocument};
pub use error::{ExportError, GraphError, NetworkError, Notice, ParseError, SessionError};
pub use node::{ChartData, ChartKind, ChartStyle, Edge, ElementData, ElementKind, Node, NodeData};
pub use node::{Position, Viewport};
pub use session::CanvasSession;
pub use sync::{SyncEffect, SyncState, Synchronizer};
