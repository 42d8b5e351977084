//! Client for the assistant chat stream.
//!
//! The chat service answers a POST with newline-delimited JSON events. Text arrives in
//! deltas, tool activity is bracketed by start/finish events, and a `canvas_update` carries a
//! complete replacement document as a JSON string.

use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::{NetworkError, ParseError};

pub const CHAT_STREAM_PATH: &str = "/api/chat/stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a chat request. `current_canvas` is the encoded document, not an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub current_canvas: String,
    #[serde(default)]
    pub data_sources: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    TextDelta {
        text: String,
    },
    ToolStart {
        tool_name: String,
        #[serde(default)]
        message: String,
    },
    ToolFinish {
        tool_name: String,
    },
    CanvasUpdate {
        canvas: String,
        #[serde(default)]
        explanation: String,
    },
    Done {
        #[serde(default)]
        usage: Value,
    },
    Error {
        error: String,
    },
}

/// Splits a byte stream into JSON lines. Chunks may end in the middle of a line or of a
/// UTF-8 sequence; incomplete input is buffered until the next chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ChatEvent, ParseError>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Parses whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<Result<ChatEvent, ParseError>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<Result<ChatEvent, ParseError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).map_err(ParseError::from))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The service closed the stream.
    Completed,
    /// The user stopped the reply.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        ChatClient {
            client: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), CHAT_STREAM_PATH),
        }
    }

    /// Sends `request` and hands every decoded event to `on_event` as it arrives.
    ///
    /// Setting the `cancel` channel to `true` stops reading and drops the connection. Lines
    /// that are not valid events are logged and skipped.
    pub async fn stream<F>(
        &self,
        request: &ChatRequest,
        mut cancel: watch::Receiver<bool>,
        mut on_event: F,
    ) -> Result<ChatOutcome, NetworkError>
    where
        F: FnMut(ChatEvent),
    {
        if *cancel.borrow() {
            return Ok(ChatOutcome::Cancelled);
        }
        debug!("opening chat stream with {} messages", request.messages.len());
        let response = self.client.post(&self.url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(NetworkError::Status(response.status().as_u16()));
        }

        let mut body = response.bytes_stream();
        let mut decoder = LineDecoder::default();
        let mut cancel_open = true;
        let mut dispatch = |result: Result<ChatEvent, ParseError>| match result {
            Ok(event) => on_event(event),
            Err(err) => warn!("skipping malformed chat event: {}", err),
        };

        loop {
            tokio::select! {
                changed = cancel.changed(), if cancel_open => {
                    if changed.is_err() {
                        cancel_open = false;
                    } else if *cancel.borrow() {
                        info!("chat stream cancelled by user");
                        return Ok(ChatOutcome::Cancelled);
                    }
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for result in decoder.push(&bytes) {
                            dispatch(result);
                        }
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }
        if let Some(result) = decoder.finish() {
            dispatch(result);
        }
        Ok(ChatOutcome::Completed)
    }
}

/// Conversation state of the chat panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
    pub messages: Vec<ChatMessage>,
    /// Assistant text received so far for the reply in progress.
    pub reply: String,
    /// Spinner text while a tool runs.
    pub tool_status: Option<String>,
    pub error: Option<String>,
    pub usage: Option<Value>,
}

impl ChatTranscript {
    /// Adds the user's message and starts a new reply.
    pub fn ask(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
        self.reply.clear();
        self.tool_status = None;
        self.error = None;
    }

    /// Builds the request for the conversation so far.
    pub fn request(&self, current_canvas: &str, data_sources: Vec<Value>) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            current_canvas: current_canvas.to_string(),
            data_sources,
        }
    }

    /// Folds one event into the transcript. Canvas updates are left to the caller.
    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::TextDelta { text } => self.reply.push_str(text),
            ChatEvent::ToolStart { message, tool_name } => {
                self.tool_status = Some(if message.is_empty() {
                    tool_name.clone()
                } else {
                    message.clone()
                });
            }
            ChatEvent::ToolFinish { .. } => self.tool_status = None,
            ChatEvent::CanvasUpdate { .. } => {}
            ChatEvent::Done { usage } => {
                self.usage = Some(usage.clone());
                self.finish_reply();
            }
            ChatEvent::Error { error } => {
                self.error = Some(error.clone());
                self.tool_status = None;
                self.finish_reply();
            }
        }
    }

    fn finish_reply(&mut self) {
        if !self.reply.is_empty() {
            let reply = std::mem::take(&mut self.reply);
            self.messages.push(ChatMessage::assistant(reply));
        }
    }
}
