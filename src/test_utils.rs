//! Test utilities: a recording chat adapter and synthetic video clips
//!
//! This module provides the in-memory doubles used by unit tests, scenario
//! tests and benchmarks. Timestamps come from [`tokio::time::Instant`] so tests
//! running on a paused clock can assert on pacing.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::adapters::{MessageAdapter, MessageId};
use crate::providers::SyntheticClip;
use crate::types::{DestinationKey, RawFrame};
use crate::{PlayerError, Result};

/// Where the [`RecordingAdapter`] puts the message id in send responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"message_id": ...}`
    TopLevel,
    /// `{"data": {"message_id": ...}}`
    DataWrapped,
    /// `{"data": {"messageInfo": {"msgId": ...}}}`
    MessageInfo,
    /// No id anywhere
    Empty,
}

/// One call observed by the [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Sent { key: DestinationKey, text: String, at: Instant },
    Edited { key: DestinationKey, message_id: MessageId, text: String, at: Instant },
}

impl AdapterEvent {
    pub fn text(&self) -> &str {
        match self {
            AdapterEvent::Sent { text, .. } | AdapterEvent::Edited { text, .. } => text,
        }
    }

    pub fn at(&self) -> Instant {
        match self {
            AdapterEvent::Sent { at, .. } | AdapterEvent::Edited { at, .. } => *at,
        }
    }
}

/// Scriptable [`MessageAdapter`] that records every call.
#[derive(Debug)]
pub struct RecordingAdapter {
    edits_supported: bool,
    shape: ResponseShape,
    fail_sends_after: Option<usize>,
    fail_edits_after: Option<usize>,
    send_delay: Option<Duration>,
    next_id: AtomicU64,
    events: Mutex<Vec<AdapterEvent>>,
}

impl Default for RecordingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAdapter {
    /// Edit-capable adapter answering with a top-level `message_id`.
    pub fn new() -> Self {
        Self {
            edits_supported: true,
            shape: ResponseShape::TopLevel,
            fail_sends_after: None,
            fail_edits_after: None,
            send_delay: None,
            next_id: AtomicU64::new(1),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Adapter for a platform that cannot edit messages.
    pub fn without_edit() -> Self {
        Self { edits_supported: false, ..Self::new() }
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// Fail every edit once `edits` edits have succeeded.
    pub fn failing_edits_after(mut self, edits: usize) -> Self {
        self.fail_edits_after = Some(edits);
        self
    }

    /// Fail every send.
    pub fn failing_sends(self) -> Self {
        self.failing_sends_after(0)
    }

    /// Fail every send once `sends` sends have succeeded.
    pub fn failing_sends_after(mut self, sends: usize) -> Self {
        self.fail_sends_after = Some(sends);
        self
    }

    /// Delay every send, simulating a slow platform.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<AdapterEvent> {
        self.events.lock().clone()
    }

    pub fn sends(&self) -> Vec<AdapterEvent> {
        self.events().into_iter().filter(|e| matches!(e, AdapterEvent::Sent { .. })).collect()
    }

    pub fn edits(&self) -> Vec<AdapterEvent> {
        self.events().into_iter().filter(|e| matches!(e, AdapterEvent::Edited { .. })).collect()
    }

    pub fn send_count(&self) -> usize {
        self.sends().len()
    }

    pub fn edit_count(&self) -> usize {
        self.edits().len()
    }

    /// Text of every edit, in call order.
    pub fn edit_texts(&self) -> Vec<String> {
        self.edits().iter().map(|e| e.text().to_string()).collect()
    }

    fn response(&self, id: u64) -> Value {
        match self.shape {
            ResponseShape::TopLevel => json!({ "status": "ok", "message_id": id.to_string() }),
            ResponseShape::DataWrapped => json!({ "status": "ok", "data": { "message_id": id } }),
            ResponseShape::MessageInfo => {
                json!({ "data": { "messageInfo": { "msgId": format!("msg-{}", id) } } })
            }
            ResponseShape::Empty => json!({ "status": "ok" }),
        }
    }
}

#[async_trait::async_trait]
impl MessageAdapter for RecordingAdapter {
    fn supports_edit(&self) -> bool {
        self.edits_supported
    }

    async fn send_text(&self, to: &DestinationKey, text: &str) -> Result<Value> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends_after.is_some_and(|limit| self.send_count() >= limit) {
            return Err(PlayerError::transport_failed(&to.platform, "send", "connection reset"));
        }

        self.events.lock().push(AdapterEvent::Sent {
            key: to.clone(),
            text: text.to_string(),
            at: Instant::now(),
        });
        Ok(self.response(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message(&self, to: &DestinationKey, id: &MessageId, text: &str) -> Result<()> {
        let mut events = self.events.lock();
        let edits = events.iter().filter(|e| matches!(e, AdapterEvent::Edited { .. })).count();
        if !self.edits_supported || self.fail_edits_after.is_some_and(|limit| edits >= limit) {
            return Err(PlayerError::transport_failed(&to.platform, "edit", "HTTP 502"));
        }

        events.push(AdapterEvent::Edited {
            key: to.clone(),
            message_id: id.clone(),
            text: text.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }
}

/// Uniform frame of the given luminance.
pub fn solid_frame(width: u32, height: u32, value: u8) -> RawFrame {
    RawFrame::filled(width, height, value)
}

/// White frame with a one pixel black column at `x`.
pub fn bar_frame(width: u32, height: u32, x: u32) -> RawFrame {
    let data = (0..height)
        .flat_map(|_| (0..width).map(move |col| if col == x { 0 } else { 255 }))
        .collect();
    RawFrame::luma(width, height, data).unwrap_or_else(|_| solid_frame(width, height, 255))
}

/// Diagonal gradient, a cheap stand-in for natural footage.
pub fn gradient_frame(width: u32, height: u32) -> RawFrame {
    let span = (width + height).max(1);
    let data = (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y) * 255 / span) as u8))
        .collect();
    RawFrame::luma(width, height, data).unwrap_or_else(|_| solid_frame(width, height, 128))
}

/// `frames` 16x8 frames with a bar sweeping left to right.
///
/// Consecutive frames always render differently at 16x8.
pub fn moving_bar_clip(frames: usize, fps: Option<f64>) -> SyntheticClip {
    let frames = (0..frames).map(|i| bar_frame(16, 8, (i % 16) as u32)).collect();
    SyntheticClip::new(fps, frames)
}

/// `frames` identical white 16x8 frames.
pub fn static_clip(frames: usize, fps: Option<f64>) -> SyntheticClip {
    SyntheticClip::new(fps, vec![solid_frame(16, 8, 255); frames])
}
