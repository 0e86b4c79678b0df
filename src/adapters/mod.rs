//! Chat platform adapters.
//!
//! A [`MessageAdapter`] is the capability set playback needs from a chat
//! platform: send a text message, edit a previously sent message, and report
//! whether editing is supported at all. The [`AdapterRegistry`] maps platform
//! names to adapters and is resolved once per playback session.
//!
//! Send responses are returned as raw JSON because platforms disagree on their
//! shape; [`extract_message_id`] knows where to look.
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use glyphcast::adapters::{AdapterRegistry, MessageAdapter, MessageId};
//! use glyphcast::types::DestinationKey;
//! use glyphcast::Result;
//!
//! struct ConsoleAdapter;
//!
//! #[async_trait::async_trait]
//! impl MessageAdapter for ConsoleAdapter {
//!     fn supports_edit(&self) -> bool {
//!         true
//!     }
//!
//!     async fn send_text(&self, to: &DestinationKey, text: &str) -> Result<serde_json::Value> {
//!         println!("[{}] {}", to, text);
//!         Ok(serde_json::json!({ "message_id": "1" }))
//!     }
//!
//!     async fn edit_message(&self, to: &DestinationKey, id: &MessageId, text: &str) -> Result<()> {
//!         println!("[{} #{}] {}", to, id, text);
//!         Ok(())
//!     }
//! }
//!
//! let mut adapters = AdapterRegistry::new();
//! adapters.register("console", Arc::new(ConsoleAdapter));
//! assert!(adapters.supports_edit("console"));
//! assert!(!adapters.supports_edit("fax"));
//! ```

mod message_id;

pub use message_id::{MessageId, extract_message_id};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::types::DestinationKey;
use crate::{PlayerError, Result};

/// Messaging capabilities of one chat platform.
#[async_trait::async_trait]
pub trait MessageAdapter: Send + Sync + 'static {
    /// Whether previously sent messages can be edited on this platform.
    fn supports_edit(&self) -> bool;

    /// Send a new text message and return the platform's raw response.
    async fn send_text(&self, to: &DestinationKey, text: &str) -> Result<Value>;

    /// Replace the text of a previously sent message.
    async fn edit_message(&self, to: &DestinationKey, id: &MessageId, text: &str) -> Result<()>;
}

/// Platform name to adapter lookup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn MessageAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for a platform.
    pub fn register(&mut self, platform: impl Into<String>, adapter: Arc<dyn MessageAdapter>) {
        self.adapters.insert(platform.into(), adapter);
    }

    pub fn with(mut self, platform: impl Into<String>, adapter: Arc<dyn MessageAdapter>) -> Self {
        self.register(platform, adapter);
        self
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn MessageAdapter>> {
        self.adapters.get(platform).cloned()
    }

    /// Resolve an adapter, failing for unknown platforms.
    pub fn resolve(&self, platform: &str) -> Result<Arc<dyn MessageAdapter>> {
        self.get(platform)
            .ok_or_else(|| PlayerError::UnknownPlatform { platform: platform.to_string() })
    }

    /// Whether the platform is known and can edit messages.
    pub fn supports_edit(&self, platform: &str) -> bool {
        self.adapters.get(platform).is_some_and(|adapter| adapter.supports_edit())
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
