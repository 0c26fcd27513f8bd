//! Conversation memory — the bounded message log an agent reasons over.
//!
//! Memory is an ordered sequence of [`Message`]s with a fixed capacity.
//! When an append would exceed the capacity, the oldest messages are
//! evicted first, so the log always holds the most recent exchange.
//!
//! A Tool message is only meaningful next to the Assistant message that
//! proposed its call, so appending one whose `tool_call_id` no Assistant
//! message emitted is rejected. Eviction also drops Tool messages left at
//! the front of the log once their Assistant message is gone, except the
//! newest message, which is never evicted. Evicted messages are always a
//! prefix of the log.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::message::{Message, Role};

/// Default capacity, in messages.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
    max_messages: usize,
    /// Call ids of the latest Assistant message that proposed tool calls.
    /// Its results stay appendable even if a small capacity evicted it.
    #[serde(default)]
    open_calls: Vec<String>,
}

impl Memory {
    /// Create an empty memory holding at most `max_messages` messages.
    pub fn new(max_messages: usize) -> Result<Self> {
        if max_messages == 0 {
            return Err(Error::InvalidArgument(
                "memory capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            messages: Vec::new(),
            max_messages,
            open_calls: Vec::new(),
        })
    }

    /// Append one message, evicting the oldest entries if needed.
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.validate(&message, &[])?;
        self.track_calls(&message);
        self.messages.push(message);
        self.trim();
        Ok(())
    }

    /// Append several messages in order.
    ///
    /// Every message is validated before any is appended, so a rejected
    /// batch leaves memory untouched. A Tool message may answer a call
    /// made earlier in the same batch.
    pub fn append_batch(&mut self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        let messages: Vec<Message> = messages.into_iter().collect();
        for (i, message) in messages.iter().enumerate() {
            self.validate(message, &messages[..i])?;
        }
        for message in &messages {
            self.track_calls(message);
        }
        self.messages.extend(messages);
        self.trim();
        Ok(())
    }

    /// The last `min(n, len)` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |m| m.role == role)
    }

    pub fn last_by_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.open_calls.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn validate(&self, message: &Message, pending: &[Message]) -> Result<()> {
        if message.role != Role::Tool {
            return Ok(());
        }
        let Some(id) = message.tool_call_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Err(Error::InvalidArgument(
                "tool message must reference a tool_call_id".into(),
            ));
        };

        let emitted = |m: &Message| {
            m.role == Role::Assistant && m.tool_calls.iter().any(|call| call.id == id)
        };
        let known = self.open_calls.iter().any(|open| open == id)
            || self.messages.iter().any(emitted)
            || pending.iter().any(emitted);
        if !known {
            return Err(Error::InvalidArgument(format!(
                "tool message references unknown tool_call_id '{id}'"
            )));
        }
        Ok(())
    }

    fn track_calls(&mut self, message: &Message) {
        if message.role == Role::Assistant && !message.tool_calls.is_empty() {
            self.open_calls = message.tool_calls.iter().map(|c| c.id.clone()).collect();
        }
    }

    fn trim(&mut self) {
        let mut evict = self.messages.len().saturating_sub(self.max_messages);
        if evict == 0 {
            return;
        }

        // A Tool message at the front has lost its Assistant message.
        let newest = self.messages.len() - 1;
        while evict < newest && self.messages[evict].role == Role::Tool {
            evict += 1;
        }

        trace!(evicted = evict, capacity = self.max_messages, "Trimming memory");
        self.messages.drain(..evict);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
            open_calls: Vec::new(),
        }
    }
}
