//! Per-instance widget state
//!
//! Lifecycle of one widget instance:
//!
//! - *uninitialized*: never rendered, or reset by composer input.
//! - *active*: seeded on first render, replaced wholesale by each
//!   persistence call from inside the widget.
//! - *stale*: active but idle for longer than the configured TTL. Stale
//!   state is never served; a re-render reseeds it and a persistence call
//!   reactivates it. [`WidgetStateStore::sweep_stale`] drops stale entries.
//!
//! Only composer input resets. Tool calls made from widget controls reuse
//! the instance and keep its state.

use crate::error::WidgetStateError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetPhase {
    Uninitialized,
    Active,
    Stale,
}

#[derive(Debug, Clone)]
struct WidgetInstance {
    conversation_id: String,
    phase: WidgetPhase,
    state: Value,
    touched_at: DateTime<Utc>,
}

impl WidgetInstance {
    fn phase_at(&self, now: DateTime<Utc>, ttl: Duration) -> WidgetPhase {
        match self.phase {
            WidgetPhase::Active if now - self.touched_at > ttl => WidgetPhase::Stale,
            phase => phase,
        }
    }
}

/// Outcome of a persistence call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistReceipt {
    pub widget_id: String,
    pub estimated_tokens: usize,
    /// Set when the state exceeds the token budget. Still stored.
    pub over_budget: bool,
}

/// Rough token count for a serialized JSON value (about four bytes per token).
pub fn estimate_tokens(value: &Value) -> usize {
    let bytes = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    bytes.div_ceil(4)
}

pub struct WidgetStateStore {
    instances: DashMap<String, WidgetInstance>,
    token_budget: usize,
    ttl: Duration,
}

impl WidgetStateStore {
    pub fn new(token_budget: usize, ttl: Duration) -> Self {
        Self {
            instances: DashMap::new(),
            token_budget,
            ttl,
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn phase(&self, widget_id: &str) -> WidgetPhase {
        self.instances
            .get(widget_id)
            .map(|w| w.phase_at(Utc::now(), self.ttl))
            .unwrap_or(WidgetPhase::Uninitialized)
    }

    /// Current state of an active instance.
    pub fn get(&self, widget_id: &str) -> Option<Value> {
        let now = Utc::now();
        self.instances
            .get(widget_id)
            .filter(|w| w.phase_at(now, self.ttl) == WidgetPhase::Active)
            .map(|w| w.state.clone())
    }

    /// Renders an instance and returns the state it should display.
    ///
    /// The first render (or the first after a reset or expiry) seeds the
    /// instance. Re-rendering an active instance keeps its state.
    pub fn render(&self, widget_id: &str, conversation_id: &str, seed: Value) -> Value {
        let now = Utc::now();
        let mut entry = self
            .instances
            .entry(widget_id.to_string())
            .or_insert_with(|| WidgetInstance {
                conversation_id: conversation_id.to_string(),
                phase: WidgetPhase::Uninitialized,
                state: Value::Null,
                touched_at: now,
            });

        if entry.phase_at(now, self.ttl) != WidgetPhase::Active {
            tracing::debug!(widget_id, conversation_id, "Seeding widget state");
            entry.state = seed;
            entry.phase = WidgetPhase::Active;
        }
        entry.conversation_id = conversation_id.to_string();
        entry.touched_at = now;
        entry.state.clone()
    }

    /// Replaces the state of a rendered instance.
    pub fn persist(
        &self,
        widget_id: &str,
        state: Value,
    ) -> Result<PersistReceipt, WidgetStateError> {
        let mut entry = self
            .instances
            .get_mut(widget_id)
            .filter(|w| w.phase != WidgetPhase::Uninitialized)
            .ok_or_else(|| WidgetStateError::NotRendered(widget_id.to_string()))?;

        let estimated_tokens = estimate_tokens(&state);
        let over_budget = estimated_tokens > self.token_budget;
        if over_budget {
            tracing::warn!(
                widget_id,
                estimated_tokens,
                budget = self.token_budget,
                "Widget state exceeds token budget"
            );
        }

        entry.state = state;
        entry.phase = WidgetPhase::Active;
        entry.touched_at = Utc::now();

        Ok(PersistReceipt {
            widget_id: widget_id.to_string(),
            estimated_tokens,
            over_budget,
        })
    }

    /// Hard reset for a conversation: the user typed into the main composer.
    /// Returns how many instances were cleared.
    pub fn reset_conversation(&self, conversation_id: &str) -> usize {
        let mut cleared = 0;
        for mut entry in self.instances.iter_mut() {
            if entry.conversation_id == conversation_id
                && entry.phase != WidgetPhase::Uninitialized
            {
                entry.phase = WidgetPhase::Uninitialized;
                entry.state = Value::Null;
                cleared += 1;
            }
        }
        tracing::info!(conversation_id, cleared, "Composer input reset widget state");
        cleared
    }

    /// Drops instances that are stale or were reset. Returns how many went.
    pub fn sweep_stale(&self) -> usize {
        let now = Utc::now();
        let before = self.instances.len();
        self.instances
            .retain(|_, w| w.phase_at(now, self.ttl) == WidgetPhase::Active);
        before.saturating_sub(self.instances.len())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
