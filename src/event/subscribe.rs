//! Real-time event subscriptions
//!
//! Key types:
//! - `EventFilter`: set-membership filter + optional custom predicate
//! - `SubscriptionId`: handle returned by `EventLog::subscribe`
//! - `EventCallback`: subscriber function (its failures are isolated)

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::log::{Event, EventType};

/// Subscriber callback. `Err` and panics are logged, never propagated.
pub type EventCallback = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Custom match predicate
pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Identifier handed out by `subscribe`, used to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which events a subscriber receives. Every field is optional; an empty
/// filter matches everything.
#[derive(Clone, Default)]
pub struct EventFilter {
    pub workflow_ids: Option<FxHashSet<String>>,
    pub event_types: Option<FxHashSet<EventType>>,
    pub step_ids: Option<FxHashSet<String>>,
    pub agents: Option<FxHashSet<String>>,
    pub predicate: Option<EventPredicate>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workflow_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn event_types<I: IntoIterator<Item = EventType>>(mut self, types: I) -> Self {
        self.event_types = Some(types.into_iter().collect());
        self
    }

    pub fn step_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents = Some(agents.into_iter().map(Into::into).collect());
        self
    }

    pub fn predicate(mut self, predicate: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// True when every configured criterion accepts the event.
    ///
    /// Events without a step id / agent never match a step / agent filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.workflow_ids {
            if !ids.contains(&event.workflow_id) {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(steps) = &self.step_ids {
            if !event.step_id.as_ref().is_some_and(|s| steps.contains(s)) {
                return false;
            }
        }
        if let Some(agents) = &self.agents {
            if !event.agent.as_ref().is_some_and(|a| agents.contains(a)) {
                return false;
            }
        }
        match &self.predicate {
            Some(predicate) => predicate(event),
            None => true,
        }
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("workflow_ids", &self.workflow_ids)
            .field("event_types", &self.event_types)
            .field("step_ids", &self.step_ids)
            .field("agents", &self.agents)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Registered subscriber (callback + filter)
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) callback: EventCallback,
    pub(crate) filter: EventFilter,
}
