//! Lifecycle hooks
//!
//! Each [`HookPoint`] keeps an ordered subscriber list. When a point fires
//! every subscriber runs in registration order and their results are folded
//! by a fold function passed to [`Hooks::trigger`]. For the cancellable
//! `Pre*` points a folded `Some(false)` cancels the row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tabula_query::Executor;

use crate::upload::UploadPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreGet,
    PostGet,
    PreCreate,
    WriteCreate,
    PostCreate,
    PreEdit,
    WriteEdit,
    PostEdit,
    PreRemove,
    PostRemove,
    PreUpload,
    PostUpload,
}

/// Payload handed to subscribers. Ids are unprefixed.
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    PreGet { id: Option<&'a str> },
    PostGet { id: Option<&'a str>, data: &'a [Value] },
    PreCreate { values: &'a Value },
    WriteCreate { id: &'a str, values: &'a Value },
    PostCreate { id: &'a str, values: &'a Value, row: Option<&'a Value> },
    PreEdit { id: &'a str, values: &'a Value },
    WriteEdit { id: &'a str, values: &'a Value },
    PostEdit { id: &'a str, values: &'a Value, row: Option<&'a Value> },
    PreRemove { id: &'a str, values: &'a Value },
    PostRemove { id: &'a str, values: &'a Value },
    PreUpload { field: &'a str, payload: &'a UploadPayload },
    PostUpload { field: &'a str, id: &'a Value, files: &'a Map<String, Value> },
}

impl HookEvent<'_> {
    pub fn point(&self) -> HookPoint {
        match self {
            HookEvent::PreGet { .. } => HookPoint::PreGet,
            HookEvent::PostGet { .. } => HookPoint::PostGet,
            HookEvent::PreCreate { .. } => HookPoint::PreCreate,
            HookEvent::WriteCreate { .. } => HookPoint::WriteCreate,
            HookEvent::PostCreate { .. } => HookPoint::PostCreate,
            HookEvent::PreEdit { .. } => HookPoint::PreEdit,
            HookEvent::WriteEdit { .. } => HookPoint::WriteEdit,
            HookEvent::PostEdit { .. } => HookPoint::PostEdit,
            HookEvent::PreRemove { .. } => HookPoint::PreRemove,
            HookEvent::PostRemove { .. } => HookPoint::PostRemove,
            HookEvent::PreUpload { .. } => HookPoint::PreUpload,
            HookEvent::PostUpload { .. } => HookPoint::PostUpload,
        }
    }

    /// Unprefixed row id, when the event concerns one row
    pub fn id(&self) -> Option<&str> {
        match *self {
            HookEvent::PreGet { id } | HookEvent::PostGet { id, .. } => id,
            HookEvent::WriteCreate { id, .. }
            | HookEvent::PostCreate { id, .. }
            | HookEvent::PreEdit { id, .. }
            | HookEvent::WriteEdit { id, .. }
            | HookEvent::PostEdit { id, .. }
            | HookEvent::PreRemove { id, .. }
            | HookEvent::PostRemove { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// A hook subscriber. Returning `None` leaves the folded result untouched.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, event: &HookEvent<'_>, executor: &dyn Executor) -> Option<bool>;
}

#[async_trait]
impl<F> Hook for F
where
    F: Fn(&HookEvent<'_>) -> Option<bool> + Send + Sync,
{
    async fn call(&self, event: &HookEvent<'_>, _executor: &dyn Executor) -> Option<bool> {
        self(event)
    }
}

/// Folds subscriber results into one
pub type Fold = fn(Vec<Option<bool>>) -> Option<bool>;

/// The last subscriber that returned something wins
pub fn last_non_null(results: Vec<Option<bool>>) -> Option<bool> {
    results.into_iter().flatten().last()
}

#[derive(Clone, Default)]
pub struct Hooks {
    subscribers: HashMap<HookPoint, Vec<Arc<dyn Hook>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, point: HookPoint, hook: Arc<dyn Hook>) {
        self.subscribers.entry(point).or_default().push(hook);
    }

    pub fn has(&self, point: HookPoint) -> bool {
        self.subscribers.get(&point).map_or(false, |s| !s.is_empty())
    }

    pub async fn trigger(
        &self,
        event: HookEvent<'_>,
        executor: &dyn Executor,
        fold: Fold,
    ) -> Option<bool> {
        let Some(subscribers) = self.subscribers.get(&event.point()) else {
            return None;
        };
        let mut results = Vec::with_capacity(subscribers.len());
        for hook in subscribers {
            results.push(hook.call(&event, executor).await);
        }
        fold(results)
    }

    /// Fire a cancellable point; `true` when a subscriber cancelled
    pub async fn cancelled(&self, event: HookEvent<'_>, executor: &dyn Executor) -> bool {
        self.trigger(event, executor, last_non_null).await == Some(false)
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut points: Vec<String> = self
            .subscribers
            .iter()
            .map(|(point, subs)| format!("{:?}({})", point, subs.len()))
            .collect();
        points.sort();
        f.debug_struct("Hooks").field("subscribers", &points).finish()
    }
}
