//! Watch streams as add / update / delete notifications
//!
//! kube's watcher reports every change as an `Apply` and replays the full
//! object set on each relist. The reconcilers need to know whether an object
//! is new, changed or gone, so [`EventClassifier`] keeps the last seen version
//! of every object and turns the raw stream into [`ResourceEvent`]s.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::controller::Context;
use crate::Result;

/// A classified change to a watched object
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent<K> {
    /// First sighting of the object
    Added(Arc<K>),
    /// The object changed since it was last seen
    Updated {
        /// Previously seen version
        old: Arc<K>,
        /// Current version
        new: Arc<K>,
    },
    /// The object is gone; carries its last known state
    Deleted(Arc<K>),
}

impl<K: Resource> ResourceEvent<K> {
    /// Short lowercase label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceEvent::Added(_) => "added",
            ResourceEvent::Updated { .. } => "updated",
            ResourceEvent::Deleted(_) => "deleted",
        }
    }

    /// The most recent version of the object
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Added(obj) | ResourceEvent::Deleted(obj) => obj,
            ResourceEvent::Updated { new, .. } => new,
        }
    }
}

/// Turns raw watcher events into [`ResourceEvent`]s
pub struct EventClassifier<K>
where
    K: Resource,
    K::DynamicType: Hash + Eq,
{
    cache: HashMap<ObjectRef<K>, Arc<K>>,
    relisted: Option<HashSet<ObjectRef<K>>>,
}

impl<K> Default for EventClassifier<K>
where
    K: Resource,
    K::DynamicType: Hash + Eq,
{
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K> EventClassifier<K>
where
    K: Resource + Clone,
    K::DynamicType: Default + Hash + Eq + Clone,
{
    /// Create an empty classifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently known
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True when no objects are known
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Classify one watcher event.
    ///
    /// A relist (`Init` .. `InitDone`) may produce several events: objects that
    /// were not part of the relist are reported as deleted when it completes.
    pub fn classify(&mut self, event: Event<K>) -> Vec<ResourceEvent<K>> {
        match event {
            Event::Apply(obj) => self.apply(obj).into_iter().collect(),
            Event::Delete(obj) => {
                self.cache.remove(&ObjectRef::from_obj(&obj));
                vec![ResourceEvent::Deleted(Arc::new(obj))]
            }
            Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(obj) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(ObjectRef::from_obj(&obj));
                }
                self.apply(obj).into_iter().collect()
            }
            Event::InitDone => {
                let Some(seen) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone: Vec<ObjectRef<K>> = self
                    .cache
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                gone.into_iter()
                    .filter_map(|key| self.cache.remove(&key))
                    .map(ResourceEvent::Deleted)
                    .collect()
            }
        }
    }

    fn apply(&mut self, obj: K) -> Option<ResourceEvent<K>> {
        let key = ObjectRef::from_obj(&obj);
        let new = Arc::new(obj);
        match self.cache.insert(key, new.clone()) {
            None => Some(ResourceEvent::Added(new)),
            Some(old) => {
                let unchanged = old.resource_version().is_some()
                    && old.resource_version() == new.resource_version();
                if unchanged {
                    None
                } else {
                    Some(ResourceEvent::Updated { old, new })
                }
            }
        }
    }
}

/// Watch `api` and run `handler` on its own task for every classified event.
///
/// Runs until the watch stream ends. Watch errors are logged and the stream
/// backs off and reconnects; handler errors are logged and not retried.
pub async fn watch_and_dispatch<K, F, Fut>(
    api: Api<K>,
    config: watcher::Config,
    kind: &'static str,
    ctx: Arc<Context>,
    handler: F,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Hash + Eq + Clone,
    F: Fn(ResourceEvent<K>, Arc<Context>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut classifier = EventClassifier::<K>::new();
    let mut stream = watcher::watcher(api, config).default_backoff().boxed();

    while let Some(event) = stream.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(kind, error = %e, "Watch error, backing off");
                continue;
            }
        };

        for resource_event in classifier.classify(event) {
            let event_kind = resource_event.kind();
            let name = resource_event.object().name_any();
            let namespace = resource_event.object().namespace().unwrap_or_default();
            debug!(
                kind,
                event = event_kind,
                name = %name,
                namespace = %namespace,
                "Dispatching event"
            );

            let fut = handler(resource_event, ctx.clone());
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    error!(
                        kind,
                        event = event_kind,
                        name = %name,
                        namespace = %namespace,
                        error = %e,
                        retryable = e.is_retryable(),
                        status_code = ?e.status_code(),
                        "Event handling failed"
                    );
                }
            });
        }
    }

    warn!(kind, "Watch stream ended");
}
