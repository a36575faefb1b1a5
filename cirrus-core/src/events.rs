use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Identity of one coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinatorId(Uuid);

impl CoordinatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CoordinatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CoordinatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coord_{}", self.0.simple())
    }
}

/// Events a coordinator raises to its own subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// The in-flight count went from 1 to 0.
    AllCompleted { coordinator: CoordinatorId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorEventKind {
    AllCompleted,
}

impl CoordinatorEvent {
    pub fn kind(&self) -> CoordinatorEventKind {
        match self {
            CoordinatorEvent::AllCompleted { .. } => CoordinatorEventKind::AllCompleted,
        }
    }
}

/// Listener signature. Listeners run on the delivery context.
pub type EventListener = Arc<dyn Fn(&CoordinatorEvent) + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    kind: CoordinatorEventKind,
    listener: EventListener,
    once: bool,
}

/// Listener registry owned by a single coordinator.
///
/// Emission is split in the same three phases regardless of the lock the
/// owner wraps the hub in:
/// 1) snapshot matching listeners (no callbacks run, lock may be held)
/// 2) run listeners (lock released)
/// 3) drop fired `once` listeners
#[derive(Default)]
pub struct EventHub {
    listeners: Vec<ListenerEntry>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn on(&mut self, kind: CoordinatorEventKind, listener: EventListener) -> ListenerId {
        self.push(kind, listener, false)
    }

    pub fn once(&mut self, kind: CoordinatorEventKind, listener: EventListener) -> ListenerId {
        self.push(kind, listener, true)
    }

    fn push(&mut self, kind: CoordinatorEventKind, listener: EventListener, once: bool) -> ListenerId {
        let id = next_listener_id();
        self.listeners.push(ListenerEntry {
            id,
            kind,
            listener,
            once,
        });
        id
    }

    /// removeListener/off
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        before != self.listeners.len()
    }

    /// Remove every listener, or only those for `kind`
    pub fn remove_all(&mut self, kind: Option<CoordinatorEventKind>) -> usize {
        let before = self.listeners.len();
        match kind {
            Some(k) => self.listeners.retain(|e| e.kind != k),
            None => self.listeners.clear(),
        }
        before - self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Phase 1: matching listeners plus the `once` ids to drop afterwards.
    pub fn snapshot_emit(&self, event: &CoordinatorEvent) -> (Vec<EventListener>, Vec<ListenerId>) {
        let kind = event.kind();
        let mut to_call = Vec::new();
        let mut once_ids = Vec::new();

        for entry in &self.listeners {
            if entry.kind == kind {
                to_call.push(entry.listener.clone());
                if entry.once {
                    once_ids.push(entry.id);
                }
            }
        }

        (to_call, once_ids)
    }

    /// Phase 3
    pub fn finalize_once_removals(&mut self, once_ids: &[ListenerId]) {
        if once_ids.is_empty() {
            return;
        }
        self.listeners.retain(|e| !once_ids.contains(&e.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn emit(hub: &mut EventHub, event: &CoordinatorEvent) -> usize {
        let (listeners, once_ids) = hub.snapshot_emit(event);
        for f in &listeners {
            f(event);
        }
        hub.finalize_once_removals(&once_ids);
        listeners.len()
    }

    fn counting(counter: &Arc<AtomicUsize>) -> EventListener {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn on_fires_every_time_once_fires_once() {
        let mut hub = EventHub::new();
        let always = Arc::new(AtomicUsize::new(0));
        let single = Arc::new(AtomicUsize::new(0));
        hub.on(CoordinatorEventKind::AllCompleted, counting(&always));
        hub.once(CoordinatorEventKind::AllCompleted, counting(&single));

        let event = CoordinatorEvent::AllCompleted {
            coordinator: CoordinatorId::new(),
        };
        assert_eq!(emit(&mut hub, &event), 2);
        assert_eq!(emit(&mut hub, &event), 1);

        assert_eq!(always.load(Ordering::SeqCst), 2);
        assert_eq!(single.load(Ordering::SeqCst), 1);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn off_removes_listener() {
        let mut hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = hub.on(CoordinatorEventKind::AllCompleted, counting(&hits));

        assert!(hub.off(id));
        assert!(!hub.off(id));

        emit(
            &mut hub,
            &CoordinatorEvent::AllCompleted {
                coordinator: CoordinatorId::new(),
            },
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_all_clears_kind() {
        let mut hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hub.on(CoordinatorEventKind::AllCompleted, counting(&hits));
        hub.once(CoordinatorEventKind::AllCompleted, counting(&hits));

        assert_eq!(hub.remove_all(Some(CoordinatorEventKind::AllCompleted)), 2);
        assert!(hub.is_empty());
    }

    #[test]
    fn coordinator_ids_are_distinct() {
        let a = CoordinatorId::new();
        let b = CoordinatorId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("coord_"));
    }
}
