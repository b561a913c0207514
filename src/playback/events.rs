//! Typed event registry with listener priority and optional debouncing.
//!
//! Listeners are keyed by [`EventKind`]. Within a kind, higher priority runs first
//! and equal priorities keep registration order. A debounced listener only sees
//! the last event of a burst: every emit re-arms a per-listener timer task, and
//! replacing the task drops (cancels) the previous one.
//!
//! Dispatch never holds an internal borrow while a listener runs, so listeners
//! may register, unregister, or call back into the player.

use crate::error::ScrollFrameError;
use smallvec::SmallVec;
use smol::{LocalExecutor, Task};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Frame,
    Complete,
    InitComplete,
    Error,
}

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Logical frame drawn, with the normalized scroll offset in `[0, 1]`
    Frame { frame: usize, offset: f64 },
    /// The last frame was drawn
    Complete,
    /// `init()` finished loading the blocking batch
    InitComplete,
    Error(ScrollFrameError),
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Frame { .. } => EventKind::Frame,
            Self::Complete => EventKind::Complete,
            Self::InitComplete => EventKind::InitComplete,
            Self::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListenerOptions {
    pub priority: i32,
    pub debounce: Option<Duration>,
}

impl ListenerOptions {
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }

    pub fn debounced(delay: Duration) -> Self {
        Self {
            debounce: Some(delay),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&PlaybackEvent)>;

struct Debounce {
    delay: Duration,
    pending: RefCell<Option<Task<()>>>,
}

struct Subscriber {
    id: ListenerId,
    priority: i32,
    listener: Listener,
    debounce: Option<Debounce>,
}

type SubscriberList = SmallVec<[Rc<Subscriber>; 4]>;

pub struct EventRegistry {
    executor: Rc<LocalExecutor<'static>>,
    next_id: Cell<u64>,
    subscribers: RefCell<HashMap<EventKind, SubscriberList>>,
}

impl EventRegistry {
    pub fn new(executor: Rc<LocalExecutor<'static>>) -> Self {
        Self {
            executor,
            next_id: Cell::new(0),
            subscribers: RefCell::new(HashMap::new()),
        }
    }

    pub fn on(&self, kind: EventKind, listener: Listener, options: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let subscriber = Rc::new(Subscriber {
            id,
            priority: options.priority,
            listener,
            debounce: options
                .debounce
                .filter(|delay| !delay.is_zero())
                .map(|delay| Debounce {
                    delay,
                    pending: RefCell::new(None),
                }),
        });

        let mut subscribers = self.subscribers.borrow_mut();
        let list = subscribers.entry(kind).or_default();
        list.push(subscriber);
        // Stable: equal priorities keep registration order.
        list.sort_by_key(|s| std::cmp::Reverse(s.priority));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|s| s.id == id) else {
            return false;
        };
        let removed = list.remove(pos);
        if let Some(debounce) = &removed.debounce {
            debounce.pending.borrow_mut().take();
        }
        if list.is_empty() {
            subscribers.remove(&kind);
        }
        true
    }

    /// Deliver `event`. Returns whether anyone was listening.
    pub fn emit(&self, event: PlaybackEvent) -> bool {
        let targets: SubscriberList = match self.subscribers.borrow().get(&event.kind()) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return false,
        };

        for subscriber in targets {
            match &subscriber.debounce {
                None => (subscriber.listener)(&event),
                Some(debounce) => {
                    let listener = subscriber.listener.clone();
                    let deferred = event.clone();
                    let delay = debounce.delay;
                    let task = self.executor.spawn(async move {
                        smol::Timer::after(delay).await;
                        listener(&deferred);
                    });
                    // Dropping the previous task cancels the stale call.
                    *debounce.pending.borrow_mut() = Some(task);
                }
            }
        }
        true
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.subscribers.borrow().get(&kind).map_or(0, |list| list.len())
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kinds", &self.subscribers.borrow().len())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}
