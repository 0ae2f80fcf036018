//! Lightweight notification primitives used for persist triggers.
//!
//! A [`Signal`] is a cloneable, multi-subscriber notification. An [`EventHub`]
//! groups signals under names so that configurations can attach persist
//! triggers by event name (`"Click"`, `"Closing"`, ...). Both implement
//! [`EventSource`], which is all the tracking core needs from an object that
//! raises events.
//!
//! Handlers are always invoked with no internal lock held, so a handler may
//! subscribe further handlers or raise other signals.

use crate::core::{TrackError, TrackResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// Anything that can attach a handler to a named event.
pub trait EventSource {
    fn add_event_handler(&self, event: &str, handler: EventHandler) -> TrackResult<()>;
}

#[derive(Clone, Default)]
pub struct Signal {
    subscribers: Arc<Mutex<Vec<EventHandler>>>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> TrackResult<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribers.lock()?.push(Arc::new(handler));
        Ok(())
    }

    /// Invoke every subscriber in subscription order.
    ///
    /// Returns the number of handlers that ran.
    pub fn raise(&self) -> TrackResult<usize> {
        let handlers = self.subscribers.lock()?.clone();
        for handler in &handlers {
            handler();
        }
        Ok(handlers.len())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.subscribers, &other.subscribers)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A single signal answers to any event name.
impl EventSource for Signal {
    fn add_event_handler(&self, _event: &str, handler: EventHandler) -> TrackResult<()> {
        self.subscribers.lock()?.push(handler);
        Ok(())
    }
}

/// Named signals. Cloning shares the underlying set.
#[derive(Clone, Default)]
pub struct EventHub {
    signals: Arc<RwLock<HashMap<String, Signal>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signals = events
            .into_iter()
            .map(|name| (name.into(), Signal::new()))
            .collect::<HashMap<_, _>>();
        Self {
            signals: Arc::new(RwLock::new(signals)),
        }
    }

    /// Declare an event, returning its signal. Declaring twice returns the
    /// same signal.
    pub fn declare(&self, event: impl Into<String>) -> TrackResult<Signal> {
        let mut signals = self.signals.write()?;
        Ok(signals.entry(event.into()).or_default().clone())
    }

    pub fn signal(&self, event: &str) -> Option<Signal> {
        self.signals
            .read()
            .ok()
            .and_then(|signals| signals.get(event).cloned())
    }

    pub fn has_event(&self, event: &str) -> bool {
        self.signal(event).is_some()
    }

    pub fn raise(&self, event: &str) -> TrackResult<usize> {
        let signal = self
            .signal(event)
            .ok_or_else(|| TrackError::UnknownEvent(event.to_string()))?;
        signal.raise()
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names = self
            .signals
            .read()
            .map(|signals| signals.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("events", &self.event_names())
            .finish()
    }
}

impl EventSource for EventHub {
    fn add_event_handler(&self, event: &str, handler: EventHandler) -> TrackResult<()> {
        let signal = self
            .signal(event)
            .ok_or_else(|| TrackError::UnknownEvent(event.to_string()))?;
        signal.add_event_handler(event, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_invokes_all_subscribers() {
        let signal = Signal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            signal
                .subscribe(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        assert_eq!(signal.raise().unwrap(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_may_subscribe_during_raise() {
        let signal = Signal::new();
        let inner = signal.clone();
        signal
            .subscribe(move || {
                inner.subscribe(|| {}).unwrap();
            })
            .unwrap();

        signal.raise().unwrap();
        assert_eq!(signal.subscriber_count(), 2);
    }

    #[test]
    fn test_hub_rejects_unknown_event() {
        let hub = EventHub::with_events(["Click"]);
        let err = hub
            .add_event_handler("DoubleClick", Arc::new(|| {}))
            .unwrap_err();
        assert_eq!(err, TrackError::UnknownEvent("DoubleClick".to_string()));
        assert!(hub.raise("DoubleClick").is_err());
    }

    #[test]
    fn test_hub_clone_shares_signals() {
        let hub = EventHub::new();
        let click = hub.declare("Click").unwrap();
        let clone = hub.clone();
        assert!(clone.signal("Click").unwrap().ptr_eq(&click));
        assert_eq!(hub.event_names(), vec!["Click".to_string()]);
    }
}
