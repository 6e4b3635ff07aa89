//! Sequence-stamping FIFO channel between pipeline stages.
//!
//! `enqueue` stamps a copy of the event with the next sequence number and
//! appends it; `dequeue` pops the head. Sequence numbers start at 0, grow by
//! exactly one per accepted event and are never reused.
//!
//! [`EventQueue`] needs `&mut self` for writes, so a single owner serializes
//! access for free. [`SharedEventQueue`] wraps it in a mutex for producers and
//! consumers on different threads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use crate::error::{EventError, Result};
use crate::events::Event;
use crate::logging::{event_fields, log, obj, v_str, Domain, Level};

pub const DEFAULT_QUEUE_NAME: &str = "main";
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Label used in log records.
    pub name: String,
    /// Initial allocation only; the queue is unbounded.
    pub initial_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_string(),
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            name: std::env::var("EVENT_QUEUE_NAME")
                .unwrap_or_else(|_| DEFAULT_QUEUE_NAME.to_string()),
            initial_capacity: std::env::var("EVENT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
        }
    }
}

#[derive(Debug)]
pub struct EventQueue {
    queue: VecDeque<Event>,
    next_seq: u64,
    name: String,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(cfg: QueueConfig) -> Self {
        Self {
            queue: VecDeque::with_capacity(cfg.initial_capacity),
            next_seq: 0,
            name: cfg.name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamp a copy of `event` with the next seq and append it.
    ///
    /// `event` itself is left untouched. Fails with
    /// [`EventError::AlreadySequenced`] if it already carries a seq; the
    /// counter does not move in that case.
    pub fn enqueue(&mut self, event: &Event) -> Result<Event> {
        if let Some(seq) = event.seq() {
            log(
                Level::Warn,
                Domain::Queue,
                "enqueue_rejected",
                event_fields(
                    event,
                    &[
                        ("queue", v_str(&self.name)),
                        ("msg", v_str("event already sequenced")),
                    ],
                ),
            );
            return Err(EventError::AlreadySequenced {
                event_id: event.event_id().clone(),
                seq,
            });
        }

        let stamped = event.stamped(self.next_seq);
        self.next_seq += 1;
        self.queue.push_back(stamped.clone());

        log(
            Level::Trace,
            Domain::for_event(stamped.event_type()),
            "enqueue",
            event_fields(
                &stamped,
                &[("queue", v_str(&self.name)), ("depth", json!(self.queue.len()))],
            ),
        );
        Ok(stamped)
    }

    /// Remove and return the head event. Never blocks.
    pub fn dequeue(&mut self) -> Result<Event> {
        match self.queue.pop_front() {
            Some(event) => {
                log(
                    Level::Trace,
                    Domain::Queue,
                    "dequeue",
                    event_fields(
                        &event,
                        &[("queue", v_str(&self.name)), ("depth", json!(self.queue.len()))],
                    ),
                );
                Ok(event)
            }
            None => {
                log(
                    Level::Debug,
                    Domain::Queue,
                    "dequeue_empty",
                    obj(&[
                        ("queue", v_str(&self.name)),
                        ("next_seq", json!(self.next_seq)),
                    ]),
                );
                Err(EventError::QueueEmpty)
            }
        }
    }

    pub fn peek(&self) -> Option<&Event> {
        self.queue.front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The seq the next accepted event will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Dequeue everything, in order.
    pub fn drain(&mut self) -> Vec<Event> {
        let events: Vec<Event> = self.queue.drain(..).collect();
        if !events.is_empty() {
            log(
                Level::Trace,
                Domain::Queue,
                "drain",
                obj(&[
                    ("queue", v_str(&self.name)),
                    ("count", json!(events.len())),
                ]),
            );
        }
        events
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to one [`EventQueue`] guarded by a mutex.
///
/// Each operation holds the lock for its whole read-modify-write, so
/// concurrent producers never see duplicate or out-of-order seqs and
/// concurrent consumers never receive the same event twice.
#[derive(Debug, Clone, Default)]
pub struct SharedEventQueue {
    inner: Arc<Mutex<EventQueue>>,
}

impl SharedEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(cfg: QueueConfig) -> Self {
        Self::from(EventQueue::with_config(cfg))
    }

    // Poison is ignored: the counter bump and the push have no fallible step between them.
    fn lock(&self) -> MutexGuard<'_, EventQueue> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enqueue(&self, event: &Event) -> Result<Event> {
        self.lock().enqueue(event)
    }

    pub fn dequeue(&self) -> Result<Event> {
        self.lock().dequeue()
    }

    /// Copy of the head event, if any.
    pub fn peek(&self) -> Option<Event> {
        self.lock().peek().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn next_seq(&self) -> u64 {
        self.lock().next_seq()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain()
    }
}

impl From<EventQueue> for SharedEventQueue {
    fn from(queue: EventQueue) -> Self {
        Self {
            inner: Arc::new(Mutex::new(queue)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{OrderSide, SignalAction};
    use chrono::Utc;
    use std::collections::HashSet;
    use std::thread;

    fn sig(symbol: &str) -> Event {
        Event::signal(Utc::now(), symbol, SignalAction::Buy)
    }

    #[test]
    fn test_fifo_and_seq() {
        let mut q = EventQueue::new();
        for sym in ["A", "B", "C"] {
            q.enqueue(&sig(sym)).unwrap();
        }
        for (i, sym) in ["A", "B", "C"].iter().enumerate() {
            let e = q.dequeue().unwrap();
            assert_eq!(e.symbol(), Some(*sym));
            assert_eq!(e.seq(), Some(i as u64));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_enqueue_leaves_original_unstamped() {
        let mut q = EventQueue::new();
        let original = sig("AAPL");
        let stamped = q.enqueue(&original).unwrap();
        assert_eq!(original.seq(), None);
        assert_eq!(stamped.seq(), Some(0));
        assert_eq!(stamped.event_id(), original.event_id());
    }

    #[test]
    fn test_restamp_rejected() {
        let mut q = EventQueue::new();
        let stamped = q.enqueue(&sig("AAPL")).unwrap();
        let err = q.enqueue(&stamped).unwrap_err();
        assert!(matches!(err, EventError::AlreadySequenced { seq: 0, .. }));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_seq(), 1);
    }

    #[test]
    fn test_empty_dequeue_keeps_state() {
        let mut q = EventQueue::new();
        q.enqueue(&sig("AAPL")).unwrap();
        q.dequeue().unwrap();
        let err = q.dequeue().unwrap_err();
        assert!(matches!(err, EventError::QueueEmpty));
        assert!(err.is_recoverable());
        assert_eq!(q.len(), 0);
        assert_eq!(q.next_seq(), 1);

        let next = q.enqueue(&sig("MSFT")).unwrap();
        assert_eq!(next.seq(), Some(1));
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let mut q = EventQueue::new();
        assert!(q.peek().is_none());
        q.enqueue(&sig("AAPL")).unwrap();
        let head = q.peek().cloned().unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue().unwrap(), head);
    }

    #[test]
    fn test_drain_in_order() {
        let mut q = EventQueue::new();
        for _ in 0..5 {
            q.enqueue(&Event::market_order(Utc::now(), "ES", OrderSide::Sell, 1.0))
                .unwrap();
        }
        let seqs: Vec<_> = q.drain().iter().filter_map(|e| e.seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
        assert_eq!(q.next_seq(), 5);
    }

    #[test]
    fn test_config_name() {
        let q = EventQueue::with_config(QueueConfig {
            name: "fills".to_string(),
            initial_capacity: 4,
        });
        assert_eq!(q.name(), "fills");
        assert_eq!(QueueConfig::default().name, DEFAULT_QUEUE_NAME);
    }

    #[test]
    fn test_shared_concurrent_producers() {
        let q = SharedEventQueue::new();
        let producers = 4;
        let per_producer = 250;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for _ in 0..per_producer {
                        q.enqueue(&sig(&format!("S{}", p))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total = producers * per_producer;
        assert_eq!(q.len(), total);
        let seqs: Vec<u64> = q.drain().iter().filter_map(|e| e.seq()).collect();
        let expected: Vec<u64> = (0..total as u64).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn test_shared_concurrent_consumers_no_duplicates() {
        let q = SharedEventQueue::new();
        for _ in 0..400 {
            q.enqueue(&sig("AAPL")).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Ok(e) = q.dequeue() {
                        got.push(e.seq().unwrap());
                    }
                    got
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            let got = h.join().unwrap();
            // each consumer sees a strictly increasing subsequence
            assert!(got.windows(2).all(|w| w[0] < w[1]));
            for s in got {
                assert!(seen.insert(s), "seq {} delivered twice", s);
            }
        }
        assert_eq!(seen.len(), 400);
        assert!(q.is_empty());
    }
}
