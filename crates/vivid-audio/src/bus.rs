//! Lock-free event channel from the main thread to the audio thread.
//!
//! A bounded single-producer single-consumer ring ([`rtrb`]) carries
//! [`AudioEvent`] records. The wrapper adds what the engine contract
//! requires on top of the ring itself: a shared drop counter (`push` never
//! blocks — a full queue counts and returns `false`) and approximate
//! occupancy reads for the monitoring overlay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vivid_core::audio::AudioEvent;

/// Default event queue capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Creates a connected sender/receiver pair with the given capacity.
pub fn event_bus(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = rtrb::RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            tx,
            dropped: Arc::clone(&dropped),
            capacity,
        },
        EventReceiver { rx, dropped },
    )
}

/// Main-thread half of the event bus.
pub struct EventSender {
    tx: rtrb::Producer<AudioEvent>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl EventSender {
    /// Queues an event. Returns `false` and bumps the drop counter when the
    /// ring is full; never blocks.
    pub fn push(&mut self, event: AudioEvent) -> bool {
        match self.tx.push(event) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Events dropped since construction.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Approximate number of queued events.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.slots()
    }

    /// Returns `true` if the queue currently looks empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Audio-thread half of the event bus.
pub struct EventReceiver {
    rx: rtrb::Consumer<AudioEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Pops the oldest queued event, if any.
    pub fn pop(&mut self) -> Option<AudioEvent> {
        self.rx.pop().ok()
    }

    /// Approximate number of queued events.
    pub fn len(&self) -> usize {
        self.rx.slots()
    }

    /// Returns `true` if the queue currently looks empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events dropped since construction (shared with the sender).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::audio::AudioEventKind;

    #[test]
    fn full_queue_counts_drops_and_preserves_fifo() {
        let (mut tx, mut rx) = event_bus(4);

        for i in 0..6 {
            let ok = tx.push(AudioEvent::param_change(0, 0, i as f32));
            assert_eq!(ok, i < 4, "push {i}");
        }
        assert_eq!(tx.dropped_count(), 2);
        assert_eq!(tx.len(), 4);

        // Pops yield exactly capacity events, oldest first.
        for i in 0..4 {
            let ev = rx.pop().expect("queued event");
            assert_eq!(ev.value1, i as f32);
        }
        assert!(rx.pop().is_none());
        assert_eq!(rx.dropped_count(), 2);
    }

    #[test]
    fn push_pop_order_is_preserved_across_kinds() {
        let (mut tx, mut rx) = event_bus(DEFAULT_EVENT_CAPACITY);
        tx.push(AudioEvent::note_on(3, 440.0, 1.0));
        tx.push(AudioEvent::trigger(1));
        tx.push(AudioEvent::note_off(3));

        assert_eq!(rx.pop().unwrap().kind, AudioEventKind::NoteOn);
        assert_eq!(rx.pop().unwrap().kind, AudioEventKind::Trigger);
        assert_eq!(rx.pop().unwrap().kind, AudioEventKind::NoteOff);
        assert!(rx.is_empty());
    }

    #[test]
    fn drained_queue_accepts_new_events() {
        let (mut tx, mut rx) = event_bus(2);
        assert!(tx.push(AudioEvent::trigger(0)));
        assert!(tx.push(AudioEvent::trigger(1)));
        assert!(!tx.push(AudioEvent::trigger(2)));

        rx.pop();
        assert!(tx.push(AudioEvent::trigger(3)));
        assert_eq!(rx.pop().unwrap().target, 1);
        assert_eq!(rx.pop().unwrap().target, 3);
        assert_eq!(tx.dropped_count(), 1);
    }
}
