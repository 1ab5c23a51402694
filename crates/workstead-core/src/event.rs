//! Typed event system with pre-allocated ring buffers.
//!
//! Events are emitted while the tick phases run and delivered in batch
//! during the post-tick phase. Each event kind has its own [`EventBuffer`]
//! ring buffer with a configurable capacity.
//!
//! Subscribers are passive: read-only callbacks for UI, audio, and
//! analytics hooks. Simulation-affecting reactions never go through the
//! bus; they are explicit world commands or queued world mutations.
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::fixed::Frames;
use crate::id::*;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why a station died.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// The decay counter reached its cap.
    DecayExhausted,
    /// A single-use station produced once.
    SingleUseSpent,
}

/// A simulation event. All events carry the frame at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Resource instances --
    InstanceSpawned {
        instance: InstanceId,
        kind: KindId,
        frame: Frames,
    },
    InstanceExpired {
        instance: InstanceId,
        kind: KindId,
        frame: Frames,
    },
    InstanceConsumed {
        instance: InstanceId,
        kind: KindId,
        area: AreaId,
        frame: Frames,
    },

    // -- Containment --
    AreaSatisfied {
        area: AreaId,
        frame: Frames,
    },
    AreaRejected {
        area: AreaId,
        instance: InstanceId,
        frame: Frames,
    },
    InstanceLocked {
        area: AreaId,
        instance: InstanceId,
        frame: Frames,
    },

    // -- Labor --
    LaborStarted {
        station: StationId,
        agent: AgentId,
        frame: Frames,
    },
    LaborStopped {
        station: StationId,
        agent: AgentId,
        frame: Frames,
    },
    /// Labor was refused because input requirements are unmet.
    LaborRejected {
        station: StationId,
        agent: AgentId,
        frame: Frames,
    },
    WorkCompleted {
        station: StationId,
        frame: Frames,
    },

    // -- Station lifecycle --
    StationProduced {
        station: StationId,
        kind: KindId,
        quantity: u32,
        frame: Frames,
    },
    StationConsumed {
        station: StationId,
        frame: Frames,
    },
    StationDecayed {
        station: StationId,
        decay: u32,
        frame: Frames,
    },
    StationDied {
        station: StationId,
        cause: DeathCause,
        frame: Frames,
    },
    StationAged {
        station: StationId,
        stage: u32,
        frame: Frames,
    },
    StationErected {
        station: StationId,
        config: StationConfigId,
        frame: Frames,
    },
    StationRemoved {
        station: StationId,
        frame: Frames,
    },
    StationUpgraded {
        from: StationId,
        to: StationId,
        config: StationConfigId,
        frame: Frames,
    },

    // -- Ledger --
    CapitalChanged {
        amount: i64,
        total: i64,
        frame: Frames,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InstanceSpawned,
    InstanceExpired,
    InstanceConsumed,
    AreaSatisfied,
    AreaRejected,
    InstanceLocked,
    LaborStarted,
    LaborStopped,
    LaborRejected,
    WorkCompleted,
    StationProduced,
    StationConsumed,
    StationDecayed,
    StationDied,
    StationAged,
    StationErected,
    StationRemoved,
    StationUpgraded,
    CapitalChanged,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 19;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InstanceSpawned { .. } => EventKind::InstanceSpawned,
            Event::InstanceExpired { .. } => EventKind::InstanceExpired,
            Event::InstanceConsumed { .. } => EventKind::InstanceConsumed,
            Event::AreaSatisfied { .. } => EventKind::AreaSatisfied,
            Event::AreaRejected { .. } => EventKind::AreaRejected,
            Event::InstanceLocked { .. } => EventKind::InstanceLocked,
            Event::LaborStarted { .. } => EventKind::LaborStarted,
            Event::LaborStopped { .. } => EventKind::LaborStopped,
            Event::LaborRejected { .. } => EventKind::LaborRejected,
            Event::WorkCompleted { .. } => EventKind::WorkCompleted,
            Event::StationProduced { .. } => EventKind::StationProduced,
            Event::StationConsumed { .. } => EventKind::StationConsumed,
            Event::StationDecayed { .. } => EventKind::StationDecayed,
            Event::StationDied { .. } => EventKind::StationDied,
            Event::StationAged { .. } => EventKind::StationAged,
            Event::StationErected { .. } => EventKind::StationErected,
            Event::StationRemoved { .. } => EventKind::StationRemoved,
            Event::StationUpgraded { .. } => EventKind::StationUpgraded,
            Event::CapitalChanged { .. } => EventKind::CapitalChanged,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    /// Pre-allocated storage.
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored (may be less than capacity).
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// The total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Clear all events from the buffer.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Wraps a listener with priority, optional filter, and insertion order.
struct SubscriberEntry {
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field(
                "filter",
                &if self.filter.is_some() {
                    "Some(<fn>)"
                } else {
                    "None"
                },
            )
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The central event bus. Holds one ring buffer per event kind, subscriber
/// lists, and suppression flags.
pub struct EventBus {
    /// One ring buffer per event kind.
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],

    /// Suppressed event kinds. Suppressed events are never buffered.
    suppressed: [bool; EVENT_KIND_COUNT],

    /// Subscribers indexed by event kind.
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],

    /// Default buffer capacity for new event buffers.
    default_capacity: usize,

    /// Monotonically increasing counter for stable sort ordering.
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        // Drop the buffer if it exists -- zero allocation for suppressed kinds.
        self.buffers[kind.index()] = None;
    }

    /// Check if an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. Stores it in the appropriate ring buffer. No-ops if
    /// the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let kind = event.kind();
        let idx = kind.index();

        if self.suppressed[idx] {
            return;
        }

        // Lazily allocate buffer on first emit.
        let buffer = self.buffers[idx].get_or_insert_with(|| EventBuffer::new(self.default_capacity));
        buffer.push(event);
    }

    /// Register a passive listener for an event kind. Listeners are called
    /// in registration order during delivery with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a passive listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Deliver all buffered events to subscribers. Called during post-tick.
    ///
    /// For each event kind that has buffered events:
    /// 1. Sort subscribers by `(priority, insertion_order)`.
    /// 2. Iterate events oldest-to-newest.
    /// 3. For each subscriber, check the optional filter; skip if it returns false.
    /// 4. Call the listener.
    /// 5. Clear the buffer after delivery.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }

            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };

            if buffer.is_empty() {
                continue;
            }

            // Collect events into a temporary Vec to avoid borrow conflicts
            // between the buffer and subscribers.
            let events: Vec<Event> = buffer.iter().cloned().collect();

            // Sort subscribers by (priority, insertion_order) for stable ordering.
            self.subscribers[idx]
                .sort_by_key(|entry| (entry.priority as u8, entry.insertion_order));

            for entry in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(ref filter) = entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }

            // Clear the buffer after delivery.
            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Get the event buffer for a specific event kind (read-only).
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Get the count of events currently buffered for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Get the total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers. Does not remove subscribers or suppression settings.
    pub fn clear_all(&mut self) {
        for buffer in &mut self.buffers {
            if let Some(b) = buffer.as_mut() {
                b.clear();
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
