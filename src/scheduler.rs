//! Cooperative timer engine.
//!
//! Every poller and the local service update timer own one slot.  The
//! main loop advances the scheduler by the wall time that passed since
//! the last pass; whatever fired is reported to a [`SchedulerDelegate`]
//! and then run to completion before the loop yields again.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        main loop                             │
//! │                                                              │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐              │
//! │  │ peer 0x42  │  │ peer 0x43  │  │ service    │  periodic    │
//! │  │ poll 10 s  │  │ poll 30 s  │  │ update 10 s│  slots       │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘              │
//! │        ▼               ▼               ▼                     │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate (due slots)             │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │         poller.poll_cycle() / service.update()               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::SchedulerDelegate;
use log::info;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single periodic schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g., "peer:climate").
    pub label: heapless::String<32>,
    /// Fire every `interval_ms`.
    pub interval_ms: u32,
}

impl Schedule {
    /// Periodic schedule; labels longer than 32 bytes are truncated.
    pub fn periodic(label: &str, interval_ms: u32) -> Self {
        Self {
            label: truncated(label),
            interval_ms,
        }
    }
}

fn truncated(label: &str) -> heapless::String<32> {
    let mut out = heapless::String::new();
    for c in label.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
pub const MAX_SCHEDULES: usize = 8;

/// The scheduler engine.
///
/// Decoupled from whatever runs when a slot is due: it only invokes the
/// [`SchedulerDelegate`].  A long poll cycle delays later slots but never
/// drops them; a slot that fell several intervals behind fires once and
/// resynchronises.
pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// Milliseconds accumulated since last fire (or since added).
    elapsed_ms: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [const { None }; MAX_SCHEDULES],
        }
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!("Scheduler: added '{}' at slot {}", schedule.label, i);
                *slot = Some(ScheduleEntry {
                    schedule,
                    elapsed_ms: 0,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Advance every slot by `elapsed_ms` and report the ones that are due.
    ///
    /// Slots fire in slot order, at most once per call.
    pub fn tick(&mut self, elapsed_ms: u32, delegate: &mut dyn SchedulerDelegate) {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            let Some(entry) = slot else {
                continue;
            };

            entry.elapsed_ms = entry.elapsed_ms.saturating_add(u64::from(elapsed_ms));

            let interval = u64::from(entry.schedule.interval_ms.max(1));
            if entry.elapsed_ms >= interval {
                log::trace!(
                    "Scheduler: '{}' periodic fire (every {}ms)",
                    entry.schedule.label,
                    entry.schedule.interval_ms
                );
                delegate.on_schedule_fired(i, &entry.schedule.label);
                entry.elapsed_ms %= interval;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
