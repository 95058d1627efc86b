//! # Strum Onset Module
//!
//! Decides when a strum happened from the per-callback amplitude signal and
//! when its snapshot should be taken.
//!
//! The detector is a plain state machine: the caller supplies timestamps, so
//! it runs the same against the wall clock (live engine) and against a
//! sample clock (offline replay and tests).
//!
//! ## Phases
//! - **Idle**: waiting for an attack
//! - **Pending**: an attack fired, waiting out the latch delay
//! - **Cooldown**: recently fired, further attacks are ignored
//!
//! A qualifying attack while a trigger is still pending replaces it, so only
//! the most recent strum is ever analysed.

use std::time::{Duration, Instant};

use crate::config::OnsetConfig;

/// A fired onset waiting for its latch delay to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// Monotonic id; a higher id supersedes every lower one.
    pub id: u64,
    /// When the attack was detected.
    pub fired_at: Instant,
    /// When the snapshot should be taken.
    pub due_at: Instant,
}

/// Observable phase of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnsetPhase {
    Idle,
    Cooldown,
    Pending,
}

/// Flux-gated onset detector with cooldown and a cancellable latch delay.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    flux_threshold: f32,
    min_amplitude: f32,
    latch_delay: Duration,
    cooldown: Duration,
    previous_amp: f32,
    last_trigger: Option<Instant>,
    pending: Option<Trigger>,
    next_id: u64,
}

impl OnsetDetector {
    pub fn new(config: &OnsetConfig) -> Self {
        Self {
            flux_threshold: config.flux_threshold,
            min_amplitude: config.min_amplitude,
            latch_delay: config.latch_delay(),
            cooldown: config.cooldown(),
            previous_amp: 0.0,
            last_trigger: None,
            pending: None,
            next_id: 1,
        }
    }

    /// Feeds one amplitude value. Returns the new trigger if an onset fired.
    ///
    /// Fires when the amplitude is above the gate, rose by more than the
    /// flux threshold since the previous value, and the cooldown since the
    /// last trigger has elapsed. A newly fired trigger replaces any pending one.
    ///
    /// A non-finite amplitude never fires and is not remembered, so the next
    /// real value is compared against the last real one.
    pub fn observe(&mut self, amp: f32, now: Instant) -> Option<Trigger> {
        if !amp.is_finite() {
            return None;
        }
        let delta = amp - self.previous_amp;
        self.previous_amp = amp;

        if !(amp > self.min_amplitude && delta > self.flux_threshold) {
            return None;
        }
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) <= self.cooldown {
                return None;
            }
        }

        self.last_trigger = Some(now);
        let trigger = Trigger {
            id: self.next_id,
            fired_at: now,
            due_at: now + self.latch_delay,
        };
        self.next_id += 1;
        self.pending = Some(trigger);
        Some(trigger)
    }

    /// The trigger currently waiting for its latch delay, if any.
    pub fn pending(&self) -> Option<Trigger> {
        self.pending
    }

    /// Takes the pending trigger if its latch delay has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<Trigger> {
        match self.pending {
            Some(trigger) if now >= trigger.due_at => self.pending.take(),
            _ => None,
        }
    }

    /// Consumes the pending trigger only if it is still trigger `id`.
    ///
    /// Returns false when `id` was preempted by a newer onset or cancelled.
    pub fn claim(&mut self, id: u64) -> bool {
        if self.pending.is_some_and(|t| t.id == id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Drops the pending trigger without analysing it.
    pub fn cancel(&mut self) -> Option<Trigger> {
        self.pending.take()
    }

    pub fn phase(&self, now: Instant) -> OnsetPhase {
        if self.pending.is_some() {
            return OnsetPhase::Pending;
        }
        match self.last_trigger {
            Some(last) if now.saturating_duration_since(last) <= self.cooldown => {
                OnsetPhase::Cooldown
            }
            _ => OnsetPhase::Idle,
        }
    }

    /// Forgets all history: amplitude, last trigger and pending work.
    /// Trigger ids keep increasing so stale ids never match again.
    pub fn reset(&mut self) {
        self.previous_amp = 0.0;
        self.last_trigger = None;
        self.pending = None;
    }
}
