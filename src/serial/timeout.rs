//! # Receive Timeout Policy
//!
//! A receive must never wait forever for a servo that does not answer, yet a
//! single fixed timeout is wrong across the range of baud rates and packet
//! sizes in use. The budget is the theoretical transfer time of the packet
//! plus a margin covering the USB adapter latency timer and scheduling jitter.

use std::time::{Duration, Instant};

use crate::constants::{
    BITS_PER_BYTE, LATENCY_TIME_DEFAULT_MS, LATENCY_TIME_MAX_MS, LATENCY_TIME_MIN_MS,
    TIMEOUT_FIXED_MARGIN_MS,
};

/// Computes timeout budgets from baud rate and packet length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    latency_ms: u8,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy {
            latency_ms: LATENCY_TIME_DEFAULT_MS,
        }
    }
}

impl TimeoutPolicy {
    /// Build a policy for an adapter latency timer, in milliseconds.
    /// Returns `None` outside of `[1, 128]`.
    pub fn with_latency(latency_ms: u8) -> Option<Self> {
        (LATENCY_TIME_MIN_MS..=LATENCY_TIME_MAX_MS)
            .contains(&latency_ms)
            .then_some(TimeoutPolicy { latency_ms })
    }

    pub fn latency_ms(&self) -> u8 {
        self.latency_ms
    }

    /// Time needed to move one byte at `baud_rate`, in milliseconds.
    pub fn byte_transfer_ms(baud_rate: u32) -> f64 {
        BITS_PER_BYTE * 1000.0 / f64::from(baud_rate.max(1))
    }

    /// Budget for receiving `packet_len` bytes at `baud_rate`. Saturates at
    /// `Duration::MAX`.
    pub fn timeout_for(&self, baud_rate: u32, packet_len: usize) -> Duration {
        let transfer_ms = Self::byte_transfer_ms(baud_rate) * packet_len as f64;
        let margin_ms = 2.0 * f64::from(self.latency_ms) + TIMEOUT_FIXED_MARGIN_MS;
        Duration::try_from_secs_f64((transfer_ms + margin_ms) / 1000.0).unwrap_or(Duration::MAX)
    }

    /// Explicit budget, bypassing the computation.
    pub fn fixed(msec: f64) -> Duration {
        Duration::try_from_secs_f64(msec.max(0.0) / 1000.0).unwrap_or(Duration::MAX)
    }
}

/// A running timeout budget: when it started and how long it may last.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBudget {
    start: Instant,
    budget: Duration,
}

impl TimeoutBudget {
    /// Start a budget now.
    pub fn start(budget: Duration) -> Self {
        TimeoutBudget {
            start: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before the budget expires, zero once it has.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Non-blocking check: has the operation exceeded its budget?
    pub fn check_timeout(&self) -> bool {
        self.elapsed() > self.budget
    }
}
