// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tool call throttling over a rolling one-minute window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Accepted call times, oldest first.
#[derive(Debug, Default)]
struct CallLog {
    accepted: VecDeque<Instant>,
}

impl CallLog {
    fn evict_expired(&mut self, now: Instant) {
        while let Some(&oldest) = self.accepted.front() {
            if now.duration_since(oldest) < WINDOW {
                break;
            }
            self.accepted.pop_front();
        }
    }

    fn time_until_slot(&self, now: Instant) -> Duration {
        self.accepted
            .front()
            .map_or(Duration::ZERO, |&oldest| WINDOW.saturating_sub(now.duration_since(oldest)))
    }
}

/// Counts accepted calls in the last sixty seconds.
#[derive(Debug)]
pub struct RateLimiter {
    per_minute: u32,
    log: Mutex<CallLog>,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            log: Mutex::new(CallLog::default()),
        }
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Records the call if fewer than `per_minute` calls were accepted
    /// in the preceding minute.
    pub async fn check_and_record(&self) -> RateLimitResult {
        let now = Instant::now();
        let mut log = self.log.lock().await;
        log.evict_expired(now);
        let used = u32::try_from(log.accepted.len()).unwrap_or(u32::MAX);
        if used >= self.per_minute {
            return RateLimitResult::Limited {
                retry_after: log.time_until_slot(now),
            };
        }
        log.accepted.push_back(now);
        RateLimitResult::Allowed {
            remaining: self.per_minute - used - 1,
        }
    }

    /// Forgets every recorded call.
    pub async fn reset(&self) {
        self.log.lock().await.accepted.clear();
    }
}
