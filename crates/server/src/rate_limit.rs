//! Per-connection rate limiting for the client-facing WebSocket.
//!
//! Not part of the pipeline spec proper — an unavoidable part of a
//! production-shaped transport (SPEC_FULL.md §C). Two independent token
//! buckets per connection: one for control/text messages, one for audio
//! bytes, both governed by `voxbridge_config::RateLimitConfig`.

use std::time::Instant;

use thiserror::Error;

use voxbridge_config::RateLimitConfig;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("message rate limit exceeded")]
    Messages,
    #[error("audio byte rate limit exceeded")]
    Audio,
}

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_s: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(refill_per_s: f64, burst_multiplier: f32) -> Self {
        let capacity = refill_per_s * burst_multiplier as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_s,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_s).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, cost: f64) -> bool {
        self.refill();
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }
}

/// One connection's rate limiting state. `enabled = false` makes every
/// check a no-op, for local/dev use.
pub struct RateLimiter {
    enabled: bool,
    messages: TokenBucket,
    // Audio is metered in KB so the bucket's capacity stays in a sane
    // numeric range regardless of `messages_per_second`.
    audio_kb: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            messages: TokenBucket::new(config.messages_per_second as f64, config.burst_multiplier),
            audio_kb: TokenBucket::new(
                config.messages_per_second as f64 * 32.0,
                config.burst_multiplier,
            ),
        }
    }

    pub fn check_message(&mut self) -> Result<(), RateLimitError> {
        if !self.enabled || self.messages.try_take(1.0) {
            Ok(())
        } else {
            Err(RateLimitError::Messages)
        }
    }

    pub fn check_audio(&mut self, bytes: usize) -> Result<(), RateLimitError> {
        if !self.enabled || self.audio_kb.try_take(bytes as f64 / 1024.0) {
            Ok(())
        } else {
            Err(RateLimitError::Audio)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            messages_per_second: 2,
            burst_multiplier: 1.0,
        }
    }

    #[test]
    fn allows_up_to_burst_then_rejects() {
        let mut limiter = RateLimiter::new(config());
        assert!(limiter.check_message().is_ok());
        assert!(limiter.check_message().is_ok());
        assert!(limiter.check_message().is_err());
    }

    #[test]
    fn disabled_limiter_never_rejects() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..config()
        });
        for _ in 0..100 {
            assert!(limiter.check_message().is_ok());
        }
    }

    #[test]
    fn audio_bytes_consume_independently_of_messages() {
        let mut limiter = RateLimiter::new(config());
        assert!(limiter.check_audio(1024).is_ok());
        assert!(limiter.check_message().is_ok());
    }
}
