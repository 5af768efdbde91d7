use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Throttling policies for outbound provider calls.
#[derive(Clone, Debug, PartialEq)]
pub enum Limits {
    /// Sleep a fixed amount after every call.
    FixedDelay(Duration),
    /// Allow `requests` calls per `period`, refilled continuously.
    TokenBucket { requests: u32, period: Duration },
    /// No throttling at all.
    Unlimited,
}

#[derive(Debug)]
pub struct RateLimiter {
    limits: Limits,
    // token bucket state: current tokens and time of last refill
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let capacity = match &limits {
            Limits::TokenBucket { requests, .. } => *requests as f64,
            _ => 0.0,
        };
        Self {
            limits,
            bucket: Mutex::new((capacity, Instant::now())),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Limits::Unlimited)
    }

    /// Wait as long as the policy requires before the next call may proceed.
    pub async fn acquire(&self) {
        match &self.limits {
            Limits::Unlimited => {}
            Limits::FixedDelay(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
            }
            Limits::TokenBucket { requests, period } => {
                if *requests > 0 && !period.is_zero() {
                    self.consume_token(*requests as f64, period.as_secs_f64()).await;
                }
            }
        }
    }

    async fn consume_token(&self, capacity: f64, period_secs: f64) {
        let refill_rate = capacity / period_secs; // tokens per second
        loop {
            let mut guard = self.bucket.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
