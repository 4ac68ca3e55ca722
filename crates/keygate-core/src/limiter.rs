//! Per-client request limits in tiers.
//!
//! Every request spends from the global tier; status probes and first-account
//! bootstrap additionally spend from their own, much tighter tier. This sits
//! in front of the lockout tracker: a rejected request never reaches login
//! and so never counts as a failed attempt.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock as _, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::{RateLimitConfig, TierConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Login and everything else without a tier of its own.
    Global,
    Status,
    Bootstrap,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Status => "status",
            Self::Bootstrap => "bootstrap",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded ({tier}); retry in {retry_after_secs}s")]
pub struct RateLimited {
    pub tier: Tier,
    pub retry_after_secs: u64,
}

/// `per_period` requests as a burst, refilled evenly across `period_secs`.
fn quota(tier: TierConfig) -> Quota {
    let burst = NonZeroU32::new(tier.per_period).unwrap_or(NonZeroU32::MIN);
    let refill = Duration::from_secs(tier.period_secs) / burst.get();
    Quota::with_period(refill)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

pub struct TieredLimiter {
    global: DefaultKeyedRateLimiter<String>,
    status: DefaultKeyedRateLimiter<String>,
    bootstrap: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl TieredLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            global: RateLimiter::keyed(quota(config.global)),
            status: RateLimiter::keyed(quota(config.status)),
            bootstrap: RateLimiter::keyed(quota(config.bootstrap)),
            clock: DefaultClock::default(),
        }
    }

    /// Spends one request for `client_key` from the global tier and, for
    /// narrower tiers, from that tier too.
    pub fn check(&self, tier: Tier, client_key: &str) -> Result<(), RateLimited> {
        let key = client_key.to_owned();
        self.spend(&self.global, Tier::Global, &key)?;
        match tier {
            Tier::Global => Ok(()),
            Tier::Status => self.spend(&self.status, tier, &key),
            Tier::Bootstrap => self.spend(&self.bootstrap, tier, &key),
        }
    }

    /// Drops per-client state that has fully refilled.
    pub fn retain_recent(&self) {
        self.global.retain_recent();
        self.status.retain_recent();
        self.bootstrap.retain_recent();
    }

    fn spend(
        &self,
        limiter: &DefaultKeyedRateLimiter<String>,
        tier: Tier,
        key: &String,
    ) -> Result<(), RateLimited> {
        limiter.check_key(key).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            tracing::warn!(client_key = %key, %tier, retry_after_secs, "rate limited");
            RateLimited {
                tier,
                retry_after_secs,
            }
        })
    }
}
