/// Rate Limiting System
use crate::{
    config::RateLimitConfig,
    error::{DeskError, DeskResult},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};

/// Per-client limiter with a tight quota for endpoints that send mail
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    challenge: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    general: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let challenge_quota = Quota::per_minute(
            NonZeroU32::new(config.challenge_requests_per_minute).unwrap_or(NonZeroU32::MIN),
        );
        let general_quota = Quota::per_second(
            NonZeroU32::new(config.general_requests_per_second).unwrap_or(NonZeroU32::MIN),
        );

        Self {
            enabled: config.enabled,
            challenge: Arc::new(GovernorLimiter::keyed(challenge_quota)),
            general: Arc::new(GovernorLimiter::keyed(general_quota)),
        }
    }

    /// Check the challenge-start quota for a client
    pub fn check_challenge(&self, ip: IpAddr) -> DeskResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.challenge.check_key(&ip).map_err(|_| {
            tracing::warn!(%ip, "Challenge rate limit exceeded");
            DeskError::RateLimitExceeded {
                retry_after: Duration::from_secs(60),
            }
        })
    }

    /// Check the general quota for a client
    pub fn check_general(&self, ip: IpAddr) -> DeskResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.general
            .check_key(&ip)
            .map_err(|_| DeskError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            })
    }

    /// Forget clients whose quota has fully replenished
    pub fn shrink(&self) {
        self.challenge.retain_recent();
        self.general.retain_recent();
    }
}
