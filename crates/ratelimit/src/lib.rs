//! Rate limiter (C7): Redis-backed sliding window per `(identity,
//! route_class)` (§4.7). Degrades to permit — never to deny — when the
//! backing KV is unreachable, since availability is preferred over strict
//! enforcement here.

use chrono::{DateTime, Utc};
use core::rate_bucket::{RateLimitIdentity, RouteClass};
use errors::CoreError;
use redis::AsyncCommands;

/// Outcome of a rate-limit check that was permitted only because Redis was
/// unreachable — callers may want to log this distinctly from a clean pass.
pub enum Decision {
    Allowed,
    DegradedAllow,
    Denied { retry_at: DateTime<Utc> }
}

pub struct RateLimiter {
    connection_manager: redis::aio::ConnectionManager
}

impl RateLimiter {
    pub async fn connect(redis_url: &str) -> Result<Self, CoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| CoreError::internal(e.to_string()))?;
        let connection_manager = client.get_connection_manager().await.map_err(|e| CoreError::internal(e.to_string()))?;
        Ok(Self { connection_manager })
    }

    fn bucket_key(identity: &RateLimitIdentity, class: RouteClass) -> String {
        let identity_key = match identity {
            RateLimitIdentity::Principal(id) => format!("p:{id}"),
            RateLimitIdentity::RemoteIp(ip) => format!("ip:{ip}")
        };
        format!("ratelimit:{class:?}:{identity_key}")
    }

    /// Records one attempt and reports whether it falls within the window
    /// limit for this route class (§4.7). Never returns an error to the
    /// caller — an unreachable Redis degrades to `DegradedAllow`.
    pub async fn check(&self, identity: &RateLimitIdentity, class: RouteClass) -> Decision {
        let (window_secs, max_count) = class.limit();
        let key = Self::bucket_key(identity, class);

        match self.check_sliding_window(&key, window_secs, max_count).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = ?e, %key, "rate limiter KV unreachable, degrading to permit");
                Decision::DegradedAllow
            }
        }
    }

    async fn check_sliding_window(&self, key: &str, window_secs: u64, max_count: u32) -> Result<Decision, redis::RedisError> {
        let mut conn = self.connection_manager.clone();
        let now_ms = now_millis();
        let window_ms = (window_secs * 1000) as i64;
        let cutoff = now_ms - window_ms;

        let _: () = conn.zrembyscore(key, 0, cutoff).await?;
        let member = format!("{now_ms}-{}", uuid_suffix());
        let _: () = conn.zadd(key, &member, now_ms).await?;
        let _: () = conn.expire(key, window_secs as i64).await?;

        let count: u32 = conn.zcard(key).await?;
        if count <= max_count {
            return Ok(Decision::Allowed);
        }

        let earliest: Vec<(String, i64)> = conn.zrange_withscores(key, 0, 0).await?;
        let retry_at = match earliest.first() {
            Some((_, score)) => millis_to_datetime(score + window_ms),
            None => Utc::now()
        };
        Ok(Decision::Denied { retry_at })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_distinguishes_principal_and_ip() {
        let principal_key = RateLimiter::bucket_key(&RateLimitIdentity::Principal("abc".to_string()), RouteClass::Login);
        let ip_key = RateLimiter::bucket_key(&RateLimitIdentity::RemoteIp("abc".to_string()), RouteClass::Login);
        assert_ne!(principal_key, ip_key);
    }

    #[test]
    fn route_class_limits_match_spec() {
        assert_eq!(RouteClass::Login.limit(), (60, 5));
        assert_eq!(RouteClass::Upload.limit(), (3600, 10));
        assert_eq!(RouteClass::GeneralApi.limit(), (3600, 200));
    }
}
