use serde::{Deserialize, Serialize};

/// Identity a rate-limit bucket is keyed by (§4.7): a principal if
/// authenticated, else the remote IP, scoped to a route class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitIdentity {
    Principal(String),
    RemoteIp(String)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Login,
    Upload,
    GeneralApi
}

impl RouteClass {
    /// `(window_seconds, max_count)` per §4.7.
    #[must_use]
    pub fn limit(self) -> (u64, u32) {
        match self {
            RouteClass::Login => (60, 5),
            RouteClass::Upload => (3600, 10),
            RouteClass::GeneralApi => (3600, 200)
        }
    }
}

/// Transient sliding-window counter held in the KV backing store (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateBucket {
    pub key: String,
    pub window_start_epoch_secs: i64,
    pub count: u32
}
