//! Runtime serving policy.
//!
//! The asset handler reads its TTL and CDN allowlist through
//! [`ConfigProvider`] once per request. Providers hand out an immutable
//! [`ServingPolicy`] snapshot, so no lock is ever held while a request
//! waits on the backend.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

/// Serving knobs consumed per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServingPolicy {
    /// Seconds intermediaries may cache unlocked assets; 0 disables.
    pub cache_ttl_seconds: u32,
    /// Exact `User-Agent` values identifying CDN edge requests.
    pub cdn_user_agents: HashSet<String>,
}

impl ServingPolicy {
    /// Whether `user_agent` is on the CDN allowlist.
    pub fn is_cdn_user_agent(&self, user_agent: Option<&str>) -> bool {
        user_agent.is_some_and(|ua| self.cdn_user_agents.contains(ua))
    }
}

/// Read-only source of the current [`ServingPolicy`].
pub trait ConfigProvider: Send + Sync {
    /// Current policy snapshot.
    fn policy(&self) -> Arc<ServingPolicy>;
}

/// Provider with a fixed policy.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy(Arc<ServingPolicy>);

impl StaticPolicy {
    /// Wrap `policy`.
    #[must_use]
    pub fn new(policy: ServingPolicy) -> Self {
        Self(Arc::new(policy))
    }
}

impl ConfigProvider for StaticPolicy {
    fn policy(&self) -> Arc<ServingPolicy> {
        Arc::clone(&self.0)
    }
}

/// Provider whose policy can be swapped at runtime.
///
/// Readers clone the current `Arc` under a read lock; `replace` takes the
/// write lock only for the pointer swap.
#[derive(Debug, Default)]
pub struct SharedPolicy {
    current: RwLock<Arc<ServingPolicy>>,
}

impl SharedPolicy {
    /// Start with `policy`.
    #[must_use]
    pub fn new(policy: ServingPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// Install a new policy for subsequent requests.
    pub fn replace(&self, policy: ServingPolicy) {
        let next = Arc::new(policy);
        *self.current.write() = next;
        tracing::info!("Serving policy updated");
    }
}

impl ConfigProvider for SharedPolicy {
    fn policy(&self) -> Arc<ServingPolicy> {
        Arc::clone(&self.current.read())
    }
}
