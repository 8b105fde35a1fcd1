//! Signing key cache keyed by `kid`.

use std::{
    collections::{HashMap, VecDeque},
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{
    jwk::{Jwk, JwkSet, PublicKeyUse},
    DecodingKey,
};
use tokio::sync::Mutex;

use crate::{clock::Clock, error::AuthError, key_source::KeySource};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Bounds on what the cache keeps and how often it may hit the key source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_entries: usize,
    pub ttl: Duration,
    pub requests_per_minute: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_entries: 5,
            ttl: Duration::from_secs(600),
            requests_per_minute: 10,
        }
    }
}

struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    keys: HashMap<String, CachedKey>,
    fetches: VecDeque<Instant>,
}

enum Lookup {
    Fresh(DecodingKey),
    Stale(DecodingKey),
    Missing,
}

/// Lazily populated map from key id to decoding key.
///
/// Entries expire `ttl` after they were fetched. A miss (or an expired entry)
/// refetches the whole key set, subject to `requests_per_minute`; when that
/// budget is spent an expired key is served until the window reopens.
///
/// Lookups never wait on the key source. Fetches are serialised by a
/// separate lock, so concurrent misses for the same `kid` cause one request.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    state: Mutex<CacheState>,
    fetch_lock: Mutex<()>,
}

impl Debug for KeyCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("policy", &self.policy)
            .finish()
    }
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>, clock: Arc<dyn Clock>, policy: CachePolicy) -> Self {
        Self {
            source,
            clock,
            policy,
            state: Mutex::new(CacheState::default()),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Resolve the decoding key for `kid`.
    pub async fn get(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Lookup::Fresh(key) = self.lookup(kid).await {
            return Ok(key);
        }

        let _fetching = self.fetch_lock.lock().await;
        let stale = match self.lookup(kid).await {
            Lookup::Fresh(key) => return Ok(key),
            Lookup::Stale(key) => Some(key),
            Lookup::Missing => None,
        };

        let now = self.clock.now();
        let slot = {
            let mut state = self.state.lock().await;
            self.take_fetch_slot(&mut state, now)
        };
        if let Err(err) = slot {
            return match stale {
                Some(key) => {
                    tracing::warn!(kid, "serving expired signing key until refresh is allowed");
                    Ok(key)
                }
                None => Err(err),
            };
        }

        let keys = self.source.fetch().await?;
        let Some(jwk) = find_signing_key(&keys, kid) else {
            self.state.lock().await.keys.remove(kid);
            return Err(AuthError::KeyNotFound(kid.to_string()));
        };
        let key = DecodingKey::from_jwk(jwk).map_err(|source| AuthError::InvalidKey {
            kid: kid.to_string(),
            source,
        })?;

        let mut state = self.state.lock().await;
        self.insert(&mut state, kid, key.clone(), now);
        Ok(key)
    }

    async fn lookup(&self, kid: &str) -> Lookup {
        let state = self.state.lock().await;
        match state.keys.get(kid) {
            Some(cached)
                if self.clock.now().saturating_duration_since(cached.fetched_at)
                    < self.policy.ttl =>
            {
                Lookup::Fresh(cached.key.clone())
            }
            Some(cached) => {
                tracing::debug!(kid, "cached signing key expired");
                Lookup::Stale(cached.key.clone())
            }
            None => Lookup::Missing,
        }
    }

    /// Number of keys currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.keys.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn take_fetch_slot(&self, state: &mut CacheState, now: Instant) -> Result<(), AuthError> {
        while let Some(oldest) = state.fetches.front() {
            if now.saturating_duration_since(*oldest) >= RATE_LIMIT_WINDOW {
                state.fetches.pop_front();
            } else {
                break;
            }
        }

        if state.fetches.len() >= self.policy.requests_per_minute {
            tracing::warn!(
                limit = self.policy.requests_per_minute,
                "signing key refresh rate limited"
            );
            return Err(AuthError::RateLimited);
        }

        state.fetches.push_back(now);
        Ok(())
    }

    fn insert(&self, state: &mut CacheState, kid: &str, key: DecodingKey, now: Instant) {
        if self.policy.max_entries == 0 {
            return;
        }

        while state.keys.len() >= self.policy.max_entries {
            let oldest = state
                .keys
                .iter()
                .min_by_key(|(_, cached)| cached.fetched_at)
                .map(|(kid, _)| kid.clone());
            match oldest {
                Some(evicted) => {
                    state.keys.remove(&evicted);
                }
                None => break,
            }
        }

        state.keys.insert(
            kid.to_string(),
            CachedKey {
                key,
                fetched_at: now,
            },
        );
    }
}

/// Keys published for encryption never verify signatures.
fn find_signing_key<'a>(keys: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    keys.keys.iter().find(|jwk| {
        jwk.common.key_id.as_deref() == Some(kid)
            && matches!(
                jwk.common.public_key_use,
                None | Some(PublicKeyUse::Signature)
            )
    })
}
