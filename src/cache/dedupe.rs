//! Collapsing of identical concurrent requests.

use super::key::{CacheKey, CacheKeyGenerator};
use crate::error::RequestError;
use crate::plugins::{FinallyContext, HookType, Plugin, PluginPriority, ResponseContext};
use crate::transport::Response;
use crate::types::{RequestConfig, Resolved, Resolver};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

/// `extra` key marking the request that owns a dedupe slot.
pub const DEDUPE_LEADER_EXTRA: &str = "plugfetch.dedupe_leader";
/// `extra` key holding the slot key computed when the leader was admitted.
/// Hooks that rewrite the request afterwards do not move the slot.
pub const DEDUPE_KEY_EXTRA: &str = "plugfetch.dedupe_key";

/// What happens to a request identical to one already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupePolicy {
    /// Wait for the first request and settle with its response or error.
    ///
    /// The response is shared from the leader's `after_response` hook, which
    /// only runs when the leader is read as a whole body. A leader consumed
    /// through `Request::stream` has a single-reader body, so its followers
    /// settle with an `UnknownError` once the leader finalizes.
    #[default]
    Share,
    /// Fail immediately with a `DuplicateRequest` error.
    Reject,
}

type Outcome = Option<std::result::Result<Response, RequestError>>;

struct Slot {
    leader: String,
    tx: watch::Sender<Outcome>,
}

/// Ensures identical concurrent requests reach the transport once.
///
/// The first request for a key becomes the leader and proceeds normally.
/// Followers either short-circuit onto the leader's outcome or are rejected.
/// A shared outcome is published when the leader is materialized or fails,
/// so followers settle no earlier than that.
pub struct DedupePlugin {
    policy: DedupePolicy,
    keys: CacheKeyGenerator,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    priority: i32,
}

impl DedupePlugin {
    pub fn new(policy: DedupePolicy) -> Self {
        Self {
            policy,
            keys: CacheKeyGenerator::new(),
            slots: Mutex::new(HashMap::new()),
            priority: PluginPriority::Low.into(),
        }
    }

    pub fn share() -> Self {
        Self::new(DedupePolicy::Share)
    }

    pub fn reject() -> Self {
        Self::new(DedupePolicy::Reject)
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn policy(&self) -> DedupePolicy {
        self.policy
    }

    /// Number of keys currently owned by a leader.
    pub fn pending(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn into_plugin(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>>> {
        self.slots.lock().map_err(|_| {
            Error::unknown_with_context(
                "dedupe lock poisoned",
                ErrorContext::new().with_source("dedupe"),
            )
        })
    }

    /// Leader token and slot key recorded by `before_request`.
    fn slot_of(config: &RequestConfig) -> Option<(&str, CacheKey)> {
        match (
            config.extra.get(DEDUPE_LEADER_EXTRA),
            config.extra.get(DEDUPE_KEY_EXTRA),
        ) {
            (Some(Value::String(token)), Some(Value::String(key))) => {
                Some((token.as_str(), CacheKey::from(key.as_str())))
            }
            _ => None,
        }
    }

    /// Publish the leader's outcome once; later calls are ignored.
    fn publish(&self, config: &RequestConfig, outcome: std::result::Result<Response, RequestError>) {
        let Some((token, key)) = Self::slot_of(config) else {
            return;
        };
        let Ok(slots) = self.slots.lock() else {
            return;
        };
        if let Some(slot) = slots.get(&key).filter(|s| s.leader == token) {
            slot.tx.send_if_modified(|current| {
                if current.is_some() {
                    return false;
                }
                *current = Some(outcome);
                true
            });
        }
    }
}

fn follower(rx: watch::Receiver<Outcome>) -> Resolver {
    Resolver::new(move || {
        let mut rx = rx.clone();
        Box::pin(async move {
            let outcome = rx.wait_for(Option::is_some).await.map(|v| v.clone());
            match outcome {
                Ok(Some(Ok(response))) => Ok(Resolved::Response(response)),
                Ok(Some(Err(error))) => Err(Error::Request(Box::new(error))),
                _ => Err(Error::unknown_with_context(
                    "deduplicated request finished without a shared response (leader streamed or was dropped)",
                    ErrorContext::new().with_source("dedupe"),
                )),
            }
        })
    })
}

#[async_trait]
impl Plugin for DedupePlugin {
    fn name(&self) -> &str {
        "dedupe"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn implements(&self, hook: HookType) -> bool {
        !matches!(hook, HookType::BeforeStream | HookType::TransformStreamChunk)
    }

    async fn before_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        if config.resolve.is_some() {
            return Ok(config);
        }
        let key = self.keys.generate(&config);
        let existing = {
            let mut slots = self.lock()?;
            match slots.get(&key) {
                Some(slot) => Some(slot.tx.subscribe()),
                None => {
                    let token = Uuid::new_v4().to_string();
                    let (tx, _) = watch::channel(None);
                    slots.insert(
                        key.clone(),
                        Slot {
                            leader: token.clone(),
                            tx,
                        },
                    );
                    config
                        .extra
                        .insert(DEDUPE_LEADER_EXTRA.to_string(), Value::from(token));
                    config
                        .extra
                        .insert(DEDUPE_KEY_EXTRA.to_string(), Value::from(key.hash.clone()));
                    None
                }
            }
        };

        let Some(rx) = existing else {
            return Ok(config);
        };
        tracing::debug!(url = %config.url, key = %key, policy = ?self.policy, "duplicate request");
        match self.policy {
            DedupePolicy::Reject => Err(RequestError::custom(
                "DuplicateRequest",
                format!("an identical {} {} is already in flight", config.method, config.url),
                0,
            )
            .into()),
            DedupePolicy::Share => {
                config.set_resolve(follower(rx));
                Ok(config)
            }
        }
    }

    async fn after_response(&self, ctx: &mut ResponseContext) -> Result<()> {
        self.publish(&ctx.config, Ok(ctx.response.clone()));
        Ok(())
    }

    async fn on_error(&self, error: RequestError, config: &RequestConfig) -> RequestError {
        self.publish(config, Err(error.clone()));
        error
    }

    async fn on_finally(&self, ctx: &FinallyContext) {
        let Some((token, key)) = Self::slot_of(&ctx.config) else {
            return;
        };
        if let Ok(mut slots) = self.slots.lock() {
            // A leader finalizes once per consumption; only drop our own slot.
            if slots.get(&key).map(|s| s.leader == token).unwrap_or(false) {
                slots.remove(&key);
            }
        }
    }
}

impl std::fmt::Debug for DedupePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupePlugin")
            .field("policy", &self.policy)
            .field("pending", &self.pending())
            .field("priority", &self.priority)
            .finish()
    }
}
