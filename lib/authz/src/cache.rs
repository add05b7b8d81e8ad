//! Lazily loaded, explicitly invalidated resource policy cache.

use crate::error::AuthzError;
use crate::pattern::PathPattern;
use crate::types::{RequiredRoles, ResourcePolicy};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use gatehouse_core::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Read access to the resource-to-role mapping.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Returns every policy in match-priority order.
    async fn list_resource_role_policies(
        &self,
    ) -> Result<Vec<ResourcePolicy>, AuthzError>;
}

#[derive(Debug)]
struct CompiledPolicy {
    pattern: PathPattern,
    method: String,
    roles: RequiredRoles,
}

#[derive(Debug)]
struct PolicySnapshot {
    policies: Vec<CompiledPolicy>,
}

impl PolicySnapshot {
    fn compile(policies: Vec<ResourcePolicy>) -> Self {
        let policies = policies
            .into_iter()
            .filter_map(|policy| match PathPattern::parse(&policy.url_pattern) {
                Ok(pattern) => Some(CompiledPolicy {
                    pattern,
                    method: policy.http_method,
                    roles: RequiredRoles::from_roles(policy.required_roles),
                }),
                Err(e) => {
                    warn!(error = %e, method = %policy.http_method, "skipping resource policy");
                    None
                }
            })
            .collect();
        Self { policies }
    }

    fn find(&self, method: &str, url: &str) -> Option<&CompiledPolicy> {
        self.policies
            .iter()
            .find(|policy| policy.method == method && policy.pattern.matches(url))
    }
}

/// A snapshot as installed in the cache.
#[derive(Debug)]
struct Installed {
    snapshot: Arc<PolicySnapshot>,
    /// Invalidation generation the snapshot was loaded under.
    generation: u64,
    /// Set when serving a fallback after a failed load; the source is
    /// retried once this passes.
    retry_at: Option<Instant>,
}

impl Installed {
    fn retry_due(&self) -> bool {
        self.retry_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Immutable snapshot of resource policies, replaced wholesale on reload.
///
/// The snapshot is loaded on first use and again on the first use after
/// [`invalidate`](Self::invalidate). Readers never block on each other and
/// never see a partially built list. A load that was already running when
/// the cache was invalidated is never installed.
///
/// If the source fails, the last snapshot that loaded successfully keeps
/// being served and the source is retried at most once per retry interval;
/// with no such snapshot the lookup fails.
pub struct ResourcePolicyCache {
    source: Arc<dyn PolicySource>,
    current: ArcSwapOption<Installed>,
    last_good: ArcSwapOption<PolicySnapshot>,
    generation: AtomicU64,
    load_lock: Mutex<()>,
    load_timeout: Duration,
    retry_interval: Duration,
}

impl ResourcePolicyCache {
    /// Creates an empty cache over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self {
            source,
            current: ArcSwapOption::empty(),
            last_good: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            load_lock: Mutex::new(()),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Sets the upper bound on a single source load.
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets how long a fallback snapshot is served before the source is retried.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Returns true if a snapshot is installed and still valid.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.installed().is_some()
    }

    /// Returns the requirement of the first policy matching `method` and `url`.
    ///
    /// `None` means no policy covers the request.
    ///
    /// # Errors
    ///
    /// Returns `PolicySourceUnavailable` if nothing has ever loaded and the
    /// source cannot be reached.
    pub async fn attributes_for(
        &self,
        method: &str,
        url: &str,
    ) -> Result<Option<RequiredRoles>, AuthzError> {
        let snapshot = match self.installed() {
            Some(installed) if !installed.retry_due() => Arc::clone(&installed.snapshot),
            _ => self.load_or_fallback().await?,
        };
        Ok(snapshot.find(method, url).map(|policy| policy.roles.clone()))
    }

    /// Drops the snapshot. The next lookup reloads from the source.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.current.store(None);
        info!("resource policy cache invalidated");
    }

    /// Loads a fresh snapshot now, replacing the current one on success.
    ///
    /// # Errors
    ///
    /// Returns `PolicySourceUnavailable` if the load fails; the previous
    /// snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize, AuthzError> {
        let _guard = self.load_lock.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        let snapshot = self.fetch().await?;
        self.install(generation, &snapshot, None);
        Ok(snapshot.policies.len())
    }

    /// The installed snapshot, unless an invalidation has happened since it loaded.
    fn installed(&self) -> Option<Arc<Installed>> {
        let generation = self.generation.load(Ordering::SeqCst);
        self.current
            .load_full()
            .filter(|installed| installed.generation == generation)
    }

    fn install(&self, generation: u64, snapshot: &Arc<PolicySnapshot>, retry_at: Option<Instant>) {
        self.current.store(Some(Arc::new(Installed {
            snapshot: Arc::clone(snapshot),
            generation,
            retry_at,
        })));
    }

    async fn load_or_fallback(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        let _guard = match self.installed() {
            // A fallback is due for a retry. Only one task retries; the rest
            // keep serving the fallback.
            Some(fallback) => match self.load_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(Arc::clone(&fallback.snapshot)),
            },
            None => self.load_lock.lock().await,
        };
        // Another task may have loaded while this one waited.
        match self.installed() {
            Some(installed) if !installed.retry_due() => {
                return Ok(Arc::clone(&installed.snapshot));
            }
            _ => {}
        }

        let generation = self.generation.load(Ordering::SeqCst);
        match self.fetch().await {
            Ok(snapshot) => {
                self.install(generation, &snapshot, None);
                Ok(snapshot)
            }
            Err(e) => match self.last_good.load_full() {
                Some(stale) => {
                    warn!(
                        error = %e,
                        retry_in = ?self.retry_interval,
                        "policy reload failed; serving previous snapshot"
                    );
                    self.install(generation, &stale, Some(Instant::now() + self.retry_interval));
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        let policies =
            match tokio::time::timeout(self.load_timeout, self.source.list_resource_role_policies())
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AuthzError::PolicySourceUnavailable {
                        reason: format!("load timed out after {:?}", self.load_timeout),
                    }
                    .into());
                }
            };

        let snapshot = Arc::new(PolicySnapshot::compile(policies));
        self.last_good.store(Some(Arc::clone(&snapshot)));
        debug!(policies = snapshot.policies.len(), "resource policies loaded");
        Ok(snapshot)
    }
}
