//! The decision engine: initialization gating and recursive resolution.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{any, ErrorPolicy};
use crate::error::{RbacError, Result};
use crate::graph::{Grant, PatternGrant, RoleGraph};
use crate::types::{Params, RoleDefinitions, RoleLoader, RoleQuery};

/// Engine construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How sub-evaluation errors combine during fan-out when no branch
    /// allowed. A directly evaluated conditional grant always propagates
    /// its failure regardless of this setting.
    pub error_policy: ErrorPolicy,
}

type InitResult = std::result::Result<Arc<RoleGraph>, Arc<RbacError>>;
type InitFuture = Shared<BoxFuture<'static, InitResult>>;

enum State {
    Ready(Arc<RoleGraph>),
    Deferred(InitFuture),
}

/// Role-based authorization decision engine.
///
/// Construct once from role definitions — synchronously with [`Rbac::new`],
/// or deferred from a future or async loader — then ask
/// [`Rbac::can`] per request whether a role (or any of several roles) may
/// perform an operation. The role graph is immutable for the engine's
/// lifetime; build a new engine to change roles.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use hrbac::{Params, Rbac, RoleDef, When};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut roles = HashMap::new();
/// roles.insert(
///     "user".to_string(),
///     RoleDef::new()
///         .allow("post:add")
///         .allow_when("post:save", When::new(|p: &Params| {
///             p.get("ownerId") == p.get("postId")
///         })),
/// );
/// roles.insert(
///     "manager".to_string(),
///     RoleDef::new().allow("post:*").inherit("user"),
/// );
///
/// let rbac = Rbac::new(roles)?;
/// assert!(rbac.can("manager", "post:delete", None).await?);
/// assert!(rbac.can("manager", "post:add", None).await?);
/// assert!(!rbac.can("user", "post:delete", None).await?);
/// # Ok(())
/// # }
/// ```
pub struct Rbac {
    state: State,
    config: EngineConfig,
}

impl Rbac {
    /// Build an engine from already-resolved role definitions.
    ///
    /// Validation and graph construction happen here; any structural
    /// violation surfaces from this constructor.
    pub fn new(defs: RoleDefinitions) -> Result<Self> {
        debug!("sync init");
        let graph = RoleGraph::build(&defs)?;
        Ok(Self {
            state: State::Ready(Arc::new(graph)),
            config: EngineConfig::default(),
        })
    }

    /// Build an engine from a future of role definitions.
    ///
    /// The engine is usable immediately; [`Rbac::can`] and [`Rbac::ready`]
    /// wait for the future and the graph build to finish. A failure —
    /// loader error or validation error — becomes the shared
    /// initialization outcome observed by every caller.
    pub fn from_future<F>(defs: F) -> Self
    where
        F: Future<Output = anyhow::Result<RoleDefinitions>> + Send + 'static,
    {
        Self::deferred(defs)
    }

    /// Build an engine from an async [`RoleLoader`].
    pub fn from_loader<L: RoleLoader>(loader: L) -> Self {
        Self::deferred(async move { loader.load().await })
    }

    /// Build an engine from a zero-argument async closure.
    pub fn from_loader_fn<F, Fut>(loader: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<RoleDefinitions>> + Send + 'static,
    {
        Self::deferred(async move { loader().await })
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Select the fan-out error policy.
    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.config.error_policy = error_policy;
        self
    }

    fn deferred<F>(defs: F) -> Self
    where
        F: Future<Output = anyhow::Result<RoleDefinitions>> + Send + 'static,
    {
        debug!("async init");
        let init = async move {
            let defs = defs.await.map_err(|e| {
                Arc::new(RbacError::Loader {
                    error: Arc::new(e),
                })
            })?;
            let graph = RoleGraph::build(&defs).map_err(Arc::new)?;
            Ok(Arc::new(graph))
        }
        .boxed()
        .shared();

        // Start loading right away when already inside a runtime; outside
        // one, the first caller drives the shared future instead.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let _ = handle.spawn(init.clone());
        }

        Self {
            state: State::Deferred(init),
            config: EngineConfig::default(),
        }
    }

    /// Wait for initialization to complete.
    ///
    /// Resolves immediately for engines built with [`Rbac::new`]. For
    /// deferred engines this is the initialization-complete signal; a
    /// failed initialization yields the same error here and on every
    /// subsequent call.
    pub async fn ready(&self) -> Result<()> {
        self.graph().await.map(|_| ())
    }

    async fn graph(&self) -> Result<Arc<RoleGraph>> {
        match &self.state {
            State::Ready(graph) => Ok(graph.clone()),
            State::Deferred(init) => {
                debug!("not inited, wait");
                let graph = init.clone().await.map_err(RbacError::Init)?;
                debug!("init complete, continue");
                Ok(graph)
            }
        }
    }

    /// Decide whether `role` may perform `operation`.
    ///
    /// `role` is a single role name or a list of names; a list is allowed
    /// if any of its roles is, and an empty list resolves `false`, as
    /// does an unknown role name. `params` is handed unmodified to any
    /// conditional predicate that ends up evaluating the grant.
    ///
    /// # Errors
    ///
    /// - a failed deferred initialization ([`RbacError::Init`])
    /// - a failing conditional predicate ([`RbacError::Predicate`]),
    ///   unless suppressed by [`ErrorPolicy::Suppress`] during fan-out
    pub async fn can(
        &self,
        role: impl Into<RoleQuery>,
        operation: &str,
        params: impl Into<Option<Params>>,
    ) -> Result<bool> {
        let graph = self.graph().await?;
        let params = Arc::new(params.into().unwrap_or_default());

        match role.into() {
            RoleQuery::One(role) => self.resolve(&graph, &role, operation, &params).await,
            RoleQuery::Many(roles) => {
                debug!(?roles, "list of roles, try all");
                any(
                    roles
                        .iter()
                        .map(|role| self.resolve(&graph, role, operation, &params)),
                    self.config.error_policy,
                )
                .await
            }
        }
    }

    /// Resolve one role against one operation.
    ///
    /// Recursion into parent roles makes this a boxed future. Depth is
    /// bounded: the graph rejected cyclic inheritance at build time.
    fn resolve<'a>(
        &'a self,
        graph: &'a RoleGraph,
        role: &'a str,
        operation: &'a str,
        params: &'a Arc<Params>,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            let Some(entry) = graph.get(role) else {
                debug!(role, "undefined role");
                return Ok(false);
            };
            debug!(role, operation, "check role");

            let exact = entry.exact.get(operation);

            // No matching grant at this level at all: the only remaining
            // chance is an inherited one.
            if exact.is_none() && !entry.patterns.iter().any(|g| g.matcher.is_match(operation)) {
                debug!(role, operation, "not allowed at this level, try higher");
                if entry.parents.is_empty() {
                    debug!(role, "no inherit, reject");
                    return Ok(false);
                }
                return any(
                    entry.parents.iter().map(|parent| {
                        debug!(parent = %parent, "try from parent");
                        self.resolve(graph, parent, operation, params)
                    }),
                    self.config.error_policy,
                )
                .await;
            }

            // An exact grant settles the operation outright; a matching
            // pattern grant is never consulted behind it.
            match exact {
                Some(Grant::Always) => {
                    debug!(role, operation, "exact match, allow");
                    return Ok(true);
                }
                Some(Grant::When(when)) => {
                    debug!(role, operation, "conditional exact match, run predicate");
                    return when.eval(role, params.clone()).await;
                }
                None => {}
            }

            let matching: Vec<&PatternGrant> = entry
                .patterns
                .iter()
                .filter(|g| g.matcher.is_match(operation))
                .collect();
            if matching.is_empty() {
                // The pre-check above said a pattern matched; failing to
                // find one now is an engine defect, not a denial.
                return Err(RbacError::Internal(format!(
                    "grant for `{operation}` on role `{role}` vanished during resolution"
                )));
            }

            // An unconditional pattern match outranks every conditional
            // one, regardless of declaration order.
            if let Some(grant) = matching.iter().find(|g| g.when.is_none()) {
                debug!(role, pattern = %grant.original, "pattern match, allow");
                return Ok(true);
            }

            debug!(
                role,
                operation,
                count = matching.len(),
                "conditional pattern matches, run predicates"
            );
            any(
                matching.into_iter().filter_map(|grant| {
                    let when = grant.when.as_ref()?;
                    Some(when.eval(role, params.clone()).boxed())
                }),
                self.config.error_policy,
            )
            .await
        }
        .boxed()
    }
}
