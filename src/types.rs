//! Core definition types: parameter bags, conditional predicates, grant
//! specs, role definitions, and the deferred-loading seam.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{RbacError, Result};

/// Free-form parameter bag passed through unmodified from the caller to
/// whichever conditional predicate ends up evaluating it.
pub type Params = HashMap<String, serde_json::Value>;

/// Role definitions as supplied by the host application.
///
/// Map semantics mean a duplicate role name silently keeps the last
/// definition inserted.
pub type RoleDefinitions = HashMap<String, RoleDef>;

type PredicateFn =
    dyn Fn(Arc<Params>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync;

/// A caller-supplied conditional predicate attached to a grant.
///
/// The engine does not inspect the predicate's logic; it owns only the
/// calling contract: the predicate receives the request's parameter bag
/// and produces a boolean, possibly asynchronously, possibly failing.
/// `Ok(false)` means "not permitted"; an error means "could not decide"
/// and is propagated to the caller of `can`, annotated with the role that
/// owns the grant.
#[derive(Clone)]
pub struct When {
    predicate: Arc<PredicateFn>,
}

impl When {
    /// Infallible synchronous predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Params) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |params| {
                let allowed = predicate(&params);
                async move { Ok(allowed) }.boxed()
            }),
        }
    }

    /// Synchronous predicate that may fail.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&Params) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |params| {
                let result = predicate(&params);
                async move { result }.boxed()
            }),
        }
    }

    /// Asynchronous predicate.
    pub fn async_fn<F, Fut>(predicate: F) -> Self
    where
        F: Fn(Arc<Params>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self {
            predicate: Arc::new(move |params| predicate(params).boxed()),
        }
    }

    /// Run the predicate, remapping any failure to a [`RbacError::Predicate`]
    /// carrying the role that owns the grant.
    pub(crate) async fn eval(&self, role: &str, params: Arc<Params>) -> Result<bool> {
        (self.predicate)(params).await.map_err(|e| RbacError::Predicate {
            role: role.to_string(),
            error: Arc::new(e),
        })
    }
}

impl fmt::Debug for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("When(..)")
    }
}

/// One entry of a role's `can` list.
///
/// Grant names containing `*` are glob patterns; the wildcard matches any
/// run of characters and the compiled matcher is anchored at the start of
/// the operation only, so `account:*` matches `account:save` and `a*b`
/// matches `a-b-suffix`. Explicit [`GrantSpec::Regex`] grants control
/// their own anchoring.
#[derive(Debug, Clone)]
pub enum GrantSpec {
    /// Operation name or glob pattern, always allowed.
    Op(String),

    /// Operation name or glob pattern guarded by a predicate.
    When { name: String, when: When },

    /// Explicit regular expression, optionally guarded.
    ///
    /// The regex decides matching even when a display `name` is present.
    Regex {
        name: Option<String>,
        regex: String,
        when: Option<When>,
    },
}

impl From<&str> for GrantSpec {
    fn from(op: &str) -> Self {
        GrantSpec::Op(op.to_string())
    }
}

impl From<String> for GrantSpec {
    fn from(op: String) -> Self {
        GrantSpec::Op(op)
    }
}

/// Definition of a single role: its grants and the roles it inherits from.
#[derive(Debug, Clone, Default)]
pub struct RoleDef {
    /// Grants, in declaration order.
    pub can: Vec<GrantSpec>,

    /// Parent roles consulted as fallback when this role has no matching
    /// grant for an operation.
    pub inherits: Vec<String>,
}

impl RoleDef {
    /// Create an empty role definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant an operation name or glob pattern unconditionally.
    pub fn allow(mut self, op: impl Into<String>) -> Self {
        self.can.push(GrantSpec::Op(op.into()));
        self
    }

    /// Grant an operation name or glob pattern guarded by a predicate.
    pub fn allow_when(mut self, op: impl Into<String>, when: When) -> Self {
        self.can.push(GrantSpec::When {
            name: op.into(),
            when,
        });
        self
    }

    /// Grant operations matching an explicit regular expression.
    pub fn allow_regex(mut self, regex: impl Into<String>, when: Option<When>) -> Self {
        self.can.push(GrantSpec::Regex {
            name: None,
            regex: regex.into(),
            when,
        });
        self
    }

    /// Declare inheritance from another role.
    pub fn inherit(mut self, role: impl Into<String>) -> Self {
        self.inherits.push(role.into());
        self
    }
}

/// The role argument of [`crate::Rbac::can`]: one role name or several.
///
/// A query over several roles is permitted if any of them is; an empty
/// list resolves `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleQuery {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for RoleQuery {
    fn from(role: &str) -> Self {
        RoleQuery::One(role.to_string())
    }
}

impl From<String> for RoleQuery {
    fn from(role: String) -> Self {
        RoleQuery::One(role)
    }
}

impl From<Vec<String>> for RoleQuery {
    fn from(roles: Vec<String>) -> Self {
        RoleQuery::Many(roles)
    }
}

impl From<Vec<&str>> for RoleQuery {
    fn from(roles: Vec<&str>) -> Self {
        RoleQuery::Many(roles.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for RoleQuery {
    fn from(roles: &[&str]) -> Self {
        RoleQuery::Many(roles.iter().map(|r| r.to_string()).collect())
    }
}

/// Deferred producer of role definitions.
///
/// The async rendering of a definitions loader: the engine invokes
/// [`RoleLoader::load`] once during initialization and builds the role
/// graph from its output. A failure is fatal to initialization and is
/// observed by every caller of the engine.
#[async_trait]
pub trait RoleLoader: Send + Sync + 'static {
    async fn load(&self) -> anyhow::Result<RoleDefinitions>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_query_conversions() {
        assert_eq!(RoleQuery::from("user"), RoleQuery::One("user".to_string()));
        assert_eq!(
            RoleQuery::from(vec!["user", "manager"]),
            RoleQuery::Many(vec!["user".to_string(), "manager".to_string()])
        );
    }

    #[test]
    fn role_def_builder_preserves_declaration_order() {
        let def = RoleDef::new()
            .allow("post:add")
            .allow_when("post:save", When::new(|_| true))
            .allow("account:*")
            .inherit("user");

        assert_eq!(def.can.len(), 3);
        assert_eq!(def.inherits, vec!["user".to_string()]);
        assert!(matches!(&def.can[0], GrantSpec::Op(op) if op == "post:add"));
        assert!(matches!(&def.can[1], GrantSpec::When { name, .. } if name == "post:save"));
    }

    #[tokio::test]
    async fn sync_predicate_sees_params() {
        let when = When::new(|p: &Params| p.get("ownerId") == p.get("postId"));
        let params = Arc::new(Params::from([
            ("ownerId".to_string(), json!(1)),
            ("postId".to_string(), json!(1)),
        ]));
        assert!(when.eval("user", params).await.unwrap());
    }

    #[tokio::test]
    async fn failing_predicate_is_annotated_with_role() {
        let when = When::fallible(|_| Err(anyhow::anyhow!("boom")));
        let err = when.eval("editor", Arc::new(Params::new())).await.unwrap_err();
        assert_eq!(err.to_string(), "role: editor when: boom");
    }

    #[tokio::test]
    async fn async_predicate_resolves() {
        let when = When::async_fn(|params: Arc<Params>| async move {
            Ok(params.contains_key("token"))
        });
        let params = Arc::new(Params::from([("token".to_string(), json!("x"))]));
        assert!(when.eval("user", params).await.unwrap());
        assert!(!when.eval("user", Arc::new(Params::new())).await.unwrap());
    }
}
