//! The short-circuiting concurrent OR combinator.
//!
//! Multi-role queries, inheritance fallback across several parents, and
//! batches of matching conditional pattern grants all reduce to the same
//! question: does any of these independent boolean sub-evaluations come
//! back `true`? [`any`] answers it once for all three call sites.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RbacError, Result};

/// What to do with a sub-evaluation error when no branch produced `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Propagate the first error observed, unless some branch allowed.
    #[default]
    Propagate,

    /// Count a failed branch as `false`.
    Suppress,
}

/// Resolve `true` as soon as any task does; otherwise `false` once all
/// complete. Zero tasks resolve `false` without polling anything.
///
/// All tasks run concurrently. The first `Ok(true)` wins immediately and
/// the remaining in-flight tasks are dropped — a best-effort
/// short-circuit, not a cancellation guarantee for side-effectful
/// predicates. Errors are held while the batch drains: a later `true`
/// suppresses them; if no branch allows, `policy` decides whether the
/// first error is re-raised or the batch resolves `false`.
pub(crate) async fn any<'a, I>(tasks: I, policy: ErrorPolicy) -> Result<bool>
where
    I: IntoIterator<Item = BoxFuture<'a, Result<bool>>>,
{
    let mut pending: FuturesUnordered<_> = tasks.into_iter().collect();
    if pending.is_empty() {
        return Ok(false);
    }

    let mut first_err: Option<RbacError> = None;
    while let Some(result) = pending.next().await {
        match result {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                debug!(error = %e, "sub-evaluation failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match (first_err, policy) {
        (Some(e), ErrorPolicy::Propagate) => Err(e),
        _ => Ok(false),
    }
}
