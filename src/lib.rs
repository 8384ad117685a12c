//! # hrbac
//!
//! Hierarchical role-based authorization decision engine.
//!
//! Host applications define roles — grants plus optional inheritance —
//! and ask the engine per request whether an operation is permitted.
//!
//! ## Features
//!
//! - **Async-first design** using the Tokio runtime; predicates and role
//!   loaders may be asynchronous
//! - **Exact, glob (`*`), and explicit-regex grants** with contractual
//!   tie-breaks: exact beats pattern, unconditional beats conditional
//! - **Role inheritance** with build-time cycle rejection
//! - **Conditional grants** via caller-supplied predicates over a
//!   free-form parameter bag
//! - **Deferred initialization** from a future or async loader, gated so
//!   every caller observes the same outcome
//! - **Short-circuiting concurrent fan-out** across roles, parents, and
//!   matching conditional grants
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use hrbac::{Params, Rbac, RoleDef, When};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut roles = HashMap::new();
//!     roles.insert(
//!         "user".to_string(),
//!         RoleDef::new()
//!             .allow("account:add")
//!             .allow_when("post:save", When::new(|p: &Params| {
//!                 p.get("ownerId") == p.get("postId")
//!             })),
//!     );
//!     roles.insert(
//!         "manager".to_string(),
//!         RoleDef::new().allow("post:*").inherit("user"),
//!     );
//!
//!     let rbac = Rbac::new(roles)?;
//!
//!     assert!(rbac.can("manager", "account:add", None).await?);
//!     assert!(!rbac.can("user", "post:delete", None).await?);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod types;

mod aggregate;
mod pattern;

pub use aggregate::ErrorPolicy;
pub use engine::{EngineConfig, Rbac};
pub use error::{RbacError, Result};
pub use graph::RoleGraph;
pub use types::{GrantSpec, Params, RoleDef, RoleDefinitions, RoleLoader, RoleQuery, When};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
