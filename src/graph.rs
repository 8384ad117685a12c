//! Role-graph construction and validation.
//!
//! [`RoleGraph::build`] turns raw role definitions into the validated,
//! in-memory representation resolution runs against: per role, an
//! exact-match grant table, an ordered pattern-grant list, and the parent
//! list. Validation stops at the first error. Cyclic inheritance is
//! rejected here rather than left to recurse unboundedly at decision
//! time.
//!
//! The graph is immutable after build and safe for unsynchronized
//! concurrent reads; to change roles, build a new graph (and engine).

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RbacError, Result};
use crate::pattern::{self, OpPattern};
use crate::types::{GrantSpec, RoleDefinitions, When};

/// A grant resolved from the exact-match table.
#[derive(Debug, Clone)]
pub(crate) enum Grant {
    /// Always allowed.
    Always,
    /// Allowed iff the predicate says so.
    When(When),
}

/// A pattern grant, tested in declaration order.
#[derive(Debug, Clone)]
pub(crate) struct PatternGrant {
    /// Original pattern text, kept for diagnostics.
    pub(crate) original: String,
    pub(crate) matcher: regex::Regex,
    pub(crate) when: Option<When>,
}

/// One validated role.
#[derive(Debug, Clone, Default)]
pub(crate) struct Role {
    pub(crate) exact: HashMap<String, Grant>,
    pub(crate) patterns: Vec<PatternGrant>,
    pub(crate) parents: Vec<String>,
}

/// The validated, immutable representation of all roles.
#[derive(Debug, Default)]
pub struct RoleGraph {
    roles: HashMap<String, Role>,
}

impl RoleGraph {
    /// Validate `defs` and build the graph.
    ///
    /// # Errors
    ///
    /// Returns the first violation encountered:
    /// - [`RbacError::UndefinedInheritance`] if a role inherits a name not
    ///   defined in `defs`
    /// - [`RbacError::InvalidPattern`] if a grant's regex fails to compile
    /// - [`RbacError::InheritanceCycle`] if the `inherits` relation is
    ///   cyclic
    pub fn build(defs: &RoleDefinitions) -> Result<Self> {
        debug!(roles = defs.len(), "building role graph");
        let mut roles = HashMap::with_capacity(defs.len());

        for (name, def) in defs {
            let mut role = Role::default();

            for parent in &def.inherits {
                if !defs.contains_key(parent) {
                    return Err(RbacError::UndefinedInheritance {
                        role: name.clone(),
                        target: parent.clone(),
                    });
                }
                role.parents.push(parent.clone());
            }

            for grant in &def.can {
                let (compiled, when) = match grant {
                    GrantSpec::Op(op) => (pattern::compile(name, op, None)?, None),
                    GrantSpec::When { name: op, when } => {
                        (pattern::compile(name, op, None)?, Some(when.clone()))
                    }
                    GrantSpec::Regex {
                        name: display,
                        regex,
                        when,
                    } => (
                        pattern::compile(name, display.as_deref().unwrap_or(regex), Some(regex))?,
                        when.clone(),
                    ),
                };
                match compiled {
                    OpPattern::Exact(op) => {
                        // Within a role, a later grant for the same exact
                        // operation replaces the earlier one.
                        role.exact
                            .insert(op, when.map(Grant::When).unwrap_or(Grant::Always));
                    }
                    OpPattern::Pattern { original, matcher } => role.patterns.push(PatternGrant {
                        original,
                        matcher,
                        when,
                    }),
                }
            }

            roles.insert(name.clone(), role);
        }

        let graph = Self { roles };
        graph.check_cycles()?;
        Ok(graph)
    }

    pub(crate) fn get(&self, role: &str) -> Option<&Role> {
        self.roles.get(role)
    }

    /// Number of roles in the graph.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Reject cyclic `inherits` relations.
    ///
    /// DFS with three states per node: unvisited, on the current path
    /// (gray), fully explored (black). Reaching a gray node closes a
    /// cycle; the error reports the full cycle path.
    fn check_cycles(&self) -> Result<()> {
        let mut state: HashMap<&str, u8> = self.roles.keys().map(|k| (k.as_str(), 0)).collect();
        let mut path: Vec<&str> = Vec::new();

        for start in self.roles.keys() {
            if state.get(start.as_str()) == Some(&0) {
                self.visit(start, &mut state, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        state: &mut HashMap<&'a str, u8>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        match state.get(node) {
            Some(1) => {
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(node);
                return Err(RbacError::InheritanceCycle {
                    path: cycle.join(" -> "),
                });
            }
            Some(2) => return Ok(()),
            _ => {}
        }

        state.insert(node, 1);
        path.push(node);

        if let Some(role) = self.roles.get(node) {
            for parent in &role.parents {
                self.visit(parent, state, path)?;
            }
        }

        state.insert(node, 2);
        path.pop();
        Ok(())
    }
}
