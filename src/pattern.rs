//! Operation-name pattern compilation and matching.
//!
//! A grant name with no wildcard is matched by whole-string equality
//! against the exact-grant table. A name containing `*` compiles to a
//! regex in which each `*` matches any run of characters; the matcher is
//! anchored at the start of the operation only, so `account:*` matches
//! `account:save` and `a*b` matches `a-b-suffix`. Explicit regex grants
//! compile their source verbatim and control their own anchoring.

use regex::Regex;

use crate::error::{RbacError, Result};

/// How a grant is matched against candidate operations.
#[derive(Debug, Clone)]
pub(crate) enum OpPattern {
    /// Whole-string equality on the operation name.
    Exact(String),

    /// Compiled wildcard or explicit regular expression.
    Pattern { original: String, matcher: Regex },
}

/// A name containing `*` is a glob pattern rather than an exact operation.
pub(crate) fn is_glob(name: &str) -> bool {
    name.contains('*')
}

/// Compile a glob into a start-anchored regex. Everything except `*` is
/// matched literally; the end is deliberately left open.
pub(crate) fn glob_to_regex(glob: &str) -> std::result::Result<Regex, regex::Error> {
    let mut source = String::with_capacity(glob.len() + 4);
    source.push('^');
    for (i, literal) in glob.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(literal));
    }
    Regex::new(&source)
}

/// Classify and compile one grant for `role`. An explicit `regex` source
/// takes precedence over deriving a pattern from `name`.
pub(crate) fn compile(role: &str, name: &str, regex_src: Option<&str>) -> Result<OpPattern> {
    if let Some(src) = regex_src {
        let matcher = Regex::new(src).map_err(|source| RbacError::InvalidPattern {
            role: role.to_string(),
            pattern: src.to_string(),
            source,
        })?;
        return Ok(OpPattern::Pattern {
            original: src.to_string(),
            matcher,
        });
    }

    if !is_glob(name) {
        return Ok(OpPattern::Exact(name.to_string()));
    }

    let matcher = glob_to_regex(name).map_err(|source| RbacError::InvalidPattern {
        role: role.to_string(),
        pattern: name.to_string(),
        source,
    })?;
    Ok(OpPattern::Pattern {
        original: name.to_string(),
        matcher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_name_is_exact() {
        assert!(matches!(
            compile("user", "post:add", None).unwrap(),
            OpPattern::Exact(op) if op == "post:add"
        ));
    }

    #[test]
    fn glob_compiles_to_start_anchored_matcher() {
        let OpPattern::Pattern { matcher, .. } = compile("user", "account:*", None).unwrap()
        else {
            panic!("expected pattern grant");
        };
        assert!(matcher.is_match("account:save"));
        assert!(matcher.is_match("account:"));
        assert!(!matcher.is_match("billing:account:save"));
    }

    #[test]
    fn glob_end_is_open() {
        let OpPattern::Pattern { matcher, .. } = compile("user", "a*b", None).unwrap() else {
            panic!("expected pattern grant");
        };
        assert!(matcher.is_match("ab"));
        assert!(matcher.is_match("a-b"));
        // No end anchor: a trailing remainder after the last literal still matches.
        assert!(matcher.is_match("a-b-suffix"));
        assert!(!matcher.is_match("b-a"));
    }

    #[test]
    fn glob_literals_are_escaped() {
        let OpPattern::Pattern { matcher, .. } = compile("user", "doc.v1:*", None).unwrap()
        else {
            panic!("expected pattern grant");
        };
        assert!(matcher.is_match("doc.v1:read"));
        assert!(!matcher.is_match("docxv1:read"));
    }

    #[test]
    fn explicit_regex_overrides_name() {
        let OpPattern::Pattern { original, matcher } =
            compile("user", "never:this", Some("^post:(add|save)$")).unwrap()
        else {
            panic!("expected pattern grant");
        };
        assert_eq!(original, "^post:(add|save)$");
        assert!(matcher.is_match("post:add"));
        assert!(!matcher.is_match("post:delete"));
        assert!(!matcher.is_match("never:this"));
    }

    #[test]
    fn invalid_regex_names_role_and_pattern() {
        let err = compile("editor", "x", Some("(")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("editor"));
        assert!(msg.contains('('));
    }

    /// Reference glob matcher: leftmost segment search after an anchored
    /// first segment, open-ended.
    fn naive_glob_match(glob: &str, input: &str) -> bool {
        let mut segments = glob.split('*');
        let first = segments.next().unwrap_or("");
        if !input.starts_with(first) {
            return false;
        }
        let mut pos = first.len();
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            match input[pos..].find(segment) {
                Some(i) => pos += i + segment.len(),
                None => return false,
            }
        }
        true
    }

    proptest! {
        #[test]
        fn compiled_glob_agrees_with_reference(
            glob in "[a-c:*]{0,8}",
            input in "[a-c:]{0,8}",
        ) {
            prop_assume!(is_glob(&glob));
            let matcher = glob_to_regex(&glob).unwrap();
            prop_assert_eq!(matcher.is_match(&input), naive_glob_match(&glob, &input));
        }

        #[test]
        fn non_glob_names_classify_exact(name in "[a-c:]{0,8}") {
            prop_assert!(matches!(
                compile("r", &name, None).unwrap(),
                OpPattern::Exact(_)
            ));
        }
    }
}
