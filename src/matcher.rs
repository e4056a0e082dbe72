//! Per-field matcher primitives used by `Match`'s winnowing phase.
//!
//! A field key compiles once (at selector-construction time) into a
//! `Matcher` that can be asked, for a given header value, whether it's an
//! exact match (+1), a don't-care (0), or a non-match (-1).

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneqOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// The uncompiled form of a case-key field, as it appears (after
/// substitution rewriting) in a mapping file.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKey {
    Wildcard,
    Exact(String),
    Alternatives(Vec<String>),
    Inequality(IneqOp, f64),
}

impl FieldKey {
    /// Parses a raw key token the way the loader sees it on a tuple
    /// element: `*` is the wildcard, `<x`/`<=x`/`>x`/`>=x` followed by a
    /// decimal literal is an inequality, anything else is a literal string
    /// (tuples of strings are represented as `Alternatives` directly by the
    /// caller, since the parser already knows which literal was a tuple).
    pub fn from_scalar(raw: &str) -> FieldKey {
        if raw == "*" {
            return FieldKey::Wildcard;
        }
        for (prefix, op) in [
            ("<=", IneqOp::Le),
            (">=", IneqOp::Ge),
            ("<", IneqOp::Lt),
            (">", IneqOp::Gt),
        ] {
            if let Some(rest) = raw.strip_prefix(prefix) {
                if let Ok(n) = rest.trim().parse::<f64>() {
                    return FieldKey::Inequality(op, n);
                }
            }
        }
        FieldKey::Exact(raw.to_string())
    }
}

/// The compiled form, ready for per-query evaluation.
pub enum Matcher {
    Wildcard,
    Exact(String),
    Alternatives(Regex),
    Inequality(IneqOp, f64),
}

impl Matcher {
    pub fn compile(key: &FieldKey) -> Matcher {
        match key {
            FieldKey::Wildcard => Matcher::Wildcard,
            FieldKey::Exact(s) => Matcher::Exact(s.clone()),
            FieldKey::Alternatives(alts) => {
                let pattern = format!(
                    "(?i)^({})$",
                    alts.iter().map(|a| regex::escape(a)).collect::<Vec<_>>().join("|")
                );
                Matcher::Alternatives(Regex::new(&pattern).expect("alternation pattern is always valid regex"))
            }
            FieldKey::Inequality(op, n) => Matcher::Inequality(*op, *n),
        }
    }

    /// Returns `+1` for an exact match, `0` for don't-care, `-1` for no
    /// match — the three-valued status winnowing consumes.
    pub fn test(&self, header_value: &str) -> i32 {
        match self {
            Matcher::Wildcard => 0,
            Matcher::Exact(s) => {
                if s.eq_ignore_ascii_case(header_value) {
                    1
                } else {
                    -1
                }
            }
            Matcher::Alternatives(re) => {
                if re.is_match(header_value) {
                    1
                } else {
                    -1
                }
            }
            Matcher::Inequality(op, n) => match header_value.trim().parse::<f64>() {
                Ok(v) => {
                    let ok = match op {
                        IneqOp::Lt => v < *n,
                        IneqOp::Le => v <= *n,
                        IneqOp::Gt => v > *n,
                        IneqOp::Ge => v >= *n,
                    };
                    if ok {
                        1
                    } else {
                        -1
                    }
                }
                Err(_) => -1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_always_zero() {
        let m = Matcher::compile(&FieldKey::Wildcard);
        assert_eq!(m.test("anything"), 0);
    }

    #[test]
    fn exact_is_case_insensitive() {
        let m = Matcher::compile(&FieldKey::Exact("ACS".to_string()));
        assert_eq!(m.test("acs"), 1);
        assert_eq!(m.test("wfc3"), -1);
    }

    #[test]
    fn alternatives_compiles_anchored_regex() {
        let m = Matcher::compile(&FieldKey::Alternatives(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(m.test("a"), 1);
        assert_eq!(m.test("ab"), -1);
    }

    #[test]
    fn inequality_parses_header_value() {
        let key = FieldKey::from_scalar("<5");
        assert_eq!(key, FieldKey::Inequality(IneqOp::Lt, 5.0));
        let m = Matcher::compile(&key);
        assert_eq!(m.test("4.9"), 1);
        assert_eq!(m.test("5.1"), -1);
    }
}
