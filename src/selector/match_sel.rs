//! The `Match` selector: winnow, rank, yield (§4.4 of the governing design).
//!
//! This is the one selector variant with a validation phase that runs
//! *before* winnowing (missing/bad parameter checks) and a yield phase that
//! may retry weaker candidate groups when the single best case raises a
//! `LookupError`-family failure on recursion.

use super::{Node, Resolved};
use crate::error::{CrdsError, Result};
use crate::matcher::{FieldKey, Matcher};
use crate::value::Header;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub optional: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, optional: bool) -> Self {
        Parameter { name: name.into(), optional }
    }
}

/// A single raw token occupying one position of a case's key, as produced
/// by the parser before substitution rewriting and matcher compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseToken {
    Scalar(String),
    Tuple(Vec<String>),
}

pub struct MatchCase {
    pub key: Vec<CaseToken>,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq)]
struct CompiledCase {
    /// `None` only ever appears in `declared_values`, never here.
    node: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSelector {
    parameters: Vec<Parameter>,
    matchers: Vec<Vec<FieldKeyCompiled>>,
    cases: Vec<CompiledCase>,
    /// Per-parameter declared value set for `BadValueError`, or `None` if a
    /// wildcard occurs at that position (which exempts the parameter).
    declared_values: Vec<Option<HashSet<String>>>,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldKeyCompiled(FieldKey);

impl MatchSelector {
    pub fn new(
        parameters: Vec<Parameter>,
        substitutions: &HashMap<String, HashMap<String, String>>,
        raw_cases: Vec<MatchCase>,
    ) -> Result<Self> {
        let n = parameters.len();
        for case in &raw_cases {
            if case.key.len() != n {
                return Err(CrdsError::MappingError {
                    file: String::new(),
                    message: format!(
                        "Match case has {} fields but {} parameters were declared",
                        case.key.len(),
                        n
                    ),
                });
            }
        }

        let mut declared_values: Vec<Option<HashSet<String>>> =
            (0..n).map(|_| Some(HashSet::new())).collect();

        let mut matchers = Vec::with_capacity(raw_cases.len());
        let mut cases = Vec::with_capacity(raw_cases.len());

        for case in raw_cases {
            let mut row = Vec::with_capacity(n);
            for (i, token) in case.key.into_iter().enumerate() {
                let rewritten = rewrite(&parameters[i].name, token, substitutions);
                match &rewritten {
                    CaseToken::Scalar(s) if s == "*" => {
                        declared_values[i] = None;
                    }
                    CaseToken::Scalar(s) => {
                        if let Some(set) = declared_values[i].as_mut() {
                            if !is_inequality(s) {
                                set.insert(s.to_lowercase());
                            }
                        }
                    }
                    CaseToken::Tuple(alts) => {
                        if let Some(set) = declared_values[i].as_mut() {
                            for a in alts {
                                set.insert(a.to_lowercase());
                            }
                        }
                    }
                }
                let field_key = match rewritten {
                    CaseToken::Scalar(s) => FieldKey::from_scalar(&s),
                    CaseToken::Tuple(alts) => FieldKey::Alternatives(alts),
                };
                row.push(FieldKeyCompiled(field_key));
            }
            matchers.push(row);
            cases.push(CompiledCase { node: case.node });
        }

        Ok(MatchSelector { parameters, matchers, cases, declared_values })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        self.validate_parameters(header)?;

        let compiled: Vec<Vec<Matcher>> = self
            .matchers
            .iter()
            .map(|row| row.iter().map(|f| Matcher::compile(&f.0)).collect())
            .collect();

        let mut weights: Vec<i32> = vec![0; self.cases.len()];
        let mut alive: Vec<bool> = vec![true; self.cases.len()];

        for (i, param) in self.parameters.iter().enumerate() {
            // validate_parameters() already rejected a required-and-absent
            // parameter, so an absent parameter here is always optional:
            // it didn't rule out any case, and it shouldn't sway ranking
            // between them either.
            if !header.contains(&param.name) {
                continue;
            }
            let value = header.get_or_not_present(&param.name);
            for case_idx in 0..self.cases.len() {
                if !alive[case_idx] {
                    continue;
                }
                let status = compiled[case_idx][i].test(&value);
                if status == -1 && !param.optional {
                    alive[case_idx] = false;
                } else {
                    weights[case_idx] -= status;
                }
            }
        }

        let mut live_indices: Vec<usize> =
            (0..self.cases.len()).filter(|&i| alive[i]).collect();
        live_indices.sort_by_key(|&i| weights[i]);

        let groups = live_indices.into_iter().group_by(|&i| weights[i]);
        for (_, group) in &groups {
            let group: Vec<usize> = group.collect();
            if group.len() > 1 {
                return Err(CrdsError::AmbiguousMatchError {
                    message: format!(
                        "{} cases tied for the best match at weight {}",
                        group.len(),
                        weights[group[0]]
                    ),
                });
            }
            let idx = group[0];
            match self.cases[idx].node.choose(header) {
                Ok(resolved) => return Ok(resolved),
                Err(e) if e.is_lookup_error() => continue,
                Err(e) => return Err(e),
            }
        }

        Err(CrdsError::MatchingError { message: "no case survived winnowing".to_string() })
    }

    fn validate_parameters(&self, header: &Header) -> Result<()> {
        for (i, param) in self.parameters.iter().enumerate() {
            if !header.contains(&param.name) {
                if !param.optional {
                    return Err(CrdsError::MissingParameterError { parameter: param.name.clone() });
                }
                continue;
            }
            let value = header.get_or_not_present(&param.name);
            if let Some(allowed) = &self.declared_values[i] {
                if !allowed.contains(&value.to_lowercase()) {
                    return Err(CrdsError::BadValueError {
                        parameter: param.name.clone(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    pub(super) fn collect_reference_names(&self, out: &mut Vec<String>) {
        for case in &self.cases {
            case.node.reference_names(out);
        }
    }

    pub(super) fn collect_required_parameters(&self, out: &mut Vec<String>) {
        for p in &self.parameters {
            out.push(p.name.clone());
        }
        for case in &self.cases {
            case.node.required_parameters(out);
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Per-parameter set of lowercased literal values declared across all
    /// cases, or `None` if a wildcard at that position exempts the
    /// parameter from value certification (§4.8).
    pub fn declared_values(&self) -> &[Option<HashSet<String>>] {
        &self.declared_values
    }

    pub(crate) fn child_nodes(&self) -> impl Iterator<Item = &Node> {
        self.cases.iter().map(|c| &c.node)
    }
}

fn is_inequality(s: &str) -> bool {
    s.starts_with('<') || s.starts_with('>')
}

fn rewrite(
    parkey: &str,
    token: CaseToken,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> CaseToken {
    let Some(subs) = substitutions.get(parkey) else { return token };
    match token {
        CaseToken::Scalar(s) => CaseToken::Scalar(subs.get(&s).cloned().unwrap_or(s)),
        CaseToken::Tuple(alts) => {
            CaseToken::Tuple(alts.into_iter().map(|a| subs.get(&a).cloned().unwrap_or(a)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn leaf(s: &str) -> Node {
        Node::Leaf(s.to_string())
    }

    fn selector() -> MatchSelector {
        // Match(("*foo","bar"), {("1.0","*"):"100", ("1.0","2.0"):"200", ("*","*"):"300"})
        let parameters =
            vec![Parameter::new("foo", true), Parameter::new("bar", false)];
        let cases = vec![
            MatchCase {
                key: vec![CaseToken::Scalar("1.0".into()), CaseToken::Scalar("*".into())],
                node: leaf("100"),
            },
            MatchCase {
                key: vec![CaseToken::Scalar("1.0".into()), CaseToken::Scalar("2.0".into())],
                node: leaf("200"),
            },
            MatchCase {
                key: vec![CaseToken::Scalar("*".into()), CaseToken::Scalar("*".into())],
                node: leaf("300"),
            },
        ];
        MatchSelector::new(parameters, &HashMap::new(), cases).unwrap()
    }

    #[test]
    fn exact_match_on_both_fields_wins() {
        let sel = selector();
        let mut h = Header::new();
        h.insert("foo", "1.0");
        h.insert("bar", "2.0");
        assert_eq!(sel.choose(&h).unwrap(), Resolved::One("200".to_string()));
    }

    #[test]
    fn missing_optional_still_matches_best_required_case() {
        let sel = selector();
        let mut h = Header::new();
        h.insert("bar", "2.0");
        assert_eq!(sel.choose(&h).unwrap(), Resolved::One("200".to_string()));
    }

    #[test]
    fn missing_required_parameter_errors() {
        let sel = selector();
        let h = Header::new();
        let err = sel.choose(&h).unwrap_err();
        assert_eq!(err, CrdsError::MissingParameterError { parameter: "bar".to_string() });
    }

    #[test]
    fn ambiguous_group_does_not_fall_through() {
        let parameters = vec![Parameter::new("x", false)];
        let cases = vec![
            MatchCase { key: vec![CaseToken::Scalar("a".into())], node: leaf("one") },
            MatchCase { key: vec![CaseToken::Tuple(vec!["a".into(), "b".into()])], node: leaf("two") },
        ];
        let sel = MatchSelector::new(parameters, &HashMap::new(), cases).unwrap();
        let mut h = Header::new();
        h.insert("x", "a");
        assert_matches!(sel.choose(&h), Err(CrdsError::AmbiguousMatchError { .. }));
    }
}
