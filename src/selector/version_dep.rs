//! `VersionDep`: dispatch on a fixed `sw_version` header value against a set
//! of `VersionRelation` guards, picking the first satisfied in ascending
//! order with `default` sorting as the maximum (§4.7 of the governing
//! design).

use super::{Node, Resolved};
use crate::error::{CrdsError, Result};
use crate::value::Header;
use crate::version::{self, VersionKey, VersionRelation};

const PARAMETER: &str = "sw_version";

#[derive(Debug, Clone, PartialEq)]
pub struct VersionDep {
    /// Ascending by `VersionRelation`'s total order.
    cases: Vec<(VersionRelation, Node)>,
}

impl VersionDep {
    pub fn new(raw_cases: Vec<(String, Node)>) -> Result<Self> {
        if raw_cases.is_empty() {
            return Err(CrdsError::MappingError {
                file: String::new(),
                message: "VersionDep requires at least one case".to_string(),
            });
        }
        let mut cases = raw_cases
            .into_iter()
            .map(|(k, n)| Ok((VersionRelation::parse(&k)?, n)))
            .collect::<Result<Vec<_>>>()?;
        cases.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(VersionDep { cases })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        let raw = header.get_or_not_present(PARAMETER);
        let query = VersionKey::parse(&raw).map_err(|_| CrdsError::BadValueError {
            parameter: PARAMETER.to_string(),
            value: raw.clone(),
        })?;
        let node = version::lookup(&self.cases, &query)?;
        node.choose(header)
    }

    pub(super) fn collect_reference_names(&self, out: &mut Vec<String>) {
        for (_, node) in &self.cases {
            node.reference_names(out);
        }
    }

    pub(super) fn collect_required_parameters(&self, out: &mut Vec<String>) {
        out.push(PARAMETER.to_string());
        for (_, node) in &self.cases {
            node.required_parameters(out);
        }
    }

    pub(crate) fn child_nodes(&self) -> impl Iterator<Item = &Node> {
        self.cases.iter().map(|(_, n)| n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ascending_scan_with_default_as_fallback() {
        let sel = VersionDep::new(vec![
            ("<5".to_string(), Node::Leaf("a".to_string())),
            ("default".to_string(), Node::Leaf("b".to_string())),
        ])
        .unwrap();

        let mut low = Header::new();
        low.insert("sw_version", 1.0);
        assert_eq!(sel.choose(&low).unwrap(), Resolved::One("a".to_string()));

        let mut high = Header::new();
        high.insert("sw_version", 6.0);
        assert_eq!(sel.choose(&high).unwrap(), Resolved::One("b".to_string()));
    }

    #[test]
    fn missing_relation_without_default_errors() {
        let sel = VersionDep::new(vec![("<5".to_string(), Node::Leaf("a".to_string()))]).unwrap();
        let mut h = Header::new();
        h.insert("sw_version", 9.0);
        assert_matches!(sel.choose(&h), Err(CrdsError::MatchingError { .. }));
    }
}
