//! `VersionRelation` guards (`<5`, `<=2.3`, `=1.0`, `default`) and the total
//! order over them used by `VersionDep`.

use crate::error::{CrdsError, Result};
use std::cmp::Ordering;

/// A parsed numeric literal or tuple-of-numbers, the only expression shapes
/// a version guard's right-hand side may take.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionKey(Vec<f64>);

impl VersionKey {
    pub fn scalar(n: f64) -> Self {
        VersionKey(vec![n])
    }

    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if let Some(inner) = expr.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let mut parts = Vec::new();
            for piece in inner.split(',') {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                parts.push(piece.parse::<f64>().map_err(|_| bad_expr(expr))?);
            }
            if parts.is_empty() {
                return Err(bad_expr(expr));
            }
            Ok(VersionKey(parts))
        } else {
            Ok(VersionKey(vec![expr.parse::<f64>().map_err(|_| bad_expr(expr))?]))
        }
    }

    fn try_cmp(&self, other: &VersionKey) -> Result<Ordering> {
        if self.0.len() != other.0.len() {
            return Err(CrdsError::MappingError {
                file: String::new(),
                message: "incompatible version value shapes".to_string(),
            });
        }
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.partial_cmp(b) {
                Some(Ordering::Equal) => continue,
                Some(o) => return Ok(o),
                None => {
                    return Err(CrdsError::MappingError {
                        file: String::new(),
                        message: "NaN in version comparison".to_string(),
                    })
                }
            }
        }
        Ok(Ordering::Equal)
    }
}

fn bad_expr(expr: &str) -> CrdsError {
    CrdsError::FormatError {
        file: String::new(),
        pos: crate::error::SourcePos { line: 0, column: 0 },
        message: format!("invalid version expression '{expr}'"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Op {
    Lt,
    Le,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VersionRelation {
    Guard { op: Op, version: VersionKey },
    Default,
}

impl VersionRelation {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "default" {
            return Ok(VersionRelation::Default);
        }
        let (op, rest) = if let Some(rest) = s.strip_prefix("<=") {
            (Op::Le, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Op::Lt, rest)
        } else if let Some(rest) = s.strip_prefix("==") {
            (Op::Eq, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Op::Eq, rest)
        } else {
            return Err(CrdsError::FormatError {
                file: String::new(),
                pos: crate::error::SourcePos { line: 0, column: 0 },
                message: format!("unrecognized version relation operator in '{s}'"),
            });
        };
        let version = VersionKey::parse(rest)?;
        Ok(VersionRelation::Guard { op, version })
    }

    /// Whether this relation is satisfied by a bare query version `v`.
    pub fn satisfies(&self, v: &VersionKey) -> Result<bool> {
        match self {
            VersionRelation::Default => Ok(true),
            VersionRelation::Guard { op, version } => {
                let ord = v.try_cmp(version)?;
                Ok(match op {
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    Op::Eq => ord == Ordering::Equal,
                })
            }
        }
    }

    /// Total order used to sort `VersionDep` cases ascending before lookup;
    /// `default` sorts as the maximum element.
    fn sort_key(&self) -> (Vec<f64>, u8) {
        match self {
            VersionRelation::Default => (vec![f64::INFINITY], 3),
            VersionRelation::Guard { op, version } => {
                let rank = match op {
                    Op::Lt => 0,
                    Op::Le => 1,
                    Op::Eq => 2,
                };
                (version.0.clone(), rank)
            }
        }
    }
}

impl PartialOrd for VersionRelation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for VersionRelation {}

impl Ord for VersionRelation {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, ra) = self.sort_key();
        let (b, rb) = other.sort_key();
        for (x, y) in a.iter().zip(b.iter()) {
            match x.partial_cmp(y) {
                Some(Ordering::Equal) => continue,
                Some(o) => return o,
                None => return Ordering::Equal,
            }
        }
        a.len().cmp(&b.len()).then(ra.cmp(&rb))
    }
}

pub fn sort_relations(relations: &mut [VersionRelation]) {
    relations.sort();
}

/// Picks the first (in ascending order) relation satisfied by `v`.
pub fn lookup<'a, T>(sorted: &'a [(VersionRelation, T)], v: &VersionKey) -> Result<&'a T> {
    for (rel, value) in sorted {
        if rel.satisfies(v)? {
            return Ok(value);
        }
    }
    Err(CrdsError::MatchingError { message: "no version relation satisfied the query".to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_maximum() {
        let a = VersionRelation::parse("<5").unwrap();
        let b = VersionRelation::Default;
        assert!(a < b);
    }

    #[test]
    fn lt_before_eq_at_equal_version() {
        let a = VersionRelation::parse("<5").unwrap();
        let b = VersionRelation::parse("=5").unwrap();
        assert!(a < b);
    }

    #[test]
    fn double_equals_normalizes_to_eq() {
        let a = VersionRelation::parse("==5").unwrap();
        let b = VersionRelation::parse("=5").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_picks_first_satisfied_in_ascending_order() {
        let mut cases = vec![
            (VersionRelation::parse("<5").unwrap(), "a"),
            (VersionRelation::parse("default").unwrap(), "b"),
        ];
        sort_relations_pairs(&mut cases);
        let v = VersionKey::scalar(6.0);
        assert_eq!(*lookup(&cases, &v).unwrap(), "b");
        let v2 = VersionKey::scalar(1.0);
        assert_eq!(*lookup(&cases, &v2).unwrap(), "a");
    }

    fn sort_relations_pairs<T>(cases: &mut [(VersionRelation, T)]) {
        cases.sort_by(|a, b| a.0.cmp(&b.0));
    }
}
