//! `LinearInterpolation`: bracket the query between the two nearest numeric
//! keys. Terminals here are always a pair of basenames, never a nested
//! selector (see §3 of the governing design).

use crate::error::{CrdsError, Result};
use crate::selector::Resolved;
use crate::value::Header;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolation {
    parameter: String,
    /// Ascending by numeric key.
    cases: Vec<(f64, String)>,
}

impl LinearInterpolation {
    pub fn new(parameter: String, mut cases: Vec<(f64, String)>) -> Result<Self> {
        if cases.is_empty() {
            return Err(CrdsError::MappingError {
                file: String::new(),
                message: "LinearInterpolation requires at least one case".to_string(),
            });
        }
        cases.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(LinearInterpolation { parameter, cases })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        let raw = header.get_or_not_present(&self.parameter);
        let query: f64 = raw.trim().parse().map_err(|_| CrdsError::BadValueError {
            parameter: self.parameter.clone(),
            value: raw.clone(),
        })?;

        if query <= self.cases[0].0 {
            let s = self.cases[0].1.clone();
            return Ok(Resolved::Pair(s.clone(), s));
        }
        let last = self.cases.len() - 1;
        if query >= self.cases[last].0 {
            let s = self.cases[last].1.clone();
            return Ok(Resolved::Pair(s.clone(), s));
        }

        let j = self.cases.partition_point(|(k, _)| *k < query);
        if (self.cases[j].0 - query).abs() < f64::EPSILON {
            let s = self.cases[j].1.clone();
            Ok(Resolved::Pair(s.clone(), s))
        } else {
            Ok(Resolved::Pair(self.cases[j - 1].1.clone(), self.cases[j].1.clone()))
        }
    }

    pub(super) fn collect_reference_names(&self, out: &mut Vec<String>) {
        for (_, s) in &self.cases {
            out.push(s.clone());
        }
    }

    pub(super) fn collect_required_parameters(&self, out: &mut Vec<String>) {
        out.push(self.parameter.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> LinearInterpolation {
        LinearInterpolation::new(
            "w".to_string(),
            vec![(1.2, "a".to_string()), (1.5, "b".to_string()), (5.0, "c".to_string())],
        )
        .unwrap()
    }

    fn query(sel: &LinearInterpolation, w: f64) -> Resolved {
        let mut h = Header::new();
        h.insert("w", w);
        sel.choose(&h).unwrap()
    }

    #[test]
    fn brackets_between_two_keys() {
        let sel = selector();
        assert_eq!(query(&sel, 1.25), Resolved::Pair("a".to_string(), "b".to_string()));
    }

    #[test]
    fn exact_hit_returns_equal_pair() {
        let sel = selector();
        assert_eq!(query(&sel, 1.2), Resolved::Pair("a".to_string(), "a".to_string()));
    }

    #[test]
    fn off_the_end_clamps_to_boundary() {
        let sel = selector();
        assert_eq!(query(&sel, 6.0), Resolved::Pair("c".to_string(), "c".to_string()));
    }
}
