//! `ClosestGeometricRatio`: despite the name, this is absolute distance on
//! the real line, not a ratio (see Open Questions in the governing design —
//! behavior is preserved as observed in the original source).

use super::{Node, Resolved};
use crate::error::{CrdsError, Result};
use crate::value::Header;

#[derive(Debug, Clone, PartialEq)]
pub struct ClosestGeometricRatio {
    parameter: String,
    /// Ascending by numeric key.
    cases: Vec<(f64, Node)>,
}

impl ClosestGeometricRatio {
    pub fn new(parameter: String, mut cases: Vec<(f64, Node)>) -> Result<Self> {
        if cases.is_empty() {
            return Err(CrdsError::MappingError {
                file: String::new(),
                message: "ClosestGeometricRatio requires at least one case".to_string(),
            });
        }
        cases.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ClosestGeometricRatio { parameter, cases })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        let raw = header.get_or_not_present(&self.parameter);
        let query: f64 = raw.trim().parse().map_err(|_| CrdsError::BadValueError {
            parameter: self.parameter.clone(),
            value: raw.clone(),
        })?;

        let mut best_idx = 0;
        let mut best_delta = f64::INFINITY;
        for (i, (key, _)) in self.cases.iter().enumerate() {
            let delta = (key - query).abs();
            // Ties resolve to the numerically smaller key; cases are sorted
            // ascending, so a strict `<` keeps the first (smallest) tie.
            if delta < best_delta {
                best_delta = delta;
                best_idx = i;
            }
        }
        self.cases[best_idx].1.choose(header)
    }

    pub(super) fn collect_reference_names(&self, out: &mut Vec<String>) {
        for (_, node) in &self.cases {
            node.reference_names(out);
        }
    }

    pub(super) fn collect_required_parameters(&self, out: &mut Vec<String>) {
        out.push(self.parameter.clone());
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
    use crate::selector::{Selector, VersionDep};

    #[test]
    fn picks_closest_and_descends_into_nested_version_dep() {
        let make_version_dep = |lt5: &str, default: &str| {
            Node::Sub(Box::new(Selector::VersionDep(
                VersionDep::new(vec![
                    ("<5".to_string(), Node::Leaf(lt5.to_string())),
                    ("default".to_string(), Node::Leaf(default.to_string())),
                ])
                .unwrap(),
            )))
        };
        let sel = ClosestGeometricRatio::new(
            "effective_wavelength".to_string(),
            vec![
                (1.2, make_version_dep("cref_flatfield_73.fits", "cref_flatfield_123.fits")),
                (1.5, make_version_dep("cref_flatfield_74.fits", "cref_flatfield_124.fits")),
                (5.0, make_version_dep("cref_flatfield_87.fits", "cref_flatfield_137.fits")),
            ],
        )
        .unwrap();

        let mut h = Header::new();
        h.insert("effective_wavelength", 1.4);
        h.insert("sw_version", 6.0);
        assert_eq!(
            sel.choose(&h).unwrap(),
            Resolved::One("cref_flatfield_124.fits".to_string())
        );
    }
}
