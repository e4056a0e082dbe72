//! Offline structural and content validation against certified valid-value
//! tables (§4.8 of the governing design). Never invoked by `choose()`;
//! `CrdsError::ValidationError` only ever comes from here.

use crate::collaborators::ValidValues;
use crate::error::CrdsError;
use crate::mapping::Mapping;
use crate::selector::{Node, Selector};
use crate::value::NOT_PRESENT;
use std::collections::HashSet;

/// Walks a reference mapping's selector tree, checking every `Match`
/// parameter's declared values against the certified set. Returns every
/// violation found rather than failing on the first (offline validation is
/// meant to produce a complete report).
pub fn validate(mapping: &Mapping, valid_values: &dyn ValidValues) -> Vec<CrdsError> {
    let Mapping::Reference(reference) = mapping else { return Vec::new() };
    let mut errors = Vec::new();
    let mut warned = HashSet::new();
    validate_selector(&reference.root, reference.header.instrument.as_deref().unwrap_or(""), reference.header.reftype.as_deref().unwrap_or(""), valid_values, &mut errors, &mut warned);
    errors
}

fn validate_selector(
    selector: &Selector,
    instrument: &str,
    reftype: &str,
    valid_values: &dyn ValidValues,
    errors: &mut Vec<CrdsError>,
    warned: &mut HashSet<String>,
) {
    match selector {
        Selector::Match(m) => {
            for (param, declared) in m.parameters().iter().zip(m.declared_values()) {
                let Some(declared) = declared else { continue };
                let Some(certified) = valid_values.valid_values(instrument, reftype, &param.name) else {
                    if warned.insert(param.name.clone()) {
                        log::warn!("no certified values for parameter '{}', skipping", param.name);
                    }
                    continue;
                };
                for value in declared {
                    if !value_is_certified(value, &certified) {
                        errors.push(CrdsError::ValidationError {
                            message: format!(
                                "value '{value}' for parameter '{}' is not in its certified set",
                                param.name
                            ),
                        });
                    }
                }
            }
            for child in m.child_nodes() {
                descend(child, instrument, reftype, valid_values, errors, warned);
            }
        }
        Selector::UseAfter(s) => {
            for child in s.child_nodes() {
                descend(child, instrument, reftype, valid_values, errors, warned);
            }
        }
        Selector::ClosestTime(s) => {
            for child in s.child_nodes() {
                descend(child, instrument, reftype, valid_values, errors, warned);
            }
        }
        Selector::ClosestGeometricRatio(s) => {
            for child in s.child_nodes() {
                descend(child, instrument, reftype, valid_values, errors, warned);
            }
        }
        Selector::VersionDep(s) => {
            for child in s.child_nodes() {
                descend(child, instrument, reftype, valid_values, errors, warned);
            }
        }
        Selector::LinearInterpolation(_) => {}
    }
}

fn descend(
    node: &Node,
    instrument: &str,
    reftype: &str,
    valid_values: &dyn ValidValues,
    errors: &mut Vec<CrdsError>,
    warned: &mut HashSet<String>,
) {
    if let Node::Sub(selector) = node {
        validate_selector(selector, instrument, reftype, valid_values, errors, warned);
    }
}

/// A declared value is exempt or acceptable if it's the `NOT PRESENT`
/// sentinel, a literal member of the certified set, equal up to
/// decimal-trailing-zero normalization (`"1.0"` ~ `"1"`), or a `"lo:hi"`
/// range whose endpoints both lie in (or are exempt from) the set.
fn value_is_certified(value: &str, certified: &HashSet<String>) -> bool {
    if value.eq_ignore_ascii_case(NOT_PRESENT) {
        return true;
    }
    if certified.iter().any(|c| c.eq_ignore_ascii_case(value)) {
        return true;
    }
    if let Some(normalized) = normalize_decimal(value) {
        if certified.iter().any(|c| normalize_decimal(c).as_deref() == Some(&normalized)) {
            return true;
        }
    }
    if let Some((lo, hi)) = value.split_once(':') {
        return value_is_certified(lo, certified) && value_is_certified(hi, certified);
    }
    false
}

fn normalize_decimal(value: &str) -> Option<String> {
    let n: f64 = value.trim().parse().ok()?;
    Some(if n.fract() == 0.0 { format!("{}", n as i64) } else { format!("{n}") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Expectation, LoadOptions};

    struct FixedValidValues(HashSet<String>);
    impl ValidValues for FixedValidValues {
        fn valid_values(&self, _i: &str, _r: &str, _p: &str) -> Option<HashSet<String>> {
            Some(self.0.clone())
        }
    }

    fn rmap() -> Mapping {
        let text = "header = {'observatory': 'hst', 'mapping': 'reference', 'instrument': 'acs', 'reftype': 'flat', 'parkey': (('DETECTOR',),), 'sha1sum': 'x'}\nselector = Match({'WFC': 'a.fits', 'HRC': 'b.fits'})\n";
        crate::mapping::parse_text("x.rmap", text, &Expectation::default(), &LoadOptions { bypass_checksum: true })
            .unwrap()
    }

    #[test]
    fn accepts_values_in_the_certified_set() {
        let vv = FixedValidValues(["WFC".to_string(), "HRC".to_string()].into_iter().collect());
        assert!(validate(&rmap(), &vv).is_empty());
    }

    #[test]
    fn rejects_values_missing_from_the_certified_set() {
        let vv = FixedValidValues(["WFC".to_string()].into_iter().collect());
        let errors = validate(&rmap(), &vv);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CrdsError::ValidationError { .. }));
    }

    #[test]
    fn decimal_trailing_zero_normalizes() {
        let mut certified = HashSet::new();
        certified.insert("1".to_string());
        assert!(value_is_certified("1.0", &certified));
    }

    #[test]
    fn range_spec_checks_both_endpoints() {
        let mut certified = HashSet::new();
        certified.insert("1".to_string());
        certified.insert("5".to_string());
        assert!(value_is_certified("1:5", &certified));
        assert!(!value_is_certified("1:9", &certified));
    }
}
