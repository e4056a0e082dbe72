//! `ClosestTime`: choose the case whose timestamp minimizes `|query - key|`.

use super::{Node, Resolved};
use crate::error::{CrdsError, Result};
use crate::timestamp::Timestamp;
use crate::value::Header;

#[derive(Debug, Clone, PartialEq)]
pub struct ClosestTime {
    parameter: String,
    cases: Vec<(Timestamp, Node)>,
}

impl ClosestTime {
    pub fn new(parameter: String, cases: Vec<(String, Node)>) -> Result<Self> {
        let parsed = cases
            .into_iter()
            .map(|(k, n)| Ok((Timestamp::parse(&k)?, n)))
            .collect::<Result<Vec<_>>>()?;
        if parsed.is_empty() {
            return Err(CrdsError::MappingError {
                file: String::new(),
                message: "ClosestTime requires at least one case".to_string(),
            });
        }
        Ok(ClosestTime { parameter, cases: parsed })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        let query = Timestamp::parse(&header.get_or_not_present(&self.parameter))?;
        let best = self
            .cases
            .iter()
            .min_by_key(|(t, _)| t.abs_delta_seconds(&query))
            .expect("validated non-empty at construction");
        best.1.choose(header)
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

    #[test]
    fn picks_minimal_absolute_delta() {
        let sel = ClosestTime::new(
            "time".to_string(),
            vec![
                ("2017-4-24".to_string(), Node::Leaf("early".to_string())),
                ("2019-4-15".to_string(), Node::Leaf("late".to_string())),
            ],
        )
        .unwrap();
        let mut h = Header::new();
        h.insert("time", "2019-1-1");
        assert_eq!(sel.choose(&h).unwrap(), Resolved::One("late".to_string()));
    }
}
