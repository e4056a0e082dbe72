//! `UseAfter`: binary search for the greatest key `<=` the query timestamp.

use super::{Node, Resolved};
use crate::error::{CrdsError, Result};
use crate::timestamp::Timestamp;
use crate::value::Header;

#[derive(Debug, Clone, PartialEq)]
pub struct UseAfter {
    /// The one or two parkeys joined with a space to form the query
    /// timestamp (typically `DATE-OBS`, `TIME-OBS`).
    parameters: Vec<String>,
    /// Ascending by parsed timestamp.
    cases: Vec<(Timestamp, Node)>,
}

impl UseAfter {
    pub fn new(parameters: Vec<String>, mut cases: Vec<(String, Node)>) -> Result<Self> {
        let mut parsed: Vec<(Timestamp, Node)> = Vec::with_capacity(cases.len());
        for (key, node) in cases.drain(..) {
            parsed.push((Timestamp::parse(&key)?, node));
        }
        parsed.sort_by_key(|(t, _)| *t);
        Ok(UseAfter { parameters, cases: parsed })
    }

    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        let query = self.query_timestamp(header)?;
        let idx = match self.cases.binary_search_by_key(&query, |(t, _)| *t) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        };
        match idx {
            Some(i) => self.cases[i].1.choose(header),
            None => Err(CrdsError::UseAfterError { query: query.to_string() }),
        }
    }

    fn query_timestamp(&self, header: &Header) -> Result<Timestamp> {
        match self.parameters.as_slice() {
            [date, time] => {
                Timestamp::parse_joined(&header.get_or_not_present(date), &header.get_or_not_present(time))
            }
            [date] => Timestamp::parse(&header.get_or_not_present(date)),
            _ => Err(CrdsError::MappingError {
                file: String::new(),
                message: "UseAfter expects one or two parkeys".to_string(),
            }),
        }
    }

    pub(super) fn collect_reference_names(&self, out: &mut Vec<String>) {
        for (_, node) in &self.cases {
            node.reference_names(out);
        }
    }

    pub(super) fn collect_required_parameters(&self, out: &mut Vec<String>) {
        out.extend(self.parameters.iter().cloned());
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

    fn leaf(s: &str) -> Node {
        Node::Leaf(s.to_string())
    }

    fn selector() -> UseAfter {
        UseAfter::new(
            vec!["DATE-OBS".to_string(), "TIME-OBS".to_string()],
            vec![
                ("2004-02-14 00:00:00".to_string(), leaf("A")),
                ("2004-04-25 21:31:00".to_string(), leaf("B")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn picks_greatest_key_at_or_before_query() {
        let sel = selector();
        let mut h = Header::new();
        h.insert("DATE-OBS", "2004-07-02");
        h.insert("TIME-OBS", "08:09:00");
        assert_eq!(sel.choose(&h).unwrap(), Resolved::One("B".to_string()));
    }

    #[test]
    fn errors_when_query_precedes_every_key() {
        let sel = selector();
        let mut h = Header::new();
        h.insert("DATE-OBS", "2003-01-01");
        h.insert("TIME-OBS", "00:00:00");
        assert_eq!(
            sel.choose(&h).unwrap_err(),
            CrdsError::UseAfterError { query: "2003-01-01 00:00:00".to_string() }
        );
    }
}
