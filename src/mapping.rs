//! The polymorphic `Mapping` type and the single-file loader that parses,
//! checksums, and structurally validates one pipeline/instrument/reference
//! file (§3, §4.3 of the governing design). Recursive closure loading and
//! caching live in [`crate::cache`]; this module only knows how to turn one
//! file's text into one validated `Mapping`.

use crate::checksum;
use crate::error::{CrdsError, Result};
use crate::parser::{self, Expr};
use crate::selector::{Node, Selector};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Pipeline,
    Instrument,
    Reference,
}

impl Tier {
    fn keyword(self) -> &'static str {
        match self {
            Tier::Pipeline => "pipeline",
            Tier::Instrument => "instrument",
            Tier::Reference => "reference",
        }
    }

    /// Infers the tier from a mapping basename's extension, per §6's
    /// filename conventions.
    pub fn from_extension(basename: &str) -> Result<Tier> {
        if basename.ends_with(".pmap") {
            Ok(Tier::Pipeline)
        } else if basename.ends_with(".imap") {
            Ok(Tier::Instrument)
        } else if basename.ends_with(".rmap") {
            Ok(Tier::Reference)
        } else {
            Err(CrdsError::MappingError {
                file: basename.to_string(),
                message: "basename has no recognized .pmap/.imap/.rmap extension".to_string(),
            })
        }
    }
}

/// The common header fields every tier requires, plus the tier-specific
/// ones layered on top (§3).
#[derive(Debug, Clone)]
pub struct MappingHeader {
    pub observatory: String,
    pub instrument: Option<String>,
    pub reftype: Option<String>,
    pub parkey: Vec<Vec<String>>,
    pub sha1sum: String,
    pub substitutions: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug)]
pub struct PipelineMapping {
    pub filename: String,
    pub header: MappingHeader,
    /// instrument name -> child `.imap` basename.
    pub selector: HashMap<String, String>,
}

#[derive(Debug)]
pub struct InstrumentMapping {
    pub filename: String,
    pub header: MappingHeader,
    /// reftype -> (file extension, child `.rmap` basename).
    pub selector: HashMap<String, (String, String)>,
}

#[derive(Debug)]
pub struct ReferenceMapping {
    pub filename: String,
    pub header: MappingHeader,
    pub root: Selector,
}

#[derive(Debug)]
pub enum Mapping {
    Pipeline(PipelineMapping),
    Instrument(InstrumentMapping),
    Reference(ReferenceMapping),
}

impl Mapping {
    pub fn filename(&self) -> &str {
        match self {
            Mapping::Pipeline(m) => &m.filename,
            Mapping::Instrument(m) => &m.filename,
            Mapping::Reference(m) => &m.filename,
        }
    }

    pub fn header(&self) -> &MappingHeader {
        match self {
            Mapping::Pipeline(m) => &m.header,
            Mapping::Instrument(m) => &m.header,
            Mapping::Reference(m) => &m.header,
        }
    }

    /// Basenames of the mappings (not reference files) this node refers to
    /// directly, one level down.
    pub fn child_mapping_names(&self) -> Vec<String> {
        match self {
            Mapping::Pipeline(m) => m.selector.values().cloned().collect(),
            Mapping::Instrument(m) => m.selector.values().map(|(_, rmap)| rmap.clone()).collect(),
            Mapping::Reference(_) => Vec::new(),
        }
    }

    /// Reference-file basenames declared directly in this mapping's own
    /// selector tree; empty except for `Reference`, since a `Pipeline`/
    /// `Instrument` only knows its children's basenames, not their loaded
    /// contents. The full tree closure (what the governing design's §4.3
    /// calls "all terminal basenames visible through the tree") needs the
    /// loaded children too, so it lives on [`crate::cache::Cache`] instead.
    pub fn reference_names(&self) -> Vec<String> {
        match self {
            Mapping::Reference(m) => m.root.reference_names(),
            _ => Vec::new(),
        }
    }

    pub fn required_parameters(&self) -> Vec<String> {
        match self {
            Mapping::Reference(m) => m.root.required_parameters(),
            _ => Vec::new(),
        }
    }
}

/// What a parent mapping expects a child to declare; checked against the
/// child's own header once parsed (§3 invariant: "a child mapping's
/// observatory/instrument/reftype equals its parent's expectation").
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    pub observatory: Option<String>,
    pub instrument: Option<String>,
    pub reftype: Option<String>,
}

pub struct LoadOptions {
    /// Skip checksum verification. Defaults to `false`; exists for fixtures
    /// and for the explicit bypass §4.2 of the governing design allows.
    pub bypass_checksum: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { bypass_checksum: false }
    }
}

/// Parses and structurally validates a single mapping file's text. Does not
/// load any child mapping — that is the cache's job, so that cross-file
/// cycles and the at-most-once-per-basename rule are enforced in one place.
pub fn parse_text(
    basename: &str,
    text: &str,
    expected: &Expectation,
    options: &LoadOptions,
) -> Result<Mapping> {
    let tier = Tier::from_extension(basename)?;
    let parsed = parser::parse_file(basename, text)?;
    let header_map = parser::dict_to_map(basename, &parsed.header)?;

    let observatory = required_str(basename, &header_map, "observatory")?;
    if let Some(want) = &expected.observatory {
        if &observatory != want {
            return Err(CrdsError::MappingError {
                file: basename.to_string(),
                message: format!("observatory '{observatory}' does not match parent's '{want}'"),
            });
        }
    }

    let mapping_kind = required_str(basename, &header_map, "mapping")?;
    if mapping_kind != tier.keyword() {
        return Err(CrdsError::MappingError {
            file: basename.to_string(),
            message: format!(
                "header declares mapping='{mapping_kind}' but extension implies '{}'",
                tier.keyword()
            ),
        });
    }

    let instrument = match tier {
        Tier::Pipeline => None,
        Tier::Instrument | Tier::Reference => Some(required_str(basename, &header_map, "instrument")?),
    };
    if let (Some(inst), Some(want)) = (&instrument, &expected.instrument) {
        if inst != want {
            return Err(CrdsError::MappingError {
                file: basename.to_string(),
                message: format!("instrument '{inst}' does not match parent's '{want}'"),
            });
        }
    }

    let reftype = match tier {
        Tier::Reference => Some(required_str(basename, &header_map, "reftype")?),
        _ => None,
    };
    if let (Some(rt), Some(want)) = (&reftype, &expected.reftype) {
        if rt != want {
            return Err(CrdsError::MappingError {
                file: basename.to_string(),
                message: format!("reftype '{rt}' does not match parent's '{want}'"),
            });
        }
    }

    let parkey_expr = header_map
        .get("parkey")
        .ok_or_else(|| CrdsError::MissingHeaderKeyError { file: basename.to_string(), key: "parkey".to_string() })?;
    let parkey = parser::parse_parkey(basename, parkey_expr)?;

    let sha1sum = required_str(basename, &header_map, "sha1sum")?;
    if !options.bypass_checksum {
        checksum::verify(basename, text, &sha1sum)?;
    }

    let substitutions = parser::parse_substitutions(basename, &header_map)?;

    let header = MappingHeader { observatory, instrument, reftype, parkey, sha1sum, substitutions };

    match tier {
        Tier::Pipeline => {
            let selector = dict_of_strings(basename, &parsed.selector)?;
            Ok(Mapping::Pipeline(PipelineMapping { filename: basename.to_string(), header, selector }))
        }
        Tier::Instrument => {
            let selector = dict_of_string_pairs(basename, &parsed.selector)?;
            Ok(Mapping::Instrument(InstrumentMapping { filename: basename.to_string(), header, selector }))
        }
        Tier::Reference => {
            let root = build_reference_root(basename, &parsed.selector, &header)?;
            Ok(Mapping::Reference(ReferenceMapping { filename: basename.to_string(), header, root }))
        }
    }
}

fn build_reference_root(basename: &str, expr: &Expr, header: &MappingHeader) -> Result<Selector> {
    let node = parser::build_node(basename, expr, &header.parkey, 0, &header.substitutions)?;
    match node {
        Node::Sub(sel) => Ok(*sel),
        Node::Leaf(_) => Err(CrdsError::MappingError {
            file: basename.to_string(),
            message: "reference mapping selector must be a constructor call, not a bare basename".to_string(),
        }),
    }
}

fn required_str(file: &str, map: &HashMap<String, Expr>, key: &str) -> Result<String> {
    let expr = map
        .get(key)
        .ok_or_else(|| CrdsError::MissingHeaderKeyError { file: file.to_string(), key: key.to_string() })?;
    parser::expr_to_string(file, expr)
}

fn dict_of_strings(file: &str, expr: &Expr) -> Result<HashMap<String, String>> {
    let pairs = expr
        .as_dict()
        .ok_or_else(|| CrdsError::MappingError { file: file.to_string(), message: "selector must be a dict".to_string() })?;
    pairs
        .iter()
        .map(|(k, v)| Ok((parser::expr_to_string(file, k)?, parser::expr_to_string(file, v)?)))
        .collect()
}

fn dict_of_string_pairs(file: &str, expr: &Expr) -> Result<HashMap<String, (String, String)>> {
    let pairs = expr
        .as_dict()
        .ok_or_else(|| CrdsError::MappingError { file: file.to_string(), message: "selector must be a dict".to_string() })?;
    pairs
        .iter()
        .map(|(k, v)| {
            let key = parser::expr_to_string(file, k)?;
            let items = v.as_tuple().ok_or_else(|| CrdsError::MappingError {
                file: file.to_string(),
                message: format!("selector['{key}'] must be an (extension, basename) tuple"),
            })?;
            let [ext, rmap] = items else {
                return Err(CrdsError::MappingError {
                    file: file.to_string(),
                    message: format!("selector['{key}'] must have exactly two elements"),
                });
            };
            Ok((key, (parser::expr_to_string(file, ext)?, parser::expr_to_string(file, rmap)?)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn pipeline_text(sha: &str) -> String {
        format!(
            "header = {{'observatory': 'hst', 'mapping': 'pipeline', 'parkey': ('INSTRUME',), 'sha1sum': '{sha}'}}\nselector = {{'ACS': 'hst_acs.imap'}}\n"
        )
    }

    #[test]
    fn parses_a_pipeline_mapping_with_valid_checksum() {
        let unsummed = "header = {'observatory': 'hst', 'mapping': 'pipeline', 'parkey': ('INSTRUME',), 'sha1sum': ''}\nselector = {'ACS': 'hst_acs.imap'}\n";
        let digest = checksum::checksum_text(unsummed);
        let text = pipeline_text(&digest);
        let m = parse_text("hst.pmap", &text, &Expectation::default(), &LoadOptions::default()).unwrap();
        match m {
            Mapping::Pipeline(p) => assert_eq!(p.selector.get("ACS").unwrap(), "hst_acs.imap"),
            _ => panic!("expected a pipeline mapping"),
        }
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let text = pipeline_text("0000000000000000000000000000000000000a");
        let err = parse_text("hst.pmap", &text, &Expectation::default(), &LoadOptions::default()).unwrap_err();
        assert_matches!(err, CrdsError::ChecksumError { .. });
    }

    #[test]
    fn mismatched_tier_keyword_is_a_mapping_error() {
        let text = "header = {'observatory': 'hst', 'mapping': 'instrument', 'parkey': ('INSTRUME',), 'sha1sum': 'x'}\nselector = {}\n";
        let err = parse_text("hst.pmap", text, &Expectation::default(), &LoadOptions { bypass_checksum: true })
            .unwrap_err();
        assert_matches!(err, CrdsError::MappingError { .. });
    }

    #[test]
    fn reference_mapping_builds_its_selector_tree() {
        let text = "header = {'observatory': 'hst', 'mapping': 'reference', 'instrument': 'acs', 'reftype': 'flat', 'parkey': (('DETECTOR',),), 'sha1sum': 'x'}\nselector = Match({'WFC': 'flat_wfc.fits'})\n";
        let m = parse_text("hst_acs_flat.rmap", text, &Expectation::default(), &LoadOptions { bypass_checksum: true })
            .unwrap();
        match m {
            Mapping::Reference(r) => assert_eq!(r.root.reference_names(), vec!["flat_wfc.fits".to_string()]),
            _ => panic!("expected a reference mapping"),
        }
    }
}
