//! The process-wide mapping cache (§5 of the governing design).
//!
//! Generalizes the `Executor`/`Promise` work-queue idiom: instead
//! of one `Mutex<BinaryHeap<Job>>` shared by a thread pool, there is one
//! `Mutex<HashMap<basename, Entry>>` shared by however many threads call
//! `load`. A `Condvar` plays the same role `Executor`'s `work_cv` does —
//! parking a thread until the state it's waiting on changes — except here
//! threads wait for "someone else's load of this basename to finish"
//! rather than for "new work to dispatch".

use crate::collaborators::Locate;
use crate::error::{CrdsError, Result, SourcePos};
use crate::mapping::{self, Expectation, LoadOptions, Mapping};
use lazy_static::lazy_static;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex};

enum Entry {
    Loading,
    Ready(Arc<Mapping>),
}

enum Claim {
    Ready(Arc<Mapping>),
    WeAreLoader,
}

pub struct Cache {
    state: Mutex<HashMap<String, Entry>>,
    cv: Condvar,
}

impl Default for Cache {
    fn default() -> Self {
        Cache { state: Mutex::new(HashMap::new()), cv: Condvar::new() }
    }
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    /// Loads `basename` and its full closure of children, publishing each
    /// one atomically: a reader never observes a `Ready` entry whose
    /// children are not themselves fully loaded.
    pub fn load(&self, basename: &str, locate: &dyn Locate, options: &LoadOptions) -> Result<Arc<Mapping>> {
        self.load_inner(basename, &Expectation::default(), locate, options, &mut Vec::new())
    }

    pub fn get(&self, basename: &str) -> Option<Arc<Mapping>> {
        match self.state.lock().unwrap().get(basename) {
            Some(Entry::Ready(m)) => Some(m.clone()),
            _ => None,
        }
    }

    /// Every mapping basename in the closure rooted at `root` that is
    /// currently loaded in this cache, `root` included. Mirrors the
    /// original rmap module's `mapping_names()` query.
    pub fn mapping_names(&self, root: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.walk_mapping_names(root, &mut seen);
        seen.into_iter().collect()
    }

    fn walk_mapping_names(&self, basename: &str, seen: &mut BTreeSet<String>) {
        if !seen.insert(basename.to_string()) {
            return;
        }
        if let Some(m) = self.get(basename) {
            for child in m.child_mapping_names() {
                self.walk_mapping_names(&child, seen);
            }
        }
    }

    /// Every reference-file basename visible through the closure rooted at
    /// `root`: `root`'s own reference names (if it's a `Reference` mapping)
    /// plus every reference name reachable through its loaded children.
    /// Mirrors the original rmap module's `reference_names()` query, which
    /// is called on pipeline and instrument contexts as well as reference
    /// mappings.
    pub fn reference_names(&self, root: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = BTreeSet::new();
        self.walk_reference_names(root, &mut seen, &mut out);
        out.into_iter().collect()
    }

    fn walk_reference_names(&self, basename: &str, seen: &mut BTreeSet<String>, out: &mut BTreeSet<String>) {
        if !seen.insert(basename.to_string()) {
            return;
        }
        let Some(m) = self.get(basename) else { return };
        out.extend(m.reference_names());
        for child in m.child_mapping_names() {
            self.walk_reference_names(&child, seen, out);
        }
    }

    /// Reference names grouped by the key one level below `root`:
    /// instrument name for a pipeline, reftype for an instrument. Empty for
    /// a reference mapping, which has no further level to group by. Mirrors
    /// the original rmap module's `reference_name_map()` query.
    pub fn reference_name_map(&self, root: &str) -> HashMap<String, Vec<String>> {
        let mut out = HashMap::new();
        let Some(m) = self.get(root) else { return out };
        match &*m {
            Mapping::Pipeline(p) => {
                for (instrument, imap) in &p.selector {
                    out.insert(instrument.clone(), self.reference_names(imap));
                }
            }
            Mapping::Instrument(i) => {
                for (reftype, (_ext, rmap)) in &i.selector {
                    out.insert(reftype.clone(), self.reference_names(rmap));
                }
            }
            Mapping::Reference(_) => {}
        }
        out
    }

    /// Mapping basenames declared somewhere in the closure rooted at `root`
    /// that this cache has no loaded entry for — a child mapping that
    /// failed to load, or was never requested. Mirrors the original rmap
    /// module's `missing_mappings()` query; an up-to-date, self-consistent
    /// pipeline returns an empty list.
    pub fn missing_mappings(&self, root: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut missing = BTreeSet::new();
        self.walk_missing_mappings(root, &mut seen, &mut missing);
        missing.into_iter().collect()
    }

    fn walk_missing_mappings(&self, basename: &str, seen: &mut BTreeSet<String>, missing: &mut BTreeSet<String>) {
        if !seen.insert(basename.to_string()) {
            return;
        }
        let Some(m) = self.get(basename) else { return };
        for child in m.child_mapping_names() {
            if self.get(&child).is_none() {
                missing.insert(child.clone());
            }
            self.walk_missing_mappings(&child, seen, missing);
        }
    }

    /// Reference basenames declared somewhere in the closure rooted at
    /// `root` that `locate` cannot find a file for on disk. Mirrors the
    /// original rmap module's `missing_references()` query.
    pub fn missing_references(&self, root: &str, locate: &dyn Locate) -> Vec<String> {
        self.reference_names(root)
            .into_iter()
            .filter(|basename| match locate.locate(basename) {
                Ok(path) => !path.exists(),
                Err(_) => true,
            })
            .collect()
    }

    fn load_inner(
        &self,
        basename: &str,
        expected: &Expectation,
        locate: &dyn Locate,
        options: &LoadOptions,
        ancestors: &mut Vec<String>,
    ) -> Result<Arc<Mapping>> {
        if ancestors.iter().any(|a| a == basename) {
            return Err(CrdsError::FormatError {
                file: basename.to_string(),
                pos: SourcePos { line: 0, column: 0 },
                message: format!("cyclic mapping reference back to '{basename}'"),
            });
        }

        match self.claim(basename) {
            Claim::Ready(m) => Ok(m),
            Claim::WeAreLoader => {
                debug!("loading mapping {basename}");
                ancestors.push(basename.to_string());
                let result = self.load_uncached(basename, expected, locate, options, ancestors);
                ancestors.pop();

                let mut guard = self.state.lock().unwrap();
                match &result {
                    Ok(m) => {
                        guard.insert(basename.to_string(), Entry::Ready(m.clone()));
                    }
                    Err(e) => {
                        warn!("failed to load {basename}: {e}");
                        guard.remove(basename);
                    }
                }
                drop(guard);
                self.cv.notify_all();
                result
            }
        }
    }

    /// Blocks until this thread either observes a published entry or wins
    /// the right to load it itself.
    fn claim(&self, basename: &str) -> Claim {
        let mut guard = self.state.lock().unwrap();
        loop {
            match guard.get(basename) {
                Some(Entry::Ready(m)) => return Claim::Ready(m.clone()),
                Some(Entry::Loading) => {
                    guard = self.cv.wait(guard).unwrap();
                }
                None => {
                    guard.insert(basename.to_string(), Entry::Loading);
                    return Claim::WeAreLoader;
                }
            }
        }
    }

    fn load_uncached(
        &self,
        basename: &str,
        expected: &Expectation,
        locate: &dyn Locate,
        options: &LoadOptions,
        ancestors: &mut Vec<String>,
    ) -> Result<Arc<Mapping>> {
        let path = locate.locate(basename)?;
        let text = std::fs::read_to_string(&path).map_err(|e| CrdsError::MappingError {
            file: basename.to_string(),
            message: format!("could not read '{}': {e}", path.display()),
        })?;
        let parsed = mapping::parse_text(basename, &text, expected, options)?;

        match &parsed {
            Mapping::Pipeline(p) => {
                for (instrument, imap) in &p.selector {
                    let child_expected = Expectation {
                        observatory: Some(p.header.observatory.clone()),
                        instrument: Some(instrument.clone()),
                        reftype: None,
                    };
                    self.load_inner(imap, &child_expected, locate, options, ancestors)?;
                }
            }
            Mapping::Instrument(i) => {
                for (reftype, (_ext, rmap)) in &i.selector {
                    let child_expected = Expectation {
                        observatory: Some(i.header.observatory.clone()),
                        instrument: i.header.instrument.clone(),
                        reftype: Some(reftype.clone()),
                    };
                    self.load_inner(rmap, &child_expected, locate, options, ancestors)?;
                }
            }
            Mapping::Reference(_) => {}
        }

        Ok(Arc::new(parsed))
    }
}

lazy_static! {
    static ref GLOBAL: Cache = Cache::new();
}

/// The shared, lazily-initialized process-wide cache (§5: "initialized
/// lazily on first query; torn down at process exit").
pub fn global() -> &'static Cache {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::collections::HashMap as StdHashMap;
    use std::path::PathBuf;

    struct InMemoryLocate {
        files: RefCell<StdHashMap<String, String>>,
    }

    impl Locate for InMemoryLocate {
        fn locate(&self, basename: &str) -> Result<PathBuf> {
            if self.files.borrow().contains_key(basename) {
                Ok(PathBuf::from(basename))
            } else {
                Err(CrdsError::MappingError { file: basename.to_string(), message: "not found".to_string() })
            }
        }
    }

    fn summed(text_without_sum: &str) -> String {
        checksum::checksum_text(text_without_sum)
    }

    #[test]
    fn a_published_entry_is_returned_by_reference_not_reparsed() {
        let rmap_unsummed = "header = {'observatory': 'hst', 'mapping': 'reference', 'instrument': 'acs', 'reftype': 'flat', 'parkey': (('DETECTOR',),), 'sha1sum': ''}\nselector = Match({'WFC': 'flat_wfc.fits'})\n";
        let rmap_digest = summed(rmap_unsummed);
        let rmap_text = rmap_unsummed.replacen("'sha1sum': ''", &format!("'sha1sum': '{rmap_digest}'"), 1);

        let cache = Cache::new();
        let m1 = mapping::parse_text(
            "hst_acs_flat.rmap",
            &rmap_text,
            &Expectation::default(),
            &LoadOptions::default(),
        )
        .unwrap();
        let arc1 = Arc::new(m1);
        cache.state.lock().unwrap().insert("hst_acs_flat.rmap".to_string(), Entry::Ready(arc1.clone()));
        let arc2 = cache.get("hst_acs_flat.rmap").unwrap();
        assert!(Arc::ptr_eq(&arc1, &arc2));
    }

    #[test]
    fn self_referencing_ancestor_chain_is_rejected() {
        let cache = Cache::new();
        let mut ancestors = vec!["a.pmap".to_string()];
        let locate = InMemoryLocate { files: RefCell::new(StdHashMap::new()) };
        let err = cache
            .load_inner("a.pmap", &Expectation::default(), &locate, &LoadOptions::default(), &mut ancestors)
            .unwrap_err();
        assert_matches!(err, CrdsError::FormatError { .. });
    }

    #[test]
    fn closure_queries_walk_the_full_loaded_tree() {
        let cache = Cache::new();

        let rmap_text = "header = {'observatory': 'hst', 'mapping': 'reference', 'instrument': 'acs', 'reftype': 'flat', 'parkey': (('DETECTOR',),), 'sha1sum': ''}\nselector = Match({'WFC': 'flat_wfc.fits'})\n";
        let digest = summed(rmap_text);
        let signed = rmap_text.replacen("'sha1sum': ''", &format!("'sha1sum': '{digest}'"), 1);
        let rmap =
            mapping::parse_text("hst_acs_flat.rmap", &signed, &Expectation::default(), &LoadOptions::default())
                .unwrap();

        let header = |instrument: Option<&str>| mapping::MappingHeader {
            observatory: "hst".to_string(),
            instrument: instrument.map(|s| s.to_string()),
            reftype: None,
            parkey: Vec::new(),
            sha1sum: String::new(),
            substitutions: StdHashMap::new(),
        };

        let mut imap_selector = StdHashMap::new();
        imap_selector.insert("flat".to_string(), ("fits".to_string(), "hst_acs_flat.rmap".to_string()));
        let imap = Mapping::Instrument(mapping::InstrumentMapping {
            filename: "hst_acs.imap".to_string(),
            header: header(Some("acs")),
            selector: imap_selector,
        });

        let mut pmap_selector = StdHashMap::new();
        pmap_selector.insert("ACS".to_string(), "hst_acs.imap".to_string());
        let pmap = Mapping::Pipeline(mapping::PipelineMapping {
            filename: "hst.pmap".to_string(),
            header: header(None),
            selector: pmap_selector,
        });

        {
            let mut guard = cache.state.lock().unwrap();
            guard.insert("hst.pmap".to_string(), Entry::Ready(Arc::new(pmap)));
            guard.insert("hst_acs.imap".to_string(), Entry::Ready(Arc::new(imap)));
            guard.insert("hst_acs_flat.rmap".to_string(), Entry::Ready(Arc::new(rmap)));
        }

        assert_eq!(
            cache.mapping_names("hst.pmap"),
            vec!["hst.pmap".to_string(), "hst_acs.imap".to_string(), "hst_acs_flat.rmap".to_string()]
        );
        assert_eq!(cache.reference_names("hst.pmap"), vec!["flat_wfc.fits".to_string()]);
        assert_eq!(
            cache.reference_name_map("hst_acs.imap").get("flat").unwrap(),
            &vec!["flat_wfc.fits".to_string()]
        );
        assert!(cache.missing_mappings("hst.pmap").is_empty());

        let locate = InMemoryLocate { files: RefCell::new(StdHashMap::new()) };
        assert_eq!(cache.missing_references("hst.pmap", &locate), vec!["flat_wfc.fits".to_string()]);
    }

    #[test]
    fn missing_mappings_reports_an_unloaded_child() {
        let cache = Cache::new();
        let mut pmap_selector = StdHashMap::new();
        pmap_selector.insert("ACS".to_string(), "hst_acs.imap".to_string());
        let pmap = Mapping::Pipeline(mapping::PipelineMapping {
            filename: "hst.pmap".to_string(),
            header: mapping::MappingHeader {
                observatory: "hst".to_string(),
                instrument: None,
                reftype: None,
                parkey: Vec::new(),
                sha1sum: String::new(),
                substitutions: StdHashMap::new(),
            },
            selector: pmap_selector,
        });
        cache.state.lock().unwrap().insert("hst.pmap".to_string(), Entry::Ready(Arc::new(pmap)));

        assert_eq!(cache.missing_mappings("hst.pmap"), vec!["hst_acs.imap".to_string()]);
    }
}
