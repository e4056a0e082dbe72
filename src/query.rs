//! The query front door (§4.9 of the governing design):
//! `best_references(ctx, header)` resolves a pipeline mapping down to one
//! reference-file basename per reftype, catching per-reftype failures
//! rather than aborting the whole batch.

use crate::cache::Cache;
use crate::collaborators::Locate;
use crate::error::{CrdsError, Result};
use crate::mapping::{LoadOptions, Mapping};
use crate::selector::Resolved;
use crate::value::Header;
use std::collections::HashMap;

pub fn best_references(
    ctx_basename: &str,
    header: &Header,
    cache: &Cache,
    locate: &dyn Locate,
    options: &LoadOptions,
) -> Result<HashMap<String, String>> {
    let pipeline = cache.load(ctx_basename, locate, options)?;
    let Mapping::Pipeline(pipeline) = pipeline.as_ref() else {
        return Err(CrdsError::MappingError {
            file: ctx_basename.to_string(),
            message: "context basename does not load as a pipeline mapping".to_string(),
        });
    };

    let instrument_value = header.get_or_not_present("INSTRUME");
    let imap_basename = pipeline
        .selector
        .iter()
        .find(|(inst, _)| inst.eq_ignore_ascii_case(&instrument_value))
        .map(|(_, imap)| imap.clone())
        .ok_or_else(|| CrdsError::MappingError {
            file: ctx_basename.to_string(),
            message: format!("no instrument mapping for INSTRUME='{instrument_value}'"),
        })?;

    let instrument_mapping = cache.get(&imap_basename).ok_or_else(|| CrdsError::MappingError {
        file: imap_basename.clone(),
        message: "instrument mapping was not found in the cache after load".to_string(),
    })?;
    let Mapping::Instrument(instrument_mapping) = instrument_mapping.as_ref() else {
        return Err(CrdsError::MappingError {
            file: imap_basename,
            message: "expected an instrument mapping".to_string(),
        });
    };

    let mut results = HashMap::with_capacity(instrument_mapping.selector.len());
    for (reftype, (_ext, rmap_basename)) in &instrument_mapping.selector {
        let outcome = resolve_one(rmap_basename, header, cache, locate, options);
        let value = match outcome {
            Ok(s) => s,
            Err(e) => format!("NOT FOUND {e}"),
        };
        results.insert(reftype.clone(), value);
    }
    Ok(results)
}

fn resolve_one(
    rmap_basename: &str,
    header: &Header,
    cache: &Cache,
    locate: &dyn Locate,
    options: &LoadOptions,
) -> Result<String> {
    let mapping = cache.get(rmap_basename).ok_or_else(|| CrdsError::MappingError {
        file: rmap_basename.to_string(),
        message: "reference mapping was not found in the cache after load".to_string(),
    })?;
    let Mapping::Reference(reference) = mapping.as_ref() else {
        return Err(CrdsError::MappingError {
            file: rmap_basename.to_string(),
            message: "expected a reference mapping".to_string(),
        });
    };
    match reference.root.choose(header)? {
        Resolved::One(s) => Ok(s),
        Resolved::Pair(a, b) => Ok(format!("{a},{b}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use crate::collaborators::NullCollaborators;
    use std::collections::HashMap as StdMap;
    use std::path::PathBuf;

    struct MapLocate(StdMap<String, PathBuf>);
    impl Locate for MapLocate {
        fn locate(&self, basename: &str) -> Result<PathBuf> {
            self.0
                .get(basename)
                .cloned()
                .ok_or_else(|| CrdsError::MappingError { file: basename.to_string(), message: "not found".to_string() })
        }
    }

    fn write_with_checksum(path: &str, unsummed: &str) {
        let digest = checksum::checksum_text(unsummed);
        let text = unsummed.replacen("'sha1sum': ''", &format!("'sha1sum': '{digest}'"), 1);
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn resolves_one_reftype_per_instrument_and_reports_not_found_for_failures() {
        let dir = std::env::temp_dir().join(format!("crds_select_test_{:x}", 0xABCDu32));
        std::fs::create_dir_all(&dir).unwrap();

        let pmap = dir.join("hst.pmap");
        write_with_checksum(
            pmap.to_str().unwrap(),
            "header = {'observatory': 'hst', 'mapping': 'pipeline', 'parkey': ('INSTRUME',), 'sha1sum': ''}\nselector = {'ACS': 'hst_acs.imap'}\n",
        );
        let imap = dir.join("hst_acs.imap");
        write_with_checksum(
            imap.to_str().unwrap(),
            "header = {'observatory': 'hst', 'mapping': 'instrument', 'instrument': 'acs', 'parkey': ('INSTRUME',), 'sha1sum': ''}\nselector = {'flat': ('fits', 'hst_acs_flat.rmap')}\n",
        );
        let rmap = dir.join("hst_acs_flat.rmap");
        write_with_checksum(
            rmap.to_str().unwrap(),
            "header = {'observatory': 'hst', 'mapping': 'reference', 'instrument': 'acs', 'reftype': 'flat', 'parkey': (('DETECTOR',),), 'sha1sum': ''}\nselector = Match({'WFC': 'flat_wfc.fits'})\n",
        );

        let mut files = StdMap::new();
        files.insert("hst.pmap".to_string(), pmap.clone());
        files.insert("hst_acs.imap".to_string(), imap.clone());
        files.insert("hst_acs_flat.rmap".to_string(), rmap.clone());
        let locate = MapLocate(files);

        let cache = Cache::new();
        let mut header = Header::new();
        header.insert("INSTRUME", "ACS");
        header.insert("DETECTOR", "WFC");

        let result = best_references("hst.pmap", &header, &cache, &locate, &LoadOptions::default()).unwrap();
        assert_eq!(result.get("flat").unwrap(), "flat_wfc.fits");

        let mut missing_header = Header::new();
        missing_header.insert("INSTRUME", "ACS");
        missing_header.insert("DETECTOR", "SBC");
        let result2 =
            best_references("hst.pmap", &missing_header, &cache, &locate, &LoadOptions::default()).unwrap();
        assert!(result2.get("flat").unwrap().starts_with("NOT FOUND"));

        let _ = NullCollaborators;
        std::fs::remove_dir_all(&dir).ok();
    }
}
