//! Traits standing in for the external collaborators the governing design
//! places out of scope: filesystem layout, FITS header extraction, and TPN
//! certification data. A caller supplies concrete implementations; the
//! core engine only ever depends on these trait objects.

use crate::mapping::Tier;
use crate::value::Header;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Resolves a mapping or reference basename to a readable path.
pub trait Locate {
    fn locate(&self, basename: &str) -> crate::error::Result<PathBuf>;
}

/// Extracts a query header from an observation dataset identifier. Kept
/// separate from `Locate` because in the source system this crosses into
/// FITS-specific code this crate does not own.
pub trait ExtractHeader {
    fn extract_header(&self, dataset: &str) -> crate::error::Result<Header>;
}

/// Certified valid values for a parameter, as loaded from a "TPN" table.
/// Returns `None` for parameters the certification data doesn't know about
/// (§4.8: unknown parameters are warned once and skipped, not rejected).
pub trait ValidValues {
    fn valid_values(&self, instrument: &str, reftype: &str, parameter: &str) -> Option<HashSet<String>>;
}

/// An in-memory stand-in used by tests: every dataset produces a header
/// built from a fixed table, nothing is certified, and paths are taken to
/// be the basename itself relative to the caller's own root.
#[derive(Debug, Clone, Default)]
pub struct NullCollaborators;

impl Locate for NullCollaborators {
    fn locate(&self, basename: &str) -> crate::error::Result<PathBuf> {
        Ok(PathBuf::from(basename))
    }
}

impl ValidValues for NullCollaborators {
    fn valid_values(&self, _instrument: &str, _reftype: &str, _parameter: &str) -> Option<HashSet<String>> {
        None
    }
}

/// Resolves basenames under two filesystem roots, one for mapping files and
/// one for reference files, each overridable by an environment variable
/// (§6: `CRDS_MAPPATH`, `CRDS_REFPATH`). A mapping basename (`.pmap`/`.imap`/
/// `.rmap`) follows the `<obs>_<inst>_<ref>.<ext>` convention and lives
/// under `<mappath>/<observatory>/<basename>`; a reference basename has no
/// such convention (it's whatever the instrument team named the file), so
/// it resolves flat under `<refpath>/<basename>`.
pub struct FsLocate {
    mappath: PathBuf,
    refpath: PathBuf,
}

impl FsLocate {
    pub fn from_env() -> Self {
        FsLocate {
            mappath: std::env::var("CRDS_MAPPATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./mappings")),
            refpath: std::env::var("CRDS_REFPATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./references")),
        }
    }

    pub fn new(mappath: PathBuf, refpath: PathBuf) -> Self {
        FsLocate { mappath, refpath }
    }

    fn observatory_of(basename: &str) -> &str {
        let stem = Path::new(basename).file_stem().and_then(|s| s.to_str()).unwrap_or(basename);
        stem.split('_').next().unwrap_or(stem)
    }
}

impl Locate for FsLocate {
    fn locate(&self, basename: &str) -> crate::error::Result<PathBuf> {
        match Tier::from_extension(basename) {
            Ok(_) => Ok(self.mappath.join(Self::observatory_of(basename)).join(basename)),
            Err(_) => Ok(self.refpath.join(basename)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_basenames_resolve_under_mappath_by_observatory() {
        let locate = FsLocate::new(PathBuf::from("/maps"), PathBuf::from("/refs"));
        let path = locate.locate("hst_acs_flat.rmap").unwrap();
        assert_eq!(path, PathBuf::from("/maps/hst/hst_acs_flat.rmap"));
    }

    #[test]
    fn reference_basenames_resolve_flat_under_refpath() {
        let locate = FsLocate::new(PathBuf::from("/maps"), PathBuf::from("/refs"));
        let path = locate.locate("flat_wfc.fits").unwrap();
        assert_eq!(path, PathBuf::from("/refs/flat_wfc.fits"));
    }
}
