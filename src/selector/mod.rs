//! The six selector variants and the heterogeneous tree they form.
//!
//! The source models this with inheritance (`Selector` base class, one
//! subclass per kind); here it's a tagged variant, with recursion through
//! the tree expressed as a single polymorphic `choose`.

mod closest_ratio;
mod closest_time;
mod linterp;
mod match_sel;
mod use_after;
mod version_dep;

pub use closest_ratio::ClosestGeometricRatio;
pub use closest_time::ClosestTime;
pub use linterp::LinearInterpolation;
pub use match_sel::{CaseToken, MatchCase, MatchSelector, Parameter};
pub use use_after::UseAfter;
pub use version_dep::VersionDep;

use crate::error::Result;
use crate::value::Header;

/// What a successful `choose()` resolves to: a single reference-file
/// basename, except for `LinearInterpolation`, which resolves to the
/// bracketing pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    One(String),
    Pair(String, String),
}

impl Resolved {
    pub fn into_one(self) -> Option<String> {
        match self {
            Resolved::One(s) => Some(s),
            Resolved::Pair(..) => None,
        }
    }
}

/// A child of a selector case: either a nested selector or a terminal
/// reference-file basename.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Sub(Box<Selector>),
    Leaf(String),
}

impl Node {
    fn choose(&self, header: &Header) -> Result<Resolved> {
        match self {
            Node::Sub(sel) => sel.choose(header),
            Node::Leaf(basename) => Ok(Resolved::One(basename.clone())),
        }
    }

    fn reference_names(&self, out: &mut Vec<String>) {
        match self {
            Node::Sub(sel) => sel.reference_names(out),
            Node::Leaf(basename) => out.push(basename.clone()),
        }
    }

    fn required_parameters(&self, out: &mut Vec<String>) {
        if let Node::Sub(sel) = self {
            sel.required_parameters(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Match(MatchSelector),
    UseAfter(UseAfter),
    ClosestTime(ClosestTime),
    ClosestGeometricRatio(ClosestGeometricRatio),
    LinearInterpolation(LinearInterpolation),
    VersionDep(VersionDep),
}

impl Selector {
    pub fn choose(&self, header: &Header) -> Result<Resolved> {
        match self {
            Selector::Match(s) => s.choose(header),
            Selector::UseAfter(s) => s.choose(header),
            Selector::ClosestTime(s) => s.choose(header),
            Selector::ClosestGeometricRatio(s) => s.choose(header),
            Selector::LinearInterpolation(s) => s.choose(header),
            Selector::VersionDep(s) => s.choose(header),
        }
    }

    /// All terminal basenames reachable through this subtree.
    pub fn reference_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_reference_names(&mut out);
        out
    }

    fn collect_reference_names(&self, out: &mut Vec<String>) {
        match self {
            Selector::Match(s) => s.collect_reference_names(out),
            Selector::UseAfter(s) => s.collect_reference_names(out),
            Selector::ClosestTime(s) => s.collect_reference_names(out),
            Selector::ClosestGeometricRatio(s) => s.collect_reference_names(out),
            Selector::LinearInterpolation(s) => s.collect_reference_names(out),
            Selector::VersionDep(s) => s.collect_reference_names(out),
        }
    }

    /// All header parameter names this subtree's nesting levels consume.
    pub fn required_parameters(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_required_parameters(&mut out);
        out
    }

    fn collect_required_parameters(&self, out: &mut Vec<String>) {
        match self {
            Selector::Match(s) => s.collect_required_parameters(out),
            Selector::UseAfter(s) => s.collect_required_parameters(out),
            Selector::ClosestTime(s) => s.collect_required_parameters(out),
            Selector::ClosestGeometricRatio(s) => s.collect_required_parameters(out),
            Selector::LinearInterpolation(s) => s.collect_required_parameters(out),
            Selector::VersionDep(s) => s.collect_required_parameters(out),
        }
    }
}
