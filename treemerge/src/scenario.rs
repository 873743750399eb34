//! Merge scenarios.
//!
//! A scenario groups the input artifacts of one (sub)merge: the two derived
//! revisions and, for three-way merges, their common ancestor. Scenarios are
//! created at the file level by the strategy layer and then again for every
//! matched pair the merge engines recurse into.

use std::fmt;

use crate::artifact::ArtifactRef;
use crate::tree::GrammarNode;

/// The type of a merge scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeType {
    /// Two revisions, no common ancestor.
    TwoWay,
    /// Two revisions with a common ancestor.
    ThreeWay,
}

impl fmt::Display for MergeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeType::TwoWay => f.write_str("two-way"),
            MergeType::ThreeWay => f.write_str("three-way"),
        }
    }
}

/// A left/base/right triple to be merged.
#[derive(Clone)]
pub struct MergeScenario<T: GrammarNode> {
    mtype: MergeType,
    left: ArtifactRef<T>,
    base: Option<ArtifactRef<T>>,
    right: ArtifactRef<T>,
}

impl<T: GrammarNode> MergeScenario<T> {
    /// Creates a three-way scenario.
    pub fn three_way(left: ArtifactRef<T>, base: ArtifactRef<T>, right: ArtifactRef<T>) -> Self {
        MergeScenario {
            mtype: MergeType::ThreeWay,
            left,
            base: Some(base),
            right,
        }
    }

    /// Creates a two-way scenario without a base.
    pub fn two_way(left: ArtifactRef<T>, right: ArtifactRef<T>) -> Self {
        MergeScenario {
            mtype: MergeType::TwoWay,
            left,
            base: None,
            right,
        }
    }

    /// Returns the scenario type.
    pub fn merge_type(&self) -> MergeType {
        self.mtype
    }

    /// Returns the left artifact.
    pub fn left(&self) -> &ArtifactRef<T> {
        &self.left
    }

    /// Returns the base artifact, if this is a three-way scenario.
    pub fn base(&self) -> Option<&ArtifactRef<T>> {
        self.base.as_ref()
    }

    /// Returns the right artifact.
    pub fn right(&self) -> &ArtifactRef<T> {
        &self.right
    }
}

impl<T: GrammarNode> fmt::Debug for MergeScenario<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MergeScenario({}, {}:{}",
            self.mtype,
            self.left.borrow().revision(),
            self.left.borrow().number()
        )?;
        if let Some(base) = &self.base {
            write!(f, ", {}:{}", base.borrow().revision(), base.borrow().number())?;
        }
        write!(
            f,
            ", {}:{})",
            self.right.borrow().revision(),
            self.right.borrow().number()
        )
    }
}
