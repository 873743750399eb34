//! treemerge - Structure-Aware Three-Way Merge
//!
//! This library merges two derived revisions of a source file against their
//! common ancestor by working on the syntax tree instead of text lines.
//! Where both sides changed the same element incompatibly, the output
//! carries textual conflict markers; everywhere else the changes combine.
//!
//! # Overview
//!
//! A merge runs in three stages:
//!
//! 1. The three revisions are parsed and wrapped into [`Artifact`] trees
//!    carrying revision labels, stable numbering and match links.
//! 2. A matcher links corresponding nodes across the revisions: the classic
//!    top-down/bottom-up matcher, or the branch-and-bound cost-model
//!    matcher.
//! 3. The merge engines walk the matched trees and emit add, delete, merge
//!    and conflict operations against a target tree, which is then printed.
//!
//! The engine is generic over the concrete grammar through the
//! [`GrammarNode`] trait; the bundled [`lang`] module provides a Java-like
//! demo grammar used by the CLI and the test suite. Line-based merging is
//! available as its own strategy and doubles as the fallback for opaque
//! method bodies in semistructured mode.
//!
//! [`Artifact`]: artifact::Artifact
//! [`GrammarNode`]: tree::GrammarNode

pub mod artifact;
pub mod context;
pub mod error;
pub mod lang;
pub mod matcher;
pub mod merge;
pub mod operations;
pub mod revision;
pub mod scenario;
pub mod strategy;
pub mod tree;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactRef, Status, Variant};
pub use context::{CancelToken, MatcherKind, MergeContext, StrategyKind};
pub use error::{Error, Result};
pub use matcher::{ClassicMatcher, CostModelMatcher, Matching, Matchings, TreeMatcher};
pub use operations::Operation;
pub use revision::Revision;
pub use scenario::{MergeScenario, MergeType};
pub use strategy::{merge_files, MergeOutcome};
pub use tree::GrammarNode;
