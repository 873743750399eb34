//! Tree matching.
//!
//! A matcher decides which nodes of two revisions correspond to the same
//! logical element. The classic matcher runs in two passes: a top-down fast
//! path that links maximal isomorphic subtrees via structural digests, and a
//! bottom-up pass that pairs the children of partially matched nodes: by
//! weighted LCS where order matters, by Hungarian assignment where it does
//! not. The alternative cost-model matcher scores whole matchings by a
//! weighted cost function and searches with branch and bound.
//!
//! All matchers are deterministic for fixed inputs, weights and numbering:
//! the LCS decision rules, the assignment algorithm and the search order are
//! fully specified, so repeated runs produce identical matchings.

pub mod cost_model;
pub mod matchings;
pub mod ordered;
pub mod topdown;
pub mod unordered;

pub use cost_model::CostModelMatcher;
pub use matchings::{Matching, Matchings};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::artifact::ArtifactRef;
use crate::context::{MatcherKind, MergeContext};
use crate::error::Result;
use crate::tree::GrammarNode;
use topdown::DigestTable;

/// A tree matching algorithm.
pub trait TreeMatcher<T: GrammarNode> {
    /// Builds the matching between two trees. The returned set must be
    /// stored via [`Matchings::store`] to take effect on the artifacts.
    fn match_trees(
        &mut self,
        context: &MergeContext,
        left: &ArtifactRef<T>,
        right: &ArtifactRef<T>,
    ) -> Result<Matchings<T>>;
}

/// Creates the matcher selected by the context.
pub fn for_context<T: GrammarNode>(context: &MergeContext) -> Box<dyn TreeMatcher<T>> {
    match context.matcher {
        MatcherKind::Classic => Box::new(ClassicMatcher::new()),
        MatcherKind::CostModel => Box::new(CostModelMatcher::from_context(context)),
    }
}

/// The two-pass top-down/bottom-up matcher.
#[derive(Debug, Default)]
pub struct ClassicMatcher;

impl ClassicMatcher {
    /// Creates a new matcher.
    pub fn new() -> Self {
        ClassicMatcher
    }
}

impl<T: GrammarNode> TreeMatcher<T> for ClassicMatcher {
    fn match_trees(
        &mut self,
        context: &MergeContext,
        left: &ArtifactRef<T>,
        right: &ArtifactRef<T>,
    ) -> Result<Matchings<T>> {
        let mut run = MatchRun {
            context,
            left_digests: DigestTable::compute(left),
            right_digests: DigestTable::compute(right),
            memo: FxHashMap::default(),
        };
        let matchings = run.match_pair(left, right, context.look_ahead)?;
        trace!(
            links = matchings.len(),
            score = matchings.total_score(),
            "matching complete"
        );
        Ok(matchings)
    }
}

/// Per-invocation matcher state: digest tables for both trees plus the pair
/// memo that keeps the bottom-up pass quadratic.
struct MatchRun<'a, T: GrammarNode> {
    context: &'a MergeContext,
    left_digests: DigestTable,
    right_digests: DigestTable,
    memo: FxHashMap<(u64, u64, u32), Matchings<T>>,
}

impl<T: GrammarNode> MatchRun<'_, T> {
    fn match_pair(
        &mut self,
        left: &ArtifactRef<T>,
        right: &ArtifactRef<T>,
        look_ahead: u32,
    ) -> Result<Matchings<T>> {
        self.context.check_cancelled()?;

        let key = (
            left.borrow().number(),
            right.borrow().number(),
            look_ahead,
        );
        if let Some(cached) = self.memo.get(&key) {
            return Ok(cached.clone());
        }

        let result = self.match_pair_uncached(left, right, look_ahead)?;
        self.memo.insert(key, result.clone());
        Ok(result)
    }

    fn match_pair_uncached(
        &mut self,
        left: &ArtifactRef<T>,
        right: &ArtifactRef<T>,
        look_ahead: u32,
    ) -> Result<Matchings<T>> {
        // Top-down fast path: isomorphic subtrees are linked wholesale.
        let left_digest = self.left_digests.get(left.borrow().number());
        let right_digest = self.right_digests.get(right.borrow().number());
        if left_digest.is_some() && left_digest == right_digest {
            let mut matchings = Matchings::new();
            topdown::link_isomorphic(left, right, &mut matchings);
            return Ok(matchings);
        }

        let matches_here = {
            let l = left.borrow();
            let r = right.borrow();
            l.matches_node(&r)
        };

        if !matches_here && look_ahead == 0 {
            return Ok(Matchings::new());
        }

        // A mismatch consumes look-ahead depth; a match restores it.
        let child_look_ahead = if matches_here {
            self.context.look_ahead
        } else {
            look_ahead - 1
        };

        let left_children: Vec<ArtifactRef<T>> = left.borrow().children().to_vec();
        let right_children: Vec<ArtifactRef<T>> = right.borrow().children().to_vec();

        // Bottom-up: score all child pairs, then select a pairing.
        let mut pair_results: Vec<Vec<Matchings<T>>> =
            Vec::with_capacity(left_children.len());
        for lc in &left_children {
            let mut row = Vec::with_capacity(right_children.len());
            for rc in &right_children {
                row.push(self.match_pair(lc, rc, child_look_ahead)?);
            }
            pair_results.push(row);
        }

        let weight = |i: usize, j: usize| pair_results[i][j].total_score();
        let chosen = if left.borrow().is_ordered() {
            ordered::lcs_pairs(left_children.len(), right_children.len(), weight)
        } else {
            unordered::assignment_pairs(left_children.len(), right_children.len(), weight)
        };

        let mut matchings = Matchings::new();
        let mut child_score = 0;
        for (i, j) in chosen {
            let pair = std::mem::take(&mut pair_results[i][j]);
            child_score += pair.total_score();
            matchings.extend(pair);
        }

        if matches_here {
            matchings.add(Matching::new(left, right, child_score + 1));
        }

        Ok(matchings)
    }
}
