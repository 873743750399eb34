//! Cost-model matching.
//!
//! Instead of growing a matching structurally, this matcher scores whole
//! candidate matchings with a weighted cost function and searches for the
//! cheapest one. A matching is a set of records, each pairing a node with
//! its image in the other tree or with nothing (a no-match). The cost of a
//! record combines three penalties:
//!
//! - renaming: the pair exists but the nodes do not match structurally,
//! - ancestry violations: children whose images escape the partner node,
//! - sibling-group breakups: siblings scattered across several families.
//!
//! For partial matchings the matcher derives lower and upper cost bounds
//! from indicator predicates over the records seen so far; the search prunes
//! a branch as soon as its lower bound exceeds the best complete cost. The
//! indicator polarity is load-bearing: the lower variants quantify over all
//! records, the upper variants ask for a witness, and flipping one silently
//! reverses pruning.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use super::{Matching, Matchings, TreeMatcher};
use crate::artifact::ArtifactRef;
use crate::context::MergeContext;
use crate::error::Result;
use crate::revision::Revision;
use crate::tree::GrammarNode;

/// One record of a candidate matching: a node and its image, or a no-match.
#[derive(Debug)]
pub struct CostRecord<T: GrammarNode> {
    /// The recorded node.
    pub node: ArtifactRef<T>,
    /// Its image in the other tree, or `None` for a no-match.
    pub image: Option<ArtifactRef<T>>,
}

impl<T: GrammarNode> Clone for CostRecord<T> {
    fn clone(&self) -> Self {
        CostRecord {
            node: self.node.clone(),
            image: self.image.clone(),
        }
    }
}

impl<T: GrammarNode> CostRecord<T> {
    /// Creates a record pairing `node` with `image`.
    pub fn new(node: &ArtifactRef<T>, image: Option<&ArtifactRef<T>>) -> Self {
        CostRecord {
            node: node.clone(),
            image: image.cloned(),
        }
    }

    fn is_no_match(&self) -> bool {
        self.image.is_none()
    }
}

/// Lower and upper bounds on a cost under any extension of the matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f32,
    pub upper: f32,
}

/// Assignment lookup for a set of records, indexed from both sides.
///
/// Keeping this index makes `image` lookups O(1), so costing a matching
/// stays quadratic overall instead of cubic.
struct ImageIndex<T: GrammarNode> {
    map: FxHashMap<(Revision, u64), Option<ArtifactRef<T>>>,
}

impl<T: GrammarNode> ImageIndex<T> {
    fn build(records: &[CostRecord<T>]) -> Self {
        let mut map = FxHashMap::default();
        for record in records {
            map.insert(key(&record.node), record.image.clone());
            if let Some(image) = &record.image {
                map.insert(key(image), Some(record.node.clone()));
            }
        }
        ImageIndex { map }
    }

    /// `None`: the node is unassigned. `Some(None)`: assigned to a no-match.
    /// `Some(Some(_))`: assigned to an image.
    fn lookup(&self, node: &ArtifactRef<T>) -> Option<&Option<ArtifactRef<T>>> {
        self.map.get(&key(node))
    }
}

fn key<T: GrammarNode>(node: &ArtifactRef<T>) -> (Revision, u64) {
    let borrowed = node.borrow();
    (borrowed.revision().clone(), borrowed.number())
}

fn is_child_of<T: GrammarNode>(candidate: &ArtifactRef<T>, parent: &ArtifactRef<T>) -> bool {
    parent
        .borrow()
        .children()
        .iter()
        .any(|c| Rc::ptr_eq(c, candidate))
}

fn siblings<T: GrammarNode>(node: &ArtifactRef<T>) -> Vec<ArtifactRef<T>> {
    match node.borrow().parent().upgrade() {
        Some(parent) => parent
            .borrow()
            .children()
            .iter()
            .filter(|c| !Rc::ptr_eq(c, node))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

fn in_siblings<T: GrammarNode>(candidate: &ArtifactRef<T>, of: &ArtifactRef<T>) -> bool {
    siblings(of).iter().any(|s| Rc::ptr_eq(s, candidate))
}

/// The branch-and-bound cost-model matcher.
#[derive(Debug, Clone)]
pub struct CostModelMatcher {
    wn: f32,
    wr: f32,
    wa: f32,
    ws: f32,
}

impl CostModelMatcher {
    /// Creates a matcher with explicit weights.
    pub fn new(wn: f32, wr: f32, wa: f32, ws: f32) -> Self {
        CostModelMatcher { wn, wr, wa, ws }
    }

    /// Creates a matcher with the context's weights.
    pub fn from_context(context: &MergeContext) -> Self {
        Self::new(context.wn, context.wr, context.wa, context.ws)
    }

    /// The exact, normalized cost of a matching over trees with
    /// `total_size` nodes in total.
    pub fn cost<T: GrammarNode>(&self, records: &[CostRecord<T>], total_size: usize) -> f32 {
        if records.is_empty() {
            return 0.0;
        }
        let index = ImageIndex::build(records);
        let sum: f32 = records.iter().map(|r| self.exact_cost(r, &index)).sum();
        sum / total_size as f32
    }

    /// The normalized lower bound of a partial matching.
    pub fn lower_bound<T: GrammarNode>(
        &self,
        records: &[CostRecord<T>],
        total_size: usize,
    ) -> f32 {
        let index = ImageIndex::build(records);
        let sum: f32 = records
            .iter()
            .map(|r| self.bound_cost(r, &index).lower)
            .sum();
        sum / total_size as f32
    }

    /// The normalized upper bound of a partial matching, assuming every
    /// unassigned node completes to a no-match.
    pub fn upper_bound<T: GrammarNode>(
        &self,
        records: &[CostRecord<T>],
        total_size: usize,
        unassigned: usize,
    ) -> f32 {
        let index = ImageIndex::build(records);
        let sum: f32 = records
            .iter()
            .map(|r| self.bound_cost(r, &index).upper)
            .sum();
        (sum + self.wn * unassigned as f32) / total_size as f32
    }

    fn exact_cost<T: GrammarNode>(&self, record: &CostRecord<T>, index: &ImageIndex<T>) -> f32 {
        let image = match &record.image {
            None => return self.wn,
            Some(image) => image,
        };
        let node = &record.node;

        self.renaming_cost(node, image)
            + self.wa * self.ancestry_violations(node, image, index) as f32
            + self.ws * self.sibling_breakup(node, image, index)
    }

    fn renaming_cost<T: GrammarNode>(&self, m: &ArtifactRef<T>, n: &ArtifactRef<T>) -> f32 {
        if m.borrow().matches_node(&n.borrow()) {
            0.0
        } else {
            self.wr
        }
    }

    /// Children of `m` whose image escapes `n`, plus the symmetric count.
    fn ancestry_violations<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> usize {
        self.violating_children(m, n, index) + self.violating_children(n, m, index)
    }

    fn violating_children<T: GrammarNode>(
        &self,
        of: &ArtifactRef<T>,
        into: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> usize {
        of.borrow()
            .children()
            .iter()
            .filter(|child| match index.lookup(child) {
                Some(Some(image)) => !is_child_of(image, into),
                _ => false,
            })
            .count()
    }

    fn sibling_breakup<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> f32 {
        self.breakup_side(m, n, index) + self.breakup_side(n, m, index)
    }

    /// divergent / (invariant + distinct families), zero when nothing
    /// diverges.
    fn breakup_side<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> f32 {
        let m_siblings = siblings(m);
        let n_siblings = siblings(n);

        let mut invariant = 0usize;
        let mut divergent = 0usize;
        let mut families: FxHashSet<Option<(Revision, u64)>> = FxHashSet::default();

        for sibling in &m_siblings {
            let image = match index.lookup(sibling) {
                Some(Some(image)) => image.clone(),
                _ => continue,
            };
            if n_siblings.iter().any(|s| Rc::ptr_eq(s, &image)) {
                invariant += 1;
            } else {
                divergent += 1;
            }
            families.insert(image.borrow().parent().upgrade().as_ref().map(key));
        }

        if divergent == 0 {
            0.0
        } else {
            divergent as f32 / (invariant + families.len()) as f32
        }
    }

    /// Bounds on the exact cost of one record under any extension.
    fn bound_cost<T: GrammarNode>(
        &self,
        record: &CostRecord<T>,
        index: &ImageIndex<T>,
    ) -> Bounds {
        let image = match &record.image {
            None => {
                return Bounds {
                    lower: self.wn,
                    upper: self.wn,
                }
            }
            Some(image) => image,
        };
        let node = &record.node;

        let renaming = self.renaming_cost(node, image);
        let ancestry = self.bound_ancestry(node, image, index);
        let sibling = self.bound_siblings(node, image, index);

        Bounds {
            lower: renaming + ancestry.lower + sibling.lower,
            upper: renaming + ancestry.upper + sibling.upper,
        }
    }

    fn bound_ancestry<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> Bounds {
        let count = |of: &ArtifactRef<T>, into: &ArtifactRef<T>, upper: bool| {
            of.borrow()
                .children()
                .iter()
                .filter(|c| ancestry_indicator(c, into, index, upper))
                .count()
        };

        let lower = count(m, n, false) + count(n, m, false);
        let upper = count(m, n, true) + count(n, m, true);

        Bounds {
            lower: self.wa * lower as f32,
            upper: self.wa * upper as f32,
        }
    }

    fn bound_siblings<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> Bounds {
        let d_mn = self.bound_distinct(m, n, index);
        let d_nm = self.bound_distinct(n, m, index);
        let i_mn = self.bound_invariant(m, n, index);
        let i_nm = self.bound_invariant(n, m, index);

        let lower = self.ws
            * ((d_mn.lower / (i_mn.upper * (d_mn.lower + 1.0)))
                + (d_nm.lower / (i_nm.upper * (d_nm.lower + 1.0))));
        let upper = self.ws * ((d_mn.upper / i_mn.lower) + (d_nm.upper / i_nm.lower)) / 2.0;

        Bounds { lower, upper }
    }

    fn bound_distinct<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> Bounds {
        let count = |upper: bool| {
            m.borrow()
                .children()
                .iter()
                .filter(|c| distinct_sibling_indicator(c, n, index, upper))
                .count() as f32
        };
        Bounds {
            lower: count(false),
            upper: count(true),
        }
    }

    fn bound_invariant<T: GrammarNode>(
        &self,
        m: &ArtifactRef<T>,
        n: &ArtifactRef<T>,
        index: &ImageIndex<T>,
    ) -> Bounds {
        let count = |upper: bool| {
            m.borrow()
                .children()
                .iter()
                .filter(|c| invariant_sibling_indicator(c, n, index, upper))
                .count() as f32
        };
        Bounds {
            lower: count(false) + 1.0,
            upper: count(true) + 1.0,
        }
    }
}

/// Lower variant: no record assigns the child to a child of `n` or to a
/// no-match. Upper variant: some record assigns it to something that is
/// neither a no-match nor a child of `n`.
fn ancestry_indicator<T: GrammarNode>(
    child: &ArtifactRef<T>,
    n: &ArtifactRef<T>,
    index: &ImageIndex<T>,
    upper: bool,
) -> bool {
    match index.lookup(child) {
        Some(Some(image)) => !is_child_of(image, n),
        Some(None) => false,
        None => !upper,
    }
}

/// Like the ancestry indicator, over the sibling set of `n`.
fn distinct_sibling_indicator<T: GrammarNode>(
    child: &ArtifactRef<T>,
    n: &ArtifactRef<T>,
    index: &ImageIndex<T>,
    upper: bool,
) -> bool {
    match index.lookup(child) {
        Some(Some(image)) => !in_siblings(image, n),
        Some(None) => false,
        None => !upper,
    }
}

/// Lower variant: every record either ignores the child or maps it into the
/// sibling set of `n`. Upper variant: some record maps it into that set.
fn invariant_sibling_indicator<T: GrammarNode>(
    child: &ArtifactRef<T>,
    n: &ArtifactRef<T>,
    index: &ImageIndex<T>,
    upper: bool,
) -> bool {
    match index.lookup(child) {
        Some(Some(image)) => in_siblings(image, n),
        Some(None) => false,
        None => !upper,
    }
}

impl<T: GrammarNode> TreeMatcher<T> for CostModelMatcher {
    fn match_trees(
        &mut self,
        context: &MergeContext,
        left: &ArtifactRef<T>,
        right: &ArtifactRef<T>,
    ) -> Result<Matchings<T>> {
        self.wn = context.wn;
        self.wr = context.wr;
        self.wa = context.wa;
        self.ws = context.ws;

        let left_nodes = preorder(left);
        let right_nodes = preorder(right);
        let total_size = left_nodes.len() + right_nodes.len();

        let mut search = Search {
            matcher: self,
            context,
            left_nodes: &left_nodes,
            right_nodes: &right_nodes,
            total_size,
            best: None,
        };
        let mut current = Vec::new();
        let mut used = vec![false; right_nodes.len()];
        search.assign(0, &mut current, &mut used)?;

        let mut matchings = Matchings::new();
        if let Some((cost, records)) = search.best {
            trace!(cost, records = records.len(), "cost-model search done");
            for record in records {
                if let Some(image) = record.image {
                    matchings.add(Matching::new(&record.node, &image, 1));
                }
            }
        }
        Ok(matchings)
    }
}

/// Branch-and-bound search state.
///
/// Left-tree nodes are assigned in pre-order; candidates are same-kind
/// right-tree nodes in ascending number, with the no-match branch explored
/// last. The first complete matching with the strictly lowest cost wins, so
/// the result is deterministic.
struct Search<'a, T: GrammarNode> {
    matcher: &'a CostModelMatcher,
    context: &'a MergeContext,
    left_nodes: &'a [ArtifactRef<T>],
    right_nodes: &'a [ArtifactRef<T>],
    total_size: usize,
    best: Option<(f32, Vec<CostRecord<T>>)>,
}

impl<T: GrammarNode> Search<'_, T> {
    fn assign(
        &mut self,
        index: usize,
        current: &mut Vec<CostRecord<T>>,
        used: &mut [bool],
    ) -> Result<()> {
        self.context.check_cancelled()?;

        if index == self.left_nodes.len() {
            let mut complete = current.clone();
            for (j, node) in self.right_nodes.iter().enumerate() {
                if !used[j] {
                    complete.push(CostRecord::new(node, None));
                }
            }
            let cost = self.matcher.cost(&complete, self.total_size);
            if self.best.as_ref().is_none_or(|(best, _)| cost < *best) {
                self.best = Some((cost, complete));
            }
            return Ok(());
        }

        if let Some((best_cost, _)) = &self.best {
            if self.matcher.lower_bound(current, self.total_size) > *best_cost {
                return Ok(());
            }
        }

        let node = &self.left_nodes[index];
        let node_kind = node.borrow().node().kind_name().to_string();

        for j in 0..self.right_nodes.len() {
            if used[j] {
                continue;
            }
            let candidate = &self.right_nodes[j];
            if candidate.borrow().node().kind_name() != node_kind {
                continue;
            }

            current.push(CostRecord::new(node, Some(candidate)));
            used[j] = true;
            self.assign(index + 1, current, used)?;
            used[j] = false;
            current.pop();
        }

        current.push(CostRecord::new(node, None));
        self.assign(index + 1, current, used)?;
        current.pop();

        Ok(())
    }
}

fn preorder<T: GrammarNode>(root: &ArtifactRef<T>) -> Vec<ArtifactRef<T>> {
    let mut nodes = Vec::new();
    collect(root, &mut nodes);
    nodes
}

fn collect<T: GrammarNode>(node: &ArtifactRef<T>, out: &mut Vec<ArtifactRef<T>>) {
    out.push(node.clone());
    let children: Vec<ArtifactRef<T>> = node.borrow().children().to_vec();
    for child in &children {
        collect(child, out);
    }
}
