//! The three-way merge engines.
//!
//! [`merge_scenario`] is the per-node entry point: it handles opaque leaves
//! in semistructured mode, runs the fixed-arity safety preflight, and
//! dispatches to the ordered or unordered engine depending on whether the
//! node's child order is semantically significant. The engines walk the
//! matched children and emit [`Operation`]s against the target tree; source
//! trees are read-only except for the merged flags.
//!
//! [`Operation`]: crate::operations::Operation

mod ordered;
mod unordered;

use tracing::debug;

use crate::artifact::{Artifact, ArtifactRef};
use crate::context::MergeContext;
use crate::error::{Error, Result};
use crate::operations::Operation;
use crate::scenario::MergeScenario;
use crate::strategy::linebased;
use crate::tree::GrammarNode;

/// Merges one matched scenario into `target`.
pub fn merge_scenario<T: GrammarNode>(
    scenario: &MergeScenario<T>,
    target: &ArtifactRef<T>,
    context: &MergeContext,
) -> Result<()> {
    context.check_cancelled()?;

    let left = scenario.left();
    let right = scenario.right();

    debug!(scenario = ?scenario, "merge");

    if context.is_semistructured() && left.borrow().is_leaf() && right.borrow().is_leaf() {
        return merge_content(scenario, target, context);
    }

    if !safe_to_merge(scenario, target) {
        // A fixed-arity node changed on both sides in incompatible ways.
        // Merging the children could reconstruct an ill-typed tree, so the
        // whole subtree becomes a conflict.
        let parent = target.borrow().parent().upgrade().ok_or_else(|| {
            Error::Reconstruction {
                id: target.borrow().id(),
                message: "fixed-arity conflict target has no parent".into(),
            }
        })?;
        Artifact::remove_child(&parent, target);

        let left_name = left.borrow().revision().name().to_string();
        let right_name = right.borrow().revision().name().to_string();
        return Operation::Conflict {
            left: Some(left.clone()),
            right: Some(right.clone()),
            target_parent: parent,
            left_name,
            right_name,
        }
        .apply(context);
    }

    if left.borrow().is_ordered() {
        ordered::merge(scenario, target, context)
    } else {
        unordered::merge(scenario, target, context)
    }
}

/// The fixed-arity safety preflight.
///
/// A node whose kind fixes the child count cannot absorb arbitrary child
/// rewrites: if both sides changed it and either the arities or the child
/// kinds at corresponding positions differ, a structural merge could build a
/// tree the grammar cannot print. Such nodes conflict wholesale.
fn safe_to_merge<T: GrammarNode>(scenario: &MergeScenario<T>, target: &ArtifactRef<T>) -> bool {
    let left = scenario.left();
    let right = scenario.right();

    // Only non-root, fixed-arity nodes are in danger.
    if target.borrow().parent().upgrade().is_none() {
        return true;
    }
    if left.borrow().fixed_arity().is_none() {
        return true;
    }

    let side_changed = |node: &ArtifactRef<T>| {
        node.borrow().is_change()
            || node
                .borrow()
                .children()
                .iter()
                .any(|c| c.borrow().is_change())
    };
    if !side_changed(left) || !side_changed(right) {
        return true;
    }

    let l = left.borrow();
    let r = right.borrow();
    if l.child_count() != r.child_count() {
        return false;
    }
    l.children()
        .iter()
        .zip(r.children().iter())
        .all(|(lc, rc)| lc.borrow().node().kind_name() == rc.borrow().node().kind_name())
}

/// Recurses into a matched pair: creates the target child, chooses two-way
/// or three-way depending on whether the pair has a base counterpart, and
/// applies the child merge.
pub(super) fn merge_matched_pair<T: GrammarNode>(
    outer: &MergeScenario<T>,
    left_child: &ArtifactRef<T>,
    right_child: &ArtifactRef<T>,
    target: &ArtifactRef<T>,
    context: &MergeContext,
) -> Result<()> {
    let base_rev = outer.base().map(|b| b.borrow().revision().clone());
    let base_child = base_rev.as_ref().and_then(|rev| {
        let borrowed = left_child.borrow();
        borrowed
            .matching(rev)
            .and_then(|m| m.partner_of(left_child))
    });

    let child_scenario = match base_child {
        Some(base_child) => {
            MergeScenario::three_way(left_child.clone(), base_child, right_child.clone())
        }
        None => MergeScenario::two_way(left_child.clone(), right_child.clone()),
    };

    let target_child = Artifact::shallow_clone(left_child);
    Artifact::add_child(target, target_child.clone());

    left_child.borrow_mut().set_merged();
    right_child.borrow_mut().set_merged();

    Operation::Merge {
        scenario: child_scenario,
        target: target_child,
    }
    .apply(context)
}

/// Merges two opaque text leaves in semistructured mode.
///
/// Equal texts pass through; differing texts go through the line-based
/// strategy on scratch files. A failure of the line-based strategy is fatal
/// for the merge.
fn merge_content<T: GrammarNode>(
    scenario: &MergeScenario<T>,
    target: &ArtifactRef<T>,
    context: &MergeContext,
) -> Result<()> {
    let left = scenario.left();
    let right = scenario.right();

    if left.borrow().matches_node(&right.borrow()) {
        let text = left.borrow().node().content().unwrap_or_default().to_string();
        target.borrow_mut().node_mut().set_content(text);
        left.borrow_mut().set_merged();
        right.borrow_mut().set_merged();
        return Ok(());
    }

    let left_text = left.borrow().node().content().unwrap_or_default().to_string();
    let right_text = right.borrow().node().content().unwrap_or_default().to_string();
    let base_text = scenario
        .base()
        .filter(|b| b.borrow().is_leaf())
        .and_then(|b| b.borrow().node().content().map(str::to_string))
        .unwrap_or_default();

    let left_name = left.borrow().revision().name().to_string();
    let right_name = right.borrow().revision().name().to_string();
    let merged = linebased::merge_scratch(
        &left_text,
        &base_text,
        &right_text,
        &left_name,
        &right_name,
    )?;

    target.borrow_mut().node_mut().set_content(merged);
    left.borrow_mut().set_merged();
    right.borrow_mut().set_merged();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_str;
    use crate::revision::Revision;

    type JavaRef = ArtifactRef<crate::lang::JavaNode>;

    fn tree(source: &str, revision: Revision) -> JavaRef {
        Artifact::from_tree(parse_str(source).unwrap(), &revision, false)
    }

    fn assign_of(root: &JavaRef) -> JavaRef {
        // CompilationUnit -> Class -> Method -> Block -> Assign
        let class = root.borrow().child(1).cloned().unwrap();
        let method = class.borrow().child(0).cloned().unwrap();
        let block = method.borrow().child(0).cloned().unwrap();
        let result = block.borrow().child(0).cloned().unwrap();
        result
    }

    #[test]
    fn test_preflight_rejects_diverged_fixed_arity() {
        use crate::matcher::{ClassicMatcher, TreeMatcher};

        let context = MergeContext::new();
        let left = tree("class C { void f() { x = a + b; } }", Revision::left());
        let right = tree("class C { void f() { x = c ? a : b; } }", Revision::right());
        let base = tree("class C { void f() { x = a; } }", Revision::base());

        let mut matcher = ClassicMatcher::new();
        matcher.match_trees(&context, &left, &base).unwrap().store();
        matcher.match_trees(&context, &right, &base).unwrap().store();
        matcher.match_trees(&context, &left, &right).unwrap().store();

        let l_assign = assign_of(&left);
        let r_assign = assign_of(&right);

        // Both sides changed the fixed-arity assignment and the child kinds
        // differ at the value position.
        let parent = Artifact::from_tree(parse_str("").unwrap(), &Revision::target(), false);
        let target = Artifact::shallow_clone(&l_assign);
        Artifact::add_child(&parent, target.clone());

        let scenario = MergeScenario::two_way(l_assign, r_assign);
        merge_scenario(&scenario, &target, &context).unwrap();

        // The target was replaced with a conflict pseudo-node.
        assert_eq!(parent.borrow().child_count(), 1);
        let spliced = parent.borrow().child(0).cloned().unwrap();
        assert!(spliced.borrow().is_conflict());
    }

    #[test]
    fn test_preflight_allows_single_sided_change() {
        let left = tree("class C { void f() { x = a + b; } }", Revision::left());
        let right = tree("class C { void f() { x = a; } }", Revision::right());
        let base = tree("class C { void f() { x = a; } }", Revision::base());

        // Give the right side its base matching so it is not a change.
        use crate::matcher::{ClassicMatcher, TreeMatcher};
        let context = MergeContext::new();
        let mut matcher = ClassicMatcher::new();
        matcher.match_trees(&context, &right, &base).unwrap().store();

        let l_assign = assign_of(&left);
        let r_assign = assign_of(&right);
        let parent = Artifact::from_tree(parse_str("").unwrap(), &Revision::target(), false);
        let target = Artifact::shallow_clone(&l_assign);
        Artifact::add_child(&parent, target.clone());

        let scenario = MergeScenario::two_way(l_assign, r_assign);
        assert!(safe_to_merge(&scenario, &target));
    }
}
