//! Ordered merge.
//!
//! Children whose order matters (statement lists, argument lists) are walked
//! with two cursors, one per side. Each step classifies the current pair:
//! a child missing from the other side is a deletion, an insertion, or a
//! deletion-versus-change conflict depending on its base matching; a pair
//! matched to each other recurses. Cursor advancement follows the
//! classification: the consumed side advances on one-sided operations,
//! both sides advance on conflicts and recursions, and merged children are
//! never reprocessed.

use tracing::trace;

use crate::artifact::{Artifact, ArtifactRef};
use crate::context::MergeContext;
use crate::error::Result;
use crate::operations::Operation;
use crate::revision::Revision;
use crate::scenario::MergeScenario;
use crate::tree::GrammarNode;

pub(super) fn merge<T: GrammarNode>(
    scenario: &MergeScenario<T>,
    target: &ArtifactRef<T>,
    context: &MergeContext,
) -> Result<()> {
    let left = scenario.left();
    let right = scenario.right();
    let left_rev = left.borrow().revision().clone();
    let right_rev = right.borrow().revision().clone();
    let base_rev = scenario.base().map(|b| b.borrow().revision().clone());

    let left_children: Vec<ArtifactRef<T>> = left.borrow().children().to_vec();
    let right_children: Vec<ArtifactRef<T>> = right.borrow().children().to_vec();

    let in_base =
        |node: &ArtifactRef<T>| base_rev.as_ref().is_some_and(|rev| node.borrow().matched_in(rev));

    let mut li = 0usize;
    let mut ri = 0usize;

    loop {
        context.check_cancelled()?;

        let left_child = left_children.get(li).cloned();
        let right_child = right_children.get(ri).cloned();
        if left_child.is_none() && right_child.is_none() {
            break;
        }

        if let Some(lc) = &left_child {
            if lc.borrow().is_merged() {
                li += 1;
                continue;
            }
        }
        if let Some(rc) = &right_child {
            if rc.borrow().is_merged() {
                ri += 1;
                continue;
            }
        }

        let lc_in_right = left_child
            .as_ref()
            .is_some_and(|lc| lc.borrow().matched_in(&right_rev));
        let rc_in_left = right_child
            .as_ref()
            .is_some_and(|rc| rc.borrow().matched_in(&left_rev));

        // In semistructured mode two opaque leaves of the same kind at the
        // same position merge by content, matched or not: differing texts
        // would otherwise classify as two independent changes.
        if context.is_semistructured() {
            if let (Some(lc), Some(rc)) = (left_child.clone(), right_child.clone()) {
                let opaque_pair = {
                    let l = lc.borrow();
                    let r = rc.borrow();
                    l.is_leaf()
                        && r.is_leaf()
                        && l.node().content().is_some()
                        && r.node().content().is_some()
                        && l.node().kind_name() == r.node().kind_name()
                };
                if opaque_pair {
                    let base_child = scenario
                        .base()
                        .and_then(|b| b.borrow().child(li).cloned())
                        .filter(|bc| bc.borrow().is_leaf());
                    let child_scenario = match base_child {
                        Some(bc) => MergeScenario::three_way(lc.clone(), bc, rc.clone()),
                        None => MergeScenario::two_way(lc.clone(), rc.clone()),
                    };
                    let target_child = Artifact::shallow_clone(&lc);
                    Artifact::add_child(target, target_child.clone());
                    Operation::Merge {
                        scenario: child_scenario,
                        target: target_child,
                    }
                    .apply(context)?;
                    li += 1;
                    ri += 1;
                    continue;
                }
            }
        }

        // Left child without a counterpart in right.
        if let Some(lc) = left_child.clone() {
            if !lc_in_right {
                trace!(id = %lc.borrow().id(), "not in right");

                if in_base(&lc) {
                    // Deleted by right.
                    if Artifact::has_changes(&lc) {
                        conflict(
                            Some(lc),
                            right_child.clone(),
                            target,
                            &left_rev,
                            &right_rev,
                            context,
                        )?;
                        li += 1;
                        if right_child.is_some() {
                            ri += 1;
                        }
                    } else {
                        Operation::Delete { artifact: lc }.apply(context)?;
                        li += 1;
                    }
                    continue;
                }

                // lc is a change introduced by left.
                match &right_child {
                    Some(rc) if !rc_in_left => {
                        if in_base(rc) {
                            // rc was deleted by left.
                            if Artifact::has_changes(rc) {
                                conflict(
                                    Some(lc),
                                    Some(rc.clone()),
                                    target,
                                    &left_rev,
                                    &right_rev,
                                    context,
                                )?;
                                li += 1;
                                ri += 1;
                            } else {
                                // The deletion is clean; keep the left change.
                                Operation::Add {
                                    artifact: lc,
                                    target: target.clone(),
                                }
                                .apply(context)?;
                                li += 1;
                            }
                        } else {
                            // Both sides changed this position.
                            conflict(
                                Some(lc),
                                Some(rc.clone()),
                                target,
                                &left_rev,
                                &right_rev,
                                context,
                            )?;
                            li += 1;
                            ri += 1;
                        }
                    }
                    _ => {
                        Operation::Add {
                            artifact: lc,
                            target: target.clone(),
                        }
                        .apply(context)?;
                        li += 1;
                    }
                }
                continue;
            }
        }

        // Right child without a counterpart in left.
        if let Some(rc) = right_child.clone() {
            if !rc_in_left {
                trace!(id = %rc.borrow().id(), "not in left");

                if in_base(&rc) {
                    // Deleted by left.
                    if Artifact::has_changes(&rc) {
                        conflict(
                            left_child.clone(),
                            Some(rc),
                            target,
                            &left_rev,
                            &right_rev,
                            context,
                        )?;
                        ri += 1;
                        if left_child.is_some() {
                            li += 1;
                        }
                    } else {
                        Operation::Delete { artifact: rc }.apply(context)?;
                        ri += 1;
                    }
                } else {
                    // A right change; the left cursor is matched or done.
                    Operation::Add {
                        artifact: rc,
                        target: target.clone(),
                    }
                    .apply(context)?;
                    ri += 1;
                }
                continue;
            }
        }

        // Both children are matched; the order-preserving matcher guarantees
        // they are matched to each other.
        match (left_child, right_child) {
            (Some(lc), Some(rc)) => {
                if !lc.borrow().is_merged() && !rc.borrow().is_merged() {
                    super::merge_matched_pair(scenario, &lc, &rc, target, context)?;
                }
                li += 1;
                ri += 1;
            }
            (Some(lc), None) => {
                // Matched, but the right cursor ran out: the partner was
                // already consumed elsewhere. Carry the child through.
                Operation::Add {
                    artifact: lc,
                    target: target.clone(),
                }
                .apply(context)?;
                li += 1;
            }
            (None, Some(rc)) => {
                Operation::Add {
                    artifact: rc,
                    target: target.clone(),
                }
                .apply(context)?;
                ri += 1;
            }
            (None, None) => break,
        }
    }

    Ok(())
}

fn conflict<T: GrammarNode>(
    left: Option<ArtifactRef<T>>,
    right: Option<ArtifactRef<T>>,
    target: &ArtifactRef<T>,
    left_rev: &Revision,
    right_rev: &Revision,
    context: &MergeContext,
) -> Result<()> {
    Operation::Conflict {
        left,
        right,
        target_parent: target.clone(),
        left_name: left_rev.name().to_string(),
        right_name: right_rev.name().to_string(),
    }
    .apply(context)
}
