//! Unordered merge.
//!
//! Children whose order carries no meaning (class member sets, import
//! sections) are merged as sets keyed by match identity. The engine walks
//! the left children in declared order, then the right children, so output
//! order is deterministic: members appear in the order of the side that
//! contributed them, left before right.

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

    let mut work: Vec<(ArtifactRef<T>, bool)> = Vec::new();
    for child in left.borrow().children() {
        work.push((child.clone(), true));
    }
    for child in right.borrow().children() {
        work.push((child.clone(), false));
    }

    for (child, from_left) in work {
        context.check_cancelled()?;

        if child.borrow().is_merged() {
            continue;
        }

        let other_rev = if from_left { &right_rev } else { &left_rev };
        let partner = {
            let borrowed = child.borrow();
            borrowed
                .matching(other_rev)
                .and_then(|m| m.partner_of(&child))
        };

        match partner {
            Some(partner) if !partner.borrow().is_merged() => {
                if !Artifact::has_changes(&child) && !Artifact::has_changes(&partner) {
                    // Unchanged on both sides: copy through once.
                    trace!(id = %child.borrow().id(), "copy through");
                    Operation::Add {
                        artifact: child.clone(),
                        target: target.clone(),
                    }
                    .apply(context)?;
                    partner.borrow_mut().set_merged();
                } else {
                    let (left_child, right_child) = if from_left {
                        (child.clone(), partner)
                    } else {
                        (partner, child.clone())
                    };
                    super::merge_matched_pair(scenario, &left_child, &right_child, target, context)?;
                }
            }
            Some(_) => {
                // The partner was already consumed; nothing left to merge.
                child.borrow_mut().set_merged();
            }
            None => {
                let in_base = base_rev
                    .as_ref()
                    .is_some_and(|rev| child.borrow().matched_in(rev));

                if in_base {
                    // Deleted by the other side.
                    if Artifact::has_changes(&child) {
                        trace!(id = %child.borrow().id(), "deletion versus change");
                        let (left_alt, right_alt) = if from_left {
                            (Some(child.clone()), None)
                        } else {
                            (None, Some(child.clone()))
                        };
                        conflict(left_alt, right_alt, target, &left_rev, &right_rev, context)?;
                    } else {
                        Operation::Delete {
                            artifact: child.clone(),
                        }
                        .apply(context)?;
                    }
                } else {
                    // A fresh addition by this side.
                    Operation::Add {
                        artifact: child.clone(),
                        target: target.clone(),
                    }
                    .apply(context)?;
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_str;
    use crate::matcher::{ClassicMatcher, TreeMatcher};

    type JavaRef = ArtifactRef<crate::lang::JavaNode>;

    fn tree(source: &str, revision: Revision) -> JavaRef {
        Artifact::from_tree(parse_str(source).unwrap(), &revision, false)
    }

    fn class_of(root: &JavaRef) -> JavaRef {
        root.borrow().child(1).cloned().unwrap()
    }

    /// Matches all three revision pairs and merges the class bodies.
    fn merge_classes(left_src: &str, base_src: &str, right_src: &str) -> JavaRef {
        let context = MergeContext::new();
        let left = tree(left_src, Revision::left());
        let base = tree(base_src, Revision::base());
        let right = tree(right_src, Revision::right());

        let mut matcher = ClassicMatcher::new();
        matcher.match_trees(&context, &left, &base).unwrap().store();
        matcher.match_trees(&context, &right, &base).unwrap().store();
        matcher.match_trees(&context, &left, &right).unwrap().store();

        let l_class = class_of(&left);
        let b_class = class_of(&base);
        let r_class = class_of(&right);

        let target = Artifact::shallow_clone(&l_class);
        let scenario = MergeScenario::three_way(l_class, b_class, r_class);
        merge(&scenario, &target, &context).unwrap();
        Artifact::renumber(&target);
        target
    }

    #[test]
    fn test_additions_from_both_sides() {
        let target = merge_classes(
            "class C { int a = 1; int b = 2; }",
            "class C { int a = 1; }",
            "class C { int a = 1; int c = 3; }",
        );

        let text = Artifact::pretty_print(&target).unwrap();
        assert_eq!(
            text,
            "\
class C {
    int a = 1;

    int b = 2;

    int c = 3;
}
"
        );
    }

    #[test]
    fn test_identical_additions_appear_once() {
        let target = merge_classes(
            "class C { int a = 1; int b = 2; }",
            "class C { int a = 1; }",
            "class C { int b = 2; int a = 1; }",
        );

        let text = Artifact::pretty_print(&target).unwrap();
        assert_eq!(
            text,
            "\
class C {
    int a = 1;

    int b = 2;
}
"
        );
    }

    #[test]
    fn test_clean_deletion() {
        let target = merge_classes(
            "class C { int a = 1; }",
            "class C { int a = 1; int b = 2; }",
            "class C { int a = 1; int b = 2; }",
        );

        let text = Artifact::pretty_print(&target).unwrap();
        assert_eq!(text, "class C {\n    int a = 1;\n}\n");
    }

    #[test]
    fn test_deletion_versus_change_conflicts() {
        // Left deletes the method, right changes its body.
        let target = merge_classes(
            "class C { int a = 1; }",
            "class C { int a = 1; int f() { return 1; } }",
            "class C { int a = 1; int f() { return 2; } }",
        );

        let text = Artifact::pretty_print(&target).unwrap();
        assert!(text.contains("<<<<<<< left\n=======\n"));
        assert!(text.contains("return 2;"));
        assert!(text.contains(">>>>>>> right"));
    }

    #[test]
    fn test_member_changed_on_one_side() {
        let target = merge_classes(
            "class C { int f() { return 1; } }",
            "class C { int f() { return 1; } }",
            "class C { int f() { return 2; } }",
        );

        let text = Artifact::pretty_print(&target).unwrap();
        assert_eq!(text, "class C {\n    int f() {\n        return 2;\n    }\n}\n");
    }
}
