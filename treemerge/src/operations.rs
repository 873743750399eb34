//! Merge operations and their applier.
//!
//! The merge engines do not mutate the target tree directly; they emit
//! operations as values and the applier executes them. Source trees are
//! never mutated beyond the merged flag. Each operation is idempotent for
//! the same input state: the applier skips work whose principal artifact was
//! already consumed.

use tracing::debug;

use crate::artifact::{Artifact, ArtifactRef};
use crate::context::MergeContext;
use crate::error::Result;
use crate::merge;
use crate::scenario::MergeScenario;
use crate::tree::GrammarNode;

/// A single merge operation against the target tree.
#[derive(Debug, Clone)]
pub enum Operation<T: GrammarNode> {
    /// Deep-clone an artifact into the target.
    Add {
        artifact: ArtifactRef<T>,
        target: ArtifactRef<T>,
    },
    /// Exclude an artifact from the target.
    Delete { artifact: ArtifactRef<T> },
    /// Recursively merge a matched pair (or triple) into a target node.
    Merge {
        scenario: MergeScenario<T>,
        target: ArtifactRef<T>,
    },
    /// Splice a conflict pseudo-node carrying both alternatives under the
    /// target parent.
    Conflict {
        left: Option<ArtifactRef<T>>,
        right: Option<ArtifactRef<T>>,
        target_parent: ArtifactRef<T>,
        left_name: String,
        right_name: String,
    },
}

impl<T: GrammarNode> Operation<T> {
    /// Executes this operation.
    pub fn apply(&self, context: &MergeContext) -> Result<()> {
        context.check_cancelled()?;

        match self {
            Operation::Add { artifact, target } => {
                if artifact.borrow().is_merged() {
                    return Ok(());
                }
                debug!(id = %artifact.borrow().id(), "add");
                let clone = Artifact::clone_tree(artifact);
                Artifact::add_child(target, clone);
                artifact.borrow_mut().set_merged();
                Ok(())
            }
            Operation::Delete { artifact } => {
                debug!(id = %artifact.borrow().id(), "delete");
                artifact.borrow_mut().set_merged();
                Ok(())
            }
            Operation::Merge { scenario, target } => merge::merge_scenario(scenario, target, context),
            Operation::Conflict {
                left,
                right,
                target_parent,
                left_name,
                right_name,
            } => {
                let consumed = left
                    .as_ref()
                    .or(right.as_ref())
                    .is_some_and(|a| a.borrow().is_merged());
                if consumed {
                    return Ok(());
                }
                debug!(
                    left = ?left.as_ref().map(|a| a.borrow().id()),
                    right = ?right.as_ref().map(|a| a.borrow().id()),
                    "conflict"
                );

                let conflict = Artifact::create_conflict(
                    left.as_ref(),
                    right.as_ref(),
                    left_name,
                    right_name,
                );
                Artifact::add_child(target_parent, conflict);

                if let Some(l) = left {
                    l.borrow_mut().set_merged();
                }
                if let Some(r) = right {
                    r.borrow_mut().set_merged();
                }
                Ok(())
            }
        }
    }
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

    fn target_root() -> JavaRef {
        Artifact::from_tree(parse_str("").unwrap(), &Revision::target(), false)
    }

    #[test]
    fn test_add_clones_and_marks_merged() {
        let context = MergeContext::new();
        let source = tree("class C {\n}\n", Revision::left());
        let class = source.borrow().child(1).cloned().unwrap();
        let target = target_root();

        Operation::Add {
            artifact: class.clone(),
            target: target.clone(),
        }
        .apply(&context)
        .unwrap();

        assert_eq!(target.borrow().child_count(), 1);
        assert!(class.borrow().is_merged());
        // The clone is a distinct allocation with the source revision.
        let added = target.borrow().child(0).cloned().unwrap();
        assert!(!std::rc::Rc::ptr_eq(&added, &class));
        assert_eq!(added.borrow().revision(), &Revision::left());
    }

    #[test]
    fn test_add_is_idempotent() {
        let context = MergeContext::new();
        let source = tree("class C {\n}\n", Revision::left());
        let class = source.borrow().child(1).cloned().unwrap();
        let target = target_root();

        let op = Operation::Add {
            artifact: class,
            target: target.clone(),
        };
        op.apply(&context).unwrap();
        op.apply(&context).unwrap();

        assert_eq!(target.borrow().child_count(), 1);
    }

    #[test]
    fn test_delete_leaves_source_intact() {
        let context = MergeContext::new();
        let source = tree("class C { int x = 1; }", Revision::left());
        let class = source.borrow().child(1).cloned().unwrap();
        let field = class.borrow().child(0).cloned().unwrap();

        Operation::Delete {
            artifact: field.clone(),
        }
        .apply(&context)
        .unwrap();

        assert!(field.borrow().is_merged());
        // The source tree keeps its shape.
        assert_eq!(class.borrow().child_count(), 1);
    }

    #[test]
    fn test_conflict_splices_pseudo_node() {
        let context = MergeContext::new();
        let left = tree("class C { int x = 1; }", Revision::left());
        let right = tree("class C { int x = 2; }", Revision::right());
        let l_field = left.borrow().child(1).unwrap().borrow().child(0).cloned().unwrap();
        let r_field = right.borrow().child(1).unwrap().borrow().child(0).cloned().unwrap();
        let target = target_root();

        let op = Operation::Conflict {
            left: Some(l_field.clone()),
            right: Some(r_field),
            target_parent: target.clone(),
            left_name: "left".into(),
            right_name: "right".into(),
        };
        op.apply(&context).unwrap();
        // Re-applying is a no-op.
        op.apply(&context).unwrap();

        assert_eq!(target.borrow().child_count(), 1);
        let conflict = target.borrow().child(0).cloned().unwrap();
        assert!(conflict.borrow().is_conflict());

        let text = Artifact::pretty_print(&conflict).unwrap();
        assert!(text.contains("int x = 1;"));
        assert!(text.contains("int x = 2;"));
    }

    #[test]
    fn test_cancelled_context_aborts() {
        let context = MergeContext::new();
        context.cancel_token().cancel();
        let source = tree("class C {\n}\n", Revision::left());
        let op = Operation::Delete { artifact: source };
        assert!(op.apply(&context).is_err());
    }
}
