//! The structured merge strategy.
//!
//! Parses the three revisions, builds artifact trees, matches every
//! revision pair, runs the recursive merge into a fresh target tree, and
//! prints the result canonically. The semistructured variant reuses this
//! driver with opaque method bodies enabled through the context.

use std::path::Path;

use tracing::debug;

use super::MergeOutcome;
use crate::artifact::{Artifact, ArtifactRef};
use crate::context::MergeContext;
use crate::error::{Error, Result};
use crate::lang::{parse_file, JavaNode};
use crate::matcher::{self, TreeMatcher as _};
use crate::operations::Operation;
use crate::revision::Revision;
use crate::scenario::{MergeScenario, MergeType};
use crate::tree::GrammarNode;

/// Merges three files structurally.
pub fn merge_files(
    context: &MergeContext,
    left: &Path,
    base: Option<&Path>,
    right: &Path,
) -> Result<MergeOutcome> {
    if context.is_semistructured() && base.is_none() {
        return Err(Error::UnsupportedMergeType {
            strategy: "semistructured",
            mtype: MergeType::TwoWay,
        });
    }

    let semistructured = context.is_semistructured();
    let left_tree = Artifact::from_tree(parse_file(left)?, &Revision::left(), semistructured);
    let right_tree = Artifact::from_tree(parse_file(right)?, &Revision::right(), semistructured);
    let base_tree = base
        .map(|path| parse_file(path))
        .transpose()?
        .map(|node| Artifact::from_tree(node, &Revision::base(), semistructured));

    merge_artifacts(context, &left_tree, base_tree.as_ref(), &right_tree)
}

/// Merges three artifact trees.
pub fn merge_artifacts<T: GrammarNode>(
    context: &MergeContext,
    left: &ArtifactRef<T>,
    base: Option<&ArtifactRef<T>>,
    right: &ArtifactRef<T>,
) -> Result<MergeOutcome> {
    let mut matcher = matcher::for_context::<T>(context);
    if let Some(base) = base {
        matcher.match_trees(context, left, base)?.store();
        matcher.match_trees(context, right, base)?.store();
    }
    matcher.match_trees(context, left, right)?.store();

    let target = Artifact::new_virtual(left.borrow().node().clone(), &Revision::target());
    let scenario = match base {
        Some(base) => MergeScenario::three_way(left.clone(), base.clone(), right.clone()),
        None => MergeScenario::two_way(left.clone(), right.clone()),
    };

    Operation::Merge {
        scenario,
        target: target.clone(),
    }
    .apply(context)?;

    Artifact::renumber(&target);
    let conflicts = count_conflicts(&target);
    let text = Artifact::pretty_print(&target)?;

    debug!(conflicts, "structured merge done");
    Ok(MergeOutcome { text, conflicts })
}

/// Counts conflict pseudo-nodes in a tree.
fn count_conflicts<T: GrammarNode>(root: &ArtifactRef<T>) -> usize {
    let mut count = usize::from(root.borrow().is_conflict());
    let children: Vec<ArtifactRef<T>> = root.borrow().children().to_vec();
    for child in &children {
        count += count_conflicts(child);
    }
    count
}

/// Convenience wrapper for merging three source strings; used by tests.
pub fn merge_sources(
    context: &MergeContext,
    left: &str,
    base: Option<&str>,
    right: &str,
) -> Result<MergeOutcome> {
    use crate::lang::parse_str;

    let semistructured = context.is_semistructured();
    let left_tree: ArtifactRef<JavaNode> =
        Artifact::from_tree(parse_str(left)?, &Revision::left(), semistructured);
    let right_tree = Artifact::from_tree(parse_str(right)?, &Revision::right(), semistructured);
    let base_tree = base
        .map(parse_str)
        .transpose()?
        .map(|node| Artifact::from_tree(node, &Revision::base(), semistructured));

    merge_artifacts(context, &left_tree, base_tree.as_ref(), &right_tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StrategyKind;

    fn merge3(left: &str, base: &str, right: &str) -> MergeOutcome {
        let context = MergeContext::new();
        merge_sources(&context, left, Some(base), right).unwrap()
    }

    #[test]
    fn test_idempotent_merge() {
        let source = "\
package demo;

class C {
    int x = 1;

    int f() {
        return x;
    }
}
";
        let outcome = merge3(source, source, source);
        assert_eq!(outcome.text, source);
        assert_eq!(outcome.conflicts, 0);
    }

    #[test]
    fn test_unchanged_side_passthrough() {
        let base = "class C {\n    int x = 1;\n}\n";
        let changed = "class C {\n    int x = 2;\n}\n";

        let left_changed = merge3(changed, base, base);
        assert_eq!(left_changed.text, changed);
        assert_eq!(left_changed.conflicts, 0);

        let right_changed = merge3(base, base, changed);
        assert_eq!(right_changed.text, changed);
        assert_eq!(right_changed.conflicts, 0);
    }

    #[test]
    fn test_two_way_merge_of_identical_sides() {
        let context = MergeContext::new();
        let source = "class C {\n    int x = 1;\n}\n";
        let outcome = merge_sources(&context, source, None, source).unwrap();
        assert_eq!(outcome.text, source);
        assert_eq!(outcome.conflicts, 0);
    }

    #[test]
    fn test_conflict_is_counted() {
        let base = "class C {\n    int f() {\n        return 1;\n    }\n}\n";
        let left = "class C {\n}\n";
        let right = "class C {\n    int f() {\n        return 2;\n    }\n}\n";

        let outcome = merge3(left, base, right);
        assert_eq!(outcome.conflicts, 1);
        assert!(outcome.text.contains("<<<<<<< left"));
    }

    #[test]
    fn test_semistructured_requires_base() {
        let context = MergeContext::with_strategy(StrategyKind::Semistructured);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("C.java");
        std::fs::write(&path, "class C {\n}\n").unwrap();

        let result = merge_files(&context, &path, None, &path);
        assert!(matches!(
            result,
            Err(Error::UnsupportedMergeType { .. })
        ));
    }

    #[test]
    fn test_symmetry_of_swapped_sides() {
        let base = "class C {\n    int f() {\n        return 0;\n    }\n}\n";
        let x = "class C {\n    int f() {\n        return 1;\n    }\n}\n";
        let y = "class C {\n    int f() {\n        return 2;\n    }\n}\n";

        let forward = merge3(x, base, y);
        let backward = merge3(y, base, x);

        // Equal up to the order of the conflict alternatives.
        assert_eq!(forward.conflicts, backward.conflicts);
        assert!(forward
            .text
            .contains("<<<<<<< left\n1\n=======\n2\n>>>>>>> right"));
        assert!(backward
            .text
            .contains("<<<<<<< left\n2\n=======\n1\n>>>>>>> right"));
    }
}
