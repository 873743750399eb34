//! End-to-end merge scenarios.
//!
//! Test cases live under `testfiles/` with one subdirectory per revision
//! (`left/`, `base/`, `right/`) and one per strategy holding the expected
//! output. Every scenario runs under every configured strategy and must
//! reproduce its reference file byte for byte.

use std::fs;
use std::path::{Path, PathBuf};

use treemerge::{merge_files, MergeContext, StrategyKind};

const STRATEGIES: &[StrategyKind] = &[
    StrategyKind::Linebased,
    StrategyKind::Structured,
    StrategyKind::Combined,
];

fn testfiles() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testfiles")
}

fn run_merge(filepath: &str) {
    let root = testfiles();
    let left = root.join("left").join(filepath);
    let base = root.join("base").join(filepath);
    let right = root.join("right").join(filepath);

    for strategy in STRATEGIES {
        let context = MergeContext::with_strategy(*strategy);
        let outcome = merge_files(&context, &left, Some(&base), &right)
            .unwrap_or_else(|e| panic!("{strategy} strategy failed on {filepath}: {e}"));

        let expected_path = root.join(strategy.name()).join(filepath);
        let expected = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("missing reference {}: {e}", expected_path.display()));

        assert_eq!(
            outcome.text, expected,
            "strategy {strategy} produced unexpected output for {filepath}"
        );
    }
}

#[test]
fn test_bag() {
    run_merge("SimpleTests/Bag/Bag.java");
}

#[test]
fn test_bag2() {
    run_merge("SimpleTests/Bag/Bag2.java");
}

#[test]
fn test_bag3() {
    run_merge("SimpleTests/Bag/Bag3.java");
}

#[test]
fn test_import_mess() {
    run_merge("SimpleTests/ImportMess.java");
}

#[test]
fn test_expr_test() {
    run_merge("SimpleTests/ExprTest.java");
}

#[test]
fn test_repeated_runs_are_byte_identical() {
    let root = testfiles();
    let left = root.join("left/SimpleTests/Bag/Bag.java");
    let base = root.join("base/SimpleTests/Bag/Bag.java");
    let right = root.join("right/SimpleTests/Bag/Bag.java");

    for strategy in STRATEGIES {
        let context = MergeContext::with_strategy(*strategy);
        let first = merge_files(&context, &left, Some(&base), &right).unwrap();
        let second = merge_files(&context, &left, Some(&base), &right).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.conflicts, second.conflicts);
    }
}

#[test]
fn test_empty_sides() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.java");
    fs::write(&empty, "").unwrap();
    let full = dir.path().join("full.java");
    let source = "class C {\n    int x = 1;\n}\n";
    fs::write(&full, source).unwrap();

    let context = MergeContext::new();

    // Only the right side has content: the merge is exactly that content.
    let outcome = merge_files(&context, &empty, Some(&empty), &full).unwrap();
    assert_eq!(outcome.text, source);
    assert_eq!(outcome.conflicts, 0);

    // All sides empty: empty output.
    let outcome = merge_files(&context, &empty, Some(&empty), &empty).unwrap();
    assert_eq!(outcome.text, "");
    assert_eq!(outcome.conflicts, 0);
}

#[test]
fn test_semistructured_matches_structured_on_bag() {
    let root = testfiles();
    let left = root.join("left/SimpleTests/Bag/Bag.java");
    let base = root.join("base/SimpleTests/Bag/Bag.java");
    let right = root.join("right/SimpleTests/Bag/Bag.java");

    let context = MergeContext::with_strategy(StrategyKind::Semistructured);
    let outcome = merge_files(&context, &left, Some(&base), &right).unwrap();
    let expected =
        fs::read_to_string(root.join("structured/SimpleTests/Bag/Bag.java")).unwrap();
    assert_eq!(outcome.text, expected);
}

#[test]
fn test_semistructured_merges_method_bodies_linewise() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| {
        let path = dir.path().join(name);
        let text = format!("class C {{\n    void f() {{\n{}    }}\n}}\n", body);
        fs::write(&path, text).unwrap();
        path
    };

    let base = write("base.java", "        a = 1;\n        b = 2;\n");
    let left = write("left.java", "        a = 9;\n        b = 2;\n");
    let right = write("right.java", "        a = 1;\n        b = 8;\n");

    let context = MergeContext::with_strategy(StrategyKind::Semistructured);
    let outcome = merge_files(&context, &left, Some(&base), &right).unwrap();

    assert_eq!(outcome.conflicts, 0);
    assert_eq!(
        outcome.text,
        "class C {\n    void f() {\n        a = 9;\n        b = 8;\n    }\n}\n"
    );
}

#[test]
fn test_target_numbering_is_preorder() {
    use treemerge::{Artifact, ArtifactRef, GrammarNode, Revision};

    fn collect<T: GrammarNode>(node: &ArtifactRef<T>, out: &mut Vec<u64>) {
        out.push(node.borrow().number());
        for child in node.borrow().children() {
            collect(child, out);
        }
    }

    let source = "class C {\n    int x = 1;\n\n    int f() {\n        return x;\n    }\n}\n";
    let tree = Artifact::from_tree(
        treemerge::lang::parse_str(source).unwrap(),
        &Revision::left(),
        false,
    );

    let mut numbers = Vec::new();
    collect(&tree, &mut numbers);
    let expected: Vec<u64> = (0..numbers.len() as u64).collect();
    assert_eq!(numbers, expected);
}
