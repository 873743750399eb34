//! Minimal library usage: merge three in-memory revisions structurally.
//!
//! Run with: cargo run --example merge

use treemerge::strategy::structured::merge_sources;
use treemerge::MergeContext;

fn main() -> treemerge::Result<()> {
    let base = "\
class Counter {
    int n = 0;

    int get() {
        return n;
    }
}
";

    // Left adds a method, right changes the getter body.
    let left = "\
class Counter {
    int n = 0;

    int get() {
        return n;
    }

    void reset() {
        n = 0;
    }
}
";
    let right = "\
class Counter {
    int n = 0;

    int get() {
        return n + 0;
    }
}
";

    let context = MergeContext::new();
    let outcome = merge_sources(&context, left, Some(base), right)?;

    print!("{}", outcome.text);
    eprintln!("{} conflicts", outcome.conflicts);
    Ok(())
}
