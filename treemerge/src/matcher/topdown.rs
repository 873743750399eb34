//! Top-down isomorphic subtree detection.
//!
//! Before the bottom-up pass runs, every subtree is fingerprinted with a
//! structural digest: the MD5 of the node's one-level identity and its
//! children's digests. Two subtrees with equal digests are isomorphic, so
//! the matcher can link all their node pairs in one walk instead of
//! re-scoring them pair by pair. This is the fast path that covers the
//! unchanged regions of a file.

use md5::{Digest as _, Md5};
use rustc_hash::FxHashMap;

use crate::artifact::ArtifactRef;
use crate::tree::GrammarNode;

/// A structural subtree digest.
pub type TreeDigest = [u8; 16];

/// Digests of every subtree of one artifact tree, keyed by artifact number.
pub struct DigestTable {
    digests: FxHashMap<u64, TreeDigest>,
}

impl DigestTable {
    /// Computes digests for all subtrees below `root`.
    pub fn compute<T: GrammarNode>(root: &ArtifactRef<T>) -> Self {
        let mut table = DigestTable {
            digests: FxHashMap::default(),
        };
        table.digest_subtree(root);
        table
    }

    /// Returns the digest of the subtree rooted at the artifact with the
    /// given number.
    pub fn get(&self, number: u64) -> Option<&TreeDigest> {
        self.digests.get(&number)
    }

    fn digest_subtree<T: GrammarNode>(&mut self, artifact: &ArtifactRef<T>) -> TreeDigest {
        let mut hasher = Md5::new();
        hasher.update(fingerprint(artifact).as_bytes());

        let children: Vec<ArtifactRef<T>> = artifact.borrow().children().to_vec();
        for child in &children {
            let child_digest = self.digest_subtree(child);
            hasher.update(child_digest);
        }

        let digest: TreeDigest = hasher.finalize().into();
        self.digests.insert(artifact.borrow().number(), digest);
        digest
    }
}

/// The one-level identity of a node: its kind plus all node-local data.
///
/// Equal fingerprints imply [`GrammarNode::matches`]; the converse need not
/// hold, which only costs the fast path, never correctness.
fn fingerprint<T: GrammarNode>(artifact: &ArtifactRef<T>) -> String {
    format!("{:?}", artifact.borrow().node())
}

/// Links every node pair of two isomorphic subtrees, scoring each pair with
/// its own subtree size. Returns the size of the walked subtree.
pub fn link_isomorphic<T: GrammarNode>(
    left: &ArtifactRef<T>,
    right: &ArtifactRef<T>,
    out: &mut super::Matchings<T>,
) -> usize {
    let left_children: Vec<ArtifactRef<T>> = left.borrow().children().to_vec();
    let right_children: Vec<ArtifactRef<T>> = right.borrow().children().to_vec();
    debug_assert_eq!(left_children.len(), right_children.len());

    let mut size = 1;
    for (lc, rc) in left_children.iter().zip(right_children.iter()) {
        size += link_isomorphic(lc, rc, out);
    }

    out.add(super::Matching::new(left, right, size));
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::lang::parse_str;
    use crate::matcher::Matchings;
    use crate::revision::Revision;

    fn tree(source: &str, revision: Revision) -> ArtifactRef<crate::lang::JavaNode> {
        Artifact::from_tree(parse_str(source).unwrap(), &revision, false)
    }

    #[test]
    fn test_equal_trees_equal_digests() {
        let a = tree("class C { int x = 1; }", Revision::left());
        let b = tree("class C { int x = 1; }", Revision::right());

        let da = DigestTable::compute(&a);
        let db = DigestTable::compute(&b);
        assert_eq!(da.get(0), db.get(0));
    }

    #[test]
    fn test_content_changes_digest() {
        let a = tree("class C { int x = 1; }", Revision::left());
        let b = tree("class C { int x = 2; }", Revision::right());

        let da = DigestTable::compute(&a);
        let db = DigestTable::compute(&b);
        assert_ne!(da.get(0), db.get(0));
    }

    #[test]
    fn test_structure_changes_digest() {
        let a = tree("class C { void f() { return; } }", Revision::left());
        let b = tree("class C { void f() { return; return; } }", Revision::right());

        let da = DigestTable::compute(&a);
        let db = DigestTable::compute(&b);
        assert_ne!(da.get(0), db.get(0));
    }

    #[test]
    fn test_link_isomorphic_links_all_pairs() {
        let a = tree("class C { int f() { return 1; } }", Revision::left());
        let b = tree("class C { int f() { return 1; } }", Revision::right());

        let mut matchings = Matchings::new();
        let size = link_isomorphic(&a, &b, &mut matchings);

        assert_eq!(size, Artifact::subtree_size(&a));
        assert_eq!(matchings.len(), size);
        // The root pair carries the full subtree size as its score.
        let root_link = matchings.by_left(0).unwrap();
        assert_eq!(root_link.score(), size);
    }
}
