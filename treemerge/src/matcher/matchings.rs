//! Cross-revision match links.
//!
//! A [`Matching`] is one scored correspondence between two artifacts of
//! different revisions; a [`Matchings`] is the set a matcher produces for a
//! scenario. Links hold weak references only; ownership stays with the
//! trees. The set keeps per-side indexes so image lookups are O(1).

use rustc_hash::FxHashMap;

use crate::artifact::{ArtifactRef, WeakArtifactRef};
use crate::tree::GrammarNode;

/// A single scored correspondence between two artifacts.
#[derive(Debug)]
pub struct Matching<T: GrammarNode> {
    left: WeakArtifactRef<T>,
    right: WeakArtifactRef<T>,
    score: usize,
}

impl<T: GrammarNode> Clone for Matching<T> {
    fn clone(&self) -> Self {
        Matching {
            left: self.left.clone(),
            right: self.right.clone(),
            score: self.score,
        }
    }
}

impl<T: GrammarNode> Matching<T> {
    /// Creates a link between two artifacts with the given score.
    pub fn new(left: &ArtifactRef<T>, right: &ArtifactRef<T>, score: usize) -> Self {
        Matching {
            left: std::rc::Rc::downgrade(left),
            right: std::rc::Rc::downgrade(right),
            score,
        }
    }

    /// Returns the match score.
    pub fn score(&self) -> usize {
        self.score
    }

    /// Returns the left endpoint, if still alive.
    pub fn left(&self) -> Option<ArtifactRef<T>> {
        self.left.upgrade()
    }

    /// Returns the right endpoint, if still alive.
    pub fn right(&self) -> Option<ArtifactRef<T>> {
        self.right.upgrade()
    }

    /// Returns the endpoint opposite to `artifact`, or `None` if `artifact`
    /// is not part of this link.
    pub fn partner_of(&self, artifact: &ArtifactRef<T>) -> Option<ArtifactRef<T>> {
        if let Some(left) = self.left.upgrade() {
            if std::rc::Rc::ptr_eq(&left, artifact) {
                return self.right.upgrade();
            }
        }
        if let Some(right) = self.right.upgrade() {
            if std::rc::Rc::ptr_eq(&right, artifact) {
                return self.left.upgrade();
            }
        }
        None
    }
}

/// The set of match links produced for one matched tree pair.
#[derive(Debug)]
pub struct Matchings<T: GrammarNode> {
    links: Vec<Matching<T>>,
    by_left: FxHashMap<u64, usize>,
    by_right: FxHashMap<u64, usize>,
}

impl<T: GrammarNode> Clone for Matchings<T> {
    fn clone(&self) -> Self {
        Matchings {
            links: self.links.clone(),
            by_left: self.by_left.clone(),
            by_right: self.by_right.clone(),
        }
    }
}

impl<T: GrammarNode> Default for Matchings<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GrammarNode> Matchings<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Matchings {
            links: Vec::new(),
            by_left: FxHashMap::default(),
            by_right: FxHashMap::default(),
        }
    }

    /// Adds a link. Each artifact may appear in at most one link per set;
    /// a link whose endpoint is already used is ignored.
    pub fn add(&mut self, matching: Matching<T>) {
        let (left, right) = match (matching.left(), matching.right()) {
            (Some(l), Some(r)) => (l, r),
            _ => return,
        };
        let left_number = left.borrow().number();
        let right_number = right.borrow().number();

        if self.by_left.contains_key(&left_number) || self.by_right.contains_key(&right_number) {
            return;
        }

        self.by_left.insert(left_number, self.links.len());
        self.by_right.insert(right_number, self.links.len());
        self.links.push(matching);
    }

    /// Moves all links of `other` into this set.
    pub fn extend(&mut self, other: Matchings<T>) {
        for link in other.links {
            self.add(link);
        }
    }

    /// Returns the link whose left endpoint has the given number.
    pub fn by_left(&self, number: u64) -> Option<&Matching<T>> {
        self.by_left.get(&number).map(|&i| &self.links[i])
    }

    /// Returns the link whose right endpoint has the given number.
    pub fn by_right(&self, number: u64) -> Option<&Matching<T>> {
        self.by_right.get(&number).map(|&i| &self.links[i])
    }

    /// Returns the right image of the left artifact with the given number.
    pub fn image_of_left(&self, number: u64) -> Option<ArtifactRef<T>> {
        self.by_left(number).and_then(|m| m.right())
    }

    /// Returns the left image of the right artifact with the given number.
    pub fn image_of_right(&self, number: u64) -> Option<ArtifactRef<T>> {
        self.by_right(number).and_then(|m| m.left())
    }

    /// Returns the number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterates over the links.
    pub fn iter(&self) -> impl Iterator<Item = &Matching<T>> {
        self.links.iter()
    }

    /// The sum of all link scores.
    pub fn total_score(&self) -> usize {
        self.links.iter().map(|m| m.score).sum()
    }

    /// Writes every link into both endpoints, keyed by the partner's
    /// revision, establishing the symmetric match relation on the trees.
    pub fn store(&self) {
        for link in &self.links {
            let (left, right) = match (link.left(), link.right()) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };
            let left_revision = left.borrow().revision().clone();
            let right_revision = right.borrow().revision().clone();
            left.borrow_mut().put_matching(right_revision, link.clone());
            right.borrow_mut().put_matching(left_revision, link.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::lang::parse_str;
    use crate::revision::Revision;

    fn tree(source: &str, revision: Revision) -> ArtifactRef<crate::lang::JavaNode> {
        Artifact::from_tree(parse_str(source).unwrap(), &revision, false)
    }

    #[test]
    fn test_symmetric_store() {
        let left = tree("class C {\n}\n", Revision::left());
        let right = tree("class C {\n}\n", Revision::right());

        let mut matchings = Matchings::new();
        matchings.add(Matching::new(&left, &right, 3));
        matchings.store();

        let l = left.borrow();
        let r = right.borrow();
        let to_right = l.matching(&Revision::right()).unwrap();
        let to_left = r.matching(&Revision::left()).unwrap();
        assert_eq!(to_right.score(), 3);
        assert_eq!(to_left.score(), 3);
        assert!(std::rc::Rc::ptr_eq(&to_right.right().unwrap(), &right));
        assert!(std::rc::Rc::ptr_eq(&to_left.left().unwrap(), &left));
    }

    #[test]
    fn test_one_link_per_node() {
        let left = tree("class C {\n}\n", Revision::left());
        let right_a = tree("class C {\n}\n", Revision::right());
        let right_b = tree("class D {\n}\n", Revision::right());

        let mut matchings = Matchings::new();
        matchings.add(Matching::new(&left, &right_a, 2));
        matchings.add(Matching::new(&left, &right_b, 9));
        assert_eq!(matchings.len(), 1);
        assert_eq!(matchings.total_score(), 2);
    }

    #[test]
    fn test_partner_lookup() {
        let left = tree("class C {\n}\n", Revision::left());
        let right = tree("class C {\n}\n", Revision::right());
        let stranger = tree("class E {\n}\n", Revision::base());

        let link = Matching::new(&left, &right, 1);
        assert!(std::rc::Rc::ptr_eq(&link.partner_of(&left).unwrap(), &right));
        assert!(std::rc::Rc::ptr_eq(&link.partner_of(&right).unwrap(), &left));
        assert!(link.partner_of(&stranger).is_none());
    }
}
