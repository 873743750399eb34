//! The artifact tree model.
//!
//! An [`Artifact`] wraps one grammar node and carries the merge metadata the
//! engine needs: the revision it came from, a stable pre-order number, match
//! links into the other revisions, a merged flag, and the conflict/choice
//! pseudo-node variants. Artifacts own their children; parents are reachable
//! through weak back-references only.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::matcher::matchings::Matching;
use crate::revision::Revision;
use crate::tree::GrammarNode;

/// Counter for numbering synthesized pseudo-nodes.
static VIRTUAL_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_virtual_number() -> u64 {
    VIRTUAL_COUNTER.fetch_add(1, Ordering::Relaxed)
}

bitflags! {
    /// Per-artifact status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// The artifact has been consumed by the merge and must not be
        /// processed again.
        const MERGED = 1;
        /// The artifact's number was drawn from the virtual counter rather
        /// than pre-order numbering.
        const VIRTUAL = 2;
    }
}

/// A reference-counted pointer to an artifact.
pub type ArtifactRef<T> = Rc<RefCell<Artifact<T>>>;

/// A weak reference to an artifact.
pub type WeakArtifactRef<T> = Weak<RefCell<Artifact<T>>>;

/// Pseudo-node data for conflicts and choices.
///
/// Plain artifacts carry neither; a conflict holds full clones of both
/// alternatives, a choice maps condition strings to variant subtrees.
#[derive(Debug)]
pub enum Variant<T: GrammarNode> {
    /// An ordinary artifact.
    Plain,
    /// A conflict pseudo-node. At least one alternative must be present.
    Conflict {
        left: Option<ArtifactRef<T>>,
        right: Option<ArtifactRef<T>>,
        left_name: String,
        right_name: String,
    },
    /// A choice pseudo-node gating variants by condition strings.
    Choice { variants: Vec<(String, ArtifactRef<T>)> },
}

/// A grammar node wrapped with merge metadata.
pub struct Artifact<T: GrammarNode> {
    /// Node-local grammar data; its own child list stays empty while the
    /// artifact tree owns the structure.
    node: T,
    revision: Revision,
    number: u64,
    parent: WeakArtifactRef<T>,
    children: Vec<ArtifactRef<T>>,
    /// Links to corresponding artifacts in other revisions, keyed by their
    /// revision.
    matches: FxHashMap<Revision, Matching<T>>,
    status: Status,
    variant: Variant<T>,
}

impl<T: GrammarNode> Artifact<T> {
    /// Builds an artifact tree from a parsed grammar tree and assigns
    /// pre-order numbers.
    ///
    /// With `semistructured` set, opaque regions are flattened to text
    /// leaves while the tree is taken apart.
    pub fn from_tree(node: T, revision: &Revision, semistructured: bool) -> ArtifactRef<T> {
        let root = Self::build(node, revision, semistructured);
        Self::renumber(&root);
        root
    }

    fn build(mut node: T, revision: &Revision, semistructured: bool) -> ArtifactRef<T> {
        if semistructured {
            node.flatten_opaque();
        }
        let child_nodes = node.take_children();

        let artifact = Rc::new(RefCell::new(Artifact {
            node,
            revision: revision.clone(),
            number: 0,
            parent: Weak::new(),
            children: Vec::new(),
            matches: FxHashMap::default(),
            status: Status::empty(),
            variant: Variant::Plain,
        }));

        for child_node in child_nodes {
            let child = Self::build(child_node, revision, semistructured);
            Self::add_child(&artifact, child);
        }

        artifact
    }

    /// Creates a childless artifact around a bare grammar node.
    pub fn new_virtual(node: T, revision: &Revision) -> ArtifactRef<T> {
        Rc::new(RefCell::new(Artifact {
            node,
            revision: revision.clone(),
            number: next_virtual_number(),
            parent: Weak::new(),
            children: Vec::new(),
            matches: FxHashMap::default(),
            status: Status::VIRTUAL,
            variant: Variant::Plain,
        }))
    }

    /// Returns the revision this artifact came from.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Returns the stable number of this artifact within its revision.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the `revision:number` identifier used in diagnostics.
    pub fn id(&self) -> String {
        format!("{}:{}", self.revision, self.number)
    }

    /// Returns a weak reference to the parent.
    pub fn parent(&self) -> &WeakArtifactRef<T> {
        &self.parent
    }

    /// Returns the children in declared order.
    pub fn children(&self) -> &[ArtifactRef<T>] {
        &self.children
    }

    /// Returns the child at `index`.
    pub fn child(&self, index: usize) -> Option<&ArtifactRef<T>> {
        self.children.get(index)
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns the wrapped grammar node.
    pub fn node(&self) -> &T {
        &self.node
    }

    /// Returns the wrapped grammar node mutably.
    pub fn node_mut(&mut self) -> &mut T {
        &mut self.node
    }

    /// Whether this artifact was already consumed by the merge.
    pub fn is_merged(&self) -> bool {
        self.status.contains(Status::MERGED)
    }

    /// Marks this artifact as consumed.
    pub fn set_merged(&mut self) {
        self.status |= Status::MERGED;
    }

    /// Whether this is a conflict pseudo-node.
    pub fn is_conflict(&self) -> bool {
        matches!(self.variant, Variant::Conflict { .. })
    }

    /// Whether this is a choice pseudo-node.
    pub fn is_choice(&self) -> bool {
        matches!(self.variant, Variant::Choice { .. })
    }

    /// Returns the pseudo-node variant.
    pub fn variant(&self) -> &Variant<T> {
        &self.variant
    }

    /// Whether a matching to the given revision exists.
    pub fn matched_in(&self, revision: &Revision) -> bool {
        self.matches.contains_key(revision)
    }

    /// Returns the matching to the given revision, if any.
    pub fn matching(&self, revision: &Revision) -> Option<&Matching<T>> {
        self.matches.get(revision)
    }

    /// Stores a matching link under the partner's revision.
    pub(crate) fn put_matching(&mut self, revision: Revision, matching: Matching<T>) {
        self.matches.insert(revision, matching);
    }

    /// Whether this artifact has no matching at all, i.e. it is a change
    /// introduced by its revision.
    pub fn is_change(&self) -> bool {
        self.matches.is_empty()
    }

    /// One-level structural equality against another artifact.
    pub fn matches_node(&self, other: &Artifact<T>) -> bool {
        self.node.matches(&other.node)
    }

    /// Whether the declared order of this artifact's children matters.
    pub fn is_ordered(&self) -> bool {
        self.node.is_ordered()
    }

    /// Whether siblings of this kind are matched by label.
    pub fn has_unique_labels(&self) -> bool {
        self.node.has_unique_labels()
    }

    /// The unique label of this artifact, if its kind has one.
    pub fn label(&self) -> Option<&str> {
        self.node.label()
    }

    /// The grammar-fixed child count of this kind, if any.
    pub fn fixed_arity(&self) -> Option<usize> {
        self.node.fixed_arity()
    }

    /// Whether the wrapped node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.node.is_leaf()
    }
}

/// Operations on artifact references.
impl<T: GrammarNode> Artifact<T> {
    /// Appends a child, rewiring its parent reference.
    pub fn add_child(parent: &ArtifactRef<T>, child: ArtifactRef<T>) {
        child.borrow_mut().parent = Rc::downgrade(parent);
        parent.borrow_mut().children.push(child);
    }

    /// Removes a child identified by pointer equality. Does nothing if the
    /// child is not present.
    pub fn remove_child(parent: &ArtifactRef<T>, child: &ArtifactRef<T>) {
        parent
            .borrow_mut()
            .children
            .retain(|c| !Rc::ptr_eq(c, child));
    }

    /// Assigns pre-order numbers starting at zero.
    pub fn renumber(root: &ArtifactRef<T>) {
        let mut counter = 0;
        Self::renumber_from(root, &mut counter);
    }

    fn renumber_from(artifact: &ArtifactRef<T>, counter: &mut u64) {
        {
            let mut borrowed = artifact.borrow_mut();
            borrowed.number = *counter;
            borrowed.status -= Status::VIRTUAL;
        }
        *counter += 1;
        let children: Vec<ArtifactRef<T>> = artifact.borrow().children.clone();
        for child in children {
            Self::renumber_from(&child, counter);
        }
    }

    /// Returns the number of nodes in this subtree.
    pub fn subtree_size(artifact: &ArtifactRef<T>) -> usize {
        let children: Vec<ArtifactRef<T>> = artifact.borrow().children.clone();
        1 + children.iter().map(Self::subtree_size).sum::<usize>()
    }

    /// Whether the subtree rooted here contains any change, i.e. any node
    /// without a matching.
    pub fn has_changes(artifact: &ArtifactRef<T>) -> bool {
        if artifact.borrow().is_change() {
            return true;
        }
        let children: Vec<ArtifactRef<T>> = artifact.borrow().children.clone();
        children.iter().any(Self::has_changes)
    }

    /// Deep-clones a subtree. The clone keeps revisions, numbers, node data
    /// and match links; parent wiring and merged flags are fresh.
    pub fn clone_tree(artifact: &ArtifactRef<T>) -> ArtifactRef<T> {
        let clone = {
            let borrowed = artifact.borrow();
            let variant = match &borrowed.variant {
                Variant::Plain => Variant::Plain,
                Variant::Conflict {
                    left,
                    right,
                    left_name,
                    right_name,
                } => Variant::Conflict {
                    left: left.as_ref().map(Self::clone_tree),
                    right: right.as_ref().map(Self::clone_tree),
                    left_name: left_name.clone(),
                    right_name: right_name.clone(),
                },
                Variant::Choice { variants } => Variant::Choice {
                    variants: variants
                        .iter()
                        .map(|(c, v)| (c.clone(), Self::clone_tree(v)))
                        .collect(),
                },
            };
            Rc::new(RefCell::new(Artifact {
                node: borrowed.node.clone(),
                revision: borrowed.revision.clone(),
                number: borrowed.number,
                parent: Weak::new(),
                children: Vec::new(),
                matches: borrowed.matches.clone(),
                status: borrowed.status & Status::VIRTUAL,
                variant,
            }))
        };

        let children: Vec<ArtifactRef<T>> = artifact.borrow().children.clone();
        for child in children {
            Self::add_child(&clone, Self::clone_tree(&child));
        }
        clone
    }

    /// Shallow-clones the node-local data into a fresh childless artifact,
    /// used to grow the target tree before recursing.
    pub fn shallow_clone(artifact: &ArtifactRef<T>) -> ArtifactRef<T> {
        let borrowed = artifact.borrow();
        Rc::new(RefCell::new(Artifact {
            node: borrowed.node.clone(),
            revision: borrowed.revision.clone(),
            number: borrowed.number,
            parent: Weak::new(),
            children: Vec::new(),
            matches: borrowed.matches.clone(),
            status: Status::empty(),
            variant: Variant::Plain,
        }))
    }

    /// Creates a conflict pseudo-node carrying clones of both alternatives.
    pub fn create_conflict(
        left: Option<&ArtifactRef<T>>,
        right: Option<&ArtifactRef<T>>,
        left_name: &str,
        right_name: &str,
    ) -> ArtifactRef<T> {
        let node = left
            .or(right)
            .map(|a| a.borrow().node.clone())
            .unwrap_or_else(T::empty);

        Rc::new(RefCell::new(Artifact {
            node,
            revision: Revision::conflict(),
            number: next_virtual_number(),
            parent: Weak::new(),
            children: Vec::new(),
            matches: FxHashMap::default(),
            status: Status::VIRTUAL,
            variant: Variant::Conflict {
                left: left.map(Self::clone_tree),
                right: right.map(Self::clone_tree),
                left_name: left_name.to_string(),
                right_name: right_name.to_string(),
            },
        }))
    }

    /// Creates a choice pseudo-node with a single condition-gated variant.
    pub fn create_choice(condition: &str, variant: &ArtifactRef<T>) -> ArtifactRef<T> {
        let node = variant.borrow().node.clone();
        Rc::new(RefCell::new(Artifact {
            node,
            revision: Revision::choice(),
            number: next_virtual_number(),
            parent: Weak::new(),
            children: Vec::new(),
            matches: FxHashMap::default(),
            status: Status::VIRTUAL,
            variant: Variant::Choice {
                variants: vec![(condition.to_string(), Self::clone_tree(variant))],
            },
        }))
    }

    /// Serializes this subtree to source text, rebuilding the grammar tree
    /// first.
    pub fn pretty_print(artifact: &ArtifactRef<T>) -> Result<String> {
        let rebuilt = Self::rebuild(artifact)?;
        Ok(rebuilt.pretty_print())
    }

    /// Rebuilds the grammar tree below this artifact: rewires grammar-node
    /// children to mirror the artifact children, attaches conflict/choice
    /// marker data for the printer, and validates grammar arity.
    pub fn rebuild(artifact: &ArtifactRef<T>) -> Result<T> {
        let borrowed = artifact.borrow();
        let mut node = borrowed.node.clone();

        match &borrowed.variant {
            Variant::Plain => {}
            Variant::Conflict {
                left,
                right,
                left_name,
                right_name,
            } => {
                if left.is_none() && right.is_none() {
                    return Err(Error::Reconstruction {
                        id: borrowed.id(),
                        message: "conflict node lost both alternatives".into(),
                    });
                }
                let left_node = left.as_ref().map(Self::rebuild).transpose()?;
                let right_node = right.as_ref().map(Self::rebuild).transpose()?;
                node.set_conflict(
                    left_node,
                    right_node,
                    left_name.clone(),
                    right_name.clone(),
                );
            }
            Variant::Choice { variants } => {
                let mut rebuilt = Vec::with_capacity(variants.len());
                for (condition, variant) in variants {
                    rebuilt.push((condition.clone(), Self::rebuild(variant)?));
                }
                node.set_choice(rebuilt);
            }
        }

        let mut child_nodes = Vec::with_capacity(borrowed.children.len());
        for child in &borrowed.children {
            child_nodes.push(Self::rebuild(child)?);
        }

        if !borrowed.is_conflict() && !node.is_leaf() {
            if let Some(arity) = node.fixed_arity() {
                if child_nodes.len() != arity {
                    return Err(Error::Reconstruction {
                        id: borrowed.id(),
                        message: format!(
                            "{} expects {} children, found {}",
                            node.kind_name(),
                            arity,
                            child_nodes.len()
                        ),
                    });
                }
            }
        }

        node.set_children(child_nodes);
        Ok(node)
    }
}

impl<T: GrammarNode> fmt::Debug for Artifact<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id())
            .field("kind", &self.node.kind_name())
            .field("children", &self.children.len())
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_str;

    fn left_tree(source: &str) -> ArtifactRef<crate::lang::JavaNode> {
        Artifact::from_tree(parse_str(source).unwrap(), &Revision::left(), false)
    }

    fn collect_numbers<T: GrammarNode>(root: &ArtifactRef<T>, out: &mut Vec<u64>) {
        out.push(root.borrow().number());
        for child in root.borrow().children() {
            collect_numbers(child, out);
        }
    }

    #[test]
    fn test_preorder_numbering() {
        let root = left_tree("class C { int f() { return 1; } int g() { return 2; } }");
        let mut numbers = Vec::new();
        collect_numbers(&root, &mut numbers);
        let expected: Vec<u64> = (0..numbers.len() as u64).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn test_parent_links() {
        let root = left_tree("class C { int x = 1; }");
        let class = root.borrow().child(1).cloned().unwrap();
        let field = class.borrow().child(0).cloned().unwrap();

        let parent = field.borrow().parent().upgrade().unwrap();
        assert!(Rc::ptr_eq(&parent, &class));
        assert!(root.borrow().parent().upgrade().is_none());
    }

    #[test]
    fn test_roundtrip_print() {
        let source = "\
package demo;

class C {
    int x = 1;
}
";
        let canonical = "\
package demo;

class C {
    int x = 1;
}
";
        let root = left_tree(source);
        assert_eq!(Artifact::pretty_print(&root).unwrap(), canonical);
    }

    #[test]
    fn test_semistructured_flattening() {
        let root = Artifact::from_tree(
            parse_str("class C { int f() { return 1; } }").unwrap(),
            &Revision::left(),
            true,
        );
        let class = root.borrow().child(1).cloned().unwrap();
        let method = class.borrow().child(0).cloned().unwrap();
        let block = method.borrow().child(0).cloned().unwrap();

        assert!(block.borrow().is_leaf());
        assert_eq!(block.borrow().node().content(), Some("return 1;\n"));
        assert_eq!(block.borrow().child_count(), 0);
    }

    #[test]
    fn test_clone_tree_is_deep() {
        let root = left_tree("class C { int x = 1; }");
        let clone = Artifact::clone_tree(&root);

        assert_eq!(Artifact::subtree_size(&root), Artifact::subtree_size(&clone));
        assert_eq!(root.borrow().number(), clone.borrow().number());
        assert!(!Rc::ptr_eq(
            root.borrow().child(0).unwrap(),
            clone.borrow().child(0).unwrap()
        ));
    }

    #[test]
    fn test_conflict_creation_and_print() {
        let left = left_tree("class C { int x = 1; }");
        let right = Artifact::from_tree(
            parse_str("class C { int x = 2; }").unwrap(),
            &Revision::right(),
            false,
        );

        let conflict = Artifact::<crate::lang::JavaNode>::create_conflict(
            Some(&left.borrow().child(1).cloned().unwrap()),
            Some(&right.borrow().child(1).cloned().unwrap()),
            "left",
            "right",
        );

        assert!(conflict.borrow().is_conflict());
        assert_eq!(conflict.borrow().revision(), &Revision::conflict());

        let text = Artifact::pretty_print(&conflict).unwrap();
        assert!(text.starts_with("<<<<<<< left\n"));
        assert!(text.contains("=======\n"));
        assert!(text.ends_with(">>>>>>> right\n"));
    }

    #[test]
    fn test_conflict_without_alternatives_fails_rebuild() {
        let lone = left_tree("class C {\n}\n");
        let conflict = Artifact::<crate::lang::JavaNode>::create_conflict(
            Some(&lone),
            None,
            "left",
            "right",
        );
        if let Variant::Conflict { left, .. } = &mut conflict.borrow_mut().variant {
            *left = None;
        }

        assert!(matches!(
            Artifact::pretty_print(&conflict),
            Err(Error::Reconstruction { .. })
        ));
    }

    #[test]
    fn test_fixed_arity_violation_detected() {
        let root = left_tree("class C { void f() { x = y; } }");
        let class = root.borrow().child(1).cloned().unwrap();
        let method = class.borrow().child(0).cloned().unwrap();
        let block = method.borrow().child(0).cloned().unwrap();
        let assign = block.borrow().child(0).cloned().unwrap();

        // Drop the value operand of the fixed-arity assignment.
        let victim = assign.borrow().child(0).cloned().unwrap();
        Artifact::remove_child(&assign, &victim);

        assert!(matches!(
            Artifact::pretty_print(&root),
            Err(Error::Reconstruction { .. })
        ));
    }

    #[test]
    fn test_choice_creation_and_print() {
        let variant = left_tree("class C {\n    int x = 1;\n}\n");
        let class = variant.borrow().child(1).cloned().unwrap();

        let choice = Artifact::<crate::lang::JavaNode>::create_choice("FEATURE_X", &class);
        assert!(choice.borrow().is_choice());
        assert_eq!(choice.borrow().revision(), &Revision::choice());

        let text = Artifact::pretty_print(&choice).unwrap();
        assert_eq!(
            text,
            "//#if FEATURE_X\nclass C {\n    int x = 1;\n}\n//#endif\n"
        );
    }

    #[test]
    fn test_merged_flag() {
        let root = left_tree("class C {\n}\n");
        assert!(!root.borrow().is_merged());
        root.borrow_mut().set_merged();
        assert!(root.borrow().is_merged());
    }
}
