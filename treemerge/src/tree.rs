//! The grammar-node interface.
//!
//! The merge engine is generic over the concrete syntax tree it operates on.
//! A tree library plugs in by implementing [`GrammarNode`] for its node type;
//! the engine relies on nothing else. The capability set mirrors what the
//! matcher and merge engines actually consume: one-level structural equality,
//! child-ordering semantics, unique-label detection, grammar arity, opaque
//! leaf content, child rewiring, and pretty-printing with conflict/choice
//! marker support.

/// A node of a concrete syntax tree.
///
/// Implementations own their children; the artifact layer detaches them on
/// construction and reattaches a rewritten child list before printing. All
/// methods must be deterministic: the engine's output is required to be
/// byte-identical across runs for identical inputs.
pub trait GrammarNode: Clone + std::fmt::Debug {
    /// A short name of this node's grammar kind, used in diagnostics.
    fn kind_name(&self) -> &str;

    /// Structural equality at this level only, ignoring children.
    ///
    /// Nodes with unique labels compare by the label's textual form; opaque
    /// leaves compare by content; everything else compares by kind and the
    /// node-local data the grammar considers identifying (operator, name,
    /// signature).
    fn matches(&self, other: &Self) -> bool;

    /// Whether the declared order of this node's children is semantically
    /// significant.
    fn is_ordered(&self) -> bool;

    /// Whether two sibling nodes of this kind can never collide and must be
    /// matched by label.
    fn has_unique_labels(&self) -> bool;

    /// The textual label of a unique-label node, if any.
    fn label(&self) -> Option<&str>;

    /// The child count this node kind is fixed to by the grammar, if any.
    fn fixed_arity(&self) -> Option<usize>;

    /// Whether this node is a leaf. Opaque-content nodes report true even if
    /// their kind ordinarily has children.
    fn is_leaf(&self) -> bool;

    /// The opaque text content of a leaf, if set.
    fn content(&self) -> Option<&str>;

    /// Sets the opaque text content, turning this node into a leaf.
    fn set_content(&mut self, text: String);

    /// Returns the children in declared order.
    fn children(&self) -> &[Self];

    /// Removes and returns the children, leaving this node childless.
    fn take_children(&mut self) -> Vec<Self>;

    /// Replaces the children.
    fn set_children(&mut self, children: Vec<Self>);

    /// Creates an empty placeholder node.
    fn empty() -> Self;

    /// Serializes this subtree to source text.
    ///
    /// Conflict and choice data previously attached via [`set_conflict`] and
    /// [`set_choice`] must be rendered as marker lines.
    ///
    /// [`set_conflict`]: GrammarNode::set_conflict
    /// [`set_choice`]: GrammarNode::set_choice
    fn pretty_print(&self) -> String;

    /// Attaches conflict alternatives for the printer. An absent side is
    /// rendered as an empty alternative.
    fn set_conflict(
        &mut self,
        left: Option<Self>,
        right: Option<Self>,
        left_name: String,
        right_name: String,
    );

    /// Attaches condition-gated variants for the printer.
    fn set_choice(&mut self, variants: Vec<(String, Self)>);

    /// Collapses the opaque region of this node for semistructured merging:
    /// grammars serialize the bodies below method-like nodes into the body's
    /// content slot and strip its children. A no-op for other kinds.
    fn flatten_opaque(&mut self);
}
