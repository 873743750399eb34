//! Node kinds of the demo grammar and their [`GrammarNode`] implementation.
//!
//! [`GrammarNode`]: crate::tree::GrammarNode

use crate::lang::printer;
use crate::tree::GrammarNode;

/// Grammar kind of a [`JavaNode`] with its node-local data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaKind {
    /// Root of a parsed file.
    CompilationUnit,
    /// `package a.b.c;`
    Package {
        /// Qualified package name.
        name: String,
    },
    /// Container of all import declarations. Unordered.
    ImportSection,
    /// `import a.b.C;`: unique label, no children.
    Import {
        /// Qualified import path.
        path: String,
    },
    /// A class declaration; children are the member set. Unordered.
    Class {
        /// Declared class name.
        name: String,
        /// Canonical header text, e.g. `public class Bag extends Collection`.
        header: String,
    },
    /// A field declaration, kept as canonical declaration text.
    Field {
        /// Full declaration including the trailing semicolon.
        decl: String,
    },
    /// A method or constructor declaration; single child is the body block.
    Method {
        /// Canonical signature text, e.g. `public void add(int e)`.
        signature: String,
    },
    /// A statement block. Ordered.
    Block,
    /// `return;` or `return expr;`
    Return,
    /// `lhs = expr;` with fixed arity 1 (the assigned value).
    Assign {
        /// Assignment target, possibly a qualified name.
        lhs: String,
    },
    /// `ty name = expr;` with fixed arity 1 (the initializer).
    VarDecl {
        /// Declared type.
        ty: String,
        /// Declared variable name.
        name: String,
    },
    /// An expression evaluated for effect. Fixed arity 1.
    ExprStmt,
    /// An identifier or qualified name.
    Ident {
        /// The (possibly qualified) name.
        name: String,
    },
    /// A numeric, string, boolean or null literal. Unique label.
    Literal {
        /// Source text of the literal.
        text: String,
    },
    /// A binary expression. Fixed arity 2.
    Binary {
        /// Operator token.
        op: String,
    },
    /// A conditional expression `c ? t : f`. Fixed arity 3.
    Ternary,
    /// A parenthesized expression. Fixed arity 1.
    Paren,
    /// A call `name(args...)` with ordered, variable-arity children.
    Call {
        /// The (possibly qualified) callee name.
        name: String,
    },
}

impl JavaKind {
    /// Returns true for kinds that never carry children.
    fn is_atom(&self) -> bool {
        matches!(
            self,
            JavaKind::Package { .. }
                | JavaKind::Import { .. }
                | JavaKind::Field { .. }
                | JavaKind::Ident { .. }
                | JavaKind::Literal { .. }
        )
    }
}

/// Conflict alternatives attached to a node for the printer.
#[derive(Debug, Clone)]
pub(crate) struct ConflictParts {
    pub left: Option<JavaNode>,
    pub right: Option<JavaNode>,
    pub left_name: String,
    pub right_name: String,
}

/// A node of the demo grammar's syntax tree.
#[derive(Debug, Clone)]
pub struct JavaNode {
    kind: JavaKind,
    children: Vec<JavaNode>,
    content: Option<String>,
    conflict: Option<Box<ConflictParts>>,
    choice: Vec<(String, JavaNode)>,
}

impl JavaNode {
    /// Creates a node without children.
    pub fn new(kind: JavaKind) -> Self {
        JavaNode {
            kind,
            children: Vec::new(),
            content: None,
            conflict: None,
            choice: Vec::new(),
        }
    }

    /// Creates a node with the given children.
    pub fn with_children(kind: JavaKind, children: Vec<JavaNode>) -> Self {
        JavaNode {
            kind,
            children,
            content: None,
            conflict: None,
            choice: Vec::new(),
        }
    }

    /// Returns the grammar kind.
    pub fn kind(&self) -> &JavaKind {
        &self.kind
    }

    pub(crate) fn conflict_parts(&self) -> Option<&ConflictParts> {
        self.conflict.as_deref()
    }

    pub(crate) fn choice_variants(&self) -> &[(String, JavaNode)] {
        &self.choice
    }
}

impl GrammarNode for JavaNode {
    fn kind_name(&self) -> &str {
        match &self.kind {
            JavaKind::CompilationUnit => "compilation-unit",
            JavaKind::Package { .. } => "package",
            JavaKind::ImportSection => "import-section",
            JavaKind::Import { .. } => "import",
            JavaKind::Class { .. } => "class",
            JavaKind::Field { .. } => "field",
            JavaKind::Method { .. } => "method",
            JavaKind::Block => "block",
            JavaKind::Return => "return",
            JavaKind::Assign { .. } => "assign",
            JavaKind::VarDecl { .. } => "var-decl",
            JavaKind::ExprStmt => "expr-stmt",
            JavaKind::Ident { .. } => "ident",
            JavaKind::Literal { .. } => "literal",
            JavaKind::Binary { .. } => "binary",
            JavaKind::Ternary => "ternary",
            JavaKind::Paren => "paren",
            JavaKind::Call { .. } => "call",
        }
    }

    fn matches(&self, other: &Self) -> bool {
        // Opaque leaves compare by their text.
        if let (Some(a), Some(b)) = (self.content.as_deref(), other.content.as_deref()) {
            return a == b;
        }

        match (&self.kind, &other.kind) {
            (JavaKind::Package { name: a }, JavaKind::Package { name: b }) => a == b,
            (JavaKind::Import { path: a }, JavaKind::Import { path: b }) => a == b,
            (
                JavaKind::Class {
                    name: a,
                    header: ha,
                },
                JavaKind::Class {
                    name: b,
                    header: hb,
                },
            ) => a == b && ha == hb,
            (JavaKind::Field { decl: a }, JavaKind::Field { decl: b }) => a == b,
            (JavaKind::Method { signature: a }, JavaKind::Method { signature: b }) => a == b,
            (
                JavaKind::VarDecl { ty: ta, name: na },
                JavaKind::VarDecl { ty: tb, name: nb },
            ) => ta == tb && na == nb,
            (JavaKind::Assign { lhs: a }, JavaKind::Assign { lhs: b }) => a == b,
            (JavaKind::Ident { name: a }, JavaKind::Ident { name: b }) => a == b,
            (JavaKind::Literal { text: a }, JavaKind::Literal { text: b }) => a == b,
            (JavaKind::Binary { op: a }, JavaKind::Binary { op: b }) => a == b,
            (JavaKind::Call { name: a }, JavaKind::Call { name: b }) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    fn is_ordered(&self) -> bool {
        !matches!(
            self.kind,
            JavaKind::ImportSection | JavaKind::Class { .. }
        )
    }

    fn has_unique_labels(&self) -> bool {
        matches!(
            self.kind,
            JavaKind::Package { .. }
                | JavaKind::Import { .. }
                | JavaKind::Field { .. }
                | JavaKind::Literal { .. }
        )
    }

    fn label(&self) -> Option<&str> {
        match &self.kind {
            JavaKind::Package { name } => Some(name),
            JavaKind::Import { path } => Some(path),
            JavaKind::Field { decl } => Some(decl),
            JavaKind::Literal { text } => Some(text),
            _ => None,
        }
    }

    fn fixed_arity(&self) -> Option<usize> {
        match self.kind {
            JavaKind::Assign { .. } => Some(1),
            JavaKind::VarDecl { .. } => Some(1),
            JavaKind::ExprStmt => Some(1),
            JavaKind::Binary { .. } => Some(2),
            JavaKind::Ternary => Some(3),
            JavaKind::Paren => Some(1),
            _ => None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.content.is_some() || self.kind.is_atom()
    }

    fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    fn set_content(&mut self, text: String) {
        self.content = Some(text);
    }

    fn children(&self) -> &[Self] {
        &self.children
    }

    fn take_children(&mut self) -> Vec<Self> {
        std::mem::take(&mut self.children)
    }

    fn set_children(&mut self, children: Vec<Self>) {
        self.children = children;
    }

    fn empty() -> Self {
        JavaNode::new(JavaKind::CompilationUnit)
    }

    fn pretty_print(&self) -> String {
        printer::print(self)
    }

    fn set_conflict(
        &mut self,
        left: Option<Self>,
        right: Option<Self>,
        left_name: String,
        right_name: String,
    ) {
        self.conflict = Some(Box::new(ConflictParts {
            left,
            right,
            left_name,
            right_name,
        }));
    }

    fn set_choice(&mut self, variants: Vec<(String, Self)>) {
        self.choice = variants;
    }

    fn flatten_opaque(&mut self) {
        if let JavaKind::Method { .. } = self.kind {
            for child in &mut self.children {
                if matches!(child.kind, JavaKind::Block) && child.content.is_none() {
                    let text = printer::print(child);
                    child.children.clear();
                    child.content = Some(text);
                }
            }
        }
    }
}
