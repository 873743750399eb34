//! Revision labels.
//!
//! A revision identifies which input tree an artifact came from. Revisions
//! compare by name only, so user-supplied labels (e.g. branch names passed to
//! the CLI) behave exactly like the built-in ones.

use std::fmt;
use std::rc::Rc;

/// A symbolic revision label.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(Rc<str>);

impl Revision {
    /// Creates a revision with the given name.
    pub fn new(name: &str) -> Self {
        Revision(Rc::from(name))
    }

    /// The left input revision.
    pub fn left() -> Self {
        Revision::new("left")
    }

    /// The common-ancestor revision.
    pub fn base() -> Self {
        Revision::new("base")
    }

    /// The right input revision.
    pub fn right() -> Self {
        Revision::new("right")
    }

    /// The output revision.
    pub fn target() -> Self {
        Revision::new("target")
    }

    /// Sentinel revision carried by conflict pseudo-nodes.
    pub fn conflict() -> Self {
        Revision::new("conflict")
    }

    /// Sentinel revision carried by choice pseudo-nodes.
    pub fn choice() -> Self {
        Revision::new("choice")
    }

    /// Returns the name of this revision.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
