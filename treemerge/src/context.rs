//! Merge context configuration.
//!
//! A [`MergeContext`] carries everything a single merge invocation needs:
//! the selected strategy and matcher, output switches, the cost-model
//! weights, the matcher look-ahead, and the cancellation token. Contexts are
//! cheap to create and never shared between concurrent merges.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// The merge strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Structural merge over the syntax tree.
    Structured,
    /// Plain line-based three-way merge.
    Linebased,
    /// Structural merge with method bodies treated as opaque text.
    Semistructured,
    /// Structural merge with a line-based whole-file fallback.
    Combined,
}

impl StrategyKind {
    /// The name used on the command line and in reports.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Structured => "structured",
            StrategyKind::Linebased => "linebased",
            StrategyKind::Semistructured => "semistructured",
            StrategyKind::Combined => "combined",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "structured" => Ok(StrategyKind::Structured),
            "linebased" => Ok(StrategyKind::Linebased),
            "semistructured" => Ok(StrategyKind::Semistructured),
            "combined" => Ok(StrategyKind::Combined),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// The tree matcher to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatcherKind {
    /// Two-pass top-down/bottom-up matcher.
    #[default]
    Classic,
    /// Branch-and-bound cost-model matcher.
    CostModel,
}

/// A cancellation token checked at node boundaries.
///
/// Cancelling aborts the merge with [`Error::Cancelled`]; the partially
/// built target must be discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration of a single merge invocation.
#[derive(Debug, Clone)]
pub struct MergeContext {
    /// Selected merge strategy.
    pub strategy: StrategyKind,
    /// Selected tree matcher.
    pub matcher: MatcherKind,
    /// Suppress informational output.
    pub quiet: bool,
    /// Compute the merge but do not emit the result.
    pub pretend: bool,
    /// Cost-model weight of leaving a node unmatched.
    pub wn: f32,
    /// Cost-model weight of renaming.
    pub wr: f32,
    /// Cost-model weight of ancestry violations.
    pub wa: f32,
    /// Cost-model weight of sibling-group breakups.
    pub ws: f32,
    /// Subtree depth still considered for matching after a mismatch.
    pub look_ahead: u32,
    cancel: CancelToken,
}

impl Default for MergeContext {
    fn default() -> Self {
        MergeContext {
            strategy: StrategyKind::Structured,
            matcher: MatcherKind::Classic,
            quiet: false,
            pretend: false,
            wn: 1.0,
            wr: 1.0,
            wa: 1.0,
            ws: 1.0,
            look_ahead: 0,
            cancel: CancelToken::new(),
        }
    }
}

impl MergeContext {
    /// Creates a context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for the given strategy.
    pub fn with_strategy(strategy: StrategyKind) -> Self {
        MergeContext {
            strategy,
            ..Self::default()
        }
    }

    /// Whether method bodies are merged as opaque text.
    pub fn is_semistructured(&self) -> bool {
        self.strategy == StrategyKind::Semistructured
    }

    /// Returns the cancellation token for this merge.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fails with [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
