//! The line-based merge strategy.
//!
//! A classic diff3 over lines: both sides are diffed against the base with
//! an LCS line diff, the resulting change chunks are walked in base order,
//! and overlapping chunks form unstable regions that either agree, take the
//! changed side, or become a conflict. Three-way conflicts carry the
//! `|||||||` base section; two-way merges omit it.
//!
//! This strategy is also the outbound fallback for opaque subtrees: the
//! engine hands it three scratch file paths and reads the merged text back.

use std::fs;
use std::path::Path;

use similar::{DiffTag, TextDiff};
use tracing::trace;

use super::{scratch::ScratchFiles, MergeOutcome};
use crate::error::{Error, Result};

/// A change chunk mapping a base line range to a side line range.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    base_lo: usize,
    base_hi: usize,
    new_lo: usize,
    new_hi: usize,
}

impl Chunk {
    fn is_empty(&self) -> bool {
        self.base_lo == self.base_hi
    }
}

/// Merges three texts. `base` of `None` selects a two-way merge.
///
/// Returns the merged text and the number of conflict regions.
pub fn merge_text(
    left: &str,
    base: Option<&str>,
    right: &str,
    left_name: &str,
    right_name: &str,
) -> (String, usize) {
    let two_way = base.is_none();
    let base_text = base.unwrap_or("");
    let base_lines: Vec<&str> = base_text.lines().collect();
    let left_lines: Vec<&str> = left.lines().collect();
    let right_lines: Vec<&str> = right.lines().collect();

    let left_chunks = side_chunks(base_text, left);
    let right_chunks = side_chunks(base_text, right);

    let mut out: Vec<String> = Vec::new();
    let mut conflicts = 0usize;
    let mut base_pos = 0usize;
    let mut li = 0usize;
    let mut ri = 0usize;

    loop {
        let lc = left_chunks.get(li).copied();
        let rc = right_chunks.get(ri).copied();

        match (lc, rc) {
            (None, None) => {
                extend_lines(&mut out, &base_lines[base_pos..]);
                break;
            }
            (Some(c), None) => {
                apply_chunk(&mut out, &base_lines, &left_lines, &c, &mut base_pos);
                li += 1;
            }
            (None, Some(c)) => {
                apply_chunk(&mut out, &base_lines, &right_lines, &c, &mut base_pos);
                ri += 1;
            }
            (Some(l), Some(r)) => {
                if !chunks_overlap(&l, &r) {
                    // Apply whichever change comes first in base order;
                    // prefer the left side on a full tie.
                    if (l.base_lo, l.base_hi) <= (r.base_lo, r.base_hi) {
                        apply_chunk(&mut out, &base_lines, &left_lines, &l, &mut base_pos);
                        li += 1;
                    } else {
                        apply_chunk(&mut out, &base_lines, &right_lines, &r, &mut base_pos);
                        ri += 1;
                    }
                    continue;
                }

                // Unstable region: expand over every chunk it overlaps.
                let mut lo = l.base_lo.min(r.base_lo);
                let mut hi = l.base_hi.max(r.base_hi);
                let mut l_group = vec![l];
                let mut r_group = vec![r];
                li += 1;
                ri += 1;

                loop {
                    let mut grew = false;
                    while let Some(c) = left_chunks.get(li) {
                        if in_region(c, lo, hi) {
                            lo = lo.min(c.base_lo);
                            hi = hi.max(c.base_hi);
                            l_group.push(*c);
                            li += 1;
                            grew = true;
                        } else {
                            break;
                        }
                    }
                    while let Some(c) = right_chunks.get(ri) {
                        if in_region(c, lo, hi) {
                            lo = lo.min(c.base_lo);
                            hi = hi.max(c.base_hi);
                            r_group.push(*c);
                            ri += 1;
                            grew = true;
                        } else {
                            break;
                        }
                    }
                    if !grew {
                        break;
                    }
                }

                extend_lines(&mut out, &base_lines[base_pos..lo]);
                base_pos = hi;

                let left_region = materialize(&base_lines, &left_lines, &l_group, lo, hi);
                let right_region = materialize(&base_lines, &right_lines, &r_group, lo, hi);
                let base_region: Vec<String> =
                    base_lines[lo..hi].iter().map(|s| s.to_string()).collect();

                if left_region == right_region {
                    out.extend(left_region);
                } else if left_region == base_region {
                    out.extend(right_region);
                } else if right_region == base_region {
                    out.extend(left_region);
                } else {
                    conflicts += 1;
                    out.push(format!("<<<<<<< {}", left_name));
                    out.extend(left_region);
                    if !two_way {
                        out.push("||||||| base".to_string());
                        out.extend(base_region);
                    }
                    out.push("=======".to_string());
                    out.extend(right_region);
                    out.push(format!(">>>>>>> {}", right_name));
                }
            }
        }
    }

    trace!(conflicts, "line merge done");

    let mut text = out.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    (text, conflicts)
}

/// Merges three files into an output file: the path interface used for the
/// semistructured fallback. Returns the number of conflict regions.
pub fn merge_paths(
    left: &Path,
    base: Option<&Path>,
    right: &Path,
    output: &Path,
    left_name: &str,
    right_name: &str,
) -> Result<usize> {
    let left_text = fs::read_to_string(left)?;
    let base_text = base.map(fs::read_to_string).transpose()?;
    let right_text = fs::read_to_string(right)?;

    let (merged, conflicts) = merge_text(
        &left_text,
        base_text.as_deref(),
        &right_text,
        left_name,
        right_name,
    );
    fs::write(output, merged)?;
    Ok(conflicts)
}

/// Merges three input files at the strategy level.
pub fn merge_files(
    left: &Path,
    base: Option<&Path>,
    right: &Path,
    left_name: &str,
    right_name: &str,
) -> Result<MergeOutcome> {
    let left_text = fs::read_to_string(left)?;
    let base_text = base.map(fs::read_to_string).transpose()?;
    let right_text = fs::read_to_string(right)?;

    let (text, conflicts) = merge_text(
        &left_text,
        base_text.as_deref(),
        &right_text,
        left_name,
        right_name,
    );
    Ok(MergeOutcome { text, conflicts })
}

/// Runs the line-based strategy over scratch files for three opaque texts.
///
/// Any failure is reported as an external-strategy error, which is fatal for
/// the subtree being merged.
pub(crate) fn merge_scratch(
    left_text: &str,
    base_text: &str,
    right_text: &str,
    left_name: &str,
    right_name: &str,
) -> Result<String> {
    let run = || -> Result<String> {
        let scratch = ScratchFiles::new(left_text, base_text, right_text)?;
        merge_paths(
            scratch.left_path(),
            Some(scratch.base_path()),
            scratch.right_path(),
            scratch.output_path(),
            left_name,
            right_name,
        )?;
        scratch.read_output()
    };
    run().map_err(|e| Error::External(e.to_string()))
}

fn side_chunks(base: &str, side: &str) -> Vec<Chunk> {
    TextDiff::from_lines(base, side)
        .ops()
        .iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .map(|op| Chunk {
            base_lo: op.old_range().start,
            base_hi: op.old_range().end,
            new_lo: op.new_range().start,
            new_hi: op.new_range().end,
        })
        .collect()
}

/// Proper base-range intersection, or two insertions at the same point.
fn chunks_overlap(l: &Chunk, r: &Chunk) -> bool {
    (l.base_lo < r.base_hi && r.base_lo < l.base_hi)
        || (l.is_empty() && r.is_empty() && l.base_lo == r.base_lo)
}

/// Whether a chunk belongs to the unstable region `[lo, hi)`.
fn in_region(c: &Chunk, lo: usize, hi: usize) -> bool {
    if c.is_empty() {
        lo < c.base_lo && c.base_lo < hi
    } else {
        c.base_lo < hi && c.base_hi > lo
    }
}

fn apply_chunk(
    out: &mut Vec<String>,
    base_lines: &[&str],
    side_lines: &[&str],
    chunk: &Chunk,
    base_pos: &mut usize,
) {
    extend_lines(out, &base_lines[*base_pos..chunk.base_lo]);
    extend_lines(out, &side_lines[chunk.new_lo..chunk.new_hi]);
    *base_pos = chunk.base_hi;
}

/// Replays one side's chunks over the base slice `[lo, hi)`.
fn materialize(
    base_lines: &[&str],
    side_lines: &[&str],
    chunks: &[Chunk],
    lo: usize,
    hi: usize,
) -> Vec<String> {
    let mut result = Vec::new();
    let mut pos = lo;
    for chunk in chunks {
        extend_lines(&mut result, &base_lines[pos..chunk.base_lo]);
        extend_lines(&mut result, &side_lines[chunk.new_lo..chunk.new_hi]);
        pos = chunk.base_hi;
    }
    extend_lines(&mut result, &base_lines[pos..hi]);
    result
}

fn extend_lines(out: &mut Vec<String>, lines: &[&str]) {
    out.extend(lines.iter().map(|s| s.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_changes_merge_clean() {
        let base = "a\nb\nc\nd\n";
        let left = "a\nB\nc\nd\n";
        let right = "a\nb\nc\nD\n";

        let (text, conflicts) = merge_text(left, Some(base), right, "left", "right");
        assert_eq!(text, "a\nB\nc\nD\n");
        assert_eq!(conflicts, 0);
    }

    #[test]
    fn test_identical_changes_merge_clean() {
        let base = "a\nb\n";
        let left = "a\nX\n";
        let right = "a\nX\n";

        let (text, conflicts) = merge_text(left, Some(base), right, "left", "right");
        assert_eq!(text, "a\nX\n");
        assert_eq!(conflicts, 0);
    }

    #[test]
    fn test_overlapping_changes_conflict() {
        let base = "a\nb\nc\n";
        let left = "a\nL\nc\n";
        let right = "a\nR\nc\n";

        let (text, conflicts) = merge_text(left, Some(base), right, "left", "right");
        assert_eq!(conflicts, 1);
        assert_eq!(
            text,
            "a\n<<<<<<< left\nL\n||||||| base\nb\n=======\nR\n>>>>>>> right\nc\n"
        );
    }

    #[test]
    fn test_two_way_conflict_omits_base_section() {
        let (text, conflicts) = merge_text("L\n", None, "R\n", "left", "right");
        assert_eq!(conflicts, 1);
        assert_eq!(text, "<<<<<<< left\nL\n=======\nR\n>>>>>>> right\n");
    }

    #[test]
    fn test_two_way_identical_is_clean() {
        let (text, conflicts) = merge_text("X\n", None, "X\n", "left", "right");
        assert_eq!(text, "X\n");
        assert_eq!(conflicts, 0);
    }

    #[test]
    fn test_deletion_is_applied() {
        let base = "a\nb\nc\n";
        let left = "a\nc\n";
        let right = "a\nb\nc\n";

        let (text, conflicts) = merge_text(left, Some(base), right, "left", "right");
        assert_eq!(text, "a\nc\n");
        assert_eq!(conflicts, 0);
    }

    #[test]
    fn test_insertions_at_same_point_conflict() {
        let base = "a\nz\n";
        let left = "a\nL\nz\n";
        let right = "a\nR\nz\n";

        let (text, conflicts) = merge_text(left, Some(base), right, "left", "right");
        assert_eq!(conflicts, 1);
        assert!(text.contains("<<<<<<< left\nL\n"));
        assert!(text.contains("=======\nR\n"));
    }

    #[test]
    fn test_merge_paths_roundtrip() {
        let scratch = ScratchFiles::new("a\nB\n", "a\nb\n", "a\nb\n").unwrap();
        let conflicts = merge_paths(
            scratch.left_path(),
            Some(scratch.base_path()),
            scratch.right_path(),
            scratch.output_path(),
            "left",
            "right",
        )
        .unwrap();

        assert_eq!(conflicts, 0);
        assert_eq!(scratch.read_output().unwrap(), "a\nB\n");
    }

    #[test]
    fn test_merge_scratch_resolves_text() {
        let merged = merge_scratch("a\nB\n", "a\nb\n", "a\nb\n", "left", "right").unwrap();
        assert_eq!(merged, "a\nB\n");
    }
}
