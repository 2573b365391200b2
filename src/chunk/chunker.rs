// Splits a hunk into size-bounded, context-filled sub-hunks, AST-guided
// when a grammar is available and falling back to a line-based split
// otherwise (spec §4.3).

use crate::diff::model::{DiffChunk, DiffLine, LineMode};
use crate::lang::{self, LanguageTag, SyntaxNode, SyntaxTree};

use super::post_image::PostImage;

pub const DEFAULT_MAX_CHARS: usize = 1500;

/// `chunk(hunk, maxChars) -> sub-hunks` (spec §4.3). Guarantees every parent
/// line is covered by exactly one output sub-hunk, in order.
pub fn chunk(parent: &DiffChunk, lang: LanguageTag, max_chars: usize) -> Vec<DiffChunk> {
    if parent.lines.is_empty() {
        return Vec::new();
    }
    if parent.byte_size() <= max_chars {
        return vec![parent.clone()];
    }

    if lang != LanguageTag::Text {
        let post = PostImage::build(parent);
        // A fully-deleted hunk has no post-image lines to parse; an empty
        // tree has no children for chunk_by_tree to walk, so every line
        // would fold into one leftover sub-hunk and blow past max_chars
        // (spec §8 "Chunker size bound"). Fall back to the line-based split.
        if !post.text.is_empty() {
            if let Some(tree) = lang::parse(&post.text, lang) {
                return chunk_by_tree(parent, &post, &tree, max_chars);
            }
        }
    }

    chunk_by_lines(parent, max_chars)
}

struct TreeWalk<'a> {
    parent: &'a DiffChunk,
    post: &'a PostImage,
    max_chars: usize,
    assigned: Vec<bool>,
    out: Vec<DiffChunk>,
    acc: Vec<usize>,
    acc_size: usize,
}

fn chunk_by_tree(parent: &DiffChunk, post: &PostImage, tree: &SyntaxTree, max_chars: usize) -> Vec<DiffChunk> {
    let mut walk = TreeWalk {
        parent,
        post,
        max_chars,
        assigned: vec![false; parent.lines.len()],
        out: Vec::new(),
        acc: Vec::new(),
        acc_size: 0,
    };
    walk.visit_children(tree.root().children());
    walk.flush();

    // Safety net for the total-coverage invariant (spec §8): a line the walk
    // never touched (e.g. a deletion sitting outside every emitted sub-hunk's
    // [first,last] span) gets folded into the nearest sub-hunk rather than
    // silently dropped.
    let leftover: Vec<usize> = (0..parent.lines.len()).filter(|&i| !walk.assigned[i]).collect();
    let mut out = walk.out;
    if !leftover.is_empty() {
        if out.is_empty() {
            out.push(build_subhunk(parent, leftover));
        } else {
            merge_leftover(parent, &mut out, leftover);
        }
    }
    out
}

impl<'a> TreeWalk<'a> {
    fn visit_children(&mut self, children: Vec<SyntaxNode<'a>>) {
        for child in children {
            self.visit_node(child);
        }
    }

    fn visit_node(&mut self, node: SyntaxNode<'a>) {
        let range = node.byte_range();
        let child_size = range.len();
        let child_lines = self.post.overlapping(&range, &self.assigned);

        if child_size > self.max_chars {
            self.flush();
            let grandchildren = node.children();
            if grandchildren.is_empty() {
                // A single indivisible node larger than maxChars: emit it as
                // its own (oversized) sub-hunk, per spec §4.3.
                if !child_lines.is_empty() {
                    self.mark(&child_lines);
                    let subhunk = build_subhunk(self.parent, child_lines);
                    self.out.push(subhunk);
                }
            } else {
                self.visit_children(grandchildren);
            }
            return;
        }

        if !self.acc.is_empty() && self.acc_size + child_size > self.max_chars {
            self.flush();
        }
        self.mark(&child_lines);
        self.acc.extend(child_lines);
        self.acc_size += child_size;
    }

    fn mark(&mut self, indices: &[usize]) {
        for &i in indices {
            self.assigned[i] = true;
        }
    }

    fn flush(&mut self) {
        if self.acc.is_empty() {
            return;
        }
        let group = std::mem::take(&mut self.acc);
        self.acc_size = 0;
        // Gap filling (spec §4.3): any parent line between the group's first
        // and last index belongs here too, even if no node covered it.
        let (first, last) = (*group.iter().min().unwrap(), *group.iter().max().unwrap());
        for i in first..=last {
            if !self.assigned[i] {
                self.assigned[i] = true;
            }
        }
        self.out.push(build_subhunk(self.parent, (first..=last).collect()));
    }
}

fn build_subhunk(parent: &DiffChunk, mut indices: Vec<usize>) -> DiffChunk {
    indices.sort_unstable();
    indices.dedup();
    let first = indices[0];
    let last = *indices.last().unwrap();
    let lines: Vec<DiffLine> = (first..=last).map(|i| parent.lines[i].clone()).collect();
    let old_offset = parent.lines[..first]
        .iter()
        .filter(|l| matches!(l.mode, LineMode::Eq | LineMode::Deletion))
        .count();

    DiffChunk {
        old_filepath: parent.old_filepath.clone(),
        new_filepath: parent.new_filepath.clone(),
        start: parent.start + old_offset,
        is_new: parent.is_new,
        is_deleted: parent.is_deleted,
        lines,
    }
}

/// Extend the sub-hunk adjacent to `leftover` rather than emit a disjoint
/// sub-hunk that would violate the "sub-hunk is a contiguous slice" shape
/// the rest of the Chunker maintains.
fn merge_leftover(parent: &DiffChunk, out: &mut [DiffChunk], leftover: Vec<usize>) {
    let min_idx = *leftover.iter().min().unwrap();
    // Find the sub-hunk whose covered range is closest to the leftover lines
    // and rebuild it (by index range) to include them.
    let mut best = 0usize;
    let mut best_dist = usize::MAX;
    let mut covered_ranges = Vec::with_capacity(out.len());
    let mut cursor = 0usize;
    for (k, sh) in out.iter().enumerate() {
        let span = sh.lines.len();
        covered_ranges.push((cursor, cursor + span.saturating_sub(1)));
        let (s, e) = covered_ranges[k];
        let dist = if min_idx < s { s - min_idx } else { min_idx.saturating_sub(e) };
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
        cursor += span;
    }
    let mut combined: Vec<usize> = Vec::new();
    // Recover the original parent indices this sub-hunk already spans by
    // matching its start back to an offset; simplest correct approach is to
    // rebuild from scratch using the sub-hunk's recorded start.
    let target = &out[best];
    let target_first = line_index_for_start(parent, target.start, target.is_new);
    let target_last = target_first + target.lines.len().saturating_sub(1);
    combined.extend(target_first..=target_last);
    combined.extend(leftover);
    out[best] = build_subhunk(parent, combined);
}

fn line_index_for_start(parent: &DiffChunk, start: usize, _is_new: bool) -> usize {
    let old_offset = start - parent.start;
    let mut seen = 0usize;
    for (i, l) in parent.lines.iter().enumerate() {
        if matches!(l.mode, LineMode::Eq | LineMode::Deletion) {
            if seen == old_offset {
                return i;
            }
            seen += 1;
        } else if seen == old_offset {
            return i;
        }
    }
    0
}

fn chunk_by_lines(parent: &DiffChunk, max_chars: usize) -> Vec<DiffChunk> {
    let mut out = Vec::new();
    let mut acc: Vec<usize> = Vec::new();
    let mut acc_size = 0usize;

    for (i, line) in parent.lines.iter().enumerate() {
        let line_size = line_byte_size(line);
        if !acc.is_empty() && acc_size + line_size > max_chars {
            out.push(build_subhunk(parent, std::mem::take(&mut acc)));
            acc_size = 0;
        }
        acc.push(i);
        acc_size += line_size;
    }
    if !acc.is_empty() {
        out.push(build_subhunk(parent, acc));
    }
    out
}

fn line_byte_size(line: &DiffLine) -> usize {
    match line.mode {
        LineMode::NoNewline => line.content.len() + 1,
        _ => line.content.len() + 2,
    }
}
