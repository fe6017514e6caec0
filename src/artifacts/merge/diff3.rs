//! Byte-level three-way content merging
//!
//! Tree merging delegates file content to a [`Diff3`] collaborator, so
//! embedders can plug in their own text-merge engine. [`LineDiff3`] is
//! the built-in implementation: a line-oriented diff3 that applies
//! non-overlapping edits from both sides and emits conflict markers
//! where edits collide.

use bytes::Bytes;
use similar::{Algorithm, DiffTag, capture_diff_slices};
use std::ops::Range;

/// External text-merge interface.
///
/// `merge` combines two divergent revisions of one file against their
/// common base. The returned flag reports whether any region could not
/// be merged cleanly; the returned bytes always form the best-effort
/// result either way.
pub trait Diff3 {
    fn merge(&self, base: &[u8], ours: &[u8], theirs: &[u8]) -> (Bytes, bool);
}

/// Line-level diff3 with `<<<<<<<`/`>>>>>>>` conflict markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDiff3;

/// One edit relative to the base: base lines `old` replaced by side
/// lines `new`.
#[derive(Debug, Clone)]
struct Chunk {
    old: Range<usize>,
    new: Range<usize>,
}

impl Chunk {
    /// Whether two edits contend for the same base region. An insertion
    /// contends with any edit anchored at the same point even though its
    /// base range is empty: applying both would impose an arbitrary
    /// order between the sides.
    fn interferes(&self, other: &Chunk) -> bool {
        if self.old.start == other.old.start && (self.old.is_empty() || other.old.is_empty()) {
            return true;
        }
        self.old.start < other.old.end && other.old.start < self.old.end
    }
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    bytes.split_inclusive(|&b| b == b'\n').collect()
}

fn chunks(base: &[&[u8]], side: &[&[u8]]) -> Vec<Chunk> {
    capture_diff_slices(Algorithm::Myers, base, side)
        .into_iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .map(|op| Chunk {
            old: op.old_range(),
            new: op.new_range(),
        })
        .collect()
}

fn emit_lines(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
}

/// Project a base region onto one side: unchanged base lines
/// interleaved with that side's edits.
fn side_region(
    absorbed: &[Chunk],
    region: &Range<usize>,
    base: &[&[u8]],
    side: &[&[u8]],
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = region.start;
    for chunk in absorbed {
        emit_lines(&mut out, &base[pos..chunk.old.start]);
        emit_lines(&mut out, &side[chunk.new.clone()]);
        pos = chunk.old.end;
    }
    emit_lines(&mut out, &base[pos..region.end]);
    out
}

fn push_terminated(out: &mut Vec<u8>, region: Vec<u8>) {
    let needs_newline = !region.is_empty() && !region.ends_with(b"\n");
    out.extend_from_slice(&region);
    if needs_newline {
        out.push(b'\n');
    }
}

impl Diff3 for LineDiff3 {
    fn merge(&self, base: &[u8], ours: &[u8], theirs: &[u8]) -> (Bytes, bool) {
        // Trivial resolutions first: identical edits, or an edit on only
        // one side
        if ours == theirs {
            return (Bytes::copy_from_slice(ours), false);
        }
        if ours == base {
            return (Bytes::copy_from_slice(theirs), false);
        }
        if theirs == base {
            return (Bytes::copy_from_slice(ours), false);
        }

        let base_lines = split_lines(base);
        let ours_lines = split_lines(ours);
        let theirs_lines = split_lines(theirs);

        let ours_chunks = chunks(&base_lines, &ours_lines);
        let theirs_chunks = chunks(&base_lines, &theirs_lines);

        let mut out = Vec::new();
        let mut conflict = false;
        let mut base_pos = 0;
        let (mut ai, mut bi) = (0, 0);

        enum Take {
            Ours,
            Theirs,
            Both,
        }

        loop {
            let take = match (ours_chunks.get(ai), theirs_chunks.get(bi)) {
                (None, None) => {
                    emit_lines(&mut out, &base_lines[base_pos..]);
                    break;
                }
                (Some(_), None) => Take::Ours,
                (None, Some(_)) => Take::Theirs,
                (Some(ca), Some(cb)) => {
                    if ca.interferes(cb) {
                        Take::Both
                    } else if ca.old.start <= cb.old.start {
                        Take::Ours
                    } else {
                        Take::Theirs
                    }
                }
            };

            match take {
                Take::Ours => {
                    let chunk = &ours_chunks[ai];
                    emit_lines(&mut out, &base_lines[base_pos..chunk.old.start]);
                    emit_lines(&mut out, &ours_lines[chunk.new.clone()]);
                    base_pos = chunk.old.end;
                    ai += 1;
                }
                Take::Theirs => {
                    let chunk = &theirs_chunks[bi];
                    emit_lines(&mut out, &base_lines[base_pos..chunk.old.start]);
                    emit_lines(&mut out, &theirs_lines[chunk.new.clone()]);
                    base_pos = chunk.old.end;
                    bi += 1;
                }
                Take::Both => {
                    // Contended region: take both chunks, then widen
                    // until no further chunk on either side touches it
                    let (a_from, b_from) = (ai, bi);
                    let (ca, cb) = (&ours_chunks[ai], &theirs_chunks[bi]);
                    let mut region = Range {
                        start: ca.old.start.min(cb.old.start),
                        end: ca.old.end.max(cb.old.end),
                    };
                    ai += 1;
                    bi += 1;

                    loop {
                        let mut grew = false;
                        while let Some(chunk) = ours_chunks.get(ai)
                            && chunk.old.start < region.end
                        {
                            region.end = region.end.max(chunk.old.end);
                            ai += 1;
                            grew = true;
                        }
                        while let Some(chunk) = theirs_chunks.get(bi)
                            && chunk.old.start < region.end
                        {
                            region.end = region.end.max(chunk.old.end);
                            bi += 1;
                            grew = true;
                        }
                        if !grew {
                            break;
                        }
                    }

                    emit_lines(&mut out, &base_lines[base_pos..region.start]);

                    let ours_region =
                        side_region(&ours_chunks[a_from..ai], &region, &base_lines, &ours_lines);
                    let theirs_region = side_region(
                        &theirs_chunks[b_from..bi],
                        &region,
                        &base_lines,
                        &theirs_lines,
                    );

                    if ours_region == theirs_region {
                        out.extend_from_slice(&ours_region);
                    } else {
                        conflict = true;
                        out.extend_from_slice(b"<<<<<<< ours\n");
                        push_terminated(&mut out, ours_region);
                        out.extend_from_slice(b"=======\n");
                        push_terminated(&mut out, theirs_region);
                        out.extend_from_slice(b">>>>>>> theirs\n");
                    }

                    base_pos = region.end;
                }
            }
        }

        (Bytes::from(out), conflict)
    }
}
