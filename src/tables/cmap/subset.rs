//! Encoding of a code point to glyph map as a compact format 4 `cmap` subtable.
//!
//! The map is encoded in three passes over a snapshot of its entries:
//!
//! 1. Split the entries into runs of consecutive code points.
//! 2. Within each run look for a stretch of consecutive glyph ids that is cheaper to store as
//!    its own delta segment, splitting the run around it.
//! 3. Join neighbouring runs that still need the glyph id array into a single segment when the
//!    `.notdef` entries needed to fill the gap between them cost less than a new segment.
//!
//! Costs are counted in 16-bit words: a segment costs 4 words (one per parallel array), and a
//! segment using the glyph id array additionally costs one word per code point it covers.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, warn};

use crate::error::WriteError;
use crate::tables::cmap::{owned, SENTINEL};

/// Words taken by one entry in each of the four parallel segment arrays.
const SEGMENT_COST: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RangeKind {
    /// Glyph ids increase with the code points, so the range can be stored as a delta.
    Continuous,
    /// Glyph ids have to be stored individually in the glyph id array.
    Scattered,
}

/// An inclusive range of indices into the entry snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct RangeRecord {
    first: usize,
    last: usize,
    kind: RangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Delta { start: u16, end: u16, id_delta: i16 },
    Array { start: u16, end: u16, glyph_ids: Vec<u16> },
}

impl RangeRecord {
    fn new(first: usize, last: usize, kind: RangeKind) -> Self {
        RangeRecord { first, last, kind }
    }

    fn len(&self) -> usize {
        self.last - self.first + 1
    }
}

impl owned::CmapSubtableFormat4 {
    /// Build a format 4 subtable holding `mappings`.
    ///
    /// Code points that format 4 cannot hold (0xFFFF and everything outside the BMP) are skipped
    /// with a warning. Fails if the resulting subtable would not fit in 64 KiB.
    pub fn from_mappings(
        mappings: &BTreeMap<u32, u16>,
    ) -> Result<owned::CmapSubtableFormat4, WriteError> {
        let entries = encodable_entries(mappings);

        let mut ranges = Vec::new();
        for range in code_point_ranges(&entries) {
            if range.len() > 1 {
                split_range(&entries, range, &mut ranges);
            } else {
                ranges.push(range);
            }
        }

        let segments = join_ranges(&entries, &ranges);
        debug!(
            "cmap: {} mappings in {} ranges, {} segments",
            entries.len(),
            ranges.len(),
            segments.len() + 1
        );
        assemble(segments)
    }
}

fn encodable_entries(mappings: &BTreeMap<u32, u16>) -> Vec<(u16, u16)> {
    mappings
        .iter()
        .filter_map(|(&code, &glyph_id)| match u16::try_from(code) {
            Ok(code) if code != SENTINEL => Some((code, glyph_id)),
            _ => {
                warn!(
                    "code point U+{:04X} cannot be stored in a format 4 cmap, skipping",
                    code
                );
                None
            }
        })
        .collect()
}

/// Partition the entries into maximal runs of consecutive code points.
fn code_point_ranges(entries: &[(u16, u16)]) -> Vec<RangeRecord> {
    let mut ranges = Vec::new();
    // Within a run of consecutive code points `code - index` is constant
    let runs = entries
        .iter()
        .enumerate()
        .group_by(|&(index, &(code, _))| usize::from(code) - index);
    for (_, mut run) in &runs {
        if let Some((first, _)) = run.next() {
            let last = run.last().map_or(first, |(index, _)| index);
            ranges.push(RangeRecord::new(first, last, RangeKind::Scattered));
        }
    }
    ranges
}

/// Split `range` around the first stretch of consecutive glyph ids that makes it cheaper to
/// store, recursing on whatever follows that stretch.
///
/// The pieces pushed to `output` always cover `range` exactly.
fn split_range(entries: &[(u16, u16)], range: RangeRecord, output: &mut Vec<RangeRecord>) {
    let whole_cost = SEGMENT_COST + range.len();
    let mut run_start = range.first;
    for index in range.first + 1..=range.last + 1 {
        let continues =
            index <= range.last && entries[index].1 == entries[index - 1].1.wrapping_add(1);
        if continues {
            continue;
        }

        // entries[run_start..index] have consecutive glyph ids
        if index - run_start > 1 {
            let left = run_start - range.first;
            let right = range.last + 1 - index;
            if scattered_cost(left) + SEGMENT_COST + scattered_cost(right) < whole_cost {
                if left > 0 {
                    output.push(RangeRecord::new(
                        range.first,
                        run_start - 1,
                        RangeKind::Scattered,
                    ));
                }
                output.push(RangeRecord::new(run_start, index - 1, RangeKind::Continuous));
                if right > 0 {
                    let rest = RangeRecord::new(index, range.last, RangeKind::Scattered);
                    split_range(entries, rest, output);
                }
                return;
            }
        }
        run_start = index;
    }

    output.push(range);
}

fn scattered_cost(len: usize) -> usize {
    match len {
        0 => 0,
        len => SEGMENT_COST + len,
    }
}

/// Turn ranges into segments, merging neighbouring scattered ranges where that is cheaper.
fn join_ranges(entries: &[(u16, u16)], ranges: &[RangeRecord]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pending: Vec<RangeRecord> = Vec::new();
    let mut pending_size = 0;

    for &range in ranges {
        if range.kind == RangeKind::Continuous || range.len() == 1 {
            flush_pending(entries, &mut pending, &mut segments);
            let (start, glyph_id) = entries[range.first];
            segments.push(Segment::Delta {
                start,
                end: entries[range.last].0,
                id_delta: glyph_id.wrapping_sub(start) as i16,
            });
        } else if let Some(previous) = pending.last() {
            let separate_size = pending_size + SEGMENT_COST + range.len();
            let joined_size =
                usize::from(entries[range.last].0 - entries[previous.last].0) + pending_size;
            if separate_size > joined_size {
                pending.push(range);
                pending_size = joined_size;
            } else {
                flush_pending(entries, &mut pending, &mut segments);
                pending.push(range);
                pending_size = SEGMENT_COST + range.len();
            }
        } else {
            pending.push(range);
            pending_size = SEGMENT_COST + range.len();
        }
    }
    flush_pending(entries, &mut pending, &mut segments);

    segments
}

/// Write the pending ranges as one segment, mapping code points in the gaps between them to
/// glyph 0.
fn flush_pending(
    entries: &[(u16, u16)],
    pending: &mut Vec<RangeRecord>,
    segments: &mut Vec<Segment>,
) {
    let (first, last) = match (pending.first(), pending.last()) {
        (Some(first), Some(last)) => (first.first, last.last),
        _ => return,
    };
    let start = entries[first].0;
    let end = entries[last].0;
    let mut glyph_ids = vec![0; usize::from(end - start) + 1];
    for &(code, glyph_id) in &entries[first..=last] {
        glyph_ids[usize::from(code - start)] = glyph_id;
    }
    segments.push(Segment::Array {
        start,
        end,
        glyph_ids,
    });
    pending.clear();
}

fn assemble(segments: Vec<Segment>) -> Result<owned::CmapSubtableFormat4, WriteError> {
    // +1 for the sentinel
    let seg_count = segments.len() + 1;
    let mut table = owned::CmapSubtableFormat4::default();

    for (index, segment) in segments.into_iter().enumerate() {
        match segment {
            Segment::Delta {
                start,
                end,
                id_delta,
            } => {
                table.start_codes.push(start);
                table.end_codes.push(end);
                table.id_deltas.push(id_delta);
                table.id_range_offsets.push(0);
            }
            Segment::Array {
                start,
                end,
                glyph_ids,
            } => {
                // Byte offset from this id_range_offsets slot to the segment's first glyph id
                let id_range_offset = 2 * (seg_count - index) + 2 * table.glyph_id_array.len();
                table.start_codes.push(start);
                table.end_codes.push(end);
                table.id_deltas.push(0);
                table.id_range_offsets.push(u16::try_from(id_range_offset)?);
                table.glyph_id_array.extend(glyph_ids);
            }
        }
    }

    table.start_codes.push(SENTINEL);
    table.end_codes.push(SENTINEL);
    table.id_deltas.push(0);
    table.id_range_offsets.push(0);

    Ok(table)
}
