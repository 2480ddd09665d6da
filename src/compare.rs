//! Byte-level comparison of sent and received data
//!
//! Two paths are provided. When both sides have the same length the bytes
//! are compared position by position. When the lengths differ the data is
//! aligned on its longest common subsequence first, so a single dropped or
//! injected byte shows up as one error instead of shifting every following
//! byte out of place.
//!
//! The result is a sparse [`ErrorMap`] keyed by position in the sent data.
//! Comparison never fails: any pair of byte strings is a valid input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One mismatched slot: the byte that was sent and the byte that came back.
///
/// `None` marks an absent side, either a byte lost on the link (`received`
/// is `None`) or line noise with no sent counterpart (`sent` is `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteDiff {
    pub sent: Option<u8>,
    pub received: Option<u8>,
}

impl ByteDiff {
    pub fn new(sent: Option<u8>, received: Option<u8>) -> Self {
        Self { sent, received }
    }

    /// A byte received in place of a different sent byte
    pub fn substituted(sent: u8, received: u8) -> Self {
        Self::new(Some(sent), Some(received))
    }

    /// A sent byte that never came back
    pub fn missing(sent: u8) -> Self {
        Self::new(Some(sent), None)
    }

    /// A received byte with no sent counterpart
    pub fn extra(received: u8) -> Self {
        Self::new(None, Some(received))
    }

    /// Number of corrupted bits in this slot.
    ///
    /// A substitution costs the popcount of the XOR of both bytes. A slot with
    /// one side absent is treated as a fully corrupted frame.
    pub fn bit_errors(&self, frame_size: f64) -> f64 {
        match (self.sent, self.received) {
            (Some(sent), Some(received)) => f64::from((sent ^ received).count_ones()),
            (Some(_), None) | (None, Some(_)) => frame_size,
            (None, None) => 0.0,
        }
    }

    /// Printable form of the sent side, empty when absent
    pub fn sent_text(&self) -> String {
        render_unit(self.sent)
    }

    /// Printable form of the received side, empty when absent
    pub fn received_text(&self) -> String {
        render_unit(self.received)
    }
}

fn render_unit(unit: Option<u8>) -> String {
    unit.map(|byte| byte.escape_ascii().to_string()).unwrap_or_default()
}

/// Sparse map of mismatched positions, ordered by index
pub type ErrorMap = BTreeMap<usize, ByteDiff>;

/// Compare sent and received data, picking the positional or aligned path
/// based on whether the lengths match.
pub fn compare(sent: &[u8], received: &[u8]) -> ErrorMap {
    if sent.len() == received.len() {
        compare_equal_length(sent, received)
    } else {
        align_and_compare(sent, received)
    }
}

/// Positional comparison of two equally long byte strings.
///
/// Extra trailing bytes on either side are ignored; callers that may pass
/// unequal lengths should use [`compare`].
pub fn compare_equal_length(sent: &[u8], received: &[u8]) -> ErrorMap {
    sent.iter()
        .zip(received)
        .enumerate()
        .filter(|(_, (s, r))| s != r)
        .map(|(index, (&s, &r))| (index, ByteDiff::substituted(s, r)))
        .collect()
}

/// Edit operation of an alignment script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Byte present on both sides
    Equal,
    /// Sent byte missing from the received data
    Delete,
    /// Received byte not present in the sent data
    Insert,
}

/// Align two byte strings of any length and record where they differ.
///
/// The edit script is walked with a cursor into the sent data:
/// - `Equal` advances both sides.
/// - `Delete` records `(sent, absent)` at the cursor and leaves a pending
///   substitution behind it.
/// - `Insert` right after a delete folds into that slot as a substitution;
///   otherwise it is recorded as `(absent, received)` at the cursor without
///   consuming a sent byte.
///
/// Several inserts landing on one slot overwrite each other, so only the
/// most recent one survives.
pub fn align_and_compare(sent: &[u8], received: &[u8]) -> ErrorMap {
    let script = edit_script(sent, received);

    let mut map = ErrorMap::new();
    let mut sent_pos = 0usize;
    let mut received_pos = 0usize;
    let mut pending_substitution = false;

    for op in script {
        match op {
            EditOp::Equal => {
                pending_substitution = false;
                sent_pos += 1;
                received_pos += 1;
            }
            EditOp::Delete => {
                map.insert(sent_pos, ByteDiff::missing(sent[sent_pos]));
                pending_substitution = true;
                sent_pos += 1;
            }
            EditOp::Insert => {
                let received_byte = received[received_pos];
                if pending_substitution {
                    let slot = sent_pos - 1;
                    map.insert(slot, ByteDiff::substituted(sent[slot], received_byte));
                } else {
                    map.insert(sent_pos, ByteDiff::extra(received_byte));
                }
                pending_substitution = false;
                received_pos += 1;
            }
        }
    }

    map
}

/// Build an edit script turning `sent` into `received`.
///
/// Common prefix and suffix are matched directly; the middle is aligned on a
/// longest common subsequence. Each run of changes is written as a block:
/// all deletes then all inserts, or all inserts first when the run has fewer
/// inserts than deletes.
pub fn edit_script(sent: &[u8], received: &[u8]) -> Vec<EditOp> {
    let prefix = sent.iter()
        .zip(received)
        .take_while(|(s, r)| s == r)
        .count();
    let suffix = sent[prefix..].iter().rev()
        .zip(received[prefix..].iter().rev())
        .take_while(|(s, r)| s == r)
        .count();

    let a = &sent[prefix..sent.len() - suffix];
    let b = &received[prefix..received.len() - suffix];

    let mut script = Vec::with_capacity(sent.len().max(received.len()) + 1);
    script.extend(std::iter::repeat(EditOp::Equal).take(prefix));
    push_runs(&mut script, &lcs_script(a, b));
    script.extend(std::iter::repeat(EditOp::Equal).take(suffix));
    script
}

/// Raw LCS script of the middle section, deletes before inserts on ties
fn lcs_script(a: &[u8], b: &[u8]) -> Vec<EditOp> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;

    // suffix[i * width + j] = LCS length of a[i..] and b[j..]
    let mut suffix = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            suffix[i * width + j] = if a[i] == b[j] {
                suffix[(i + 1) * width + j + 1] + 1
            } else {
                suffix[(i + 1) * width + j].max(suffix[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(EditOp::Equal);
            i += 1;
            j += 1;
        } else if suffix[(i + 1) * width + j] >= suffix[i * width + j + 1] {
            ops.push(EditOp::Delete);
            i += 1;
        } else {
            ops.push(EditOp::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(EditOp::Delete).take(n - i));
    ops.extend(std::iter::repeat(EditOp::Insert).take(m - j));
    ops
}

/// Copy `ops` into `script`, regrouping each run of changes between equal
/// bytes into a delete block and an insert block.
fn push_runs(script: &mut Vec<EditOp>, ops: &[EditOp]) {
    let mut deletes = 0usize;
    let mut inserts = 0usize;

    let flush = |script: &mut Vec<EditOp>, deletes: &mut usize, inserts: &mut usize| {
        let delete_block = std::iter::repeat(EditOp::Delete).take(*deletes);
        let insert_block = std::iter::repeat(EditOp::Insert).take(*inserts);
        if *inserts < *deletes {
            script.extend(insert_block.chain(delete_block));
        } else {
            script.extend(delete_block.chain(insert_block));
        }
        *deletes = 0;
        *inserts = 0;
    };

    for op in ops {
        match op {
            EditOp::Delete => deletes += 1,
            EditOp::Insert => inserts += 1,
            EditOp::Equal => {
                flush(script, &mut deletes, &mut inserts);
                script.push(EditOp::Equal);
            }
        }
    }
    flush(script, &mut deletes, &mut inserts);
}

/// Total corrupted bits over an error map
pub fn total_bit_errors(map: &ErrorMap, frame_size: f64) -> f64 {
    map.values().map(|diff| diff.bit_errors(frame_size)).sum()
}
