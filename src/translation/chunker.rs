/*!
 * Chunk planning.
 *
 * Consecutive pending segments are packed into chunks whose total source
 * length stays within the character budget. A segment longer than the budget
 * is never split; it becomes a chunk of its own. Planning is a pure function
 * of the pending list and the budget, so a retried run forms the same chunks.
 */

use crate::checkpoint::PendingSegment;

/// A group of segments sent to the remote service in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the plan
    pub id: usize,
    /// Member segment ids, in document order
    pub segment_ids: Vec<u64>,
    /// Source texts, parallel to `segment_ids`
    pub texts: Vec<String>,
    /// Sum of the members' character lengths
    pub char_count: usize,
}

impl Chunk {
    fn new(id: usize) -> Self {
        Self {
            id,
            segment_ids: Vec::new(),
            texts: Vec::new(),
            char_count: 0,
        }
    }

    fn push(&mut self, segment: &PendingSegment, chars: usize) {
        self.segment_ids.push(segment.id);
        self.texts.push(segment.source_text.clone());
        self.char_count += chars;
    }

    /// Number of segments in the chunk
    pub fn len(&self) -> usize {
        self.segment_ids.len()
    }

    /// Whether the chunk has no members
    pub fn is_empty(&self) -> bool {
        self.segment_ids.is_empty()
    }

    /// Whether a single segment exceeds the budget on its own
    pub fn is_oversized(&self, max_chunk_size: usize) -> bool {
        self.len() == 1 && self.char_count > max_chunk_size
    }
}

/// Pack `pending` into chunks of at most `max_chunk_size` characters.
///
/// A budget of zero is treated as one, so every segment gets its own chunk.
pub fn plan_chunks(pending: &[PendingSegment], max_chunk_size: usize) -> Vec<Chunk> {
    let budget = max_chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = Chunk::new(0);

    for segment in pending {
        let chars = segment.source_text.chars().count();
        if !current.is_empty() && current.char_count + chars > budget {
            let next_id = current.id + 1;
            chunks.push(std::mem::replace(&mut current, Chunk::new(next_id)));
        }
        current.push(segment, chars);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
