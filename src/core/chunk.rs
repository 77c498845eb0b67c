#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ChunkStatus {
    /// Items are still being accumulated.
    Continuable,
    /// The chunk reached its capacity.
    Full,
    /// The reader is exhausted; this is the last chunk, possibly partial or empty.
    Finished,
}

/// Bounded buffer of items written and committed as one unit.
///
/// Besides the items, a chunk counts every source record it consumed,
/// including the ones that were read with an error and skipped, so that the
/// step cursor can move past all of them once the chunk is committed.
#[derive(Debug)]
pub struct Chunk<I> {
    items: Vec<I>,
    consumed: usize,
    status: ChunkStatus,
    chunk_size: usize,
}

impl<I> Chunk<I> {
    pub fn new(chunk_size: usize) -> Chunk<I> {
        Chunk {
            items: Vec::with_capacity(chunk_size),
            consumed: 0,
            status: ChunkStatus::Continuable,
            chunk_size,
        }
    }

    pub fn add_item(&mut self, item: I) {
        self.items.push(item);
        self.consumed += 1;

        if self.items.len() >= self.chunk_size {
            self.status = ChunkStatus::Full;
        }
    }

    /// Records a source record that was consumed without producing an item.
    pub fn skip_item(&mut self) {
        self.consumed += 1;
    }

    pub fn finish(&mut self) {
        self.status = ChunkStatus::Finished;
    }

    pub fn get_items(&self) -> &[I] {
        &self.items
    }

    pub fn get_status(&self) -> ChunkStatus {
        self.status
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn is_full(&self) -> bool {
        self.status == ChunkStatus::Full
    }

    pub fn is_finished(&self) -> bool {
        self.status == ChunkStatus::Finished
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
