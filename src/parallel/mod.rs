// ABOUTME: Parallel module for bounded-concurrency fan-out over item lists.
// ABOUTME: Items run concurrently within fixed-size chunks; chunks run sequentially.

mod chunks;

pub use chunks::{ChunkRunner, DEFAULT_CHUNK_SIZE, ItemOutput, process_in_chunks};
