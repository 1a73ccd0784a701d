// ABOUTME: Chunked fan-out with bounded concurrency and early termination.
// ABOUTME: Processors emit one result or many; failures abort or fall back per policy.

use futures::future;

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Output of one processor call: a single result or several.
///
/// An explicit union rather than shape-sniffing, so a processor whose result
/// type is itself a `Vec` stays unambiguous. An empty `Many` contributes
/// nothing to the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutput<R> {
    Single(R),
    Many(Vec<R>),
}

impl<R> ItemOutput<R> {
    /// Number of results this output contributes.
    pub fn len(&self) -> usize {
        match self {
            ItemOutput::Single(_) => 1,
            ItemOutput::Many(results) => results.len(),
        }
    }

    /// Whether this output contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append_to(self, out: &mut Vec<R>) {
        match self {
            ItemOutput::Single(result) => out.push(result),
            ItemOutput::Many(results) => out.extend(results),
        }
    }
}

impl<R> From<R> for ItemOutput<R> {
    fn from(result: R) -> Self {
        ItemOutput::Single(result)
    }
}

impl<R> From<Vec<R>> for ItemOutput<R> {
    fn from(results: Vec<R>) -> Self {
        ItemOutput::Many(results)
    }
}

/// Configurable chunked fan-out.
///
/// Items are split into fixed-size chunks; all items of a chunk are
/// processed concurrently, and one chunk is awaited fully before the next
/// starts, bounding concurrency at `chunk_size`. There is no ordering
/// guarantee among items inside a chunk, but the output preserves item
/// order.
#[derive(Debug, Clone)]
pub struct ChunkRunner {
    chunk_size: usize,
    max_results: Option<usize>,
}

impl Default for ChunkRunner {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_results: None,
        }
    }
}

impl ChunkRunner {
    /// Create a runner with the default chunk size and no result cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process up to `chunk_size` items concurrently. Clamped to at least 1.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stop once this many results have accumulated; the output is truncated
    /// to exactly this length. Chunks past the cap never start.
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Process `items`, aborting on the first failure.
    ///
    /// When an item fails, remaining chunks never start. Other items of the
    /// failing chunk have already run to completion unobserved - there is no
    /// cancellation primitive.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, processor: F) -> Result<Vec<R>, anyhow::Error>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<ItemOutput<R>, anyhow::Error>>,
    {
        self.run_inner(items, processor, None::<fn(anyhow::Error) -> ItemOutput<R>>)
            .await
    }

    /// Process `items`, converting each failure into `on_error`'s output
    /// instead of aborting the batch.
    pub async fn run_with_fallback<T, R, F, Fut, E>(
        &self,
        items: Vec<T>,
        processor: F,
        on_error: E,
    ) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<ItemOutput<R>, anyhow::Error>>,
        E: Fn(anyhow::Error) -> ItemOutput<R>,
    {
        // on_error converts every failure, so the inner loop cannot fail.
        self.run_inner(items, processor, Some(on_error))
            .await
            .unwrap_or_default()
    }

    async fn run_inner<T, R, F, Fut, E>(
        &self,
        items: Vec<T>,
        processor: F,
        on_error: Option<E>,
    ) -> Result<Vec<R>, anyhow::Error>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<ItemOutput<R>, anyhow::Error>>,
        E: Fn(anyhow::Error) -> ItemOutput<R>,
    {
        let mut out = Vec::new();
        let mut iter = items.into_iter();

        loop {
            if let Some(limit) = self.max_results {
                if out.len() >= limit {
                    break;
                }
            }

            let chunk: Vec<T> = iter.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let results = future::join_all(chunk.into_iter().map(&processor)).await;

            for result in results {
                match result {
                    Ok(output) => output.append_to(&mut out),
                    Err(error) => match &on_error {
                        Some(fallback) => fallback(error).append_to(&mut out),
                        None => return Err(error),
                    },
                }
            }
        }

        if let Some(limit) = self.max_results {
            out.truncate(limit);
        }

        Ok(out)
    }
}

/// Process `items` in default-size chunks, aborting on the first failure.
pub async fn process_in_chunks<T, R, F, Fut>(
    items: Vec<T>,
    processor: F,
) -> Result<Vec<R>, anyhow::Error>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<ItemOutput<R>, anyhow::Error>>,
{
    ChunkRunner::new().run(items, processor).await
}
