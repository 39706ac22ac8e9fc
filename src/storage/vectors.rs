use crate::core::error::Result;
use crate::storage::schema::EMBEDDINGS_TABLE;
use redb::{Database, ReadableTable};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

/// Which stored vectors a similarity search may return
#[derive(Debug, Clone)]
pub enum Candidates {
    All,
    Only(HashSet<u64>),
}

impl Candidates {
    fn admits(&self, id: u64) -> bool {
        match self {
            Candidates::All => true,
            Candidates::Only(ids) => ids.contains(&id),
        }
    }
}

/// Vector store for file embeddings, keyed by file record id
#[derive(Clone)]
pub struct EmbeddingIndex {
    db: Arc<Database>,
}

impl EmbeddingIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace the vector for `id`
    pub fn put(&self, id: u64, vector: &[f32]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EMBEDDINGS_TABLE)?;
            table.insert(id, encode(vector))?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<Option<Vec<f32>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let result = table.get(id)?.map(|guard| decode(guard.value()));
        Ok(result)
    }

    pub fn remove(&self, id: u64) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Drop every stored vector
    pub fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let ids: Vec<u64> = table
                .iter()?
                .map(|item| item.map(|(key, _)| key.value()))
                .collect::<std::result::Result<_, _>>()?;
            for id in ids {
                table.remove(id)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;
        let len = table.len()?;
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Rank stored vectors by cosine similarity to `query`.
    ///
    /// Linear scan keeping the best `limit` in a min-heap. Results are ordered by
    /// similarity descending, equal similarities by ascending id.
    pub fn similarity_search(
        &self,
        candidates: &Candidates,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(u64, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(limit + 1);

        let mut consider = |id: u64, bytes: &[u8]| {
            let similarity = cosine_similarity(query, &decode(bytes));
            heap.push(Ranked { id, similarity });
            if heap.len() > limit {
                heap.pop();
            }
        };

        match candidates {
            Candidates::Only(ids) if ids.len() < 64 => {
                // Point lookups beat a full scan for small candidate sets.
                let mut sorted: Vec<u64> = ids.iter().copied().collect();
                sorted.sort_unstable();
                for id in sorted {
                    if let Some(guard) = table.get(id)? {
                        consider(id, guard.value());
                    }
                }
            }
            _ => {
                for item in table.iter()? {
                    let (key, value) = item?;
                    let id = key.value();
                    if candidates.admits(id) {
                        consider(id, value.value());
                    }
                }
            }
        }

        let mut results: Vec<(u64, f32)> = heap.into_iter().map(|r| (r.id, r.similarity)).collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        Ok(results)
    }
}

/// Cosine similarity; 0.0 for mismatched dimensions or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn encode(vector: &[f32]) -> &[u8] {
    bytemuck::cast_slice(vector)
}

fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(std::mem::size_of::<f32>())
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect()
}

/// Heap entry ordered so that BinaryHeap (a max-heap) pops the weakest match first.
struct Ranked {
    id: u64,
    similarity: f32,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower similarity is "greater"; among equals the higher id is evicted first.
        other
            .similarity
            .partial_cmp(&self.similarity)
            .unwrap_or(Ordering::Equal)
            .then(self.id.cmp(&other.id))
    }
}
