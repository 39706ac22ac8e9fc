use crate::core::error::Result;

/// Embedding dimension of [`HashEmbedder`]
pub const HASH_EMBEDDING_DIM: usize = 256;

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for a given model and always return
/// vectors of [`Embedder::dimension`] length.
pub trait Embedder: Send + Sync {
    /// Identifier of the model behind this embedder
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Feature-hashing embedder.
///
/// Lower-cased word tokens and character trigrams are hashed with FNV-1a into
/// a fixed number of buckets, signed by one hash bit, then L2-normalised. It
/// needs no model files, which makes it the default capability.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(HASH_EMBEDDING_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "fnv1a-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.add_feature(&mut vector, token.as_bytes(), 1.0);

            let chars: Vec<char> = format!("^{}$", token).chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), 0.5);
            }
        }

        // No features: the zero vector, which is similar to nothing
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Ok(vector);
        }
        for value in vector.iter_mut() {
            *value /= norm;
        }

        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}
