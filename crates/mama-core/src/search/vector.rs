//! HNSW vector index
//!
//! USearch-backed approximate nearest neighbor index over decision
//! embeddings, keyed by the storage row id. The index is in-memory and is
//! rebuilt from the embeddings table on connect; the BLOB table is the
//! durable copy.

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// HNSW connectivity parameter (higher = better recall, more memory)
const DEFAULT_CONNECTIVITY: usize = 16;

/// HNSW expansion factor for index building
const DEFAULT_EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search (higher = better recall, slower)
const DEFAULT_EXPANSION_SEARCH: usize = 64;

/// Vector search error types
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum VectorSearchError {
    /// Failed to create the index
    IndexCreation(String),
    /// Failed to add a vector
    IndexAdd(String),
    /// Failed to search
    IndexSearch(String),
    /// Dimension mismatch (expected, got)
    InvalidDimensions(usize, usize),
}

impl std::fmt::Display for VectorSearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorSearchError::IndexCreation(e) => write!(f, "Index creation failed: {}", e),
            VectorSearchError::IndexAdd(e) => write!(f, "Failed to add vector: {}", e),
            VectorSearchError::IndexSearch(e) => write!(f, "Search failed: {}", e),
            VectorSearchError::InvalidDimensions(expected, got) => {
                write!(f, "Invalid dimensions: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for VectorSearchError {}

/// In-memory HNSW index keyed by storage row id
pub struct VectorIndex {
    index: Index,
    dimensions: usize,
}

impl VectorIndex {
    /// Create an empty index for `dimensions`-wide vectors.
    pub fn new(dimensions: usize) -> Result<Self, VectorSearchError> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
            multi: false,
        };

        let index =
            Index::new(&options).map_err(|e| VectorSearchError::IndexCreation(e.to_string()))?;

        Ok(Self { index, dimensions })
    }

    /// Number of vectors in the index.
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector width this index was built for.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Add a vector under a row id.
    ///
    /// usearch requires capacity to be reserved before adding.
    pub fn add(&mut self, rowid: u64, vector: &[f32]) -> Result<(), VectorSearchError> {
        if vector.len() != self.dimensions {
            return Err(VectorSearchError::InvalidDimensions(
                self.dimensions,
                vector.len(),
            ));
        }

        let capacity = self.index.capacity();
        let size = self.index.size();
        if size >= capacity {
            let new_capacity = std::cmp::max(capacity * 2, 16);
            self.index
                .reserve(new_capacity)
                .map_err(|e| VectorSearchError::IndexCreation(format!("reserve failed: {}", e)))?;
        }

        self.index
            .add(rowid, vector)
            .map_err(|e| VectorSearchError::IndexAdd(e.to_string()))
    }

    /// Nearest neighbors of `query`, as `(rowid, similarity)` pairs.
    pub fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, VectorSearchError> {
        if query.len() != self.dimensions {
            return Err(VectorSearchError::InvalidDimensions(
                self.dimensions,
                query.len(),
            ));
        }

        if self.is_empty() {
            return Ok(vec![]);
        }

        let results = self
            .index
            .search(query, limit)
            .map_err(|e| VectorSearchError::IndexSearch(e.to_string()))?;

        Ok(results
            .keys
            .iter()
            .zip(results.distances.iter())
            // Cosine distance → similarity
            .map(|(key, distance)| (*key, 1.0 - distance))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIM: usize = 8;

    fn test_vector(seed: f32) -> Vec<f32> {
        let raw: Vec<f32> = (0..DIM).map(|i| ((i as f32 + seed) / DIM as f32).sin()).collect();
        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        raw.into_iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::new(DIM).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), DIM);
        assert!(index.search(&test_vector(1.0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_add_and_search() {
        let mut index = VectorIndex::new(DIM).unwrap();
        index.add(1, &test_vector(1.0)).unwrap();
        index.add(2, &test_vector(2.0)).unwrap();
        index.add(3, &test_vector(50.0)).unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&test_vector(1.0), 3).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 1);
        assert!(results[0].1 > 0.99);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::new(DIM).unwrap();
        assert!(matches!(
            index.add(1, &[1.0, 2.0]),
            Err(VectorSearchError::InvalidDimensions(DIM, 2))
        ));
        assert!(index.search(&[1.0], 5).is_err());
    }

    #[test]
    fn test_capacity_growth() {
        let mut index = VectorIndex::new(DIM).unwrap();
        for i in 0..100 {
            index.add(i, &test_vector(i as f32)).unwrap();
        }
        assert_eq!(index.len(), 100);
    }
}
