//! Similarity comparators.
//!
//! A comparator scores how related two texts are, in `[0, 1]`:
//! - [`EmbeddingSimilarity`]: cosine similarity of normalized text embeddings
//! - [`ExactMatch`]: normalized string equality
//! - [`ContainsMatch`]: normalized substring containment
//!
//! Selectors map to comparators through [`ComparatorKind`].

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::models::clamp_score;

/// Scores semantic relatedness of two texts.
#[async_trait]
pub trait Comparator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Similarity of `a` and `b` in `[0, 1]`.
    async fn similarity(&self, a: &str, b: &str) -> Result<f64>;

    /// Similarity of `reference` against each candidate, in candidate order.
    async fn batch_similarity(&self, reference: &str, candidates: &[String]) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(self.similarity(reference, candidate).await?);
        }
        Ok(scores)
    }
}

/// Lowercase and trim.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

// ── Embedding ─────────────────────────────────────────────────────────────

/// Encodes texts into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces the embedder on first use.
pub type EmbedderLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Embedder>>> + Send + Sync>;

/// Offline embedder: bag of lowercase word tokens hashed into a fixed number
/// of buckets with SHA-256.
/// Character n-gram width for texts without word tokens.
const NGRAM: usize = 3;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Loader that hands out a fresh `HashEmbedder`.
    pub fn loader(dimension: usize) -> EmbedderLoader {
        Arc::new(move || -> BoxFuture<'static, Result<Arc<dyn Embedder>>> {
            Box::pin(async move { Ok(Arc::new(HashEmbedder::new(dimension)) as Arc<dyn Embedder>) })
        })
    }

    /// Word tokens, or character trigrams when the text has no words
    /// (emoji, punctuation). Whitespace-only text stays the zero vector.
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let lowered = text.to_lowercase();
        let mut words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .peekable();
        if words.peek().is_some() {
            for token in words {
                self.bump(&mut vector, token);
            }
            return vector;
        }

        let chars: Vec<char> = lowered.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.len() < NGRAM {
            if !chars.is_empty() {
                self.bump(&mut vector, &chars.iter().collect::<String>());
            }
            return vector;
        }
        for gram in chars.windows(NGRAM) {
            self.bump(&mut vector, &gram.iter().collect::<String>());
        }
        vector
    }

    fn bump(&self, vector: &mut [f32], token: &str) {
        let digest = Sha256::digest(token.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        vector[idx] += 1.0;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Scale `v` to unit length; the zero vector stays zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

/// Clamped dot product of two normalized vectors.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    clamp_score(f64::from(dot))
}

/// Identical non-empty texts after normalization score 1.0 whatever the
/// embedder returns for them.
fn same_text(a: &str, b: &str) -> bool {
    let a = normalize_text(a);
    !a.is_empty() && a == normalize_text(b)
}

/// Cosine similarity of text embeddings.
///
/// The embedder is loaded once, on first use, and shared read-only by every
/// concurrent caller of this comparator instance.
pub struct EmbeddingSimilarity {
    loader: EmbedderLoader,
    embedder: OnceCell<Arc<dyn Embedder>>,
}

impl EmbeddingSimilarity {
    pub fn new(loader: EmbedderLoader) -> Self {
        Self {
            loader,
            embedder: OnceCell::new(),
        }
    }

    /// Whether the embedder has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.embedder.initialized()
    }

    async fn embedder(&self) -> Result<&Arc<dyn Embedder>> {
        self.embedder
            .get_or_try_init(|| {
                debug!("loading embedder");
                (self.loader)()
            })
            .await
    }

    async fn embed_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder().await?.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(ProbeError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors.iter().map(|v| l2_normalize(v)).collect())
    }
}

impl Default for EmbeddingSimilarity {
    fn default() -> Self {
        Self::new(HashEmbedder::loader(HashEmbedder::DEFAULT_DIMENSION))
    }
}

#[async_trait]
impl Comparator for EmbeddingSimilarity {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        if same_text(a, b) {
            return Ok(1.0);
        }
        let embs = self.embed_normalized(&[a.to_string(), b.to_string()]).await?;
        Ok(cosine(&embs[0], &embs[1]))
    }

    async fn batch_similarity(&self, reference: &str, candidates: &[String]) -> Result<Vec<f64>> {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(reference.to_string());
        texts.extend(candidates.iter().cloned());
        let embs = self.embed_normalized(&texts).await?;
        let (head, rest) = embs.split_at(1);
        Ok(rest
            .iter()
            .zip(candidates)
            .map(|(e, candidate)| {
                if same_text(reference, candidate) {
                    1.0
                } else {
                    cosine(&head[0], e)
                }
            })
            .collect())
    }
}

// ── String matching ───────────────────────────────────────────────────────

/// 1.0 when the normalized texts are identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

#[async_trait]
impl Comparator for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        Ok(if normalize_text(a) == normalize_text(b) {
            1.0
        } else {
            0.0
        })
    }
}

/// Text extraction applied by [`ContainsMatch`] before comparing.
pub type ExtractFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 1.0 when either extracted text contains the other.
#[derive(Clone)]
pub struct ContainsMatch {
    extract: ExtractFn,
}

impl ContainsMatch {
    pub fn new() -> Self {
        Self {
            extract: Arc::new(normalize_text),
        }
    }

    pub fn with_extract(extract: ExtractFn) -> Self {
        Self { extract }
    }
}

impl Default for ContainsMatch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Comparator for ContainsMatch {
    fn name(&self) -> &'static str {
        "contains"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        let (a, b) = ((self.extract)(a), (self.extract)(b));
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        Ok(if a.contains(&b) || b.contains(&a) {
            1.0
        } else {
            0.0
        })
    }
}

// ── Selector ──────────────────────────────────────────────────────────────

/// Comparator selector used in property configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    #[default]
    Embedding,
    Exact,
    Contains,
}

impl ComparatorKind {
    pub const ALL: [ComparatorKind; 3] = [
        ComparatorKind::Embedding,
        ComparatorKind::Exact,
        ComparatorKind::Contains,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComparatorKind::Embedding => "embedding",
            ComparatorKind::Exact => "exact",
            ComparatorKind::Contains => "contains",
        }
    }

    /// Build the comparator. `loader` only matters for `Embedding`; without
    /// one the offline [`HashEmbedder`] is used.
    pub fn build(&self, loader: Option<EmbedderLoader>) -> Arc<dyn Comparator> {
        match self {
            ComparatorKind::Embedding => Arc::new(match loader {
                Some(loader) => EmbeddingSimilarity::new(loader),
                None => EmbeddingSimilarity::default(),
            }),
            ComparatorKind::Exact => Arc::new(ExactMatch),
            ComparatorKind::Contains => Arc::new(ContainsMatch::new()),
        }
    }
}

impl std::fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ComparatorKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ProbeError::UnknownComparator {
                name: s.to_string(),
                available: Self::ALL.iter().map(|k| k.name().to_string()).collect(),
            })
    }
}
