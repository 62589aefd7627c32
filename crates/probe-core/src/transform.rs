//! Variant transforms: turn one input into a finite list of perturbed inputs.
//!
//! Paraphrase, entity-swap and negation ask the model under test to write the
//! variants; typo injection is local and seeded.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::provider::{LlmProvider, DEFAULT_TEMPERATURE};

/// Kind of perturbation a transform applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Paraphrase,
    EntitySwap,
    Negation,
    Typo,
}

impl TransformKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::Paraphrase => "paraphrase",
            TransformKind::EntitySwap => "entity_swap",
            TransformKind::Negation => "negation",
            TransformKind::Typo => "typo",
        }
    }
}

/// Produces perturbed variants of an input text.
///
/// Each call generates a fresh list; model-driven transforms need `provider`.
#[async_trait]
pub trait Transform: Send + Sync {
    fn kind(&self) -> TransformKind;

    async fn apply(&self, text: &str, provider: Option<&dyn LlmProvider>) -> Result<Vec<String>>;
}

fn require_provider<'a>(
    kind: TransformKind,
    provider: Option<&'a dyn LlmProvider>,
) -> Result<&'a dyn LlmProvider> {
    provider.ok_or_else(|| {
        ProbeError::Transform(format!("{} transform requires an LLM provider", kind.name()))
    })
}

/// Parse a numbered/bulleted list out of a free-text model response.
///
/// Blank lines are dropped, leading digits and then any of `.`, `-`, `)` are
/// stripped from each line, and at most `n` entries are kept.
pub fn parse_numbered_lines(raw: &str, n: usize) -> Vec<String> {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', '-', ')'])
                .trim()
        })
        .filter(|cleaned| !cleaned.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}

/// `n` meaning-preserving rephrasings written by the model.
#[derive(Debug, Clone)]
pub struct ParaphraseTransform {
    n: usize,
}

impl ParaphraseTransform {
    pub const DEFAULT_N: usize = 5;

    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    fn prompt(&self, text: &str) -> String {
        format!(
            "Rephrase the following text in {n} different ways. \
             Each rephrasing must preserve the exact same meaning and intent. \
             Return ONLY the rephrasings, one per line, numbered 1-{n}.\n\n\
             Text: {text}",
            n = self.n
        )
    }
}

impl Default for ParaphraseTransform {
    fn default() -> Self {
        Self::new(Self::DEFAULT_N)
    }
}

#[async_trait]
impl Transform for ParaphraseTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::Paraphrase
    }

    async fn apply(&self, text: &str, provider: Option<&dyn LlmProvider>) -> Result<Vec<String>> {
        let provider = require_provider(self.kind(), provider)?;
        let raw = provider.generate(&self.prompt(text), DEFAULT_TEMPERATURE).await?;
        let variants = parse_numbered_lines(&raw, self.n);
        debug!(transform = "paraphrase", requested = self.n, produced = variants.len());
        Ok(variants)
    }
}

/// `n` variants with named entities swapped for plausible alternatives.
#[derive(Debug, Clone)]
pub struct EntitySwapTransform {
    n: usize,
}

impl EntitySwapTransform {
    pub const DEFAULT_N: usize = 3;

    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    fn prompt(&self, text: &str) -> String {
        format!(
            "Take this text and create {n} variants by swapping named entities \
             (person names, places, organizations, specific numbers) with different \
             but plausible alternatives. Keep the structure and intent identical.\n\
             Return ONLY the variants, one per line, numbered 1-{n}.\n\n\
             Text: {text}",
            n = self.n
        )
    }
}

impl Default for EntitySwapTransform {
    fn default() -> Self {
        Self::new(Self::DEFAULT_N)
    }
}

#[async_trait]
impl Transform for EntitySwapTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::EntitySwap
    }

    async fn apply(&self, text: &str, provider: Option<&dyn LlmProvider>) -> Result<Vec<String>> {
        let provider = require_provider(self.kind(), provider)?;
        let raw = provider.generate(&self.prompt(text), DEFAULT_TEMPERATURE).await?;
        let variants = parse_numbered_lines(&raw, self.n);
        debug!(transform = "entity_swap", requested = self.n, produced = variants.len());
        Ok(variants)
    }
}

/// Exactly one negated restatement written by the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegationTransform;

impl NegationTransform {
    fn prompt(text: &str) -> String {
        format!(
            "Negate the following question or statement. If it asks 'Is X true?', \
             change it to 'Is X NOT true?' or 'Is X false?'. Preserve the topic.\n\
             Return ONLY the negated version, nothing else.\n\n\
             Text: {text}"
        )
    }
}

#[async_trait]
impl Transform for NegationTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::Negation
    }

    async fn apply(&self, text: &str, provider: Option<&dyn LlmProvider>) -> Result<Vec<String>> {
        let provider = require_provider(self.kind(), provider)?;
        let raw = provider.generate(&Self::prompt(text), DEFAULT_TEMPERATURE).await?;
        let negated = raw.trim();
        if negated.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![negated.to_string()])
    }
}

/// `n` variants, each with one pair of adjacent interior characters swapped.
///
/// Texts shorter than [`TypoTransform::MIN_CHARS`] characters are returned
/// unchanged. The random stream is seeded once per transform, so repeated
/// calls on the same instance continue the same sequence.
#[derive(Debug)]
pub struct TypoTransform {
    n: usize,
    rng: Mutex<StdRng>,
}

impl TypoTransform {
    pub const DEFAULT_N: usize = 3;
    pub const MIN_CHARS: usize = 4;

    /// Seeded from `seed`, or from OS entropy when `None`.
    pub fn new(n: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            n,
            rng: Mutex::new(rng),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Generate the variants without going through the async trait.
    pub fn perturb(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() < Self::MIN_CHARS {
            return vec![text.to_string(); self.n];
        }

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..self.n)
            .map(|_| {
                let mut swapped = chars.clone();
                let idx = rng.gen_range(1..=chars.len() - 2);
                swapped.swap(idx, idx + 1);
                swapped.into_iter().collect()
            })
            .collect()
    }
}

impl Default for TypoTransform {
    fn default() -> Self {
        Self::new(Self::DEFAULT_N, None)
    }
}

#[async_trait]
impl Transform for TypoTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::Typo
    }

    async fn apply(&self, text: &str, _provider: Option<&dyn LlmProvider>) -> Result<Vec<String>> {
        Ok(self.perturb(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replies with a fixed response and remembers the last prompt.
    struct Canned {
        reply: String,
        last_prompt: Mutex<Option<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_parse_numbered_lines_tolerates_fewer_lines() {
        let parsed = parse_numbered_lines("1. Hello there\n2. Hi!\n", 5);
        assert_eq!(parsed, vec!["Hello there", "Hi!"]);
    }

    #[test]
    fn test_parse_numbered_lines_strips_markers_and_truncates() {
        let raw = "\n1) First\n\n- Second\n3.Third\n10. Fourth\n   \n5 - Fifth\n";
        let parsed = parse_numbered_lines(raw, 4);
        assert_eq!(parsed, vec!["First", "Second", "Third", "Fourth"]);
    }

    #[test]
    fn test_parse_numbered_lines_drops_marker_only_lines() {
        assert!(parse_numbered_lines("1.\n2)\n-\n", 3).is_empty());
        assert!(parse_numbered_lines("", 3).is_empty());
    }

    #[tokio::test]
    async fn test_paraphrase_requires_provider() {
        let err = ParaphraseTransform::default()
            .apply("What is 2+2?", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Transform(_)));
        assert!(err.to_string().contains("paraphrase"));
    }

    #[tokio::test]
    async fn test_paraphrase_prompt_and_parse() {
        let provider = Canned::new("1. What does 2+2 equal?\n2. How much is 2 plus 2?\n3. Sum of 2 and 2?");
        let variants = ParaphraseTransform::new(2)
            .apply("What is 2+2?", Some(&provider))
            .await
            .unwrap();
        assert_eq!(variants, vec!["What does 2+2 equal?", "How much is 2 plus 2?"]);

        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("in 2 different ways"));
        assert!(prompt.ends_with("Text: What is 2+2?"));
    }

    #[tokio::test]
    async fn test_entity_swap_empty_response_yields_no_variants() {
        let provider = Canned::new("   \n\n");
        let variants = EntitySwapTransform::default()
            .apply("Alice lives in Paris.", Some(&provider))
            .await
            .unwrap();
        assert!(variants.is_empty());
    }

    #[tokio::test]
    async fn test_negation_returns_single_trimmed_line() {
        let provider = Canned::new("  Is 2+2 NOT equal to 4?\n");
        let variants = NegationTransform
            .apply("Is 2+2=4?", Some(&provider))
            .await
            .unwrap();
        assert_eq!(variants, vec!["Is 2+2 NOT equal to 4?"]);
    }

    #[tokio::test]
    async fn test_negation_requires_provider() {
        assert!(NegationTransform.apply("Is 2+2=4?", None).await.is_err());
    }

    #[tokio::test]
    async fn test_typo_short_text_unchanged() {
        let variants = TypoTransform::new(3, Some(7)).apply("abc", None).await.unwrap();
        assert_eq!(variants, vec!["abc", "abc", "abc"]);
    }

    #[test]
    fn test_typo_swaps_one_interior_adjacent_pair() {
        let text = "What is the capital of France?";
        let original: Vec<char> = text.chars().collect();
        for variant in TypoTransform::new(20, Some(42)).perturb(text) {
            let chars: Vec<char> = variant.chars().collect();
            assert_eq!(chars.len(), original.len());
            assert_eq!(chars[0], original[0]);
            let diffs: Vec<usize> = (0..chars.len()).filter(|&i| chars[i] != original[i]).collect();
            // Swapping two equal characters leaves the text unchanged.
            if diffs.is_empty() {
                continue;
            }
            assert_eq!(diffs.len(), 2);
            assert_eq!(diffs[1], diffs[0] + 1);
            assert_eq!(chars[diffs[0]], original[diffs[1]]);
        }
    }

    #[test]
    fn test_typo_same_seed_is_reproducible() {
        let text = "Explain photosynthesis in 2 sentences.";
        let a = TypoTransform::new(5, Some(1234)).perturb(text);
        let b = TypoTransform::new(5, Some(1234)).perturb(text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_transform_kind_names() {
        assert_eq!(TransformKind::EntitySwap.name(), "entity_swap");
        assert_eq!(TypoTransform::default().kind(), TransformKind::Typo);
    }
}
