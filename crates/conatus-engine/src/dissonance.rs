//! Dissonance Engine — scores an input event against the current state.
//!
//! Three components: per-channel mismatch, contradiction against corpus
//! results, and novelty. Scoring never fails: degenerate vectors score
//! similarity 0 (maximal distance) so the per-cycle path stays available.

use conatus_core::config::DissonanceConfig;
use conatus_core::tensor::{cosine, Channel, StateTensor, CHANNEL_COUNT};
use conatus_core::traits::ContradictionDetector;
use conatus_core::types::{CorpusHit, DissonanceReport, HardNegative, HARD_NEGATIVE_TEXT_LIMIT};
use conatus_core::Result;
use tracing::debug;

#[derive(Debug)]
pub struct DissonanceEngine {
    config: DissonanceConfig,
}

impl DissonanceEngine {
    /// Construction validates the per-channel weights (sum 1.0 ± 1%).
    /// Bad configuration is fatal here, never at scoring time.
    pub fn new(config: DissonanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DissonanceConfig {
        &self.config
    }

    /// Score an input vector against a state, with optional corpus results
    /// and an optional external contradiction detector.
    pub fn score(
        &self,
        input: &[f32],
        state: &StateTensor,
        corpus: &[CorpusHit],
        detector: Option<&dyn ContradictionDetector>,
    ) -> DissonanceReport {
        let mut per_channel = [0.0f32; CHANNEL_COUNT];
        let mut base = 0.0f32;
        for channel in Channel::ALL {
            let distance = 1.0 - cosine(input, state.channel(channel));
            let weighted = self.config.channel_weights[channel.index()] * distance;
            per_channel[channel.index()] = weighted;
            base += weighted;
        }

        let (hard_negatives, max_similarity) = self.scan_corpus(input, corpus, detector);

        let contradiction = if corpus.is_empty() {
            0.0
        } else {
            hard_negatives.len() as f32 / corpus.len() as f32
        };

        let novelty = match max_similarity {
            None => 1.0,
            Some(max) if max < self.config.novelty_floor => (1.0 - max).max(0.0),
            Some(_) => 0.0,
        };

        let total = base
            + self.config.contradiction_weight * contradiction
            + self.config.novelty_weight * novelty;
        let is_shock = total > self.config.shock_threshold;

        debug!(
            base,
            contradiction, novelty, total, is_shock, "dissonance scored"
        );

        DissonanceReport {
            total,
            per_channel,
            hard_negatives,
            max_similarity,
            is_shock,
        }
    }

    /// Flag hard negatives among corpus results.
    ///
    /// A result is a hard negative when its input similarity is below the
    /// hard threshold, or when it sits in the middle band and the supplied
    /// detector flags it.
    fn scan_corpus(
        &self,
        input: &[f32],
        corpus: &[CorpusHit],
        detector: Option<&dyn ContradictionDetector>,
    ) -> (Vec<HardNegative>, Option<f32>) {
        let mut hard_negatives = Vec::new();
        let mut max_similarity: Option<f32> = None;

        for hit in corpus {
            let similarity = cosine(input, &hit.vector);
            max_similarity = Some(max_similarity.map_or(similarity, |m| m.max(similarity)));

            let flagged = if similarity < self.config.hard_negative_threshold {
                true
            } else if similarity >= self.config.band_low && similarity < self.config.band_high {
                detector.is_some_and(|d| d.contradicts(input, hit))
            } else {
                false
            };

            if flagged {
                hard_negatives.push(HardNegative {
                    similarity,
                    text: hit.text.as_deref().map(truncate_chars),
                    source: hit.source.clone(),
                });
            }
        }

        (hard_negatives, max_similarity)
    }
}

fn truncate_chars(text: &str) -> String {
    text.chars().take(HARD_NEGATIVE_TEXT_LIMIT).collect()
}
