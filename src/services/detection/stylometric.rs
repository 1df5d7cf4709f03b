// Stylometric Scorer
// Offline AI-probability estimate from lexical statistics
//
// Uses soft thresholds (sigmoid) and logit-space accumulation so that the
// output is continuous rather than bucketed.

use crate::services::text_processor::{compute_stylometry, estimate_perplexity};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Sigmoid function: smooth transition around center
/// k controls steepness (smaller = steeper)
#[inline]
fn sigmoid(x: f64, center: f64, k: f64) -> f64 {
    1.0 / (1.0 + ((x - center) / k).exp())
}

/// Inverse sigmoid: 1 - sigmoid (for "greater than" thresholds)
#[inline]
fn sigmoid_inv(x: f64, center: f64, k: f64) -> f64 {
    1.0 - sigmoid(x, center, k)
}

#[inline]
fn from_logit(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// Deterministic hash-based noise in [-0.5, 0.5]
fn deterministic_noise(text: &str, seed: u64) -> f64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    seed.hash(&mut hasher);
    let hash = hasher.finish();
    ((hash % 10000) as f64 / 10000.0) - 0.5
}

fn is_mostly_cjk(text: &str) -> bool {
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    total > 0 && cjk as f64 / total as f64 > 0.3
}

#[derive(Debug, Clone, Default)]
pub struct StylometricScore {
    pub probability: f64,
    pub explanations: Vec<String>,
}

/// Estimate the probability that `text` is machine-written
pub fn score_ai_probability(text: &str) -> StylometricScore {
    let metrics = compute_stylometry(text);
    let ppl = estimate_perplexity(text);
    let is_cjk = is_mostly_cjk(text);
    let mut explanations = Vec::new();

    let ttr = metrics.ttr;
    let rep = metrics.repeat_ratio;
    let ngram = metrics.ngram_repeat_rate;
    let avg_len = metrics.avg_sentence_len;

    // CJK stylometry is character-based; gentler thresholds avoid an AI bias
    let (ttr_low_center, ttr_high_center) = if is_cjk { (0.46, 0.70) } else { (0.58, 0.78) };
    let (rep_center, rep_k) = if is_cjk { (0.26, 0.07) } else { (0.18, 0.06) };
    let (ngram_center, ngram_k) = if is_cjk { (0.14, 0.05) } else { (0.10, 0.04) };
    let (len_short_center, len_long_center) = if is_cjk { (22.0, 90.0) } else { (35.0, 120.0) };
    let (ppl_low_center, ppl_high_center) = if is_cjk { (75.0, 180.0) } else { (85.0, 200.0) };

    let mut logit: f64 = 0.0;

    // Lexical diversity: low TTR reads as templated
    let ttr_contrib = sigmoid(ttr, ttr_low_center, 0.08) * 1.2 + sigmoid_inv(ttr, ttr_high_center, 0.06) * -0.9;
    logit += ttr_contrib;
    if ttr_contrib.abs() > 0.3 {
        explanations.push(format!("ttr={:.3} contrib={:.2}", ttr, ttr_contrib));
    }

    let rep_contrib = sigmoid_inv(rep, rep_center, rep_k);
    logit += rep_contrib;
    if rep_contrib > 0.3 {
        explanations.push(format!("repeat={:.3} contrib={:.2}", rep, rep_contrib));
    }

    let ngram_contrib = sigmoid_inv(ngram, ngram_center, ngram_k) * 1.1;
    logit += ngram_contrib;
    if ngram_contrib > 0.3 {
        explanations.push(format!("ngram={:.3} contrib={:.2}", ngram, ngram_contrib));
    }

    // U-shaped: very short or very long sentences
    let len_contrib = sigmoid(avg_len, len_short_center, 10.0) * 0.3 + sigmoid_inv(avg_len, len_long_center, 25.0) * 0.4;
    logit += len_contrib;
    if len_contrib.abs() > 0.15 {
        explanations.push(format!("avg_len={:.1} contrib={:.2}", avg_len, len_contrib));
    }

    // Predictable text has low perplexity
    let ppl_contrib = sigmoid(ppl, ppl_low_center, 20.0) + sigmoid_inv(ppl, ppl_high_center, 30.0) * -0.6;
    logit += ppl_contrib;
    if ppl_contrib.abs() > 0.2 {
        explanations.push(format!("ppl={:.1} contrib={:.2}", ppl, ppl_contrib));
    }

    let ai_anchor = sigmoid(ttr, 0.55, 0.05)
        * sigmoid(ppl, 90.0, 15.0)
        * (sigmoid_inv(rep, 0.15, 0.04) + sigmoid_inv(ngram, 0.10, 0.03))
        / 2.0;
    if ai_anchor > 0.3 {
        logit += ai_anchor * 1.5;
        explanations.push(format!("ai_anchor strength={:.2}", ai_anchor));
    }

    let human_anchor = sigmoid_inv(ttr, 0.70, 0.05)
        * sigmoid_inv(ppl, 170.0, 25.0)
        * sigmoid(rep, 0.15, 0.04)
        * sigmoid_inv(avg_len, 25.0, 8.0);
    if human_anchor > 0.3 {
        logit += human_anchor * -1.2;
        explanations.push(format!("human_anchor strength={:.2}", human_anchor));
    }

    let mut prob = from_logit(logit);

    // Break up quantization in the undecided band without losing reproducibility
    if prob > 0.35 && prob < 0.75 {
        prob += deterministic_noise(text, 42) * 0.02;
    }

    StylometricScore {
        probability: prob.clamp(0.02, 0.98),
        explanations,
    }
}

/// Human-likeness in [0.02, 0.98] from the perplexity signal alone
pub fn score_human_likeness(text: &str) -> f64 {
    sigmoid_inv(estimate_perplexity(text), 110.0, 30.0).clamp(0.02, 0.98)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_shapes() {
        assert!((sigmoid(0.5, 0.5, 0.1) - 0.5).abs() < 1e-12);
        assert!(sigmoid(0.0, 0.5, 0.1) > 0.99);
        assert!(sigmoid_inv(1.0, 0.5, 0.1) > 0.99);
    }

    #[test]
    fn test_repetitive_text_scores_higher_than_varied_text() {
        let repetitive = "The system is good. The system is good. The system is good. \
                          The system is good. The system is good. The system is good.";
        let varied = "Grandma's kitchen smelled of burnt cardamom whenever storms rolled off \
                      the harbor; nobody dared mention it, least of all Uncle Teodor, who \
                      once tried fixing her stove with a bent trombone slide.";
        let r = score_ai_probability(repetitive).probability;
        let v = score_ai_probability(varied).probability;
        assert!(r > v, "repetitive={} varied={}", r, v);
    }

    #[test]
    fn test_scores_are_bounded_and_deterministic() {
        let text = "Some ordinary sentence about weather and trains.";
        let a = score_ai_probability(text).probability;
        let b = score_ai_probability(text).probability;
        assert_eq!(a, b);
        assert!((0.02..=0.98).contains(&a));
        assert!((0.02..=0.98).contains(&score_human_likeness(text)));
        assert!((0.02..=0.98).contains(&score_ai_probability("").probability));
    }
}
