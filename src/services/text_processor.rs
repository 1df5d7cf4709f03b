// Text Processing Service
// Normalization, tokenization and the text statistics fed into detection

use crate::models::TextStatistics;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_']+|[\u{4e00}-\u{9fff}]").expect("token regex"))
}

fn alpha_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+").expect("alpha word regex"))
}

fn odd_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}]").expect("space regex"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B]+").expect("whitespace regex"))
}

/// Normalize quotes, dashes, line endings and horizontal whitespace
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text
        .replace('\u{201c}', "\"")
        .replace('\u{201d}', "\"")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{2014}', "-");

    s = odd_space_re().replace_all(&s, " ").to_string();
    s = s.replace("\r\n", "\n").replace('\r', "\n");
    s = horizontal_ws_re().replace_all(&s, " ").to_string();

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Word tokens (ASCII words plus individual CJK characters)
pub fn tokenize(text: &str) -> Vec<&str> {
    token_re().find_iter(text).map(|m| m.as_str()).collect()
}

/// Estimate token count (Chinese chars + English words)
pub fn estimate_tokens(text: &str) -> usize {
    token_re().find_iter(text).count().max(1)
}

/// Keep the prefix of `text` holding its first `max_tokens` tokens
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    match token_re().find_iter(text).nth(max_tokens.saturating_sub(1)) {
        Some(m) if max_tokens > 0 => {
            let rest_has_tokens = token_re().find_at(text, m.end()).is_some();
            if rest_has_tokens {
                &text[..m.end()]
            } else {
                text
            }
        }
        Some(_) => "",
        None => text,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceOffset {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Sentence splitting with offset tracking; quotes and decimals do not split
pub fn split_sentences_advanced(text: &str) -> Vec<SentenceOffset> {
    if text.is_empty() {
        return vec![];
    }

    let mut sentences = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let quote_chars: HashSet<char> = ['"', '\u{201c}', '\u{201d}'].into_iter().collect();

    let mut current_start: usize = 0;
    let mut buffer = String::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        buffer.push(ch);

        if quote_chars.contains(&ch) {
            in_quote = !in_quote;
        }

        if ['。', '！', '？', '.', '!', '?'].contains(&ch) {
            if in_quote {
                i += 1;
                continue;
            }

            // 3.14
            if ch == '.'
                && i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit()
            {
                i += 1;
                continue;
            }

            // Swallow trailing whitespace into this sentence
            while i + 1 < chars.len() && chars[i + 1].is_whitespace() {
                i += 1;
                buffer.push(chars[i]);
            }

            let sentence_text = buffer.trim().to_string();
            if !sentence_text.is_empty() {
                sentences.push(SentenceOffset {
                    text: sentence_text,
                    start: current_start,
                    end: current_start + buffer.len(),
                });
            }
            current_start += buffer.len();
            buffer.clear();
        }

        i += 1;
    }

    let remaining = buffer.trim().to_string();
    if !remaining.is_empty() {
        sentences.push(SentenceOffset {
            text: remaining,
            start: current_start,
            end: text.len(),
        });
    }

    sentences
}

/// Vowel-group syllable estimate for an English word (minimum 1)
pub fn count_syllables(word: &str) -> usize {
    let lower = word.to_ascii_lowercase();
    let chars: Vec<char> = lower.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if chars.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &chars {
        let v = is_vowel(c);
        if v && !prev_vowel {
            count += 1;
        }
        prev_vowel = v;
    }

    // Silent trailing "e" ("make"), but not "-le" ("table")
    let n = chars.len();
    if n > 2 && chars[n - 1] == 'e' && chars[n - 2] != 'l' && !is_vowel(chars[n - 2]) && count > 1 {
        count -= 1;
    }

    count.max(1)
}

/// Flesch reading ease clamped to [0, 100]; 0 for text without words
pub fn flesch_reading_ease(text: &str) -> f64 {
    let words: Vec<&str> = alpha_word_re().find_iter(text).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return 0.0;
    }

    let sentences = split_sentences_advanced(text).len().max(1) as f64;
    let word_count = words.len() as f64;
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let score = 206.835 - 1.015 * (word_count / sentences) - 84.6 * (syllables as f64 / word_count);
    score.clamp(0.0, 100.0)
}

/// Unigram-entropy perplexity heuristic, in [20, 300]
pub fn estimate_perplexity(text: &str) -> f64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 120.0;
    }

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for t in &tokens {
        *freq.entry(*t).or_insert(0) += 1;
    }

    let total = tokens.len() as f64;
    let entropy = -freq
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            p * (p + 1e-12).ln()
        })
        .sum::<f64>();

    let ppl_uni = entropy.exp();
    let ppl_scaled = 20.0 + ((ppl_uni - 1.0) * 22.5).min(280.0);
    let diversity = freq.len() as f64 / total.max(1.0);
    let base = 120.0 - diversity * 60.0 + (text.chars().count() as f64) / 500.0;
    let val = 0.5 * ppl_scaled + 0.5 * base;
    let clamped = val.clamp(20.0, 300.0);
    (clamped * 100.0).round() / 100.0
}

/// Geometric-mean token probability implied by the perplexity estimate
pub fn average_token_probability(text: &str) -> f64 {
    1.0 / estimate_perplexity(text)
}

pub fn compute_text_statistics(text: &str) -> TextStatistics {
    let word_count = tokenize(text).len();
    let sentences = split_sentences_advanced(text);
    let avg_sentence_len = if sentences.is_empty() {
        0.0
    } else {
        sentences.iter().map(|s| s.text.chars().count()).sum::<usize>() as f64 / sentences.len() as f64
    };

    TextStatistics {
        word_count,
        sentence_count: sentences.len(),
        avg_sentence_len,
        readability: flesch_reading_ease(text),
        avg_token_probability: average_token_probability(text),
    }
}

/// Stylometry metrics used by the local scorer
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StylometryMetrics {
    pub ttr: f64, // Type-Token Ratio
    pub avg_sentence_len: f64,
    pub repeat_ratio: f64,
    pub ngram_repeat_rate: f64,
    pub punctuation_ratio: f64,
}

pub fn compute_stylometry(text: &str) -> StylometryMetrics {
    let words: Vec<String> = tokenize(text).into_iter().map(|w| w.to_lowercase()).collect();
    let total_words = words.len();
    if total_words == 0 {
        return StylometryMetrics::default();
    }

    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
    let ttr = unique.len() as f64 / total_words as f64;

    let sentences = split_sentences_advanced(text);
    let avg_sentence_len = if sentences.is_empty() {
        text.chars().count() as f64
    } else {
        sentences.iter().map(|s| s.text.chars().count()).sum::<usize>() as f64 / sentences.len() as f64
    };

    let punct_count = text.chars().filter(|c| matches!(c, ',' | '.' | '!' | '?' | ';' | ':' | '，' | '。' | '！' | '？')).count();
    let punctuation_ratio = punct_count as f64 / text.chars().count().max(1) as f64;

    // Fraction of vocab items that occur >= 3 times
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *freq.entry(w.as_str()).or_insert(0) += 1;
    }
    let repeat_ratio = freq.values().filter(|&&v| v >= 3).count() as f64 / freq.len().max(1) as f64;

    let refs: Vec<&str> = words.iter().map(String::as_str).collect();

    StylometryMetrics {
        ttr,
        avg_sentence_len,
        repeat_ratio,
        ngram_repeat_rate: ngram_repeat_rate(&refs, 3),
        punctuation_ratio,
    }
}

fn ngram_repeat_rate(tokens: &[&str], n: usize) -> f64 {
    if n == 0 || tokens.len() < n + 1 {
        return 0.0;
    }
    let mut counts: HashMap<&[&str], usize> = HashMap::new();
    let mut total = 0usize;
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
        total += 1;
    }
    let repeats = counts.values().filter(|&&c| c >= 2).map(|&c| c - 1).sum::<usize>();
    repeats as f64 / total.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Hello\u{201c}World\u{201d}"), "Hello\"World\"");
        assert_eq!(normalize_text("  a \t b\r\n  c  "), "a b\nc");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("Hello World"), 2);
        assert_eq!(estimate_tokens("你好世界"), 4);
        assert_eq!(estimate_tokens("Hello 你好"), 3);
        assert_eq!(estimate_tokens(""), 1);
    }

    #[test]
    fn test_truncate_to_tokens() {
        assert_eq!(truncate_to_tokens("one two three four", 2), "one two");
        assert_eq!(truncate_to_tokens("one two", 2), "one two");
        assert_eq!(truncate_to_tokens("one two.", 2), "one two.");
        assert_eq!(truncate_to_tokens("one two", 5), "one two");
    }

    #[test]
    fn test_split_sentences_keeps_decimals_and_quotes() {
        let sentences = split_sentences_advanced("Pi is 3.14 roughly. He said \"stop. now\" loudly! Done");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Pi is 3.14 roughly.", "He said \"stop. now\" loudly!", "Done"]);
        assert_eq!(sentences[0].start, 0);
        assert_eq!(sentences[2].end, "Pi is 3.14 roughly. He said \"stop. now\" loudly! Done".len());
    }

    #[test]
    fn test_count_syllables() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("reading"), 2);
        assert_eq!(count_syllables("beautiful"), 3);
        assert_eq!(count_syllables("the"), 1);
    }

    #[test]
    fn test_flesch_orders_simple_above_complex() {
        let simple = flesch_reading_ease("The cat sat on the mat. The dog ran to the cat.");
        let complex = flesch_reading_ease(
            "Institutional considerations necessitate comprehensive organizational restructuring \
             notwithstanding administrative complications.",
        );
        assert!(simple > 80.0, "simple={}", simple);
        assert!(complex < 30.0, "complex={}", complex);
        assert_eq!(flesch_reading_ease("12345"), 0.0);
    }

    #[test]
    fn test_perplexity_bounds_and_token_probability() {
        let ppl = estimate_perplexity("the the the the the the");
        assert!((20.0..=300.0).contains(&ppl));
        assert_eq!(estimate_perplexity(""), 120.0);
        let p = average_token_probability("a quick brown fox");
        assert!(p > 0.0 && p <= 1.0 / 20.0);
    }

    #[test]
    fn test_text_statistics() {
        let stats = compute_text_statistics("One short line. Another short line!");
        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.sentence_count, 2);
        assert!(stats.readability > 0.0);
    }

    #[test]
    fn test_stylometry_repetition() {
        let repetitive = compute_stylometry("the cat sat the cat sat the cat sat the cat sat");
        let varied = compute_stylometry("Every morning Lena cycled past crooked orchards toward town.");
        assert!(repetitive.ttr < varied.ttr);
        assert!(repetitive.ngram_repeat_rate > 0.5);
        assert_eq!(varied.ngram_repeat_rate, 0.0);
    }
}
