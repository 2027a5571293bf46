//! Structural key generators and the per-method dispatcher.
//!
//! Generators are pure and total: malformed or empty input produces an empty
//! key set rather than an error. The dispatcher owns normalization, case
//! folding and the per-method defaults.

use crate::config::{
    COMPOSITE_PREFIX_LENGTH, DEFAULT_NGRAM_SIZE, DEFAULT_PREFIX_LENGTH, DEFAULT_SUFFIX_LENGTH,
    PAD_CHAR,
};
use crate::models::{BlockingKey, BlockingKeyConfig, BlockingMethod, KeyOptions, Record};
use crate::normalize::normalize;
use crate::phonetic::{cologne_phonetic, metaphone, soundex};
use rustc_hash::FxHashSet;
use tracing::trace;

fn compact_chars(value: &str) -> Vec<char> {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn exact(value: &str) -> Vec<String> {
    vec![value.to_string()]
}

/// First `n` non-whitespace chars, right-padded with `_` to exactly `n`.
pub fn prefix(value: &str, n: usize) -> String {
    let chars = compact_chars(value);
    let mut key: String = chars.iter().take(n).collect();
    key.extend(std::iter::repeat_n(PAD_CHAR, n.saturating_sub(chars.len())));
    key
}

/// Last `n` non-whitespace chars, left-padded with `_` to exactly `n`.
pub fn suffix(value: &str, n: usize) -> String {
    let chars = compact_chars(value);
    let start = chars.len().saturating_sub(n);
    let mut key: String = std::iter::repeat_n(PAD_CHAR, n.saturating_sub(chars.len())).collect();
    key.extend(&chars[start..]);
    key
}

/// Distinct `n`-char windows in first-seen order.
///
/// Values shorter than `n` produce themselves as the single key so short
/// values still land in a block.
pub fn ngrams(value: &str, n: usize) -> Vec<String> {
    let chars = compact_chars(value);
    if n == 0 || chars.is_empty() {
        return Vec::new();
    }
    if chars.len() < n {
        return vec![chars.into_iter().collect()];
    }

    let mut seen = FxHashSet::default();
    chars
        .windows(n)
        .map(|w| w.iter().collect::<String>())
        .filter(|gram| seen.insert(gram.clone()))
        .collect()
}

/// Union of prefix(3), Soundex and Cologne Phonetic keys, without empties.
pub fn composite(value: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(3);
    for key in [
        prefix(value, COMPOSITE_PREFIX_LENGTH),
        soundex(value),
        cologne_phonetic(value),
    ] {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Keys for one field value under `method`.
///
/// The value is normalized unless the options opt out; blank values yield no
/// keys. Exact keys are lowercased unless `case_sensitive` is set; the other
/// structural methods keep the case of the normalized value.
pub fn generate_keys(value: &str, method: BlockingMethod, options: &KeyOptions) -> Vec<String> {
    let prepared = if options.skip_normalization {
        value.trim().to_string()
    } else {
        normalize(value)
    };
    if prepared.is_empty() {
        return Vec::new();
    }

    let keys = match method {
        BlockingMethod::Exact if options.case_sensitive => exact(&prepared),
        BlockingMethod::Exact => exact(&prepared.to_lowercase()),
        BlockingMethod::Prefix => {
            vec![prefix(&prepared, options.length.unwrap_or(DEFAULT_PREFIX_LENGTH))]
        }
        BlockingMethod::Suffix => {
            vec![suffix(&prepared, options.length.unwrap_or(DEFAULT_SUFFIX_LENGTH))]
        }
        BlockingMethod::Soundex => vec![soundex(&prepared)],
        BlockingMethod::ColognePhonetic => vec![cologne_phonetic(&prepared)],
        BlockingMethod::Metaphone => vec![metaphone(&prepared)],
        BlockingMethod::Ngram => ngrams(&prepared, options.length.unwrap_or(DEFAULT_NGRAM_SIZE)),
        BlockingMethod::Composite => composite(&prepared),
        BlockingMethod::Normalized => vec![prepared],
    };

    keys.into_iter().filter(|k| !k.is_empty()).collect()
}

/// Applies every config to every configured field of `record`.
///
/// Absent, null, container and blank fields are skipped silently.
pub fn generate_blocking_keys(record: &Record, configs: &[BlockingKeyConfig]) -> Vec<BlockingKey> {
    let mut out = Vec::new();
    for config in configs {
        for field in &config.fields {
            let Some(text) = record.text(field) else {
                continue;
            };
            let keys = generate_keys(&text, config.method, &config.options);
            trace!(field = %field, method = %config.method, count = keys.len(), "Generated keys");
            out.extend(keys.into_iter().map(|key| BlockingKey {
                key,
                method: config.method,
                field: field.clone(),
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    #[test]
    fn prefix_pads_short_values() {
        assert_eq!(prefix("Ab", 4), "Ab__");
        assert_eq!(prefix("", 3), "___");
        assert_eq!(prefix("Anything", 0), "");
    }

    #[test]
    fn prefix_removes_whitespace() {
        assert_eq!(prefix("van der Berg", 5), "vande");
    }

    #[test]
    fn suffix_pads_on_the_left() {
        assert_eq!(suffix("Ab", 4), "__Ab");
        assert_eq!(suffix("Hamburg", 3), "urg");
        assert_eq!(suffix("New York", 5), "wYork");
    }

    #[test]
    fn prefix_and_suffix_are_fixed_length() {
        for value in ["", "a", "Köln", "Frankfurt am Main", "  x  y  "] {
            for n in 0..8 {
                assert_eq!(prefix(value, n).chars().count(), n, "prefix({value:?}, {n})");
                assert_eq!(suffix(value, n).chars().count(), n, "suffix({value:?}, {n})");
            }
        }
    }

    #[test]
    fn ngrams_of_berlin() {
        assert_eq!(ngrams("Berlin", 3), vec!["Ber", "erl", "rli", "lin"]);
    }

    #[test]
    fn ngrams_are_deduplicated() {
        assert_eq!(ngrams("aaaa", 2), vec!["aa"]);
        assert_eq!(ngrams("abab", 2), vec!["ab", "ba"]);
    }

    #[test]
    fn ngrams_short_and_degenerate() {
        assert_eq!(ngrams("ab", 3), vec!["ab"]);
        assert!(ngrams("abc", 0).is_empty());
        assert!(ngrams("   ", 2).is_empty());
        assert_eq!(ngrams("Bad Tölz", 4), vec!["BadT", "adTö", "dTöl", "Tölz"]);
    }

    #[test]
    fn composite_unions_three_methods() {
        assert_eq!(composite("meyer"), vec!["mey", "M600", "67"]);
        assert!(composite("123").iter().all(|k| !k.is_empty()));
    }

    #[test]
    fn dispatcher_folds_case_for_exact_only() {
        let opts = KeyOptions::default();
        assert_eq!(generate_keys("  Müller!  ", BlockingMethod::Exact, &opts), vec!["muller"]);
        assert_eq!(generate_keys("Straße", BlockingMethod::Normalized, &opts), vec!["Strasse"]);
        assert_eq!(generate_keys("Ab", BlockingMethod::Prefix, &opts), vec!["Ab_"]);
        assert_eq!(generate_keys("Hamburg", BlockingMethod::Suffix, &opts), vec!["urg"]);
        assert_eq!(generate_keys("Meyer", BlockingMethod::Composite, &opts), vec!["Mey", "M600", "67"]);

        let four = KeyOptions {
            length: Some(4),
            ..KeyOptions::default()
        };
        assert_eq!(generate_keys("Ab", BlockingMethod::Prefix, &four), vec!["Ab__"]);
        assert_ne!(
            generate_keys("Berlin", BlockingMethod::Ngram, &opts),
            generate_keys("BERLIN", BlockingMethod::Ngram, &opts)
        );
    }

    #[test]
    fn case_sensitive_exact_keeps_case() {
        let opts = KeyOptions {
            case_sensitive: true,
            ..KeyOptions::default()
        };
        assert_eq!(generate_keys("Müller", BlockingMethod::Exact, &opts), vec!["Muller"]);
    }

    #[test]
    fn dispatcher_respects_options() {
        let opts = KeyOptions {
            length: Some(4),
            case_sensitive: true,
            skip_normalization: false,
        };
        assert_eq!(generate_keys("Hamburg", BlockingMethod::Prefix, &opts), vec!["Hamb"]);
        assert_eq!(generate_keys("Hamburg", BlockingMethod::Suffix, &opts), vec!["burg"]);

        let raw = KeyOptions {
            skip_normalization: true,
            case_sensitive: true,
            ..KeyOptions::default()
        };
        assert_eq!(generate_keys(" A.B ", BlockingMethod::Exact, &raw), vec!["A.B"]);
    }

    #[test]
    fn dispatcher_phonetic_keys() {
        let opts = KeyOptions::default();
        assert_eq!(generate_keys("Meyer", BlockingMethod::ColognePhonetic, &opts), vec!["67"]);
        assert_eq!(generate_keys("Robert", BlockingMethod::Soundex, &opts), vec!["R163"]);
        assert_eq!(generate_keys("Smith", BlockingMethod::Metaphone, &opts), vec!["SM0"]);
    }

    #[test]
    fn dispatcher_drops_empty_keys() {
        let opts = KeyOptions::default();
        assert!(generate_keys("", BlockingMethod::Exact, &opts).is_empty());
        assert!(generate_keys("  ...  ", BlockingMethod::Composite, &opts).is_empty());
        // digits only: no soundex letter, so only prefix and cologne remain
        assert_eq!(generate_keys("123", BlockingMethod::Composite, &opts), vec!["123", "0"]);
        assert!(generate_keys("42", BlockingMethod::Soundex, &opts).is_empty());
    }

    #[test]
    fn blocking_keys_for_record() {
        let record = Record::new()
            .with("id", "1")
            .with("firstName", "Hans")
            .with("lastName", "Meyer");
        let configs = vec![
            BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic),
            BlockingKeyConfig::new(["firstName", "lastName"], BlockingMethod::Prefix).with_length(2),
        ];
        let keys = generate_blocking_keys(&record, &configs);
        let rendered: Vec<String> = keys.iter().map(|k| k.block_key()).collect();
        assert_eq!(
            rendered,
            vec![
                "cologne_phonetic:lastName:67",
                "prefix:firstName:Ha",
                "prefix:lastName:Me",
            ]
        );
    }

    #[test]
    fn ngram_keys_of_berlin_keep_case() {
        let record = Record::new().with("city", "Berlin");
        let configs = vec![BlockingKeyConfig::new(["city"], BlockingMethod::Ngram)];
        let keys: Vec<String> = generate_blocking_keys(&record, &configs)
            .into_iter()
            .map(|k| k.key)
            .collect();
        assert_eq!(keys, vec!["Ber", "erl", "rli", "lin"]);
    }

    #[test]
    fn missing_or_empty_fields_produce_no_keys() {
        let record = Record::new()
            .with("id", "1")
            .with("lastName", "")
            .with("city", Value::Null);
        let configs = vec![
            BlockingKeyConfig::new(["lastName"], BlockingMethod::Soundex),
            BlockingKeyConfig::new(["city"], BlockingMethod::Exact),
            BlockingKeyConfig::new(["address.street"], BlockingMethod::ColognePhonetic),
        ];
        assert!(generate_blocking_keys(&record, &configs).is_empty());
    }

    #[test]
    fn numeric_fields_produce_keys() {
        let record = Record::new().with("postalCode", 50667i64);
        let configs = vec![BlockingKeyConfig::new(["postalCode"], BlockingMethod::Exact)];
        let keys = generate_blocking_keys(&record, &configs);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "50667");
    }
}
