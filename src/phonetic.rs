//! Phonetic encoders: Soundex, Cologne Phonetic (Kölner Phonetik) and a
//! simplified Metaphone.
//!
//! All encoders fold umlauts and strip diacritics first, then work on the
//! uppercase ASCII letters of the input. Anything else (digits, punctuation,
//! whitespace, letters outside Latin) is ignored.

use crate::config::{METAPHONE_MAX_LENGTH, SOUNDEX_LENGTH};
use crate::normalize::ascii_letters_upper;

/// American Soundex: first letter plus three digit classes, zero padded.
///
/// Vowels, `Y`, `H` and `W` separate runs, so the same class may repeat
/// across them. Returns an empty string when the input has no letters.
pub fn soundex(value: &str) -> String {
    let letters = ascii_letters_upper(value);
    let Some((&first, rest)) = letters.split_first() else {
        return String::new();
    };

    let mut code = String::with_capacity(SOUNDEX_LENGTH);
    code.push(char::from(first));
    let mut last = soundex_class(first);

    for &letter in rest {
        if code.len() == SOUNDEX_LENGTH {
            break;
        }
        match soundex_class(letter) {
            Some(digit) => {
                if last != Some(digit) {
                    code.push(char::from(digit));
                }
                last = Some(digit);
            }
            None => last = None,
        }
    }

    while code.len() < SOUNDEX_LENGTH {
        code.push('0');
    }
    code
}

fn soundex_class(letter: u8) -> Option<u8> {
    match letter {
        b'B' | b'F' | b'P' | b'V' => Some(b'1'),
        b'C' | b'G' | b'J' | b'K' | b'Q' | b'S' | b'X' | b'Z' => Some(b'2'),
        b'D' | b'T' => Some(b'3'),
        b'L' => Some(b'4'),
        b'M' | b'N' => Some(b'5'),
        b'R' => Some(b'6'),
        _ => None,
    }
}

enum CologneCode {
    Silent,
    One(u8),
    Two(u8, u8),
}

/// Cologne Phonetic code of `value`.
///
/// Each letter gets a digit depending on its neighbours; adjacent equal
/// digits collapse (a silent `H` does not separate them), then every `0` is
/// removed. Returns `"0"` when nothing remains.
pub fn cologne_phonetic(value: &str) -> String {
    let letters = ascii_letters_upper(value);
    let mut digits: Vec<u8> = Vec::with_capacity(letters.len() + 1);

    for (i, &letter) in letters.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| letters[p]);
        let next = letters.get(i + 1).copied();
        match cologne_code(letter, prev, next, i == 0) {
            CologneCode::Silent => {}
            CologneCode::One(d) => push_collapsed(&mut digits, d),
            CologneCode::Two(a, b) => {
                push_collapsed(&mut digits, a);
                push_collapsed(&mut digits, b);
            }
        }
    }

    let code: String = digits
        .into_iter()
        .filter(|d| *d != b'0')
        .map(char::from)
        .collect();

    if code.is_empty() {
        "0".to_string()
    } else {
        code
    }
}

fn push_collapsed(digits: &mut Vec<u8>, digit: u8) {
    if digits.last() != Some(&digit) {
        digits.push(digit);
    }
}

fn cologne_code(letter: u8, prev: Option<u8>, next: Option<u8>, initial: bool) -> CologneCode {
    use CologneCode::{One, Silent, Two};

    match letter {
        b'A' | b'E' | b'I' | b'O' | b'U' | b'J' | b'Y' => One(b'0'),
        b'H' => Silent,
        b'B' => One(b'1'),
        b'P' => One(if next == Some(b'H') { b'3' } else { b'1' }),
        b'D' | b'T' => One(if matches!(next, Some(b'C' | b'S' | b'Z')) {
            b'8'
        } else {
            b'2'
        }),
        b'F' | b'V' | b'W' => One(b'3'),
        b'G' | b'K' | b'Q' => One(b'4'),
        b'C' if initial => One(
            if matches!(
                next,
                Some(b'A' | b'H' | b'K' | b'L' | b'O' | b'Q' | b'R' | b'U' | b'X')
            ) {
                b'4'
            } else {
                b'8'
            },
        ),
        b'C' => One(if matches!(prev, Some(b'S' | b'Z')) {
            b'8'
        } else if matches!(next, Some(b'A' | b'H' | b'K' | b'O' | b'Q' | b'U' | b'X')) {
            b'4'
        } else {
            b'8'
        }),
        b'X' if matches!(prev, Some(b'C' | b'K' | b'Q')) => One(b'8'),
        b'X' => Two(b'4', b'8'),
        b'L' => One(b'5'),
        b'M' | b'N' => One(b'6'),
        b'R' => One(b'7'),
        b'S' | b'Z' => One(b'8'),
        _ => Silent,
    }
}

/// Applied in order after prefix and `MB` handling.
const METAPHONE_SUBSTITUTIONS: [(&str, &str); 9] = [
    ("X", "KS"),
    ("PH", "F"),
    ("GH", "F"),
    ("CK", "K"),
    ("SCH", "SK"),
    ("SH", "X"),
    ("TH", "0"),
    ("TCH", "X"),
    ("WH", "W"),
];

const METAPHONE_SILENT_PREFIXES: [&str; 5] = ["KN", "GN", "PN", "AE", "WR"];

/// Simplified Metaphone, at most six characters. `0` stands for `TH`.
pub fn metaphone(value: &str) -> String {
    let mut word: String = ascii_letters_upper(value)
        .into_iter()
        .map(char::from)
        .collect();

    if METAPHONE_SILENT_PREFIXES.iter().any(|p| word.starts_with(p)) {
        word.remove(0);
    }
    if word.ends_with("MB") {
        word.pop();
    }
    for (from, to) in METAPHONE_SUBSTITUTIONS {
        if word.contains(from) {
            word = word.replace(from, to);
        }
    }

    let w = word.as_bytes();
    let mut code = String::with_capacity(METAPHONE_MAX_LENGTH);
    for (i, &c) in w.iter().enumerate() {
        if code.len() >= METAPHONE_MAX_LENGTH {
            break;
        }
        let prev = i.checked_sub(1).map(|p| w[p]);
        let next = w.get(i + 1).copied();
        let next_is_vowel = next.is_some_and(is_vowel);
        let front_vowel_next = matches!(next, Some(b'E' | b'I' | b'Y'));

        let mapped = match c {
            b'A' | b'E' | b'I' | b'O' | b'U' => (i == 0).then_some(b'A'),
            b'C' if front_vowel_next => Some(b'S'),
            b'C' | b'Q' | b'K' => Some(b'K'),
            b'G' if front_vowel_next => Some(b'J'),
            b'G' => Some(b'K'),
            b'D' => Some(b'T'),
            b'V' => Some(b'F'),
            b'Z' => Some(b'S'),
            b'H' => (next_is_vowel && !matches!(prev, Some(b'C' | b'G' | b'P' | b'S' | b'T')))
                .then_some(b'H'),
            b'W' | b'Y' => next_is_vowel.then_some(c),
            b'B' | b'F' | b'J' | b'L' | b'M' | b'N' | b'P' | b'R' | b'S' | b'T' | b'X'
            | b'0' => Some(c),
            _ => None,
        };
        if let Some(m) = mapped {
            code.push(char::from(m));
        }
    }
    code
}

fn is_vowel(c: u8) -> bool {
    matches!(c, b'A' | b'E' | b'I' | b'O' | b'U')
}
