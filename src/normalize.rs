use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalizes a raw value for blocking.
///
/// Expands `ß` to `ss`, strips diacritics via NFD, drops everything that is
/// not a letter, digit or whitespace, and collapses whitespace. Case is kept.
pub fn normalize(value: &str) -> String {
    let stripped: String = expand_sharp_s(value)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    collapse_whitespace(&stripped)
}

/// Replaces German sharp s with its two-letter spelling.
pub(crate) fn expand_sharp_s(value: &str) -> String {
    if value.contains(['ß', 'ẞ']) {
        value.replace('ß', "ss").replace('ẞ', "SS")
    } else {
        value.to_string()
    }
}

/// Uppercase ASCII letters only, after umlaut folding and diacritic removal.
/// Shared by the phonetic encoders.
pub(crate) fn ascii_letters_upper(value: &str) -> Vec<u8> {
    expand_sharp_s(value)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase() as u8)
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(normalize("Müller"), "Muller");
        assert_eq!(normalize("Café Crème"), "Cafe Creme");
        assert_eq!(normalize("Øresund"), "Øresund");
    }

    #[test]
    fn expands_sharp_s() {
        assert_eq!(normalize("Straße"), "Strasse");
        assert_eq!(normalize("GROẞ"), "GROSS");
    }

    #[test]
    fn removes_punctuation() {
        assert_eq!(normalize("O'Brien-Smith, Jr."), "OBrienSmith Jr");
        assert_eq!(normalize("ACME GmbH & Co. KG"), "ACME GmbH Co KG");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Hans \t  Peter\n Meier  "), "Hans Peter Meier");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn keeps_digits() {
        assert_eq!(normalize("DE 123.456.789"), "DE 123456789");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "Müller-Lüdenscheidt",
            "  Ça   va?  ",
            "Straße 12a",
            "Zoë Ångström",
            "北京市 朝阳区",
            "a\u{0301}\u{0327}",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn ascii_letters_for_phonetics() {
        assert_eq!(ascii_letters_upper("Müßig-Gänger 2"), b"MUSSIGGANGER".to_vec());
    }
}
