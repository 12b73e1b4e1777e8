//! Pinyin normalization for typed answers: tone marks and tone numbers compare
//! equal (`xué` == `xue2`), and `ü` is written as `v`.

/// Tone-marked vowel → (base vowel, tone digit).
fn tone_of(c: char) -> Option<(char, char)> {
    let pair = match c {
        'ā' => ('a', '1'),
        'á' => ('a', '2'),
        'ǎ' => ('a', '3'),
        'à' => ('a', '4'),
        'ē' => ('e', '1'),
        'é' => ('e', '2'),
        'ě' => ('e', '3'),
        'è' => ('e', '4'),
        'ī' => ('i', '1'),
        'í' => ('i', '2'),
        'ǐ' => ('i', '3'),
        'ì' => ('i', '4'),
        'ō' => ('o', '1'),
        'ó' => ('o', '2'),
        'ǒ' => ('o', '3'),
        'ò' => ('o', '4'),
        'ū' => ('u', '1'),
        'ú' => ('u', '2'),
        'ǔ' => ('u', '3'),
        'ù' => ('u', '4'),
        'ǖ' => ('v', '1'),
        'ǘ' => ('v', '2'),
        'ǚ' => ('v', '3'),
        'ǜ' => ('v', '4'),
        _ => return None,
    };
    Some(pair)
}

/// Canonical form used for comparison: lowercase, numbered tones at the end
/// of each syllable, single spaces between syllables.
///
/// Only the first tone mark in a syllable is converted.
pub fn normalize_pinyin(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .map(normalize_syllable)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_syllable(syllable: &str) -> String {
    let mut out = String::with_capacity(syllable.len() + 1);
    let mut tone = None;
    for c in syllable.chars() {
        match (tone, tone_of(c)) {
            (None, Some((base, digit))) => {
                out.push(base);
                tone = Some(digit);
            }
            _ if c == 'ü' => out.push('v'),
            _ => out.push(c),
        }
    }
    if let Some(digit) = tone {
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_tone_to_syllable_end() {
        assert_eq!(normalize_pinyin("xué"), "xue2");
        assert_eq!(normalize_pinyin("hǎo"), "hao3");
        assert_eq!(normalize_pinyin("Xué"), "xue2");
    }

    #[test]
    fn leaves_numbered_pinyin_alone() {
        assert_eq!(normalize_pinyin("xue2"), "xue2");
        assert_eq!(normalize_pinyin("lv4"), "lv4");
    }

    #[test]
    fn writes_u_umlaut_as_v() {
        assert_eq!(normalize_pinyin("lǜ"), "lv4");
        assert_eq!(normalize_pinyin("nǚ"), "nv3");
        assert_eq!(normalize_pinyin("lü4"), "lv4");
    }

    #[test]
    fn collapses_whitespace_between_syllables() {
        assert_eq!(normalize_pinyin("  nǐ   hǎo "), "ni3 hao3");
    }
}
