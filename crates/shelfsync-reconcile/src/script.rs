//! Writing-system helpers shared by the tag and title detectors.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Cjk,
    Latin,
    Other,
}

/// CJK ideographs, kana, hangul and the CJK symbol/punctuation block.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3000..=0x303F
        | 0x3040..=0x30FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2FA1F)
}

/// Full-width ASCII variants and the ideographic space.
pub fn is_full_width(c: char) -> bool {
    matches!(c as u32, 0xFF01..=0xFF5E | 0x3000)
}

/// Map full-width ASCII variants to their half-width forms.
pub fn fold_width(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x3000 => ' ',
            code @ 0xFF01..=0xFF5E => char::from_u32(code - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Script of the majority of the letters in `text`.
///
/// Any ideograph wins over Latin letters when they tie, since mixed titles are
/// usually CJK titles with a Latin subtitle or series tag.
pub fn dominant_script(text: &str) -> Script {
    let mut cjk = 0usize;
    let mut latin = 0usize;
    for c in text.chars() {
        if is_cjk(c) && c.is_alphanumeric() {
            cjk += 1;
        } else if c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c) {
            latin += 1;
        }
    }
    match (cjk, latin) {
        (0, 0) => Script::Other,
        (c, l) if c >= l => Script::Cjk,
        _ => Script::Latin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_width_converts_full_width_punctuation() {
        assert_eq!(fold_width("三體：黑暗森林"), "三體:黑暗森林");
        assert_eq!(fold_width("ＡＢＣ　１２３"), "ABC 123");
    }

    #[test]
    fn dominant_script_detects_cjk_and_latin() {
        assert_eq!(dominant_script("三體"), Script::Cjk);
        assert_eq!(dominant_script("The Three-Body Problem"), Script::Latin);
        assert_eq!(dominant_script("1984"), Script::Other);
        assert_eq!(dominant_script("三體 II"), Script::Cjk);
    }

    #[test]
    fn ideographic_punctuation_is_cjk_but_not_a_letter() {
        assert!(is_cjk('。'));
        assert_eq!(dominant_script("。。。"), Script::Other);
    }
}
