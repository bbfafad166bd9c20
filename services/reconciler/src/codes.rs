//! Key deriver
//!
//! Style codes encode brand, year and season positionally. A code looks like
//! `<brand prefix:2><serial><year letter><season digit>...`; SPAO serials are
//! one character longer than every other brand's, which shifts the year and
//! season positions by one.
//!
//! Every lookup here is total: unknown prefixes, unmapped letters and short
//! codes degrade to a fallback or an empty string.

use unicode_normalization::UnicodeNormalization;

/// Two-letter code prefix -> brand name.
pub const BRAND_CODES: &[(&str, &str)] = &[
    ("sp", "스파오"),
    ("cv", "클라비스"),
    ("mi", "미쏘"),
    ("wh", "후아유"),
    ("rm", "로엠"),
    ("ep", "에블린"),
    ("mb", "마인드브릿지"),
    ("nb", "뉴발란스"),
    ("hs", "슈펜"),
];

/// Year indicator letter -> year.
pub const YEAR_LETTERS: &[(char, &str)] = &[('E', "2024"), ('F', "2025"), ('G', "2026")];

const BRAND_PREFIX_LEN: usize = 2;

/// 1-based position of the year letter in the serial after the brand prefix.
const YEAR_POSITION: usize = 5;
const SPAO_YEAR_POSITION: usize = 6;

const SPAO: &str = "스파오";

/// Brand name for a style or item code.
///
/// Unknown prefixes come back as the uppercased two-character prefix.
pub fn brand_from_code(code: &str) -> String {
    let prefix: String = code.trim().chars().take(BRAND_PREFIX_LEN).collect();
    let prefix = prefix.to_lowercase();
    BRAND_CODES
        .iter()
        .find(|(c, _)| *c == prefix)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| prefix.to_uppercase())
}

/// Two-letter code for a brand name, if the name is in the brand table.
pub fn brand_code(brand: &str) -> Option<&'static str> {
    BRAND_CODES
        .iter()
        .find(|(_, name)| *name == brand)
        .map(|(code, _)| *code)
}

/// 0-based character index of the year letter for `brand`.
fn year_index(brand: &str) -> usize {
    let position = if brand == SPAO {
        SPAO_YEAR_POSITION
    } else {
        YEAR_POSITION
    };
    BRAND_PREFIX_LEN + position - 1
}

fn code_chars(code: &str) -> Vec<char> {
    code.trim().chars().collect()
}

/// Year encoded in the code, or empty when the letter is unmapped or the code
/// is too short.
pub fn year_from_code(code: &str, brand: &str) -> String {
    code_chars(code)
        .get(year_index(brand))
        .map(|c| c.to_ascii_uppercase())
        .and_then(|letter| YEAR_LETTERS.iter().find(|(l, _)| *l == letter))
        .map(|(_, year)| year.to_string())
        .unwrap_or_default()
}

/// `(key, label)` for the year and season encoded in the code, e.g.
/// `("20261", "2026년 1시즌")`. Both are empty unless the year maps and the
/// following character is a decimal digit.
pub fn year_season_from_code(code: &str, brand: &str) -> (String, String) {
    let year = year_from_code(code, brand);
    if year.is_empty() {
        return (String::new(), String::new());
    }
    match code_chars(code).get(year_index(brand) + 1) {
        Some(season) if season.is_ascii_digit() => (
            format!("{}{}", year, season),
            format!("{}년 {}시즌", year, season),
        ),
        _ => (String::new(), String::new()),
    }
}

/// Style code for a longer item (SKU) code: everything up to and including
/// the season digit. Codes too short to carry a season are returned whole.
pub fn style_code_from_item_code(item_code: &str) -> String {
    let chars = code_chars(item_code);
    let brand = brand_from_code(item_code);
    let style_len = year_index(&brand) + 2;
    chars.into_iter().take(style_len).collect()
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Join key used across sources: NFKC, whitespace / control / zero-width
/// characters removed, uppercased.
pub fn canonical_key(code: &str) -> String {
    code.nfkc()
        .filter(|c| !c.is_whitespace() && !c.is_control() && !is_invisible(*c))
        .flat_map(char::to_uppercase)
        .collect()
}
