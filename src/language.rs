//! Home/foreign language detection by script.
//!
//! A message counts as home language (Japanese) when it contains at least one
//! kana character. Text written only in kanji is classified as foreign; this is
//! a known approximation of the heuristic, not something to fix here.

/// Which side of the translation pair a message is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Home,
    Foreign,
}

/// Direction a translation request runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HomeToForeign,
    ForeignToHome,
}

impl Language {
    /// Translation direction for text written in this language.
    pub fn translation_direction(self) -> Direction {
        match self {
            Language::Home => Direction::HomeToForeign,
            Language::Foreign => Direction::ForeignToHome,
        }
    }
}

/// Hiragana block.
const HIRAGANA: std::ops::RangeInclusive<char> = '\u{3040}'..='\u{309F}';
/// Katakana block.
const KATAKANA: std::ops::RangeInclusive<char> = '\u{30A0}'..='\u{30FF}';

fn is_kana(c: char) -> bool {
    HIRAGANA.contains(&c) || KATAKANA.contains(&c)
}

pub fn detect(text: &str) -> Language {
    if text.chars().any(is_kana) {
        Language::Home
    } else {
        Language::Foreign
    }
}
