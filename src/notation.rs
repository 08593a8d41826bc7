use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Full-width Roman numerals, upper and lower case, mapped to ASCII numerals.
const ROMAN_GLYPHS: [(char, &str); 14] = [
    ('Ⅰ', "I"),
    ('Ⅱ', "II"),
    ('Ⅲ', "III"),
    ('Ⅳ', "IV"),
    ('Ⅴ', "V"),
    ('Ⅵ', "VI"),
    ('Ⅶ', "VII"),
    ('ⅰ', "I"),
    ('ⅱ', "II"),
    ('ⅲ', "III"),
    ('ⅳ', "IV"),
    ('ⅴ', "V"),
    ('ⅵ', "VI"),
    ('ⅶ', "VII"),
];

const ACCIDENTAL_GLYPHS: [(char, &str); 3] = [('♯', "#"), ('♭', "b"), ('＃', "#")];

pub const DEGREES: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Natural, sharp, flat
pub const DEGREE_MODIFIERS: [&str; 3] = ["", "#", "b"];

/// Chord qualities in the order they are offered for selection.
/// The empty string is a plain major triad.
pub const QUALITIES: [&str; 18] = [
    "", "m", "7", "maj7", "m7", "dim", "dim7", "aug", "sus4", "sus2", "7sus4", "add9", "m7b5",
    "6", "m6", "9", "maj9", "m9",
];

/// Number of chord slots in one pattern (8 measures, 2 slots each).
pub const PATTERN_SLOTS: usize = 16;

pub const SLOTS_PER_MEASURE: usize = 2;

fn substitute(text: &str, table: &[(char, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match table.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, ascii)) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}

/// Rewrite alternate spellings of a chord token into the canonical one:
/// `Ⅳmaj7` becomes `IVmaj7`, `♭Ⅶ` becomes `bVII`.
///
/// Roman numerals are replaced first, accidentals second. Anything else
/// passes through untouched. An absent token is the empty string.
pub fn normalize_chord(chord: Option<&str>) -> String {
    let Some(chord) = chord else {
        return String::new();
    };
    let numerals = substitute(chord, &ROMAN_GLYPHS);
    substitute(&numerals, &ACCIDENTAL_GLYPHS)
}

/// Selection lists for building a chord picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordOptions {
    pub degrees: &'static [&'static str],
    pub modifiers: &'static [&'static str],
    pub qualities: &'static [&'static str],
}

pub fn chord_options() -> ChordOptions {
    ChordOptions {
        degrees: &DEGREES,
        modifiers: &DEGREE_MODIFIERS,
        qualities: &QUALITIES,
    }
}

// Longest numerals first so `VII` is not read as `V` + quality `II`.
static CHORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([#b]?)(VII|VI|V|IV|III|II|I)([^/]*)(?:/([#b]?(?:VII|VI|V|IV|III|II|I)))?$")
        .unwrap()
});

/// A chord token split into its parts, e.g. `bVIImaj7/V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSymbol {
    pub modifier: String,
    pub degree: String,
    pub quality: String,
    /// Bass degree of a slash chord, modifier included.
    pub bass: Option<String>,
}

impl ChordSymbol {
    /// Parse a token after glyph normalization. Returns `None` for text that
    /// does not start with a scale degree.
    pub fn parse(token: &str) -> Option<ChordSymbol> {
        let normalized = normalize_chord(Some(token.trim()));
        let caps = CHORD_RE.captures(&normalized)?;
        Some(ChordSymbol {
            modifier: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            degree: caps.get(2)?.as_str().to_string(),
            quality: caps.get(3).map_or("", |m| m.as_str()).to_string(),
            bass: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    pub fn has_known_quality(&self) -> bool {
        QUALITIES.contains(&self.quality.as_str())
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.modifier, self.degree, self.quality)?;
        if let Some(bass) = &self.bass {
            write!(f, "/{bass}")?;
        }
        Ok(())
    }
}
