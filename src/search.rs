use crate::catalog::model::Pattern;
use crate::notation::normalize_chord;

/// Separates chords within one pattern of the search form.
pub const SLOT_DELIMITER: &str = "|";

/// Separates patterns in the search form.
pub const PATTERN_DELIMITER: &str = "||";

fn is_query_delimiter(c: char) -> bool {
    c == '|' || c == '-' || c.is_whitespace()
}

/// Fragments of a glyph-normalized query, split on runs of `|`, `-` and
/// whitespace, rejoined with a single slot delimiter.
fn join_fragments(normalized: &str) -> String {
    normalized
        .split(is_query_delimiter)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(SLOT_DELIMITER)
}

/// Search form of one pattern: normalized chords joined by `|`, empty slots
/// dropped.
pub fn normalize_pattern(chords: &[Option<String>]) -> String {
    chords
        .iter()
        .filter_map(|c| c.as_deref())
        .filter(|c| !c.is_empty())
        .map(|c| normalize_chord(Some(c)))
        .collect::<Vec<_>>()
        .join(SLOT_DELIMITER)
}

/// Build the search form stored next to a progression's patterns.
///
/// `[[IV, V, IIIm, VIm], [IV, V, III, VIm]]` becomes
/// `IV|V|IIIm|VIm||IV|V|III|VIm`. Patterns without any chord are left out
/// entirely, so an empty middle pattern leaves a single `||`, not `||||`.
pub fn normalize_chords_for_search(patterns: &[Pattern]) -> String {
    patterns
        .iter()
        .map(|p| normalize_pattern(&p.chords))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(PATTERN_DELIMITER)
}

/// Normalize a user-typed chord query into the slot-delimited form, so
/// `|Ⅳ||Ⅴ|`, `IV-V` and `IV V` all become `IV|V`.
pub fn normalize_search_query(query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => join_fragments(&normalize_chord(Some(q))),
        _ => String::new(),
    }
}

/// Case-insensitive substring match of `query` inside a search form.
///
/// Matches are not anchored on chord boundaries, so `V` is found inside
/// `VIm`. A rejoined query never contains `||`, so it cannot run from one
/// pattern into the next. A query made only of delimiters rejoins to the
/// empty string and matches any non-empty search form.
pub fn search_in_normalized(normalized_chords: &str, query: &str) -> bool {
    if query.is_empty() || normalized_chords.is_empty() {
        return false;
    }
    let needle = join_fragments(&normalize_chord(Some(query)));
    normalized_chords
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

/// Render a pattern for display, one `| … |` cell per measure:
/// `| IV V | IIIm VIm |`. Empty measures show as `-` and trailing empty
/// measures are dropped.
pub fn format_measures(chords: &[Option<String>], slots_per_measure: usize) -> String {
    let measures: Vec<String> = chords
        .chunks(slots_per_measure.max(1))
        .map(|measure| {
            measure
                .iter()
                .filter_map(|c| c.as_deref())
                .filter(|c| !c.is_empty())
                .map(|c| normalize_chord(Some(c)))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let Some(last) = measures.iter().rposition(|m| !m.is_empty()) else {
        return String::new();
    };

    let cells: Vec<&str> = measures[..=last]
        .iter()
        .map(|m| if m.is_empty() { "-" } else { m.as_str() })
        .collect();
    format!("| {} |", cells.join(" | "))
}
