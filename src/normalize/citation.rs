//! Citation formatting.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::NormalizeError;
use crate::models::DocumentType;

/// Jurisdictions and the abbreviation appended to legislation citations.
pub const JURISDICTIONS: &[(&str, &str)] = &[
    ("commonwealth", "Cth"),
    ("new_south_wales", "NSW"),
    ("victoria", "Vic"),
    ("queensland", "Qld"),
    ("south_australia", "SA"),
    ("western_australia", "WA"),
    ("tasmania", "Tas"),
    ("northern_territory", "NT"),
    ("australian_capital_territory", "ACT"),
];

static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" No\s+\d+$").unwrap());

/// Abbreviation for a jurisdiction, if it is one we know.
pub fn abbreviate(jurisdiction: &str) -> Option<&'static str> {
    JURISDICTIONS
        .iter()
        .find(|(name, _)| *name == jurisdiction)
        .map(|(_, abbr)| *abbr)
}

/// Format a document title into a citation.
///
/// Legislation loses any trailing `No <n>` and any abbreviation already in
/// the title, then gets ` (<abbr>)` appended. Decisions are only unescaped
/// and whitespace-normalized.
pub fn format_citation(
    title: &str,
    doc_type: DocumentType,
    jurisdiction: &str,
) -> Result<String, NormalizeError> {
    let mut title = unescape_html(title);

    if doc_type.is_legislation() {
        let abbr = abbreviate(jurisdiction)
            .ok_or_else(|| NormalizeError::UnknownJurisdiction(jurisdiction.to_string()))?;

        title = TRAILING_NUMBER.replace(&title, "").into_owned();

        let marker = format!("({})", abbr);
        if let Some(idx) = title.find(&marker) {
            title.truncate(idx);
        }

        title = format!("{} {}", title, marker);
    }

    Ok(title.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // Escape tag openers so the parser only resolves entities.
    let fragment = Html::parse_fragment(&text.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}
