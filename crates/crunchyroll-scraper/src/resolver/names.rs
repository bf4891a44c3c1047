//! Parsing of local folder and file names.

use once_cell::sync::Lazy;
use regex::Regex;

/// `(2019)`, `[id=1234]` and similar decorations
static ATTRIBUTE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(\([^)]*\)|\[[^\]]*\])").unwrap());

static SEASON_WITH_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^season\s*\d+\s*-\s*(.+)$").unwrap());

static BARE_SEASON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^season\s*\d+$").unwrap());

/// Episode marker followed by a decimal or letter-suffixed number
static FRACTIONAL_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^A-Za-z])E(\d+\.\d+|\d+[A-Za-z]+)").unwrap());

static EPISODE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z])E-?(\d+\.\d+|\d+[A-Za-z]+|[A-Za-z]+\d+|\d+)").unwrap()
});

static TITLE_ID_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[CrunchyrollId-([^\]\s]+)\]").unwrap());

static YEAR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d{4}\)").unwrap());

/// `[tvdbid-123]`, `[imdbid=tt1]`, `[CrunchyrollId-G1]`
static PROVIDER_ID_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\[[a-z]*id[-=][^\]]*\]").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Search key for a season folder.
///
/// `Season 2 - OAD (2019)` yields `OAD`; a bare `Season 3` yields `None`, as
/// it carries nothing beyond its number.
pub fn season_search_key(folder_name: &str) -> Option<String> {
    let stripped = ATTRIBUTE_TAG.replace_all(folder_name, "");
    let stripped = stripped.trim();

    if let Some(caps) = SEASON_WITH_TITLE.captures(stripped) {
        let title = caps[1].trim();
        return (!title.is_empty()).then(|| title.to_string());
    }
    if stripped.is_empty() || BARE_SEASON.is_match(stripped) {
        return None;
    }
    Some(stripped.to_string())
}

/// Whether the episode number in a file name must be read textually
pub fn has_fractional_episode_number(file_name: &str) -> bool {
    FRACTIONAL_EPISODE.is_match(strip_extension(file_name))
}

/// Episode identifier following the `E` marker of a file name.
///
/// Leading zeros of numeric identifiers are dropped: `S06E0032.9` yields
/// `32.9`, `S13E-SP1` yields `SP1`.
pub fn extract_episode_identifier(file_name: &str) -> Option<String> {
    let caps = EPISODE_TOKEN.captures(strip_extension(file_name))?;
    let token = &caps[1];

    if token.starts_with(|c: char| c.is_ascii_digit()) {
        Some(trim_leading_zeros(token))
    } else {
        Some(token.to_string())
    }
}

/// Series id pinned by a `[CrunchyrollId-<id>]` tag anywhere in the path
pub fn title_id_from_path(path: &str) -> Option<String> {
    TITLE_ID_TAG
        .captures_iter(path)
        .last()
        .map(|caps| caps[1].to_string())
}

/// Series name with year and provider id tags removed, for catalog search
pub fn normalize_series_name(name: &str) -> String {
    let name = YEAR_TAG.replace_all(name, "");
    let name = PROVIDER_ID_TAG.replace_all(&name, "");
    WHITESPACE.replace_all(name.trim(), " ").into_owned()
}

/// Drop a media extension such as `.mkv`, but not `.5` in `E1.5`
fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if (1..=4).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic()) =>
        {
            stem
        }
        _ => file_name,
    }
}

fn trim_leading_zeros(token: &str) -> String {
    let trimmed = token.trim_start_matches('0');
    if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    }
}
