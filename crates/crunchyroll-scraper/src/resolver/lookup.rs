//! Lookups against a cached title tree.

use shared::{Episode, Season, TitleMetadata};

/// Season whose title or identifier equals `name`, ignoring case
pub fn season_id_by_name(title: &TitleMetadata, name: &str) -> Option<String> {
    let name = name.trim();
    title
        .seasons
        .iter()
        .find(|s| s.title.trim().eq_ignore_ascii_case(name) || s.identifier.eq_ignore_ascii_case(name))
        .map(|s| s.id.clone())
}

/// First season (by remote ordering) carrying the given season number
pub fn season_id_by_number(title: &TitleMetadata, number: i32) -> Option<String> {
    title
        .seasons
        .iter()
        .filter(|s| s.season_number == number)
        .min_by_key(|s| s.season_sequence_number)
        .map(|s| s.id.clone())
}

/// The season sharing `season_id`'s number that follows it in remote order.
///
/// Only the immediate successor is considered.
pub fn duplicate_next_season_id(title: &TitleMetadata, season_id: &str) -> Option<String> {
    let current = title.seasons.get(season_id)?;
    title
        .seasons
        .iter()
        .filter(|s| {
            s.id != current.id
                && s.season_number == current.season_number
                && s.season_sequence_number > current.season_sequence_number
        })
        .min_by_key(|s| s.season_sequence_number)
        .map(|s| s.id.clone())
}

/// Episode matching an identifier such as `12`, `1.5`, `13A` or `SP1`.
///
/// Display numbers are compared first, textually then numerically; numeric
/// identifiers fall back to the sequence number, which is where specials
/// without a display number sit.
pub fn episode_id_by_identifier(
    title: &TitleMetadata,
    season_id: &str,
    identifier: &str,
) -> Option<String> {
    let season = title.seasons.get(season_id)?;
    let identifier = identifier.trim();
    let numeric = identifier.parse::<f64>().ok();

    find_episode(season, |e| e.episode_number.eq_ignore_ascii_case(identifier))
        .or_else(|| {
            let n = numeric?;
            find_episode(season, |e| e.episode_number.trim().parse::<f64>().ok() == Some(n))
        })
        .or_else(|| {
            let n = numeric?;
            find_episode(season, |e| e.sequence_number == n)
        })
}

/// Episode whose title appears in the file name; the longest title wins
pub fn episode_id_by_name(title: &TitleMetadata, season_id: &str, file_name: &str) -> Option<String> {
    let season = title.seasons.get(season_id)?;
    let haystack = file_name.to_lowercase();

    season
        .episodes
        .iter()
        .filter(|e| !e.title.trim().is_empty())
        .filter(|e| haystack.contains(&e.title.trim().to_lowercase()))
        .max_by_key(|e| e.title.trim().len())
        .map(|e| e.id.clone())
}

/// Slug of an episode anywhere in the tree
pub fn episode_slug(title: &TitleMetadata, episode_id: &str) -> Option<String> {
    title
        .seasons
        .iter()
        .find_map(|s| s.episodes.get(episode_id))
        .map(|e| e.slug_title.clone())
}

fn find_episode(season: &Season, predicate: impl Fn(&Episode) -> bool) -> Option<String> {
    season.episodes.iter().find(|e| predicate(e)).map(|e| e.id.clone())
}
