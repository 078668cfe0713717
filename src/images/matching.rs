use strsim::normalized_levenshtein;
use unidecode::unidecode;

/// Edition suffixes tried after the plain title
pub const TITLE_VARIANTS: &[&str] = &[
    "Deluxe",
    "Remastered",
    "Anniversary",
    "Special Edition",
    "Expanded Edition",
];

pub const ARTIST_MATCH_THRESHOLD: f64 = 0.90;
pub const ALBUM_MATCH_THRESHOLD: f64 = 0.85;

/// The album title followed by its edition variants
pub fn title_variants(album: &str) -> Vec<String> {
    std::iter::once(album.to_string())
        .chain(TITLE_VARIANTS.iter().map(|suffix| format!("{} {}", album, suffix)))
        .collect()
}

/// Similarity in `[0, 1]` that ignores word order, case, accents and punctuation
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b))
}

pub fn fuzzy_match(target: &str, candidate: &str, threshold: f64) -> bool {
    token_sort_similarity(target, candidate) >= threshold
}

/// Year part of a provider release date ("1997-06-16" -> "1997")
pub fn release_year(date: &str) -> &str {
    date.split('-').next().unwrap_or_default()
}

fn sorted_tokens(value: &str) -> String {
    let cleaned: String = unidecode(value)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
