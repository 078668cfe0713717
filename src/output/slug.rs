use unidecode::unidecode;

const SEPARATOR: char = '-';
const FALLBACK: &str = "unknown";

/// Filesystem-safe lowercase token: ASCII-transliterated, with every run of
/// non-alphanumerics collapsed to a single `-`. Never empty.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;

    for c in unidecode(value).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        FALLBACK.to_string()
    } else {
        slug
    }
}
