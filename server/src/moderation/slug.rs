/// URL slug derived from an event title, used by public event pages.
///
/// Lowercases, turns whitespace and hyphen runs into a single `-`, drops everything outside
/// `[a-z0-9_]`, and trims hyphens from both ends.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut separator = false;

    for ch in text.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() || ch == '-' {
            separator = !slug.is_empty();
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            if separator {
                slug.push('-');
                separator = false;
            }
            slug.push(ch);
        }
    }

    slug
}
