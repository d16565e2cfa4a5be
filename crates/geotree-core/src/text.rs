// crates/geotree-core/src/text.rs
use deunicode::deunicode;

/// Folds a name into its comparison key: transliterated to ASCII,
/// lowercased, with runs of whitespace collapsed.
///
/// ```rust
/// use geotree_core::text::fold_key;
///
/// assert_eq!(fold_key("  Lagos "), "lagos");
/// assert_eq!(fold_key("Akwa  Ibom"), "akwa ibom");
/// assert_eq!(fold_key("Côte d'Ivoire"), fold_key("cote d'ivoire"));
/// ```
pub fn fold_key(s: &str) -> String {
    deunicode(s)
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Equality on folded form.
#[inline]
pub fn equals_folded(a: &str, b: &str) -> bool {
    fold_key(a) == fold_key(b)
}

/// Trims a display name and rejects blank ones.
pub(crate) fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Name-based matching helpers for types that expose a display name.
///
/// Implementors provide a `&str` view of their name via
/// [`NameMatch::name_str`] and get accent- and case-insensitive helpers.
///
/// # Examples
/// ```rust
/// use geotree_core::text::NameMatch;
///
/// struct Place(&'static str);
/// impl NameMatch for Place {
///     fn name_str(&self) -> &str { self.0 }
/// }
///
/// assert!(Place("Abéokuta").is_named("abeokuta"));
/// assert!(Place("South-West").name_contains("west"));
/// ```
pub trait NameMatch {
    /// Returns the display name used for matching.
    fn name_str(&self) -> &str;

    #[inline]
    fn is_named(&self, q: &str) -> bool {
        equals_folded(self.name_str(), q)
    }

    #[inline]
    fn name_contains(&self, q: &str) -> bool {
        fold_key(self.name_str()).contains(&fold_key(q))
    }
}
