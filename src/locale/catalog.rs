use super::tag::{LanguageRange, Locale};

/// The set of locales the server can render text in.
pub trait LocaleCatalog: Send + Sync {
    /// All locales with translations available.
    fn available_locales(&self) -> &[Locale];

    /// The locale used when nothing the client asked for is available.
    fn default_locale(&self) -> Locale;

    /// Picks the best available locale for the given preferences.
    ///
    /// Ranges are tried in order. For each one the full tag is looked up
    /// first, then progressively shorter prefixes, so `fr-FR` falls back to
    /// `fr`. Wildcards never match. When nothing matches, the default wins.
    fn negotiate(&self, ranges: &[LanguageRange]) -> Locale {
        let available = self.available_locales();
        for range in ranges {
            let mut candidate = range.locale().cloned();
            while let Some(locale) = candidate {
                if available.contains(&locale) {
                    return locale;
                }
                candidate = locale.parent();
            }
        }
        self.default_locale()
    }
}

/// A fixed [`LocaleCatalog`].
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    available: Vec<Locale>,
    default: Locale,
}

impl StaticCatalog {
    /// Creates a catalog. The default is added to the available set if missing.
    pub fn new(default: Locale, available: impl IntoIterator<Item = Locale>) -> Self {
        let mut available: Vec<Locale> = available.into_iter().collect();
        if !available.contains(&default) {
            available.push(default.clone());
        }
        Self { available, default }
    }
}

impl LocaleCatalog for StaticCatalog {
    fn available_locales(&self) -> &[Locale] {
        &self.available
    }

    fn default_locale(&self) -> Locale {
        self.default.clone()
    }
}
