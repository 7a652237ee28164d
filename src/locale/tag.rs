use crate::error::InvalidLocale;
use std::fmt;
use std::str::FromStr;

/// A language tag such as `en`, `fr-FR` or `zh-Hant-TW`.
///
/// Tags are stored canonically (lowercase language, titlecase script,
/// uppercase region) so equality ignores the case the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(String);

impl Locale {
    /// Parses a tag, accepting `-` or `_` between subtags.
    pub fn parse(tag: &str) -> Result<Self, InvalidLocale> {
        let invalid = || InvalidLocale(tag.to_owned());

        let mut canonical = String::with_capacity(tag.len());
        for (i, subtag) in tag.trim().split(['-', '_']).enumerate() {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.bytes().all(|b| b.is_ascii_alphanumeric())
            {
                return Err(invalid());
            }

            if i == 0 {
                if !subtag.bytes().all(|b| b.is_ascii_alphabetic()) {
                    return Err(invalid());
                }
                canonical.push_str(&subtag.to_ascii_lowercase());
                continue;
            }

            canonical.push('-');
            let is_alpha = subtag.bytes().all(|b| b.is_ascii_alphabetic());
            match subtag.len() {
                // script
                4 if is_alpha => {
                    let (first, rest) = subtag.split_at(1);
                    canonical.push_str(&first.to_ascii_uppercase());
                    canonical.push_str(&rest.to_ascii_lowercase());
                }
                // region
                2 if is_alpha => canonical.push_str(&subtag.to_ascii_uppercase()),
                _ => canonical.push_str(&subtag.to_ascii_lowercase()),
            }
        }
        Ok(Locale(canonical))
    }

    /// Returns the canonical tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the primary language subtag.
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Returns the tag with its last subtag removed, if it has more than one.
    pub fn parent(&self) -> Option<Locale> {
        self.0
            .rsplit_once('-')
            .map(|(parent, _)| Locale(parent.to_owned()))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = InvalidLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::parse(s)
    }
}

/// One weighted entry of an `Accept-Language` header.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRange {
    locale: Option<Locale>,
    quality: f32,
}

impl LanguageRange {
    /// The requested locale, or `None` for the `*` wildcard.
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// The quality value, between 0 and 1.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn parse(entry: &str) -> Option<Self> {
        let mut params = entry.split(';');
        let tag = params.next()?.trim();
        let locale = match tag {
            "*" => None,
            tag => Some(Locale::parse(tag).ok()?),
        };

        let mut quality = 1.0;
        for param in params {
            let Some((name, value)) = param.split_once('=') else {
                return None;
            };
            if name.trim().eq_ignore_ascii_case("q") {
                quality = parse_quality(value.trim())?;
            }
        }

        Some(Self { locale, quality })
    }
}

/// Accepts `0`, `1` and decimals between them with at most three digits.
fn parse_quality(value: &str) -> Option<f32> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if !matches!(whole, "0" | "1")
        || fraction.len() > 3
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let quality = value.parse::<f32>().ok()?;
    (quality <= 1.0).then_some(quality)
}

/// Parses an `Accept-Language` header into ranges, most preferred first.
///
/// Ranges with a quality of zero are dropped. Entries with equal quality keep
/// their header order. A malformed entry anywhere yields an empty list.
pub fn parse_accept_language(header: &str) -> Vec<LanguageRange> {
    let mut ranges = Vec::new();
    for entry in header.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match LanguageRange::parse(entry) {
            Some(range) if range.quality > 0.0 => ranges.push(range),
            Some(_) => {}
            None => return Vec::new(),
        }
    }

    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    ranges
}
