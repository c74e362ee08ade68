use regex::Regex;

/// Include/exclude gate over names and titles.
///
/// Semantics follow the usual pair-of-patterns contract: an include
/// pattern, when present, must match or the candidate is dropped; an
/// exclude pattern, when present, drops the candidate even if include
/// matched. With neither pattern, everything is kept. Patterns are
/// unanchored searches. The three filter points (playlist names,
/// collection names, metadata titles) each get their own instance.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl NameFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            include: include.map(Regex::new).transpose()?,
            exclude: exclude.map(Regex::new).transpose()?,
        })
    }

    /// A filter with no patterns; keeps everything.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn keeps(&self, candidate: &str) -> bool {
        if let Some(ref include) = self.include {
            if !include.is_match(candidate) {
                return false;
            }
        }
        if let Some(ref exclude) = self.exclude {
            if exclude.is_match(candidate) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_overrides_include() {
        let filter = NameFilter::new(Some("^Kids"), Some("Temp")).unwrap();
        assert!(!filter.keeps("Kids Temp List"));
        assert!(filter.keeps("Kids Movies"));
        assert!(!filter.keeps("Adult List"));
    }

    #[test]
    fn no_patterns_keeps_everything() {
        let filter = NameFilter::open();
        assert!(filter.keeps("anything"));
        assert!(filter.keeps(""));
    }

    #[test]
    fn include_only() {
        let filter = NameFilter::new(Some("Marvel"), None).unwrap();
        assert!(filter.keeps("Marvel Phase One"));
        assert!(!filter.keeps("DC Films"));
    }

    #[test]
    fn exclude_only() {
        let filter = NameFilter::new(None, Some("(?i)temp")).unwrap();
        assert!(!filter.keeps("My TEMP list"));
        assert!(filter.keeps("Keepers"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(NameFilter::new(Some("("), None).is_err());
    }
}
