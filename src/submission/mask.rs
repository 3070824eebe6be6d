use regex::Regex;
use serde::Deserialize;

/// Split a delimited list (commas or newlines) into trimmed, non-empty tokens.
pub fn parse_string_list(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One `source[:target]` entry of a select mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub source: String,
    pub target: String,
}

impl FieldSelector {
    /// Returns `None` for tokens without a source name (e.g. `":x"`).
    pub fn parse(token: &str) -> Option<Self> {
        let (source, target) = match token.split_once(':') {
            Some((source, target)) => (source.trim(), target.trim()),
            None => (token.trim(), ""),
        };

        if source.is_empty() {
            return None;
        }

        let target = if target.is_empty() { source } else { target };

        Some(Self {
            source: source.to_string(),
            target: target.to_string(),
        })
    }
}

/// Ordered list of keys to keep, each optionally renamed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct SelectMask {
    selectors: Vec<FieldSelector>,
}

impl SelectMask {
    pub fn parse(input: &str) -> Self {
        Self {
            selectors: parse_string_list(input)
                .iter()
                .filter_map(|token| FieldSelector::parse(token))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSelector> {
        self.selectors.iter()
    }
}

impl From<String> for SelectMask {
    fn from(input: String) -> Self {
        Self::parse(&input)
    }
}

impl From<&str> for SelectMask {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

#[derive(Debug, Clone)]
struct KeyPattern {
    raw: String,
    wildcard: Option<Regex>,
}

impl KeyPattern {
    fn new(raw: String) -> Self {
        let wildcard = raw.contains('*').then(|| {
            let escaped: Vec<String> = raw.split('*').map(|part| regex::escape(part)).collect();
            Regex::new(&format!("^{}$", escaped.join(".*"))).ok()
        });

        Self {
            raw,
            wildcard: wildcard.flatten(),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match &self.wildcard {
            Some(re) => re.is_match(candidate),
            None => self.raw == candidate,
        }
    }
}

/// Set of key patterns marking fields for a value conversion.
///
/// A pattern matches either the full key (`group/question`) or its leaf
/// segment (`question`). `*` matches any run of characters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "String")]
pub struct KeyMask {
    patterns: Vec<KeyPattern>,
}

/// Keys whose string values are coerced to numbers.
pub type NumberMask = KeyMask;

impl KeyMask {
    pub fn parse(input: &str) -> Self {
        Self {
            patterns: parse_string_list(input)
                .into_iter()
                .map(KeyPattern::new)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.raw.as_str())
    }

    pub fn matches(&self, key: &str) -> bool {
        let leaf = leaf_segment(key);
        self.patterns
            .iter()
            .any(|p| p.matches(key) || p.matches(leaf))
    }
}

impl From<String> for KeyMask {
    fn from(input: String) -> Self {
        Self::parse(&input)
    }
}

impl From<&str> for KeyMask {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

/// Last `/`-separated segment of a grouped key.
pub fn leaf_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_drops_empty_segments() {
        assert_eq!(parse_string_list(" a , b ,, c "), vec!["a", "b", "c"]);
        assert_eq!(parse_string_list("a\nb,\n c"), vec!["a", "b", "c"]);
        assert!(parse_string_list(" , ,").is_empty());
        assert!(parse_string_list("").is_empty());
    }

    #[test]
    fn selector_with_and_without_target() {
        let renamed = FieldSelector::parse(" a : x ").unwrap();
        assert_eq!(renamed.source, "a");
        assert_eq!(renamed.target, "x");

        let plain = FieldSelector::parse("b").unwrap();
        assert_eq!(plain.source, "b");
        assert_eq!(plain.target, "b");

        let empty_target = FieldSelector::parse("c:").unwrap();
        assert_eq!(empty_target.target, "c");

        assert!(FieldSelector::parse(":x").is_none());
    }

    #[test]
    fn select_mask_keeps_order() {
        let mask = SelectMask::parse("b, a:x, ,grp/c");
        let targets: Vec<&str> = mask.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "x", "grp/c"]);
        assert_eq!(mask.len(), 3);
    }

    #[test]
    fn key_mask_matches_full_key_or_leaf() {
        let mask = KeyMask::parse("age, household/size");
        assert!(mask.matches("age"));
        assert!(mask.matches("person/age"));
        assert!(mask.matches("household/size"));
        assert!(!mask.matches("size"));
        assert!(!mask.matches("ages"));
    }

    #[test]
    fn key_mask_wildcards() {
        let mask = KeyMask::parse("count_*, *.v");
        assert!(mask.matches("count_people"));
        assert!(mask.matches("grp/count_cows"));
        assert!(mask.matches("x.v"));
        assert!(!mask.matches("xv"));
        assert!(!mask.matches("people_count"));
    }

    #[test]
    fn masks_deserialize_from_strings() {
        let mask: SelectMask = serde_json::from_str("\"a:x, b\"").unwrap();
        assert_eq!(mask.len(), 2);

        let numbers: KeyMask = serde_json::from_str("\"n\"").unwrap();
        assert_eq!(numbers.patterns().collect::<Vec<_>>(), vec!["n"]);
    }
}
