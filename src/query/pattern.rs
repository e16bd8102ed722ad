//! Pattern Matcher - FDSN selector lists
//!
//! A selector list is a comma separated set of terms. Terms may use `*`
//! (zero or more characters) and `?` (exactly one character). A term
//! prefixed with `-` excludes what it matches. Matching is anchored and
//! case-sensitive.
//!
//! ```text
//! "BH?,-BHZ"   matches BHE, BHN        but not BHZ, HHZ
//! "*,-BHZ"     matches everything      except BHZ
//! "--"         (location) matches the empty location code
//! ```

use regex::Regex;

use crate::query::error::{QueryError, QueryResult};

/// Which NSLC component a selector applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Network,
    Station,
    Location,
    Channel,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Network => "Network",
            Field::Station => "Station",
            Field::Location => "Location",
            Field::Channel => "Channel",
        };
        f.write_str(name)
    }
}

/// A compiled selector list
#[derive(Debug, Clone)]
pub struct PatternList {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    /// Treat blank candidates as the empty location code
    blank_is_empty: bool,
}

impl PatternList {
    /// A list that matches every candidate
    pub fn any() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            blank_is_empty: false,
        }
    }

    /// Compile a selector list for network, station or channel codes
    pub fn parse(list: &str) -> QueryResult<Self> {
        Self::compile(list, false)
    }

    /// Compile a selector list for location codes.
    ///
    /// Terms made only of spaces and the literal `--` stand for the empty
    /// location code.
    pub fn parse_location(list: &str) -> QueryResult<Self> {
        Self::compile(list, true)
    }

    /// Compile a list for the given field
    pub fn for_field(field: Field, list: &str) -> QueryResult<Self> {
        match field {
            Field::Location => Self::parse_location(list),
            _ => Self::parse(list),
        }
    }

    fn compile(list: &str, location: bool) -> QueryResult<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for raw in list.split(',') {
            if location && (raw.trim().is_empty() || raw.trim() == "--") {
                include.push(term_regex(raw, "")?);
                continue;
            }

            let term = raw.trim();
            match term.strip_prefix('-') {
                Some("") => {
                    return Err(QueryError::invalid_pattern(raw, "exclusion needs a term"));
                }
                Some(rest) if rest.starts_with('-') => {
                    return Err(QueryError::invalid_pattern(
                        raw,
                        "more than one leading '-'",
                    ));
                }
                Some(rest) => exclude.push(term_regex(raw, rest)?),
                None => include.push(term_regex(raw, term)?),
            }
        }

        Ok(Self {
            include,
            exclude,
            blank_is_empty: location,
        })
    }

    /// Check a candidate code against the list
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = if self.blank_is_empty && candidate.trim().is_empty() {
            ""
        } else {
            candidate
        };

        let included = self.include.is_empty() || self.include.iter().any(|r| r.is_match(candidate));
        included && !self.exclude.iter().any(|r| r.is_match(candidate))
    }

    /// Whether the list accepts everything
    pub fn is_match_all(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

impl Default for PatternList {
    fn default() -> Self {
        Self::any()
    }
}

/// Translate one wildcard term into an anchored regex
fn term_regex(raw: &str, term: &str) -> QueryResult<Regex> {
    let mut pattern = String::with_capacity(term.len() + 4);
    pattern.push('^');

    for c in term.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == ' ' => pattern.push(c),
            c => {
                return Err(QueryError::invalid_pattern(
                    raw,
                    format!("unexpected character {:?}", c),
                ));
            }
        }
    }

    pattern.push('$');
    Regex::new(&pattern).map_err(|e| QueryError::invalid_pattern(raw, e.to_string()))
}

/// Check a single candidate against a selector list
pub fn matches(pattern_list: &str, candidate: &str) -> QueryResult<bool> {
    Ok(PatternList::parse(pattern_list)?.matches(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_examples() {
        assert!(!matches("BH?,-BHZ", "BHZ").unwrap());
        assert!(matches("BH?,-BHZ", "BHN").unwrap());
        assert!(matches("*", "").unwrap());
        assert!(matches("", "").unwrap());
        assert!(matches("A?", "AB").unwrap());
        assert!(!matches("A?", "ABC").unwrap());
    }

    #[test]
    fn test_anchored_and_case_sensitive() {
        assert!(!matches("T", "TA").unwrap());
        assert!(!matches("A", "TA").unwrap());
        assert!(!matches("ta", "TA").unwrap());
        assert!(matches("T*", "TA").unwrap());
        assert!(matches("?HZ", "BHZ").unwrap());
        assert!(!matches("?*", "").unwrap());
        assert!(matches("?*?", "BH").unwrap());
    }

    #[test]
    fn test_only_exclusions_match_rest() {
        let list = PatternList::parse("-BHZ").unwrap();
        assert!(list.matches("BHE"));
        assert!(!list.matches("BHZ"));
    }

    #[test]
    fn test_empty_candidate() {
        assert!(!matches("BH?", "").unwrap());
        assert!(matches("BHZ,", "").unwrap());
    }

    #[test]
    fn test_location_blank_equivalence() {
        for list in ["", " ", "  ", "--"] {
            let pattern = PatternList::parse_location(list).unwrap();
            assert!(pattern.matches(""), "{:?} should match empty location", list);
            assert!(pattern.matches("  "), "{:?} should match blank location", list);
            assert!(!pattern.matches("00"), "{:?} should not match 00", list);
        }

        for list in ["00", "XX", "X"] {
            assert!(!PatternList::parse_location(list).unwrap().matches(""));
        }

        assert!(PatternList::parse_location("--,00").unwrap().matches("00"));
    }

    #[test]
    fn test_invalid_patterns() {
        for list in ["-", "BHZ,-", "--BHZ", "B.Z", "B[HZ]"] {
            assert!(
                matches!(PatternList::parse(list), Err(QueryError::InvalidPattern { .. })),
                "{:?} should be rejected",
                list
            );
        }
    }

    #[test]
    fn test_any() {
        let list = PatternList::any();
        assert!(list.is_match_all());
        assert!(list.matches(""));
        assert!(list.matches("anything"));
    }

    #[test]
    fn test_field_display() {
        assert_eq!(Field::Network.to_string(), "Network");
        assert_eq!(Field::Channel.to_string(), "Channel");
    }
}
