//! Segment-length rules for PUC-style account codes.
//!
//! The nesting depth of an account is encoded in the length of its code:
//! `4` (class), `41` (group), `4135` (account), `413505` (sub-account) and
//! then two more digits per auxiliary level. [`SegmentScheme`] turns a code
//! into the code of its candidate parent without knowing anything about the
//! rest of the chart.

use crate::error::{EngineError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maps a code length to the length of its parent's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    pub code_len: usize,
    pub parent_len: usize,
}

impl SegmentRule {
    pub const fn new(code_len: usize, parent_len: usize) -> Self {
        Self {
            code_len,
            parent_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentScheme {
    #[schemars(description = "Explicit code length to parent length table, checked first")]
    pub rules: Vec<SegmentRule>,

    #[schemars(
        description = "Even code lengths at or above this value drop `longCodeTrim` trailing characters"
    )]
    pub long_code_min_len: usize,

    pub long_code_trim: usize,

    #[schemars(description = "Characters dropped from any code length not covered above")]
    pub fallback_trim: usize,
}

impl Default for SegmentScheme {
    fn default() -> Self {
        Self::puc()
    }
}

impl SegmentScheme {
    /// The standard chart-of-accounts segmentation: 1/2/4/6 digits, then
    /// two digits per level from 8 onwards.
    pub fn puc() -> Self {
        Self {
            rules: vec![
                SegmentRule::new(2, 1),
                SegmentRule::new(4, 2),
                SegmentRule::new(6, 4),
            ],
            long_code_min_len: 8,
            long_code_trim: 2,
            fallback_trim: 1,
        }
    }

    /// Length of the candidate parent code, or `None` for top-level codes.
    pub fn parent_len(&self, code_len: usize) -> Option<usize> {
        let parent_len = if let Some(rule) = self.rules.iter().find(|r| r.code_len == code_len) {
            Some(rule.parent_len)
        } else if code_len >= self.long_code_min_len && code_len % 2 == 0 {
            code_len.checked_sub(self.long_code_trim)
        } else {
            code_len.checked_sub(self.fallback_trim)
        };

        parent_len.filter(|&len| len > 0 && len < code_len)
    }

    /// The code a node would hang under, if that code exists in the chart.
    pub fn candidate_parent<'c>(&self, code: &'c str) -> Option<&'c str> {
        let parent_len = self.parent_len(code.chars().count())?;
        let (end, _) = code.char_indices().nth(parent_len)?;
        Some(&code[..end])
    }

    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            if rule.parent_len == 0 || rule.parent_len >= rule.code_len {
                return Err(EngineError::InvalidSegmentRule {
                    code_len: rule.code_len,
                    parent_len: rule.parent_len,
                });
            }
        }

        if self.long_code_trim == 0 {
            return Err(EngineError::InvalidSegmentRule {
                code_len: self.long_code_min_len,
                parent_len: self.long_code_min_len,
            });
        }

        if self.fallback_trim == 0 {
            return Err(EngineError::InvalidSegmentRule {
                code_len: 0,
                parent_len: 0,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_puc_table() {
        let scheme = SegmentScheme::puc();

        assert_eq!(scheme.candidate_parent("4"), None);
        assert_eq!(scheme.candidate_parent("41"), Some("4"));
        assert_eq!(scheme.candidate_parent("4135"), Some("41"));
        assert_eq!(scheme.candidate_parent("413505"), Some("4135"));
        assert_eq!(scheme.candidate_parent("41350501"), Some("413505"));
        assert_eq!(scheme.candidate_parent("4135050102"), Some("41350501"));
    }

    #[test]
    fn test_fallback_drops_one_character() {
        let scheme = SegmentScheme::puc();

        assert_eq!(scheme.candidate_parent("413"), Some("41"));
        assert_eq!(scheme.candidate_parent("41350"), Some("4135"));
        assert_eq!(scheme.candidate_parent("4135050"), Some("413505"));
        assert_eq!(scheme.candidate_parent("413505012"), Some("41350501"));
    }

    #[test]
    fn test_empty_code_has_no_parent() {
        let scheme = SegmentScheme::puc();
        assert_eq!(scheme.candidate_parent(""), None);
    }

    #[test]
    fn test_validate_rejects_non_shrinking_rule() {
        let mut scheme = SegmentScheme::puc();
        scheme.rules.push(SegmentRule::new(3, 3));

        let result = scheme.validate();
        assert!(matches!(
            result,
            Err(EngineError::InvalidSegmentRule {
                code_len: 3,
                parent_len: 3
            })
        ));
    }

    #[test]
    fn test_deserialize_partial_scheme_uses_defaults() {
        let scheme: SegmentScheme = serde_json::from_str(r#"{"fallbackTrim": 1}"#).unwrap();
        assert_eq!(scheme, SegmentScheme::puc());
    }
}
