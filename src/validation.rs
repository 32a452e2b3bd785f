use serde_json::Value;

use crate::config::Config;
use crate::error::ValidationError;
use crate::match_record::{MatchRecord, THREE_PM};

pub const DEFAULT_MAX_TAG_CHARS: usize = 10;
pub const DEFAULT_MAX_FIELD_LEN: usize = 1000;
pub const REQUIRED_FIELDS: [&str; 4] = ["league", "home_team", "away_team", "kickoff"];

/// Extra kickoff constraint applied on top of the structural rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickoffRule {
    Any,
    ThreePmOnly,
}

/// Structural checks a batch must pass before it is cached, and again
/// whenever it is read back from disk. The thresholds are empirical, so
/// they are configurable.
#[derive(Debug, Clone, Copy)]
pub struct ValidationGate {
    max_tag_chars: usize,
    max_field_len: usize,
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAG_CHARS, DEFAULT_MAX_FIELD_LEN)
    }
}

impl ValidationGate {
    pub fn new(max_tag_chars: usize, max_field_len: usize) -> Self {
        Self {
            max_tag_chars,
            max_field_len,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_tag_chars, config.max_field_len)
    }

    pub fn validate_records(
        &self,
        records: &[MatchRecord],
        rule: KickoffRule,
    ) -> Result<(), ValidationError> {
        let payload = serde_json::to_value(records).map_err(|_| ValidationError::NotAList)?;
        self.validate_value(&payload, rule)
    }

    pub fn validate_value(
        &self,
        payload: &Value,
        rule: KickoffRule,
    ) -> Result<(), ValidationError> {
        let items = payload.as_array().ok_or(ValidationError::NotAList)?;
        for (index, item) in items.iter().enumerate() {
            let map = item
                .as_object()
                .ok_or(ValidationError::NotAMapping { index })?;
            for field in REQUIRED_FIELDS {
                let value = map
                    .get(field)
                    .ok_or(ValidationError::MissingField { index, field })?;
                match value.as_str() {
                    Some(s) if !s.trim().is_empty() => {}
                    _ => return Err(ValidationError::EmptyField { index, field }),
                }
            }
            for (field, value) in map {
                self.check_strings(index, field, value)?;
            }
            if rule == KickoffRule::ThreePmOnly {
                let kickoff = map.get("kickoff").and_then(Value::as_str).unwrap_or_default();
                if kickoff != THREE_PM {
                    return Err(ValidationError::Kickoff {
                        index,
                        kickoff: kickoff.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_strings(
        &self,
        index: usize,
        field: &str,
        value: &Value,
    ) -> Result<(), ValidationError> {
        match value {
            Value::String(s) => self.check_string(index, field, s),
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.check_strings(index, field, item)),
            Value::Object(map) => map
                .values()
                .try_for_each(|item| self.check_strings(index, field, item)),
            _ => Ok(()),
        }
    }

    fn check_string(&self, index: usize, field: &str, s: &str) -> Result<(), ValidationError> {
        let markup = s.chars().filter(|c| *c == '<' || *c == '>').count();
        if markup > self.max_tag_chars {
            return Err(ValidationError::MarkupLeak {
                index,
                field: field.to_string(),
                count: markup,
            });
        }
        let len = s.chars().count();
        if len > self.max_field_len {
            return Err(ValidationError::Oversized {
                index,
                field: field.to_string(),
                len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::match_record::League;

    fn fixture() -> Value {
        json!({
            "league": "Premier League",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "kickoff": "15:00",
            "venue": "Emirates Stadium"
        })
    }

    #[test]
    fn accepts_clean_batch() {
        let gate = ValidationGate::default();
        assert_eq!(gate.validate_value(&json!([fixture()]), KickoffRule::ThreePmOnly), Ok(()));
        assert_eq!(gate.validate_value(&json!([]), KickoffRule::Any), Ok(()));
    }

    #[test]
    fn rejects_non_list_and_non_mapping() {
        let gate = ValidationGate::default();
        assert_eq!(
            gate.validate_value(&fixture(), KickoffRule::Any),
            Err(ValidationError::NotAList)
        );
        assert_eq!(
            gate.validate_value(&json!([fixture(), "oops"]), KickoffRule::Any),
            Err(ValidationError::NotAMapping { index: 1 })
        );
    }

    #[test]
    fn rejects_missing_or_empty_required_fields() {
        let gate = ValidationGate::default();
        let mut missing = fixture();
        missing.as_object_mut().expect("object").remove("away_team");
        assert_eq!(
            gate.validate_value(&json!([missing]), KickoffRule::Any),
            Err(ValidationError::MissingField { index: 0, field: "away_team" })
        );
        let mut blank = fixture();
        blank["kickoff"] = json!("  ");
        assert_eq!(
            gate.validate_value(&json!([blank]), KickoffRule::Any),
            Err(ValidationError::EmptyField { index: 0, field: "kickoff" })
        );
    }

    #[test]
    fn markup_threshold_is_exclusive() {
        let gate = ValidationGate::default();
        let mut ok = fixture();
        ok["venue"] = json!("<<<<<>>>>>");
        assert!(gate.validate_value(&json!([ok]), KickoffRule::Any).is_ok());
        let mut leak = fixture();
        leak["venue"] = json!("<div><span><b>x</b></span></div>");
        assert!(matches!(
            gate.validate_value(&json!([leak]), KickoffRule::Any),
            Err(ValidationError::MarkupLeak { count: 12, .. })
        ));
    }

    #[test]
    fn rejects_oversized_fields_with_configured_limit() {
        let gate = ValidationGate::new(10, 20);
        let mut long = fixture();
        long["venue"] = json!("x".repeat(21));
        assert!(matches!(
            gate.validate_value(&json!([long]), KickoffRule::Any),
            Err(ValidationError::Oversized { len: 21, .. })
        ));
    }

    #[test]
    fn three_pm_rule_applies_only_when_asked() {
        let gate = ValidationGate::default();
        let record = MatchRecord::fixture(League::PremierLeague, "Everton", "Fulham", "17:30");
        assert!(gate.validate_records(&[record.clone()], KickoffRule::Any).is_ok());
        assert!(matches!(
            gate.validate_records(&[record], KickoffRule::ThreePmOnly),
            Err(ValidationError::Kickoff { .. })
        ));
    }
}
