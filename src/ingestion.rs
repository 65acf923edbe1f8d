use crate::schema::CodeEntity;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An amount posted against an account code, as delivered by a ledger or
/// tax-return export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub code: String,
    pub value: f64,
}

pub fn is_well_formed_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_digit())
}

/// Trims codes and drops records whose code is empty or not all digits.
pub fn sanitize_entities(entities: Vec<CodeEntity>) -> Vec<CodeEntity> {
    let total = entities.len();
    let kept: Vec<CodeEntity> = entities
        .into_iter()
        .filter_map(|mut entity| {
            let trimmed = entity.code.trim();
            if !is_well_formed_code(trimmed) {
                warn!(
                    "Dropping account '{}' with malformed code '{}'",
                    entity.label, entity.code
                );
                return None;
            }
            entity.code = trimmed.to_string();
            Some(entity)
        })
        .collect();

    debug!("Kept {} of {} account records", kept.len(), total);
    kept
}

/// Builds a `code → value` map, summing rows that share a code.
pub fn seed_values(rows: &[BalanceRow]) -> BTreeMap<String, f64> {
    let mut values: BTreeMap<String, f64> = BTreeMap::new();

    for row in rows {
        let code = row.code.trim();
        if !is_well_formed_code(code) {
            warn!("Ignoring balance {} for malformed code '{}'", row.value, row.code);
            continue;
        }
        *values.entry(code.to_string()).or_default() += row.value;
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_drops_malformed_codes() {
        let entities = vec![
            CodeEntity::new(" 4135 ", "Comercio"),
            CodeEntity::new("", "Sin codigo"),
            CodeEntity::new("41A", "Letras"),
            CodeEntity::new("5", "Gastos"),
        ];

        let kept = sanitize_entities(entities);
        let codes: Vec<&str> = kept.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["4135", "5"]);
    }

    #[test]
    fn test_seed_values_sums_duplicates() {
        let rows = vec![
            BalanceRow {
                code: "413505".to_string(),
                value: 1000.0,
            },
            BalanceRow {
                code: "413505".to_string(),
                value: 200.0,
            },
            BalanceRow {
                code: "x".to_string(),
                value: 5.0,
            },
        ];

        let values = seed_values(&rows);
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("413505"), Some(&1200.0));
    }
}
