use crate::error::InputError;
use crate::model::{co_key, parse_outcome_key, po_key, OUTCOME_COUNT};
use serde::{Serialize, Serializer};
use serde_json::json;
use std::collections::BTreeMap;

/// User-chosen CO -> PO links, fixed 12 x 12.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CoPoMapping {
    cells: [[bool; OUTCOME_COUNT]; OUTCOME_COUNT],
}

impl CoPoMapping {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a mapping from 1-based `(co, po)` pairs; out-of-range pairs are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut m = Self::empty();
        for (co, po) in pairs {
            m.set(co, po, true);
        }
        m
    }

    /// 1-based. Returns false when either index is out of range.
    pub fn set(&mut self, co: usize, po: usize, mapped: bool) -> bool {
        if !(1..=OUTCOME_COUNT).contains(&co) || !(1..=OUTCOME_COUNT).contains(&po) {
            return false;
        }
        self.cells[co - 1][po - 1] = mapped;
        true
    }

    pub fn is_mapped(&self, co: usize, po: usize) -> bool {
        (1..=OUTCOME_COUNT).contains(&co)
            && (1..=OUTCOME_COUNT).contains(&po)
            && self.cells[co - 1][po - 1]
    }

    /// COs linked to `po`, ascending.
    pub fn cos_for_po(&self, po: usize) -> Vec<usize> {
        (1..=OUTCOME_COUNT)
            .filter(|&co| self.is_mapped(co, po))
            .collect()
    }

    pub fn link_count(&self) -> usize {
        self.cells.iter().flatten().filter(|v| **v).count()
    }

    /// `{ "CO1": { "PO1": 0|1, ... }, ... }` with all 144 cells present.
    pub fn to_matrix(&self) -> BTreeMap<String, BTreeMap<String, u8>> {
        (1..=OUTCOME_COUNT)
            .map(|co| {
                let row = (1..=OUTCOME_COUNT)
                    .map(|po| (po_key(po), u8::from(self.is_mapped(co, po))))
                    .collect();
                (co_key(co), row)
            })
            .collect()
    }
}

impl Serialize for CoPoMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_matrix().serialize(serializer)
    }
}

fn is_truthy_link(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64() == Some(1.0),
        serde_json::Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Reads the JSON matrix form. Missing rows/cells are unmapped; `1`, `"1"` and `true` map;
/// unknown CO/PO keys are rejected.
pub fn parse_mapping(raw: &serde_json::Value) -> Result<CoPoMapping, InputError> {
    let Some(rows) = raw.as_object() else {
        return Err(InputError::bad_params("mapping must be an object keyed by CO"));
    };
    let mut m = CoPoMapping::empty();
    for (co_raw, row) in rows {
        let Some(co) = parse_outcome_key(co_raw, "CO") else {
            return Err(InputError::bad_params("unknown CO key in mapping")
                .with_details(json!({ "co": co_raw })));
        };
        if row.is_null() {
            continue;
        }
        let Some(cells) = row.as_object() else {
            return Err(InputError::bad_params("mapping rows must be objects keyed by PO")
                .with_details(json!({ "co": co_raw })));
        };
        for (po_raw, v) in cells {
            let Some(po) = parse_outcome_key(po_raw, "PO") else {
                return Err(InputError::bad_params("unknown PO key in mapping")
                    .with_details(json!({ "co": co_raw, "po": po_raw })));
            };
            m.set(co, po, is_truthy_link(v));
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_link_values() {
        let raw = json!({
            "CO1": { "PO1": 1, "PO2": "1", "PO3": true, "PO4": 0, "PO5": "0" },
            "CO2": { "PO1": 1.0 },
            "CO3": null
        });
        let m = parse_mapping(&raw).expect("mapping");
        assert!(m.is_mapped(1, 1) && m.is_mapped(1, 2) && m.is_mapped(1, 3));
        assert!(!m.is_mapped(1, 4) && !m.is_mapped(1, 5));
        assert_eq!(m.cos_for_po(1), vec![1, 2]);
        assert_eq!(m.link_count(), 4);
    }

    #[test]
    fn rejects_unknown_keys() {
        let e = parse_mapping(&json!({ "CO13": {} })).unwrap_err();
        assert_eq!(e.code, "bad_params");
        let e = parse_mapping(&json!({ "CO1": { "PX": 1 } })).unwrap_err();
        assert_eq!(e.details, Some(json!({ "co": "CO1", "po": "PX" })));
        assert!(parse_mapping(&json!([1, 2])).is_err());
    }

    #[test]
    fn matrix_is_always_full() {
        let m = CoPoMapping::from_pairs([(2, 12), (13, 1)]);
        let matrix = m.to_matrix();
        assert_eq!(matrix.len(), 12);
        assert!(matrix.values().all(|row| row.len() == 12));
        assert_eq!(matrix["CO2"]["PO12"], 1);
        assert_eq!(m.link_count(), 1);
        let v = serde_json::to_value(m).expect("json");
        assert_eq!(v["CO1"]["PO1"], 0);
    }
}
