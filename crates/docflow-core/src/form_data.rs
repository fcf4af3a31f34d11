//! The two-level sheet -> cell form grid and `Sheet:Cell` references.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Error for a reference that is not of the form `Sheet:Cell`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cell reference '{0}' (expected Sheet:Cell)")]
pub struct CellRefError(pub String);

/// A `Sheet:Cell` address into [`FormData`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub sheet: String,
    pub cell: String,
}

impl CellRef {
    pub fn new(sheet: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            cell: cell.into(),
        }
    }
}

impl FromStr for CellRef {
    type Err = CellRefError;

    /// Exactly one `:` separating two non-empty parts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(sheet), Some(cell), None) if !sheet.is_empty() && !cell.is_empty() => {
                Ok(Self::new(sheet, cell))
            }
            _ => Err(CellRefError(s.to_owned())),
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sheet, self.cell)
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sheet name -> (cell reference -> value).
///
/// Ordered maps keep serialization deterministic, so the same input always
/// yields byte-identical JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(BTreeMap<String, BTreeMap<String, Value>>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Returns the raw value stored at `at`, if any.
    pub fn get(&self, at: &CellRef) -> Option<&Value> {
        self.0.get(&at.sheet).and_then(|cells| cells.get(&at.cell))
    }

    /// Stores `value` at `at`, creating the sheet when needed.
    pub fn set(&mut self, at: &CellRef, value: Value) {
        self.0
            .entry(at.sheet.clone())
            .or_default()
            .insert(at.cell.clone(), value);
    }

    /// Returns the display string for a cell (empty when absent).
    pub fn display(&self, at: &CellRef) -> String {
        match self.get(at) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Iterates `(sheet, cells)` pairs in sheet order.
    pub fn sheets(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Value>)> {
        self.0.iter()
    }

    /// Overlays every cell of `other` onto `self`.
    pub fn merge(&mut self, other: &FormData) {
        for (sheet, cells) in &other.0 {
            let target = self.0.entry(sheet.clone()).or_default();
            for (cell, value) in cells {
                target.insert(cell.clone(), value.clone());
            }
        }
    }
}

impl From<BTreeMap<String, BTreeMap<String, Value>>> for FormData {
    fn from(map: BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_cell_ref() {
        let r: CellRef = "Main:A1".parse().unwrap();
        assert_eq!(r, CellRef::new("Main", "A1"));
        assert_eq!(r.to_string(), "Main:A1");
    }

    #[test]
    fn reject_malformed_cell_refs() {
        for bad in ["A1", "Main:", ":A1", "Main:A1:B2", ""] {
            assert!(bad.parse::<CellRef>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn set_and_get() {
        let mut data = FormData::new();
        let at = CellRef::new("Main", "A1");
        assert!(data.get(&at).is_none());
        data.set(&at, json!(3));
        assert_eq!(data.get(&at), Some(&json!(3)));
        assert_eq!(data.display(&at), "3");
    }

    #[test]
    fn serializes_as_nested_object() {
        let mut data = FormData::new();
        data.set(&CellRef::new("Main", "B1"), json!("x"));
        data.set(&CellRef::new("Main", "A1"), json!(1));
        let text = serde_json::to_string(&data).unwrap();
        assert_eq!(text, r#"{"Main":{"A1":1,"B1":"x"}}"#);

        let back: FormData = serde_json::from_str(&text).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn merge_overlays_cells() {
        let mut base: FormData = serde_json::from_value(json!({"Main": {"A1": 1, "A2": 2}})).unwrap();
        let patch: FormData = serde_json::from_value(json!({"Main": {"A2": 5}, "Other": {"B1": "y"}})).unwrap();
        base.merge(&patch);
        assert_eq!(
            serde_json::to_value(&base).unwrap(),
            json!({"Main": {"A1": 1, "A2": 5}, "Other": {"B1": "y"}})
        );
    }
}
