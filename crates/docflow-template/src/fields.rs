//! Field catalog parser.
//!
//! Sheet HTML declares inputs with bracketed markers:
//!
//! ```text
//! [text* customer_name cell="B4"]
//! [number qty cell="C7"]
//! [signature approver]
//! ```
//!
//! A `*` right after the type marks the field required; `cell` binds it to
//! a grid cell on the same sheet. Markers that do not fit the shape are
//! skipped, never reported.

use std::collections::HashSet;
use std::sync::LazyLock;

use docflow_core::enums::FieldType;
use docflow_core::form_data::CellRef;
use docflow_core::template::Sheet;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub(crate) static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    let types = FieldType::ALL
        .iter()
        .map(FieldType::as_str)
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r#"\[(?P<type>{types})(?P<required>\*?)\s+(?P<name>[^\s\]]+)(?:\s+cell="(?P<cell>[^"]+)")?\]"#
    );
    Regex::new(&pattern).expect("field marker pattern is valid")
});

/// One field declared in a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub sheet: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl Field {
    /// Grid address of the field, when it has a cell binding.
    pub fn cell_ref(&self) -> Option<CellRef> {
        self.cell
            .as_ref()
            .map(|cell| CellRef::new(self.sheet.clone(), cell.clone()))
    }

    pub(crate) fn from_captures(sheet: &str, caps: &Captures<'_>) -> Option<Self> {
        let field_type = caps.name("type")?.as_str().parse().ok()?;
        let name = caps.name("name")?.as_str().to_owned();
        Some(Self {
            sheet: sheet.to_owned(),
            field_type,
            required: caps.name("required").is_some_and(|m| m.as_str() == "*"),
            name,
            cell: caps.name("cell").map(|m| m.as_str().to_owned()),
        })
    }
}

/// Fields of a template keyed by name, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    fields: Vec<Field>,
}

impl FieldCatalog {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn by_type(&self, field_type: FieldType) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.field_type == field_type)
            .collect()
    }

    pub fn required(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.required).collect()
    }
}

impl IntoIterator for FieldCatalog {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Extracts the fields declared in one sheet, in document order.
pub fn parse_sheet(sheet_name: &str, html: &str) -> Vec<Field> {
    MARKER
        .captures_iter(html)
        .filter_map(|caps| Field::from_captures(sheet_name, &caps))
        .collect()
}

/// Extracts every field across `sheets`, processed in the given order.
///
/// A name seen again later keeps its first declaration.
pub fn parse_all_sheets(sheets: &[Sheet]) -> FieldCatalog {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for sheet in sheets {
        for field in parse_sheet(&sheet.name, &sheet.html) {
            if seen.insert(field.name.clone()) {
                fields.push(field);
            } else {
                debug!(sheet = %sheet.name, name = %field.name, "duplicate field name ignored");
            }
        }
    }
    FieldCatalog { fields }
}

pub fn is_supported_type(name: &str) -> bool {
    name.parse::<FieldType>().is_ok()
}

pub fn supported_types() -> Vec<&'static str> {
    FieldType::ALL.iter().map(FieldType::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn required_text_field_with_cell() {
        let catalog = parse_all_sheets(&[Sheet::new("Main", r#"[text* name cell="A1"]"#)]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("name"),
            Some(&Field {
                sheet: "Main".into(),
                field_type: FieldType::Text,
                required: true,
                name: "name".into(),
                cell: Some("A1".into()),
            })
        );
    }

    #[test]
    fn field_without_cell() {
        let fields = parse_sheet("S", "<td>[signature approver]</td>");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type, FieldType::Signature);
        assert!(!fields[0].required);
        assert_eq!(fields[0].cell, None);
        assert_eq!(fields[0].cell_ref(), None);
    }

    #[test]
    fn every_supported_type_is_recognised() {
        let html: String = supported_types()
            .iter()
            .map(|t| format!("[{t} f_{t}]"))
            .collect();
        let fields = parse_sheet("S", &html);
        assert_eq!(fields.len(), FieldType::ALL.len());
    }

    #[test]
    fn malformed_markers_are_skipped() {
        let html = r#"
            [text]                 <!-- no name -->
            [* nameonly]           <!-- no type -->
            [password secret]      <!-- unsupported type -->
            [text*name]            <!-- missing whitespace -->
            [number qty cell="C7"] <!-- fine -->
            [text broken cell="A1  <!-- unterminated -->
        "#;
        let fields = parse_sheet("S", html);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["qty"]);
    }

    #[test]
    fn order_follows_sheets_then_position() {
        let sheets = vec![
            Sheet::new("First", "[text b] [text a]"),
            Sheet::new("Second", r#"[date c cell="D1"] [text a cell="Z9"]"#),
        ];
        let catalog = parse_all_sheets(&sheets);
        assert_eq!(catalog.names(), vec!["b", "a", "c"]);
        // The first declaration of `a` wins.
        assert_eq!(catalog.get("a").unwrap().sheet, "First");
        assert_eq!(
            catalog.get("c").unwrap().cell_ref(),
            Some(CellRef::new("Second", "D1"))
        );
    }

    #[test]
    fn filter_helpers() {
        let catalog = parse_all_sheets(&[Sheet::new(
            "S",
            "[text* a] [number b] [number* c] [checkbox d]",
        )]);
        let numbers: Vec<&str> = catalog
            .by_type(FieldType::Number)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(numbers, vec!["b", "c"]);
        assert_eq!(catalog.required().len(), 2);
    }

    #[test]
    fn type_lookup() {
        assert!(is_supported_type("textarea"));
        assert!(!is_supported_type("password"));
        assert_eq!(supported_types().len(), 9);
    }

    #[test]
    fn catalog_serializes_as_list() {
        let catalog = parse_all_sheets(&[Sheet::new("Main", r#"[email* contact cell="B2"]"#)]);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"sheet": "Main", "type": "email", "required": true, "name": "contact", "cell": "B2"}
            ])
        );
    }
}
