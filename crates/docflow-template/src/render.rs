//! Resolves field markers in sheet HTML into form inputs.

use docflow_core::enums::FieldType;
use docflow_core::form_data::{CellRef, FormData};
use docflow_core::template::Template;
use html_escape::{encode_double_quoted_attribute as attr, encode_text};
use regex::Captures;
use serde::Serialize;
use serde_json::Value;

use crate::fields::{Field, MARKER};

/// A sheet ready for form display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSheet {
    pub name: String,
    pub html: String,
}

/// Renders every sheet of `template`, filling inputs from `form_data` when
/// a document is given. Text that is not a well-formed marker passes
/// through untouched.
pub fn render_sheets(template: &Template, form_data: Option<&FormData>) -> Vec<RenderedSheet> {
    template
        .sheets
        .iter()
        .map(|sheet| {
            let html = MARKER.replace_all(&sheet.html, |caps: &Captures<'_>| {
                match Field::from_captures(&sheet.name, caps) {
                    Some(field) => render_field(&field, form_data),
                    None => caps[0].to_owned(),
                }
            });
            RenderedSheet {
                name: sheet.name.clone(),
                html: html.into_owned(),
            }
        })
        .collect()
}

/// Input markup for one field.
pub fn render_field(field: &Field, form_data: Option<&FormData>) -> String {
    let key = field.cell.as_deref().unwrap_or(&field.name);
    let at = CellRef::new(field.sheet.clone(), key);
    let stored = form_data.and_then(|data| data.get(&at));
    let raw = form_data.map(|data| data.display(&at)).unwrap_or_default();
    let value = attr(&raw);

    let input_name = format!("form_data[{}][{}]", attr(&field.sheet), attr(key));
    let data_field = attr(&field.name);
    let required = if field.required { " required" } else { "" };

    match field.field_type {
        FieldType::Text
        | FieldType::Email
        | FieldType::Tel
        | FieldType::Number
        | FieldType::Date => format!(
            r#"<input type="{}" name="{input_name}" value="{value}" data-field="{data_field}"{required}>"#,
            field.field_type
        ),
        FieldType::Textarea => format!(
            r#"<textarea name="{input_name}" data-field="{data_field}"{required}>{}</textarea>"#,
            encode_text(&raw)
        ),
        FieldType::Select => format!(
            r#"<select name="{input_name}" data-field="{data_field}"{required}><option value="{value}" selected>{}</option></select>"#,
            encode_text(&raw)
        ),
        FieldType::Checkbox => {
            let checked = if stored.is_some_and(is_checked) { " checked" } else { "" };
            format!(
                r#"<input type="checkbox" name="{input_name}" value="1" data-field="{data_field}"{checked}{required}>"#
            )
        }
        FieldType::Signature => {
            let signer = stored.map(signature_label).unwrap_or_default();
            format!(
                r#"<div class="signature" data-field="{data_field}">{}</div>"#,
                encode_text(&signer)
            )
        }
    }
}

fn is_checked(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && s != "false",
        _ => false,
    }
}

/// `approver (signed_at)` for a stored signature record, or the plain
/// string for anything else.
fn signature_label(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let who = map.get("approver_id").and_then(Value::as_str).unwrap_or("");
            match map.get("signed_at").and_then(Value::as_str) {
                Some(at) => format!("{who} ({at})"),
                None => who.to_owned(),
            }
        }
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
