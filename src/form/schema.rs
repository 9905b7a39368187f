use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codec::FieldValue;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate field name `{0}`")]
    DuplicateField(String),
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("invalid form schema: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Email,
    Password,
    Number,
    Tel,
    Url,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: FieldValue,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Type-specific part of a field. Constraints are read by the presentation layer only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    #[serde(alias = "text-input")]
    Input {
        #[serde(default)]
        input_type: InputType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    #[serde(alias = "selection")]
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
        #[serde(default)]
        multiple: bool,
    },
    #[serde(alias = "boolean-toggle")]
    Checkbox,
    #[serde(alias = "multiline-text")]
    Textarea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cols: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl FieldSchema {
    fn with_kind(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            placeholder: None,
            required: false,
            disabled: false,
            class_name: None,
        }
    }

    pub fn input(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            label,
            FieldKind::Input {
                input_type: InputType::Text,
                pattern: None,
                min_length: None,
                max_length: None,
            },
        )
    }

    pub fn select(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            label,
            FieldKind::Select {
                options: Vec::new(),
                multiple: false,
            },
        )
    }

    pub fn checkbox(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(name, label, FieldKind::Checkbox)
    }

    pub fn textarea(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            label,
            FieldKind::Textarea {
                rows: None,
                cols: None,
                min_length: None,
                max_length: None,
            },
        )
    }

    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    pub fn disabled(mut self, value: bool) -> Self {
        self.disabled = value;
        self
    }

    pub fn placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholder = Some(value.into());
        self
    }

    pub fn class_name(mut self, value: impl Into<String>) -> Self {
        self.class_name = Some(value.into());
        self
    }

    // The setters below only apply to kinds that carry the constraint.

    pub fn input_type(mut self, value: InputType) -> Self {
        if let FieldKind::Input { input_type, .. } = &mut self.kind {
            *input_type = value;
        }
        self
    }

    pub fn pattern(mut self, value: impl Into<String>) -> Self {
        if let FieldKind::Input { pattern, .. } = &mut self.kind {
            *pattern = Some(value.into());
        }
        self
    }

    pub fn min_length(mut self, value: usize) -> Self {
        match &mut self.kind {
            FieldKind::Input { min_length, .. } | FieldKind::Textarea { min_length, .. } => {
                *min_length = Some(value);
            }
            _ => {}
        }
        self
    }

    pub fn max_length(mut self, value: usize) -> Self {
        match &mut self.kind {
            FieldKind::Input { max_length, .. } | FieldKind::Textarea { max_length, .. } => {
                *max_length = Some(value);
            }
            _ => {}
        }
        self
    }

    pub fn option(mut self, label: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        if let FieldKind::Select { options, .. } = &mut self.kind {
            options.push(SelectOption::new(label, value));
        }
        self
    }

    pub fn multiple(mut self, value: bool) -> Self {
        if let FieldKind::Select { multiple, .. } = &mut self.kind {
            *multiple = value;
        }
        self
    }

    pub fn rows(mut self, value: u32) -> Self {
        if let FieldKind::Textarea { rows, .. } = &mut self.kind {
            *rows = Some(value);
        }
        self
    }

    pub fn cols(mut self, value: u32) -> Self {
        if let FieldKind::Textarea { cols, .. } = &mut self.kind {
            *cols = Some(value);
        }
        self
    }
}

/// Ordered, immutable field list a form session is built against.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    fields: Vec<FieldSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submit_button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_button_text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormSchema {
    fields: Vec<FieldSchema>,
    #[serde(default)]
    submit_button_text: Option<String>,
    #[serde(default)]
    cancel_button_text: Option<String>,
}

impl<'de> Deserialize<'de> for FormSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawFormSchema::deserialize(deserializer)?;
        let schema = FormSchema::new(raw.fields).map_err(serde::de::Error::custom)?;
        Ok(FormSchema {
            submit_button_text: raw.submit_button_text,
            cancel_button_text: raw.cancel_button_text,
            ..schema
        })
    }
}

impl FormSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self {
            fields,
            submit_button_text: None,
            cancel_button_text: None,
        })
    }

    pub fn from_json(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn submit_button_text(mut self, value: impl Into<String>) -> Self {
        self.submit_button_text = Some(value.into());
        self
    }

    pub fn cancel_button_text(mut self, value: impl Into<String>) -> Self {
        self.cancel_button_text = Some(value.into());
        self
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|field| field.required)
    }

    pub fn submit_label(&self) -> Option<&str> {
        self.submit_button_text.as_deref()
    }

    pub fn cancel_label(&self) -> Option<&str> {
        self.cancel_button_text.as_deref()
    }
}

/// Types that describe their own form layout, usually via `#[derive(SchemaModel)]`.
pub trait SchemaModel {
    fn schema() -> FormSchema;
    fn to_values(&self) -> super::codec::ValueMap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_and_empty_names() {
        let duplicate = FormSchema::new(vec![
            FieldSchema::input("email", "Email"),
            FieldSchema::checkbox("email", "Email again"),
        ]);
        assert!(matches!(duplicate, Err(SchemaError::DuplicateField(name)) if name == "email"));

        let empty = FormSchema::new(vec![FieldSchema::input("", "Nameless")]);
        assert!(matches!(empty, Err(SchemaError::EmptyFieldName)));
    }

    #[test]
    fn parses_json_field_configs() {
        let schema = FormSchema::from_json(
            r#"{
                "fields": [
                    { "name": "email", "label": "Email", "type": "input", "inputType": "email", "required": true, "maxLength": 64 },
                    { "name": "country", "label": "Country", "type": "select",
                      "options": [{ "label": "Other", "value": "other" }] },
                    { "name": "bio", "label": "About", "type": "multiline-text", "rows": 3 },
                    { "name": "terms", "label": "Terms", "type": "boolean-toggle", "required": true }
                ],
                "submitButtonText": "Send"
            }"#,
        )
        .expect("schema parses");

        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.submit_label(), Some("Send"));
        assert_eq!(
            schema.field("email").map(|field| &field.kind),
            Some(&FieldKind::Input {
                input_type: InputType::Email,
                pattern: None,
                min_length: None,
                max_length: Some(64),
            })
        );
        assert!(matches!(
            schema.field("bio").map(|field| &field.kind),
            Some(FieldKind::Textarea { rows: Some(3), .. })
        ));
        let required = schema
            .required_fields()
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(required, vec!["email", "terms"]);
    }

    #[test]
    fn json_with_duplicate_fields_is_rejected() {
        let result = FormSchema::from_json(
            r#"{ "fields": [
                { "name": "a", "label": "A", "type": "checkbox" },
                { "name": "a", "label": "B", "type": "checkbox" }
            ] }"#,
        );
        assert!(matches!(result, Err(SchemaError::Parse(_))));
    }

    #[test]
    fn builders_ignore_constraints_of_other_kinds() {
        let field = FieldSchema::checkbox("subscribe", "Subscribe")
            .rows(4)
            .min_length(2)
            .required(true);
        assert_eq!(field.kind, FieldKind::Checkbox);
        assert!(field.required);

        let select = FieldSchema::select("lang", "Language")
            .option("English", "en")
            .option("Deutsch", "de")
            .multiple(true);
        assert!(matches!(
            select.kind,
            FieldKind::Select { ref options, multiple: true } if options.len() == 2
        ));
    }
}
