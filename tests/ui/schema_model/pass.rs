use calmform::form::{FieldKind, FieldValue, SchemaModel};

#[derive(Clone, calmform::form::SchemaModel)]
struct Feedback {
    #[field(label = "Email", required, input_type = "email", placeholder = "you@example.com")]
    email: String,
    #[field(rename = "message", label = "Message", kind = "textarea", rows = 4)]
    body: String,
    #[field(label = "Send me a copy")]
    copy: bool,
}

fn main() {
    let schema = Feedback::schema();
    assert_eq!(schema.fields().len(), 3);
    assert!(matches!(
        schema.field("message").map(|field| &field.kind),
        Some(FieldKind::Textarea { rows: Some(4), .. })
    ));

    let values = Feedback {
        email: "a@b.c".to_string(),
        body: "hi".to_string(),
        copy: true,
    }
    .to_values();
    assert_eq!(values.get("message"), Some(&FieldValue::from("hi")));
    assert_eq!(values.get("copy"), Some(&FieldValue::Bool(true)));
}
