pub use crate::form::{
    DraftStore, FieldSchema, FieldValue, FormController, FormError, FormOptions, FormResult,
    FormSchema, FormSnapshot, SchemaModel, SubmitOutcome, ValueMap,
};
pub use crate::value_map;
pub use crate::{I18nManager, Locale};
