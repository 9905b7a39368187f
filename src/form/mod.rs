mod autosave;
mod codec;
mod controller;
mod draft;
pub mod helpers;
mod schema;
mod validation;


pub use autosave::{ManualScheduler, ScheduledTask, Scheduler, SpawnScheduler};
pub use calmform_derive::SchemaModel;
pub use codec::{FieldValue, ValueMap, diff_keys, equal, reset_to_empty, trim};
pub use controller::{
    DEFAULT_AUTO_SAVE_DELAY_MS, DEFAULT_FORM_ID, FormController, FormError, FormOptions,
    FormResult, FormSnapshot, SubmitOutcome, SubscriptionId,
};
pub use draft::{DraftError, DraftStore, FileStore, InMemoryStore, KeyValueStore};
pub use schema::{
    FieldKind, FieldSchema, FormSchema, InputType, SchemaError, SchemaModel, SelectOption,
};
