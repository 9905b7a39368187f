use super::codec::{FieldValue, ValueMap};
use super::controller::{FormController, FormResult, FormState, write_lock};
use super::helpers::missing_required_fields;
use crate::i18n::REQUIRED_FIELD;

impl FormController {
    /// Writes one field. No validation runs; auto-save is rescheduled.
    pub fn set_value(&self, name: impl Into<String>, value: impl Into<FieldValue>) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "writing field value")?;
            let mut next = state.current.clone();
            next.insert(name.into(), value.into());
            state.replace_current(next);
        }
        self.schedule_autosave()?;
        self.notify()
    }

    /// Merges `partial` into the current values.
    pub fn set_values(&self, partial: ValueMap) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "merging field values")?;
            let mut next = state.current.clone();
            next.extend(partial);
            state.replace_current(next);
        }
        self.schedule_autosave()?;
        self.notify()
    }

    /// Checks required fields in schema order. Only presence is checked;
    /// length and pattern constraints are left to the presentation layer.
    pub fn validate(&self) -> FormResult<bool> {
        let valid = {
            let mut state = write_lock(&self.state, "validating form")?;
            self.check_required(&mut state)
        };
        self.notify()?;
        Ok(valid)
    }

    pub(super) fn check_required(&self, state: &mut FormState) -> bool {
        let required = self
            .schema
            .required_fields()
            .map(|field| field.name.as_str());
        let first_missing = missing_required_fields(&state.current, required)
            .first()
            .and_then(|name| self.schema.field(name));

        match first_missing {
            Some(field) => {
                state.has_error = true;
                state.error_message = self
                    .i18n
                    .t_with(REQUIRED_FIELD, &[("label", field.label.as_str())]);
                false
            }
            None => {
                state.has_error = false;
                state.error_message.clear();
                true
            }
        }
    }
}
