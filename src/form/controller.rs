use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{AbortHandle, BoxFuture};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::autosave::Scheduler;
use super::codec::{self, FieldValue, ValueMap};
use super::draft::DraftStore;
use super::schema::{FormSchema, SchemaModel};
use crate::i18n::{I18nManager, SUBMIT_FAILED};

static SUBSCRIPTION_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

pub const DEFAULT_FORM_ID: &str = "default-form";
pub const DEFAULT_AUTO_SAVE_DELAY_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    pub form_id: String,
    pub initial_values: ValueMap,
    pub auto_save: bool,
    #[serde(alias = "autoSaveDelay")]
    pub auto_save_delay_ms: u64,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            form_id: DEFAULT_FORM_ID.to_string(),
            initial_values: ValueMap::new(),
            auto_save: false,
            auto_save_delay_ms: DEFAULT_AUTO_SAVE_DELAY_MS,
        }
    }
}

impl FormOptions {
    pub fn auto_save_delay(&self) -> Duration {
        Duration::from_millis(self.auto_save_delay_ms)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    Submitted,
    Invalid,
    Failed,
}

/// Observable state of a form session, with derived fields freshly computed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub values: ValueMap,
    pub original: ValueMap,
    pub submitting: bool,
    pub has_error: bool,
    pub error_message: String,
    pub touched: bool,
    pub dirty: bool,
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form submit is already in progress")]
    AlreadySubmitting,
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) type SubmitHandler =
    Arc<dyn Fn(ValueMap) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
pub(super) type CancelHandler = Arc<dyn Fn() + Send + Sync>;
pub(super) type ErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;
pub(super) type Observer = Arc<dyn Fn(&FormSnapshot) + Send + Sync>;

#[derive(Clone, Default)]
pub(super) struct FormHooks {
    pub(super) on_submit: Option<SubmitHandler>,
    pub(super) on_cancel: Option<CancelHandler>,
    pub(super) on_error: Option<ErrorHandler>,
}

pub(super) struct PendingSave {
    pub(super) ticket: u64,
    pub(super) handle: AbortHandle,
}

pub(super) struct FormState {
    pub(super) current: ValueMap,
    pub(super) original: ValueMap,
    pub(super) submitting: bool,
    pub(super) has_error: bool,
    pub(super) error_message: String,
    pub(super) touched: bool,
    /// Bumped on every write to `current`.
    pub(super) revision: u64,
    pub(super) save_ticket: u64,
    pub(super) pending_save: Option<PendingSave>,
}

impl FormState {
    fn new(initial: ValueMap) -> Self {
        Self {
            original: initial.clone(),
            current: initial,
            submitting: false,
            has_error: false,
            error_message: String::new(),
            touched: false,
            revision: 0,
            save_ticket: 0,
            pending_save: None,
        }
    }

    pub(super) fn replace_current(&mut self, values: ValueMap) {
        self.current = values;
        self.revision = self.revision.wrapping_add(1);
    }

    pub(super) fn clear_feedback(&mut self) {
        self.touched = false;
        self.has_error = false;
        self.error_message.clear();
    }

    pub(super) fn take_pending_save(&mut self) -> Option<AbortHandle> {
        self.pending_save.take().map(|pending| pending.handle)
    }

    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            values: self.current.clone(),
            original: self.original.clone(),
            submitting: self.submitting,
            has_error: self.has_error,
            error_message: self.error_message.clone(),
            touched: self.touched,
            dirty: !codec::equal(&self.current, &self.original),
            changed_fields: codec::diff_keys(&self.original, &self.current),
        }
    }
}

/// Reactive controller for one form session. Clones share the session.
#[derive(Clone)]
pub struct FormController {
    pub(super) schema: Arc<FormSchema>,
    pub(super) options: Arc<FormOptions>,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) drafts: DraftStore,
    pub(super) scheduler: Option<Arc<dyn Scheduler>>,
    pub(super) i18n: I18nManager,
    pub(super) hooks: FormHooks,
    pub(super) observers: Arc<RwLock<BTreeMap<SubscriptionId, Observer>>>,
}

impl FormController {
    /// Starts a session with `current` and `original` both set to the initial values.
    /// Drafts are not loaded automatically.
    pub fn new(schema: FormSchema, options: FormOptions) -> Self {
        let state = FormState::new(options.initial_values.clone());
        Self {
            schema: Arc::new(schema),
            options: Arc::new(options),
            state: Arc::new(RwLock::new(state)),
            drafts: DraftStore::default(),
            scheduler: None,
            i18n: I18nManager::new(),
            hooks: FormHooks::default(),
            observers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Session for a typed model: schema from the type, initial values from `model`.
    pub fn for_model<M>(model: &M, options: FormOptions) -> Self
    where
        M: SchemaModel,
    {
        Self::new(
            M::schema(),
            FormOptions {
                initial_values: model.to_values(),
                ..options
            },
        )
    }

    pub fn with_draft_store(mut self, drafts: DraftStore) -> Self {
        self.drafts = drafts;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn with_i18n(mut self, i18n: I18nManager) -> Self {
        self.i18n = i18n;
        self
    }

    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ValueMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.on_submit = Some(Arc::new(move |values: ValueMap| handler(values).boxed()));
        self
    }

    pub fn on_cancel(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_cancel = Some(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&anyhow::Error) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(handler));
        self
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn form_id(&self) -> &str {
        &self.options.form_id
    }

    pub fn values(&self) -> FormResult<ValueMap> {
        Ok(read_lock(&self.state, "reading current values")?
            .current
            .clone())
    }

    pub fn original(&self) -> FormResult<ValueMap> {
        Ok(read_lock(&self.state, "reading original values")?
            .original
            .clone())
    }

    pub fn value(&self, name: &str) -> FormResult<Option<FieldValue>> {
        Ok(read_lock(&self.state, "reading field value")?
            .current
            .get(name)
            .cloned())
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submitting flag")?.submitting)
    }

    pub fn has_error(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading error flag")?.has_error)
    }

    pub fn error_message(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading error message")?
            .error_message
            .clone())
    }

    pub fn is_touched(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched flag")?.touched)
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        let state = read_lock(&self.state, "computing dirty state")?;
        Ok(!codec::equal(&state.current, &state.original))
    }

    pub fn changed_fields(&self) -> FormResult<Vec<String>> {
        let state = read_lock(&self.state, "computing changed fields")?;
        Ok(codec::diff_keys(&state.original, &state.current))
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        Ok(read_lock(&self.state, "creating form snapshot")?.snapshot())
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&FormSnapshot) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let id = SubscriptionId::next();
        write_lock(&self.observers, "registering observer")?.insert(id, Arc::new(observer));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(write_lock(&self.observers, "removing observer")?
            .remove(&id)
            .is_some())
    }

    /// Validates, then hands the trimmed values to the submit handler.
    ///
    /// A call made while another submit is in flight returns
    /// [`FormError::AlreadySubmitting`] without touching the session.
    pub async fn submit(&self) -> FormResult<SubmitOutcome> {
        let (trimmed, revision) = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.submitting {
                return Err(FormError::AlreadySubmitting);
            }
            state.touched = true;
            if !self.check_required(&mut state) {
                drop(state);
                debug!(form_id = %self.form_id(), "submit blocked by validation");
                self.notify()?;
                return Ok(SubmitOutcome::Invalid);
            }
            state.submitting = true;
            state.has_error = false;
            state.error_message.clear();
            (codec::trim(&state.current), state.revision)
        };
        let in_flight = SubmitGuard::arm(&self.state);
        self.notify()?;

        let result = match &self.hooks.on_submit {
            Some(handler) => handler(trimmed.clone()).await,
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                let (edited, pending) = {
                    let mut state = write_lock(&self.state, "completing submit")?;
                    in_flight.disarm();
                    state.submitting = false;
                    let edited = state.revision != revision;
                    if !edited {
                        state.current = trimmed.clone();
                    }
                    state.original = trimmed;
                    (edited, state.take_pending_save())
                };
                if let Some(handle) = pending {
                    handle.abort();
                }
                self.drafts.remove(self.form_id());
                // Edits made while the handler ran still need their draft.
                if edited {
                    self.schedule_autosave()?;
                }
                debug!(form_id = %self.form_id(), "form submitted");
                self.notify()?;
                Ok(SubmitOutcome::Submitted)
            }
            Err(error) => {
                let message = match error.to_string() {
                    message if message.trim().is_empty() => self.i18n.t(SUBMIT_FAILED),
                    message => message,
                };
                debug!(form_id = %self.form_id(), %message, "submit handler failed");
                {
                    let mut state = write_lock(&self.state, "recording submit failure")?;
                    in_flight.disarm();
                    state.submitting = false;
                    state.has_error = true;
                    state.error_message = message;
                }
                if let Some(on_error) = &self.hooks.on_error {
                    on_error(&error);
                }
                self.notify()?;
                Ok(SubmitOutcome::Failed)
            }
        }
    }

    /// Clears whatever is typed to empty values of the same type and drops the draft.
    pub fn cancel(&self) -> FormResult<()> {
        let pending = {
            let mut state = write_lock(&self.state, "cancelling form")?;
            let cleared = codec::reset_to_empty(&state.current);
            state.replace_current(cleared);
            state.clear_feedback();
            state.take_pending_save()
        };
        if let Some(handle) = pending {
            handle.abort();
        }
        self.drafts.remove(self.form_id());
        if let Some(on_cancel) = &self.hooks.on_cancel {
            on_cancel();
        }
        self.notify()
    }

    /// Reverts `current` to the last committed values. The stored draft is left alone.
    pub fn reset(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "resetting form")?;
            let original = state.original.clone();
            state.replace_current(original);
            state.clear_feedback();
        }
        self.schedule_autosave()?;
        self.notify()
    }

    /// Replaces both `current` and `original`, e.g. after the host reloads the record.
    pub fn reinitialize(&self, values: ValueMap) -> FormResult<()> {
        let pending = {
            let mut state = write_lock(&self.state, "reinitializing form")?;
            state.original = values.clone();
            state.replace_current(values);
            state.clear_feedback();
            state.take_pending_save()
        };
        if let Some(handle) = pending {
            handle.abort();
        }
        self.notify()
    }

    pub(super) fn notify(&self) -> FormResult<()> {
        let observers = read_lock(&self.observers, "reading observers")?
            .values()
            .cloned()
            .collect::<Vec<_>>();
        if observers.is_empty() {
            return Ok(());
        }
        let snapshot = self.snapshot()?;
        for observer in observers {
            observer(&snapshot);
        }
        Ok(())
    }
}

/// Clears `submitting` when a submit future is dropped before its handler settles.
struct SubmitGuard {
    state: Arc<RwLock<FormState>>,
    armed: bool,
}

impl SubmitGuard {
    fn arm(state: &Arc<RwLock<FormState>>) -> Self {
        Self {
            state: state.clone(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.submitting = false;
        debug!("submit abandoned before the handler settled");
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
