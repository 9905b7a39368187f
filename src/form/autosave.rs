use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use futures::task::{Spawn, SpawnExt};
use futures_timer::Delay;
use tracing::{debug, warn};

use super::controller::{FormController, FormResult, FormState, PendingSave, write_lock};
use super::draft::DraftStore;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after `delay` unless the returned handle is aborted first.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> AbortHandle;
}

/// Wall-clock scheduler backed by `futures-timer` on any `Spawn` executor.
#[derive(Clone)]
pub struct SpawnScheduler<S> {
    spawner: S,
}

impl<S> SpawnScheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }
}

impl<S> Scheduler for SpawnScheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> AbortHandle {
        let (handle, registration) = AbortHandle::new_pair();
        let timer = Abortable::new(
            async move {
                Delay::new(delay).await;
                task();
            },
            registration,
        );
        if let Err(error) = self.spawner.spawn(async move {
            let _ = timer.await;
        }) {
            warn!(%error, "failed to spawn auto-save timer");
            handle.abort();
        }
        handle
    }
}

struct ManualEntry {
    due: Duration,
    seq: u64,
    handle: AbortHandle,
    task: ScheduledTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    entries: Vec<ManualEntry>,
}

/// Virtual clock for hosts that drive time themselves, and for tests.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualClock> {
        match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Timers that are scheduled and not aborted.
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| !entry.handle.is_aborted())
            .count()
    }

    /// Moves the clock forward, running due tasks in deadline order.
    ///
    /// Tasks run without the clock locked, so they may schedule new timers;
    /// those fire within the same call when they fall inside the window.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let next = {
                let mut clock = self.lock();
                clock.entries.retain(|entry| !entry.handle.is_aborted());
                let due = clock
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= target)
                    .min_by_key(|(_, entry)| (entry.due, entry.seq))
                    .map(|(index, _)| index);
                match due {
                    Some(index) => {
                        let entry = clock.entries.remove(index);
                        clock.now = clock.now.max(entry.due);
                        Some(entry.task)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };
            match next {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> AbortHandle {
        let (handle, _registration) = AbortHandle::new_pair();
        let mut clock = self.lock();
        clock.entries.retain(|entry| !entry.handle.is_aborted());
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now + delay;
        clock.entries.push(ManualEntry {
            due,
            seq,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

impl FormController {
    /// Replaces the pending auto-save with a fresh one. Only the newest timer
    /// can write the draft.
    pub(super) fn schedule_autosave(&self) -> FormResult<()> {
        if !self.options.auto_save {
            return Ok(());
        }
        let Some(scheduler) = &self.scheduler else {
            debug!(form_id = %self.form_id(), "auto-save enabled without a scheduler");
            return Ok(());
        };

        let mut state = write_lock(&self.state, "scheduling auto-save")?;
        if let Some(previous) = state.take_pending_save() {
            previous.abort();
        }
        state.save_ticket = state.save_ticket.wrapping_add(1);
        let ticket = state.save_ticket;
        let session = Arc::downgrade(&self.state);
        let drafts = self.drafts.clone();
        let form_id = self.options.form_id.clone();
        let handle = scheduler.schedule(
            self.options.auto_save_delay(),
            Box::new(move || run_autosave(&session, &drafts, &form_id, ticket)),
        );
        state.pending_save = Some(PendingSave { ticket, handle });
        Ok(())
    }
}

fn run_autosave(session: &Weak<RwLock<FormState>>, drafts: &DraftStore, form_id: &str, ticket: u64) {
    let Some(session) = session.upgrade() else {
        return;
    };
    let values = {
        let Ok(mut state) = session.write() else {
            warn!(form_id, "form state poisoned, skipping auto-save");
            return;
        };
        if state.pending_save.as_ref().map(|pending| pending.ticket) != Some(ticket) {
            return;
        }
        state.pending_save = None;
        state.current.clone()
    };
    drafts.save(form_id, &values);
}
