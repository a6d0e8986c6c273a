//! Scripted, time-paced interactions that drive the wizard through the same
//! mutations a person would make.
//!
//! Work is split across three channels. Starting a task on a channel cancels
//! whatever was running there first; channels never cancel each other.
//! Composite flows live in [`flows`] and are built from the same primitives.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use shared::domain::{CategoryId, TextField, WizardStep};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::samples::SampleCatalogue;

mod flows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Name,
    Description,
    Tap,
}

impl From<TextField> for Channel {
    fn from(value: TextField) -> Self {
        match value {
            TextField::Name => Channel::Name,
            TextField::Description => Channel::Description,
        }
    }
}

/// One mutation a script asks the target to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    ClearText(TextField),
    PushChar(TextField, char),
    PopChar(TextField),
    Tap(CategoryId),
    SelectLayout(String),
    ResetDraft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Done,
    /// `PopChar` on an empty buffer.
    Empty,
    /// The target refused the interaction; state is unchanged.
    Rejected,
    /// The token was already cancelled; state is unchanged.
    Cancelled,
}

/// Whatever the scripts drive. Implementations must check `token` while
/// holding the lock that guards their state, so nothing is applied after
/// the token is cancelled.
#[async_trait]
pub trait InteractionTarget: Send + Sync {
    async fn apply(&self, token: &CancellationToken, interaction: Interaction) -> Applied;
    async fn is_tree_ready(&self) -> bool;
    async fn current_step(&self) -> WizardStep;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceTask {
    TypeText(TextField),
    EraseText(TextField),
    TapSequence,
    Tutorial,
    Autofill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    Started(SequenceTask),
    Finished {
        task: SequenceTask,
        outcome: SequenceOutcome,
    },
}

/// Pacing for every scripted task, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SequencerTimings {
    pub typing_per_char_ms: u64,
    pub typing_lead_ms: u64,
    pub erase_per_char_ms: u64,
    pub tap_initial_ms: u64,
    pub tap_step_ms: u64,
    pub readiness_interval_ms: u64,
    pub readiness_attempts: u32,
    pub tutorial_hold_ms: u64,
    pub tutorial_gap_ms: u64,
    pub autofill_pause_ms: u64,
}

impl Default for SequencerTimings {
    fn default() -> Self {
        Self {
            typing_per_char_ms: 60,
            typing_lead_ms: 300,
            erase_per_char_ms: 35,
            tap_initial_ms: 400,
            tap_step_ms: 450,
            readiness_interval_ms: 100,
            readiness_attempts: 50,
            tutorial_hold_ms: 1200,
            tutorial_gap_ms: 400,
            autofill_pause_ms: 500,
        }
    }
}

impl SequencerTimings {
    /// Every delay zero, readiness still polled once.
    pub fn immediate() -> Self {
        Self {
            typing_per_char_ms: 0,
            typing_lead_ms: 0,
            erase_per_char_ms: 0,
            tap_initial_ms: 0,
            tap_step_ms: 0,
            readiness_interval_ms: 0,
            readiness_attempts: 1,
            tutorial_hold_ms: 0,
            tutorial_gap_ms: 0,
            autofill_pause_ms: 0,
        }
    }

    pub fn typing_per_char(&self) -> Duration {
        Duration::from_millis(self.typing_per_char_ms)
    }

    pub fn typing_lead(&self) -> Duration {
        Duration::from_millis(self.typing_lead_ms)
    }

    pub fn erase_per_char(&self) -> Duration {
        Duration::from_millis(self.erase_per_char_ms)
    }

    pub fn tap_initial(&self) -> Duration {
        Duration::from_millis(self.tap_initial_ms)
    }

    pub fn tap_step(&self) -> Duration {
        Duration::from_millis(self.tap_step_ms)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }

    pub fn tutorial_hold(&self) -> Duration {
        Duration::from_millis(self.tutorial_hold_ms)
    }

    pub fn tutorial_gap(&self) -> Duration {
        Duration::from_millis(self.tutorial_gap_ms)
    }

    pub fn autofill_pause(&self) -> Duration {
        Duration::from_millis(self.autofill_pause_ms)
    }
}

/// A running task. Dropping the handle does not stop the task.
pub struct SequenceHandle {
    task: SequenceTask,
    token: CancellationToken,
    handle: JoinHandle<SequenceOutcome>,
}

impl SequenceHandle {
    pub fn task(&self) -> SequenceTask {
        self.task
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> SequenceOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(task = ?self.task, "sequencer: task did not finish cleanly: {err}");
                SequenceOutcome::Cancelled
            }
        }
    }
}

/// Sleeps for `duration` unless `token` fires first. Returns whether the
/// caller may carry on.
pub(crate) async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => !token.is_cancelled(),
    }
}

/// What a spawned task needs from the sequencer, detached from its locks.
#[derive(Clone)]
struct Script {
    target: Arc<dyn InteractionTarget>,
    timings: SequencerTimings,
    events: broadcast::Sender<SequenceEvent>,
}

impl Script {
    async fn traced<F>(&self, task: SequenceTask, work: F) -> SequenceOutcome
    where
        F: Future<Output = SequenceOutcome>,
    {
        debug!(?task, "sequencer: started");
        let _ = self.events.send(SequenceEvent::Started(task));
        let outcome = work.await;
        debug!(?task, ?outcome, "sequencer: finished");
        let _ = self.events.send(SequenceEvent::Finished { task, outcome });
        outcome
    }

    async fn type_into(
        &self,
        token: &CancellationToken,
        field: TextField,
        text: &str,
        per_char: Duration,
        lead: Duration,
    ) -> SequenceOutcome {
        if self.target.apply(token, Interaction::ClearText(field)).await == Applied::Cancelled {
            return SequenceOutcome::Cancelled;
        }
        if !pause(token, lead).await {
            return SequenceOutcome::Cancelled;
        }

        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if self.target.apply(token, Interaction::PushChar(field, ch)).await
                == Applied::Cancelled
            {
                return SequenceOutcome::Cancelled;
            }
            if chars.peek().is_some() && !pause(token, per_char).await {
                return SequenceOutcome::Cancelled;
            }
        }
        SequenceOutcome::Completed
    }

    async fn erase_from(
        &self,
        token: &CancellationToken,
        field: TextField,
        per_char: Duration,
    ) -> SequenceOutcome {
        loop {
            match self.target.apply(token, Interaction::PopChar(field)).await {
                Applied::Cancelled => return SequenceOutcome::Cancelled,
                Applied::Empty | Applied::Rejected => return SequenceOutcome::Completed,
                Applied::Done => {}
            }
            if !pause(token, per_char).await {
                return SequenceOutcome::Cancelled;
            }
        }
    }

    /// Bounded readiness poll. Gives up waiting after the configured number
    /// of attempts and lets the caller proceed; `false` only on cancellation.
    async fn wait_for_tree(&self, token: &CancellationToken) -> bool {
        for _ in 0..self.timings.readiness_attempts {
            if token.is_cancelled() {
                return false;
            }
            if self.target.is_tree_ready().await {
                return true;
            }
            if !pause(token, self.timings.readiness_interval()).await {
                return false;
            }
        }
        debug!(
            attempts = self.timings.readiness_attempts,
            "sequencer: category tree still not ready, walking anyway"
        );
        !token.is_cancelled()
    }

    async fn walk_taps(
        &self,
        token: &CancellationToken,
        leaf: &CategoryId,
        initial: Duration,
        step: Duration,
    ) -> SequenceOutcome {
        if !self.wait_for_tree(token).await {
            return SequenceOutcome::Cancelled;
        }
        let plan = leaf.tap_sequence();
        if !pause(token, initial).await {
            return SequenceOutcome::Cancelled;
        }

        for id in plan {
            match self.target.apply(token, Interaction::Tap(id.clone())).await {
                Applied::Cancelled => return SequenceOutcome::Cancelled,
                Applied::Rejected => debug!(%id, "sequencer: scripted tap rejected"),
                Applied::Done | Applied::Empty => {}
            }
            if !pause(token, step).await {
                return SequenceOutcome::Cancelled;
            }
        }
        SequenceOutcome::Completed
    }
}

pub struct InteractionSequencer {
    target: Arc<dyn InteractionTarget>,
    timings: SequencerTimings,
    samples: SampleCatalogue,
    channels: Mutex<HashMap<Channel, CancellationToken>>,
    flow: Mutex<Option<CancellationToken>>,
    rng: Mutex<StdRng>,
    events: broadcast::Sender<SequenceEvent>,
}

impl InteractionSequencer {
    pub fn new(
        target: Arc<dyn InteractionTarget>,
        timings: SequencerTimings,
        samples: SampleCatalogue,
        seed: Option<u64>,
    ) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (events, _) = broadcast::channel(256);
        Self {
            target,
            timings,
            samples,
            channels: Mutex::new(HashMap::new()),
            flow: Mutex::new(None),
            rng: Mutex::new(rng),
            events,
        }
    }

    pub fn timings(&self) -> &SequencerTimings {
        &self.timings
    }

    pub fn samples(&self) -> &SampleCatalogue {
        &self.samples
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SequenceEvent> {
        self.events.subscribe()
    }

    fn script(&self) -> Script {
        Script {
            target: Arc::clone(&self.target),
            timings: self.timings,
            events: self.events.clone(),
        }
    }

    /// Installs a fresh token on `channel`, cancelling the one it replaces.
    fn claim(&self, channel: Channel, parent: Option<&CancellationToken>) -> CancellationToken {
        let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        if let Some(previous) = self.channels.lock().insert(channel, token.clone()) {
            if !previous.is_cancelled() {
                debug!(?channel, "sequencer: cancelling previous task on channel");
                previous.cancel();
            }
        }
        token
    }

    fn spawn<F, Fut>(&self, task: SequenceTask, token: CancellationToken, work: F) -> SequenceHandle
    where
        F: FnOnce(Script) -> Fut,
        Fut: Future<Output = SequenceOutcome> + Send + 'static,
    {
        let script = self.script();
        let work = work(script.clone());
        let handle = tokio::spawn(async move { script.traced(task, work).await });
        SequenceHandle {
            task,
            token,
            handle,
        }
    }

    pub fn cancel(&self, channel: Channel) {
        if let Some(token) = self.channels.lock().remove(&channel) {
            debug!(?channel, "sequencer: channel cancelled");
            token.cancel();
        }
    }

    /// Cancels the running tutorial or autofill flow, if any, and every
    /// channel task it owns.
    pub fn cancel_flow(&self) {
        if let Some(flow) = self.flow.lock().take() {
            debug!("sequencer: flow cancelled");
            flow.cancel();
        }
    }

    pub fn cancel_all(&self) {
        self.cancel_flow();
        for (_, token) in self.channels.lock().drain() {
            token.cancel();
        }
    }

    /// Clears `field`, waits `lead`, then types `text` one character at a
    /// time. A cancelled task leaves whatever prefix it had typed.
    pub fn type_text(
        &self,
        field: TextField,
        text: impl Into<String>,
        per_char: Duration,
        lead: Duration,
    ) -> SequenceHandle {
        let token = self.claim(Channel::from(field), None);
        let text = text.into();
        let task_token = token.clone();
        self.spawn(SequenceTask::TypeText(field), token, move |script| async move {
            script
                .type_into(&task_token, field, &text, per_char, lead)
                .await
        })
    }

    pub fn erase_text(&self, field: TextField, per_char: Duration) -> SequenceHandle {
        let token = self.claim(Channel::from(field), None);
        let task_token = token.clone();
        self.spawn(SequenceTask::EraseText(field), token, move |script| async move {
            script.erase_from(&task_token, field, per_char).await
        })
    }

    /// Taps the lineage of `leaf` root first, after a bounded wait for the
    /// tree to be ready.
    pub fn run_tap_sequence(
        &self,
        leaf: CategoryId,
        initial: Duration,
        step: Duration,
    ) -> SequenceHandle {
        let token = self.claim(Channel::Tap, None);
        let task_token = token.clone();
        self.spawn(SequenceTask::TapSequence, token, move |script| async move {
            script.walk_taps(&task_token, &leaf, initial, step).await
        })
    }
}

impl Drop for InteractionSequencer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
#[path = "tests/sequencer_tests.rs"]
mod tests;
