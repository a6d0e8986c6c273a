//! Category wizard engine: tap-driven selection over a [`taxonomy::CategoryTree`],
//! a four-step creation wizard, and cancellable scripted flows that drive
//! both through the same operations a person would use.

use std::sync::Arc;

use serde::Deserialize;
use shared::{
    domain::{CategoryId, TextField, WizardStep},
    error::SelectionError,
};
use taxonomy::CategoryTree;

pub mod samples;
pub mod selection;
pub mod sequencer;
pub mod session;
pub mod wizard;

pub use samples::{SampleCatalogue, SamplePrompt};
pub use selection::{SelectionController, TapOutcome, UnknownIdPolicy};
pub use sequencer::{
    Channel, InteractionSequencer, SequenceEvent, SequenceHandle, SequenceOutcome, SequenceTask,
    SequencerTimings,
};
pub use session::{WizardEvent, WizardSession, WizardSnapshot};
pub use wizard::{requirements_to_leave, StepTransition, WizardCoordinator};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub unknown_ids: UnknownIdPolicy,
    pub timings: SequencerTimings,
    pub samples: SampleCatalogue,
    /// Fixed seed for sample choices; entropy when unset.
    pub seed: Option<u64>,
}

/// Owns the session and the sequencer that scripts it. Build one per
/// wizard and hand out references; nothing here is global.
pub struct Wizard {
    session: Arc<WizardSession>,
    sequencer: InteractionSequencer,
}

impl Wizard {
    pub fn new(tree: Arc<CategoryTree>, options: SessionOptions) -> Self {
        let session = Arc::new(WizardSession::new(tree, options.unknown_ids));
        let sequencer = InteractionSequencer::new(
            session.clone(),
            options.timings,
            options.samples,
            options.seed,
        );
        Self { session, sequencer }
    }

    pub fn session(&self) -> &Arc<WizardSession> {
        &self.session
    }

    pub fn sequencer(&self) -> &InteractionSequencer {
        &self.sequencer
    }

    /// Human typing wins over a script on the same field.
    pub async fn type_by_hand(&self, field: TextField, text: impl Into<String>) {
        self.sequencer.cancel(Channel::from(field));
        self.session.set_text(field, text).await;
    }

    /// Human tap; stops any scripted walk first.
    pub async fn tap_by_hand(&self, id: &CategoryId) -> Result<TapOutcome, SelectionError> {
        self.sequencer.cancel(Channel::Tap);
        self.session.tap(id).await
    }

    /// Starts the typing tutorial for whichever text step is showing.
    /// `None` on the category and layout steps.
    pub async fn start_tutorial(&self) -> Option<SequenceHandle> {
        let step = self.session.step().await;
        let field = match step {
            WizardStep::Name => TextField::Name,
            WizardStep::Description => TextField::Description,
            WizardStep::Category | WizardStep::Layout => return None,
        };
        Some(self.sequencer.start_tutorial(field, step))
    }

    pub fn start_autofill(&self) -> SequenceHandle {
        self.sequencer.start_autofill()
    }

    pub fn stop_scripts(&self) {
        self.sequencer.cancel_all();
    }
}
