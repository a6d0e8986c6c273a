//! Tutorial and autofill flows, composed from the channel primitives.

use std::time::Duration;

use rand::Rng;
use shared::domain::{CategoryId, TextField, WizardStep, DEFAULT_LAYOUT};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    pause, Applied, Channel, Interaction, InteractionSequencer, Script, SequenceHandle,
    SequenceOutcome, SequenceTask,
};

struct AutofillPlan {
    name: Option<String>,
    description: Option<String>,
    category: Option<CategoryId>,
}

struct AutofillTokens {
    flow: CancellationToken,
    name: CancellationToken,
    description: CancellationToken,
    tap: CancellationToken,
}

impl InteractionSequencer {
    /// Replaces the running flow, if any, with a fresh flow token.
    fn begin_flow(&self) -> CancellationToken {
        let flow = CancellationToken::new();
        if let Some(previous) = self.flow.lock().replace(flow.clone()) {
            debug!("sequencer: replacing running flow");
            previous.cancel();
        }
        flow
    }

    /// Types sample names into `field` and erases them again, over and over,
    /// for as long as the wizard stays on `watched_step`.
    pub fn start_tutorial(&self, field: TextField, watched_step: WizardStep) -> SequenceHandle {
        let flow = self.begin_flow();
        let token = self.claim(Channel::from(field), Some(&flow));
        let offset = if self.samples.prompts.is_empty() {
            0
        } else {
            self.rng.lock().gen_range(0..self.samples.prompts.len())
        };
        let names = self.samples.names_from(offset);

        self.spawn(SequenceTask::Tutorial, flow, move |script| async move {
            script.tutorial(&token, field, watched_step, &names).await
        })
    }

    /// Clears the draft, then fills in a random sample name, description,
    /// category and the default layout.
    pub fn start_autofill(&self) -> SequenceHandle {
        self.cancel_all();
        let flow = self.begin_flow();
        let tokens = AutofillTokens {
            name: self.claim(Channel::Name, Some(&flow)),
            description: self.claim(Channel::Description, Some(&flow)),
            tap: self.claim(Channel::Tap, Some(&flow)),
            flow: flow.clone(),
        };

        let plan = {
            let mut rng = self.rng.lock();
            let prompt = self.samples.choose_prompt(&mut *rng).cloned();
            AutofillPlan {
                description: self
                    .samples
                    .choose_description(&mut *rng)
                    .map(str::to_string),
                name: prompt.as_ref().map(|prompt| prompt.name.clone()),
                category: prompt.map(|prompt| prompt.category),
            }
        };

        self.spawn(SequenceTask::Autofill, flow, move |script| async move {
            script.autofill(&tokens, plan).await
        })
    }
}

impl Script {
    async fn tutorial(
        &self,
        token: &CancellationToken,
        field: TextField,
        watched_step: WizardStep,
        names: &[String],
    ) -> SequenceOutcome {
        let timings = self.timings;
        for name in names.iter().cycle() {
            if token.is_cancelled() {
                return SequenceOutcome::Cancelled;
            }
            if self.target.current_step().await != watched_step {
                debug!(step = %watched_step, "sequencer: tutorial step left");
                return SequenceOutcome::Completed;
            }

            let typed = self
                .traced(
                    SequenceTask::TypeText(field),
                    self.type_into(
                        token,
                        field,
                        name,
                        timings.typing_per_char(),
                        timings.typing_lead(),
                    ),
                )
                .await;
            if typed == SequenceOutcome::Cancelled || !pause(token, timings.tutorial_hold()).await
            {
                return SequenceOutcome::Cancelled;
            }

            let erased = self
                .traced(
                    SequenceTask::EraseText(field),
                    self.erase_from(token, field, timings.erase_per_char()),
                )
                .await;
            if erased == SequenceOutcome::Cancelled || !pause(token, timings.tutorial_gap()).await {
                return SequenceOutcome::Cancelled;
            }
        }
        SequenceOutcome::Completed
    }

    async fn autofill(&self, tokens: &AutofillTokens, plan: AutofillPlan) -> SequenceOutcome {
        let timings = self.timings;
        let flow = &tokens.flow;

        if self.target.apply(flow, Interaction::ResetDraft).await == Applied::Cancelled {
            return SequenceOutcome::Cancelled;
        }

        if let Some(name) = &plan.name {
            let typed = self
                .traced(
                    SequenceTask::TypeText(TextField::Name),
                    self.type_into(
                        &tokens.name,
                        TextField::Name,
                        name,
                        timings.typing_per_char(),
                        timings.typing_lead(),
                    ),
                )
                .await;
            if typed == SequenceOutcome::Cancelled || !pause(flow, timings.autofill_pause()).await {
                return SequenceOutcome::Cancelled;
            }
        }

        if let Some(description) = &plan.description {
            let typed = self
                .traced(
                    SequenceTask::TypeText(TextField::Description),
                    self.type_into(
                        &tokens.description,
                        TextField::Description,
                        description,
                        timings.typing_per_char(),
                        Duration::ZERO,
                    ),
                )
                .await;
            if typed == SequenceOutcome::Cancelled || !pause(flow, timings.autofill_pause()).await {
                return SequenceOutcome::Cancelled;
            }
        }

        if let Some(category) = &plan.category {
            let walked = self
                .traced(
                    SequenceTask::TapSequence,
                    self.walk_taps(
                        &tokens.tap,
                        category,
                        timings.tap_initial(),
                        timings.tap_step(),
                    ),
                )
                .await;
            if walked == SequenceOutcome::Cancelled || !pause(flow, timings.autofill_pause()).await
            {
                return SequenceOutcome::Cancelled;
            }
        }

        match self
            .target
            .apply(flow, Interaction::SelectLayout(DEFAULT_LAYOUT.to_string()))
            .await
        {
            Applied::Cancelled => SequenceOutcome::Cancelled,
            _ => SequenceOutcome::Completed,
        }
    }
}
