//! Shared wizard state. Human input and scripted input land on the same
//! coordinator, one mutation at a time, and every change is broadcast.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shared::{
    domain::{CategoryId, CategoryNode, Field, RankoDraft, TextField, WizardStep},
    error::{LayoutError, LoadError, SelectionError, ValidationFailure},
};
use taxonomy::CategoryTree;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    selection::{TapOutcome, UnknownIdPolicy},
    sequencer::{Applied, Interaction, InteractionTarget},
    wizard::{StepTransition, WizardCoordinator},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    TaxonomyLoaded {
        nodes: usize,
        roots: usize,
    },
    LoadFailed(LoadError),
    SelectionChanged {
        path: Vec<CategoryId>,
        current: Option<CategoryNode>,
    },
    TextChanged {
        field: TextField,
        text: String,
    },
    StepChanged {
        from: WizardStep,
        to: WizardStep,
    },
    /// A blocked advance; one event per missing field.
    Nudge(Field),
    LayoutSelected(String),
    PrivacyChanged(bool),
    DraftCleared,
    Submitted(RankoDraft),
}

/// Point-in-time copy of everything a renderer needs besides the row list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub layout: Option<String>,
    pub path: Vec<CategoryId>,
    pub current: Option<CategoryNode>,
    pub expanded_parent: Option<CategoryId>,
    pub expanded_sub: Option<CategoryId>,
    pub can_advance: bool,
}

pub struct WizardSession {
    tree: Arc<CategoryTree>,
    coordinator: Mutex<WizardCoordinator>,
    events: broadcast::Sender<WizardEvent>,
}

impl WizardSession {
    pub fn new(tree: Arc<CategoryTree>, unknown_ids: UnknownIdPolicy) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            tree,
            coordinator: Mutex::new(WizardCoordinator::new(unknown_ids)),
            events,
        }
    }

    pub fn tree(&self) -> &Arc<CategoryTree> {
        &self.tree
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WizardEvent) {
        let _ = self.events.send(event);
    }

    pub async fn load_taxonomy(&self) -> Result<(), LoadError> {
        match self.tree.load().await {
            Ok(()) => {
                let stats = self.tree.stats();
                info!(nodes = stats.nodes, roots = stats.roots, "wizard: taxonomy ready");
                self.emit(WizardEvent::TaxonomyLoaded {
                    nodes: stats.nodes,
                    roots: stats.roots,
                });
                Ok(())
            }
            Err(err) => {
                self.emit(WizardEvent::LoadFailed(err.clone()));
                Err(err)
            }
        }
    }

    pub async fn tap(&self, id: &CategoryId) -> Result<TapOutcome, SelectionError> {
        let mut coordinator = self.coordinator.lock().await;
        self.tap_locked(&mut coordinator, id)
    }

    fn tap_locked(
        &self,
        coordinator: &mut WizardCoordinator,
        id: &CategoryId,
    ) -> Result<TapOutcome, SelectionError> {
        match coordinator.tap(&self.tree, id) {
            Ok(outcome) => {
                debug!(%id, ?outcome, "wizard: tap");
                self.selection_changed(coordinator);
                Ok(outcome)
            }
            Err(err) => {
                debug!(%id, "wizard: tap refused: {err}");
                Err(err)
            }
        }
    }

    fn selection_changed(&self, coordinator: &WizardCoordinator) {
        let selection = coordinator.selection();
        self.emit(WizardEvent::SelectionChanged {
            path: selection.path().to_vec(),
            current: selection.current().cloned(),
        });
    }

    fn text_changed(&self, coordinator: &WizardCoordinator, field: TextField) {
        self.emit(WizardEvent::TextChanged {
            field,
            text: coordinator.text(field).to_string(),
        });
    }

    pub async fn set_text(&self, field: TextField, text: impl Into<String>) {
        let mut coordinator = self.coordinator.lock().await;
        coordinator.set_text(field, text);
        self.text_changed(&coordinator, field);
    }

    pub async fn text(&self, field: TextField) -> String {
        self.coordinator.lock().await.text(field).to_string()
    }

    pub async fn set_private(&self, is_private: bool) {
        let mut coordinator = self.coordinator.lock().await;
        coordinator.set_private(is_private);
        self.emit(WizardEvent::PrivacyChanged(is_private));
    }

    pub async fn select_layout(&self, name: &str) -> Result<(), LayoutError> {
        let mut coordinator = self.coordinator.lock().await;
        self.select_layout_locked(&mut coordinator, name)
    }

    fn select_layout_locked(
        &self,
        coordinator: &mut WizardCoordinator,
        name: &str,
    ) -> Result<(), LayoutError> {
        let template = coordinator.select_layout(name)?;
        self.emit(WizardEvent::LayoutSelected(template.name.to_string()));
        Ok(())
    }

    fn clear_draft_locked(&self, coordinator: &mut WizardCoordinator) {
        coordinator.clear_draft();
        self.draft_cleared(coordinator);
    }

    /// `DraftCleared` is followed by the emptied values, so a renderer that
    /// only follows field events ends up blank too.
    fn draft_cleared(&self, coordinator: &WizardCoordinator) {
        self.emit(WizardEvent::DraftCleared);
        self.text_changed(coordinator, TextField::Name);
        self.text_changed(coordinator, TextField::Description);
        self.selection_changed(coordinator);
        self.emit(WizardEvent::PrivacyChanged(coordinator.is_private()));
    }

    /// Clears the draft and returns to the first step.
    pub async fn reset(&self) {
        let mut coordinator = self.coordinator.lock().await;
        let from = coordinator.step();
        coordinator.reset();
        self.draft_cleared(&coordinator);
        if from != WizardStep::Name {
            self.transitioned(&StepTransition::Moved {
                from,
                to: WizardStep::Name,
            });
        }
    }

    fn transitioned(&self, transition: &StepTransition) {
        match transition {
            StepTransition::Moved { from, to } => {
                debug!(%from, %to, "wizard: step changed");
                self.emit(WizardEvent::StepChanged {
                    from: *from,
                    to: *to,
                });
            }
            StepTransition::Submitted(draft) => {
                info!(name = %draft.name, category = %draft.category.id, "wizard: draft submitted");
                self.emit(WizardEvent::Submitted(draft.clone()));
            }
        }
    }

    fn nudge(&self, failure: &ValidationFailure) {
        debug!(step = %failure.step, missing = ?failure.missing, "wizard: advance blocked");
        for field in &failure.missing {
            self.emit(WizardEvent::Nudge(*field));
        }
    }

    pub async fn advance(&self) -> Result<StepTransition, ValidationFailure> {
        let mut coordinator = self.coordinator.lock().await;
        let result = coordinator.advance();
        match &result {
            Ok(transition) => self.transitioned(transition),
            Err(failure) => self.nudge(failure),
        }
        result
    }

    pub async fn back(&self) -> Option<StepTransition> {
        let mut coordinator = self.coordinator.lock().await;
        let transition = coordinator.back();
        if let Some(transition) = &transition {
            self.transitioned(transition);
        }
        transition
    }

    pub async fn go_to(
        &self,
        step: WizardStep,
    ) -> Result<Option<StepTransition>, ValidationFailure> {
        let mut coordinator = self.coordinator.lock().await;
        let result = coordinator.go_to(step);
        match &result {
            Ok(Some(transition)) => self.transitioned(transition),
            Ok(None) => {}
            Err(failure) => self.nudge(failure),
        }
        result
    }

    pub async fn submit(&self) -> Result<RankoDraft, ValidationFailure> {
        let coordinator = self.coordinator.lock().await;
        let result = coordinator.submit();
        match &result {
            Ok(draft) => self.transitioned(&StepTransition::Submitted(draft.clone())),
            Err(failure) => self.nudge(failure),
        }
        result
    }

    pub async fn step(&self) -> WizardStep {
        self.coordinator.lock().await.step()
    }

    pub async fn visible_rows(&self) -> Vec<CategoryNode> {
        self.coordinator
            .lock()
            .await
            .selection()
            .visible_rows(&self.tree)
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let coordinator = self.coordinator.lock().await;
        let selection = coordinator.selection();
        WizardSnapshot {
            step: coordinator.step(),
            name: coordinator.name().to_string(),
            description: coordinator.description().to_string(),
            is_private: coordinator.is_private(),
            layout: coordinator.layout().map(|layout| layout.name.to_string()),
            path: selection.path().to_vec(),
            current: selection.current().cloned(),
            expanded_parent: selection.expanded_parent().cloned(),
            expanded_sub: selection.expanded_sub().cloned(),
            can_advance: coordinator.can_advance(),
        }
    }
}

#[async_trait]
impl InteractionTarget for WizardSession {
    async fn apply(&self, token: &CancellationToken, interaction: Interaction) -> Applied {
        let mut coordinator = self.coordinator.lock().await;
        if token.is_cancelled() {
            return Applied::Cancelled;
        }

        match interaction {
            Interaction::ClearText(field) => {
                coordinator.clear_text(field);
                self.text_changed(&coordinator, field);
                Applied::Done
            }
            Interaction::PushChar(field, ch) => {
                coordinator.push_char(field, ch);
                self.text_changed(&coordinator, field);
                Applied::Done
            }
            Interaction::PopChar(field) => match coordinator.pop_char(field) {
                Some(_) => {
                    self.text_changed(&coordinator, field);
                    Applied::Done
                }
                None => Applied::Empty,
            },
            Interaction::Tap(id) => match self.tap_locked(&mut coordinator, &id) {
                Ok(_) => Applied::Done,
                Err(_) => Applied::Rejected,
            },
            Interaction::SelectLayout(name) => {
                match self.select_layout_locked(&mut coordinator, &name) {
                    Ok(()) => Applied::Done,
                    Err(err) => {
                        warn!("wizard: scripted layout choice refused: {err}");
                        Applied::Rejected
                    }
                }
            }
            Interaction::ResetDraft => {
                self.clear_draft_locked(&mut coordinator);
                Applied::Done
            }
        }
    }

    async fn is_tree_ready(&self) -> bool {
        self.tree.has_roots()
    }

    async fn current_step(&self) -> WizardStep {
        self.coordinator.lock().await.step()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
