//! The four-step creation wizard and its forward-validation table.

use shared::{
    domain::{CategoryId, Field, LayoutTemplate, RankoDraft, TextField, WizardStep},
    error::{LayoutError, SelectionError, ValidationFailure},
};
use taxonomy::CategoryTree;

use crate::selection::{SelectionController, TapOutcome, UnknownIdPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTransition {
    Moved { from: WizardStep, to: WizardStep },
    Submitted(RankoDraft),
}

/// Fields that must be filled before `step` can be left forwards.
/// Leaving `Layout` forwards means submitting.
pub fn requirements_to_leave(step: WizardStep) -> &'static [Field] {
    match step {
        WizardStep::Name | WizardStep::Description => &[Field::Name],
        WizardStep::Category => &[Field::Name, Field::Category],
        WizardStep::Layout => &[Field::Name, Field::Category, Field::Layout],
    }
}

#[derive(Debug, Clone, Default)]
pub struct WizardCoordinator {
    step: WizardStep,
    name: String,
    description: String,
    is_private: bool,
    layout: Option<&'static LayoutTemplate>,
    selection: SelectionController,
}

impl WizardCoordinator {
    pub fn new(unknown_ids: UnknownIdPolicy) -> Self {
        Self {
            selection: SelectionController::new(unknown_ids),
            ..Self::default()
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Name => &self.name,
            TextField::Description => &self.description,
        }
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn layout(&self) -> Option<&'static LayoutTemplate> {
        self.layout
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    fn text_mut(&mut self, field: TextField) -> &mut String {
        match field {
            TextField::Name => &mut self.name,
            TextField::Description => &mut self.description,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_text(&mut self, field: TextField, text: impl Into<String>) {
        *self.text_mut(field) = text.into();
    }

    pub fn push_char(&mut self, field: TextField, ch: char) {
        self.text_mut(field).push(ch);
    }

    /// Removes the last character; `None` when the buffer was already empty.
    pub fn pop_char(&mut self, field: TextField) -> Option<char> {
        self.text_mut(field).pop()
    }

    pub fn clear_text(&mut self, field: TextField) {
        self.text_mut(field).clear();
    }

    pub fn set_private(&mut self, is_private: bool) {
        self.is_private = is_private;
    }

    pub fn select_layout(&mut self, name: &str) -> Result<&'static LayoutTemplate, LayoutError> {
        let template =
            LayoutTemplate::find(name).ok_or_else(|| LayoutError::Unknown(name.to_string()))?;
        if template.disabled {
            return Err(LayoutError::Disabled(template.name.to_string()));
        }
        self.layout = Some(template);
        Ok(template)
    }

    pub fn clear_layout(&mut self) {
        self.layout = None;
    }

    pub fn tap(
        &mut self,
        tree: &CategoryTree,
        id: &CategoryId,
    ) -> Result<TapOutcome, SelectionError> {
        self.selection.tap(tree, id)
    }

    /// Clears every field and the selection. The current step is kept.
    pub fn clear_draft(&mut self) {
        let unknown_ids = self.selection.unknown_ids();
        let step = self.step;
        *self = Self::new(unknown_ids);
        self.step = step;
    }

    /// Clears the draft and returns to the first step.
    pub fn reset(&mut self) {
        self.clear_draft();
        self.step = WizardStep::Name;
    }

    fn is_filled(&self, field: Field) -> bool {
        match field {
            Field::Name => !self.name.trim().is_empty(),
            Field::Description => !self.description.trim().is_empty(),
            Field::Category => !self.selection.is_empty(),
            Field::Layout => self.layout.is_some(),
        }
    }

    pub fn missing_for(&self, step: WizardStep) -> Vec<Field> {
        requirements_to_leave(step)
            .iter()
            .copied()
            .filter(|field| !self.is_filled(*field))
            .collect()
    }

    fn check(&self, step: WizardStep) -> Result<(), ValidationFailure> {
        let missing = self.missing_for(step);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { step, missing })
        }
    }

    pub fn can_advance(&self) -> bool {
        self.missing_for(self.step).is_empty()
    }

    pub fn advance(&mut self) -> Result<StepTransition, ValidationFailure> {
        self.check(self.step)?;
        match self.step.next() {
            Some(to) => Ok(self.enter(to)),
            None => self.submit().map(StepTransition::Submitted),
        }
    }

    pub fn back(&mut self) -> Option<StepTransition> {
        self.step.previous().map(|to| self.enter(to))
    }

    /// Tab-style navigation. Backwards always succeeds; forwards checks the
    /// requirements of every step being skipped over.
    pub fn go_to(&mut self, to: WizardStep) -> Result<Option<StepTransition>, ValidationFailure> {
        if to == self.step {
            return Ok(None);
        }
        if to.index() > self.step.index() {
            for passed in WizardStep::ALL[self.step.index()..to.index()].iter() {
                self.check(*passed)?;
            }
        }
        Ok(Some(self.enter(to)))
    }

    fn enter(&mut self, to: WizardStep) -> StepTransition {
        let from = self.step;
        if from == WizardStep::Category {
            self.selection.collapse();
        }
        self.step = to;
        StepTransition::Moved { from, to }
    }

    /// Builds the finished draft if everything the `Layout` step needs is
    /// present, regardless of the current step.
    pub fn submit(&self) -> Result<RankoDraft, ValidationFailure> {
        self.check(WizardStep::Layout)?;
        let (Some(category), Some(layout)) = (self.selection.current().cloned(), self.layout)
        else {
            return Err(ValidationFailure {
                step: WizardStep::Layout,
                missing: vec![Field::Category],
            });
        };

        Ok(RankoDraft {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            is_private: self.is_private,
            category,
            category_path: self.selection.path().to_vec(),
            layout: layout.name.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
