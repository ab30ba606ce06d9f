//! Model and token budget fallback order

use super::CompletionFailure;

/// One (model, budget) pair to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
}

/// What to do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    AdvanceBudget,
    AdvanceModel,
}

/// Decide the next step from an attempt outcome.
///
/// Only a capacity refusal skips the remaining budgets of a model; every
/// other failure tries the next smaller budget.
pub fn next_step(outcome: &Result<String, CompletionFailure>) -> Step {
    match outcome {
        Ok(_) => Step::Succeed,
        Err(CompletionFailure::NoCapacity(_)) => Step::AdvanceModel,
        Err(_) => Step::AdvanceBudget,
    }
}

/// Walks models in order and, per model, budgets largest first
#[derive(Debug, Clone)]
pub struct AttemptLadder<'a> {
    models: &'a [String],
    budgets: &'a [u32],
    model: usize,
    budget: usize,
}

impl<'a> AttemptLadder<'a> {
    pub fn new(models: &'a [String], budgets: &'a [u32]) -> Self {
        Self {
            models,
            budgets,
            model: 0,
            budget: 0,
        }
    }

    /// Skip the remaining budgets of the model last yielded
    pub fn abandon_model(&mut self) {
        if self.budget > 0 {
            self.model += 1;
            self.budget = 0;
        }
    }

    /// Total attempts when nothing is abandoned
    pub fn len(&self) -> usize {
        self.models.len() * self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> Iterator for AttemptLadder<'a> {
    type Item = Attempt<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.budgets.is_empty() {
            return None;
        }
        if self.budget >= self.budgets.len() {
            self.model += 1;
            self.budget = 0;
        }
        let model = self.models.get(self.model)?;
        let max_tokens = self.budgets[self.budget];
        self.budget += 1;
        Some(Attempt { model, max_tokens })
    }
}
