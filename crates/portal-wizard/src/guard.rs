//! Navigation guard
//!
//! Decides whether a requested step may be shown for the current state, or
//! where the caller should redirect instead. Decisions are values; nothing
//! here fails or performs I/O.

use crate::registry::StepRegistry;
use crate::state::WizardState;
use crate::step::{Step, StepKind};
use std::fmt;

/// Why a request was redirected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// Application already submitted
    AlreadySubmitted,
    /// Confirmation requested before submission
    NotSubmitted,
    /// Step is not part of this flow
    UnknownStep,
    /// Step does not apply to the saved answers
    NotApplicable,
    /// A prerequisite step has not been saved
    MissingPrerequisite,
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedirectReason::AlreadySubmitted => "already-submitted",
            RedirectReason::NotSubmitted => "not-submitted",
            RedirectReason::UnknownStep => "unknown-step",
            RedirectReason::NotApplicable => "not-applicable",
            RedirectReason::MissingPrerequisite => "missing-prerequisite",
        })
    }
}

/// Outcome of [`NavigationGuard::authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Show the requested step
    Allow,
    /// Send the user elsewhere
    Redirect {
        /// Target step
        to: Step,
        /// Rule that fired
        reason: RedirectReason,
    },
}

impl Decision {
    /// Check if allowed
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Redirect target, if any
    #[inline]
    #[must_use]
    pub fn redirect_target(&self) -> Option<Step> {
        match self {
            Decision::Allow => None,
            Decision::Redirect { to, .. } => Some(*to),
        }
    }
}

/// Access rules for one flow's steps
#[derive(Debug, Clone, Copy)]
pub struct NavigationGuard<'a> {
    registry: &'a StepRegistry,
}

impl<'a> NavigationGuard<'a> {
    /// Guard over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'a StepRegistry) -> Self {
        Self { registry }
    }

    /// Decide whether `step` may be shown for `state`
    ///
    /// Rules, first match wins:
    /// 1. submitted and not the confirmation page: confirmation
    /// 2. not submitted and the confirmation page: first step
    /// 3. step outside the flow: first step
    /// 4. step not applicable: next applicable step
    /// 5. prerequisite missing: earliest missing prerequisite
    #[must_use]
    pub fn authorize(&self, step: Step, state: &WizardState) -> Decision {
        let first = self.registry.first_step();
        let is_confirmation = step.kind() == StepKind::Confirmation;

        if state.is_submitted() {
            let confirmation = self.registry.terminal_step().unwrap_or(Step::Confirmation);
            if step != confirmation {
                return redirect(confirmation, RedirectReason::AlreadySubmitted);
            }
        } else if is_confirmation {
            return redirect(first, RedirectReason::NotSubmitted);
        }

        if !self.registry.contains(step) {
            return redirect(first, RedirectReason::UnknownStep);
        }

        if !self.registry.is_applicable(step, state) {
            let target = self.registry.resolve_applicable(step, state);
            let target = if target == step { first } else { target };
            return redirect(target, RedirectReason::NotApplicable);
        }

        if let Some(missing) = self.registry.missing_prerequisites(step, state).first() {
            return redirect(*missing, RedirectReason::MissingPrerequisite);
        }

        Decision::Allow
    }
}

fn redirect(to: Step, reason: RedirectReason) -> Decision {
    tracing::debug!(%to, %reason, "navigation redirected");
    Decision::Redirect { to, reason }
}
