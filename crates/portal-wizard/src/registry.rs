//! Step registry for the apply flows
//!
//! Provides [`StepRegistry`], one ordered step table per [`ApplicationType`],
//! and [`Registries`] holding the standard tables. All resolution methods are
//! pure functions of the registry and the current [`WizardState`].

use crate::state::WizardState;
use crate::step::{ApplicationType, Step, StepKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Applicability rule of a step, evaluated against saved payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Always applicable
    Always,
    /// Tax filing answered "no"
    TaxesNotFiled,
    /// Tax filing answered "yes" or not answered yet
    TaxesFiled,
    /// Taxes filed and applicant married or common-law
    PartnerRequired,
}

impl Condition {
    /// Evaluate against a state
    #[must_use]
    pub fn holds(self, state: &WizardState) -> bool {
        let filed = state.tax_filing().map(|t| t.filed_previous_year);
        match self {
            Condition::Always => true,
            Condition::TaxesNotFiled => filed == Some(false),
            Condition::TaxesFiled => filed != Some(false),
            Condition::PartnerRequired => {
                filed != Some(false) && state.marital_status().is_some_and(|m| m.has_partner())
            }
        }
    }
}

/// Where to go when a step does not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Continue with the step's successor
    Skip,
    /// Go to a fixed step
    Redirect(Step),
}

/// Forward navigation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Successor {
    /// Always the same step
    Next(Step),
    /// `to` when the condition holds, `otherwise` if not
    Branch {
        /// Branch condition
        when: Condition,
        /// Target when the condition holds
        to: Step,
        /// Target otherwise
        otherwise: Step,
    },
    /// End of the flow
    Terminal,
}

/// Whether a step requires the submission to be absent or present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionGate {
    /// Only before submission
    Unsubmitted,
    /// Only after submission
    Submitted,
}

/// Declaration of a single step within a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    /// Step id
    pub step: Step,
    /// Steps that must be saved first, in flow order
    pub requires: Vec<Step>,
    /// Back-navigation target; the first step is its own predecessor
    pub predecessor: Step,
    /// Forward rule
    pub successor: Successor,
    /// Applicability rule
    pub condition: Condition,
    /// Target when not applicable
    pub fallback: Fallback,
    /// Submission gate
    pub gate: SubmissionGate,
}

impl StepDefinition {
    /// Step whose payload this page writes, if any
    #[inline]
    #[must_use]
    pub fn field(&self) -> Option<Step> {
        self.step.is_data().then_some(self.step)
    }
}

/// Ordered step table for one application type
#[derive(Debug, Clone)]
pub struct StepRegistry {
    application_type: ApplicationType,
    steps: IndexMap<Step, StepDefinition>,
}

impl StepRegistry {
    /// Start building a table
    #[must_use]
    pub fn builder(application_type: ApplicationType) -> RegistryBuilder {
        RegistryBuilder {
            application_type,
            steps: IndexMap::new(),
            chain: Vec::new(),
            pending_exit: None,
        }
    }

    /// Flow this table describes
    #[inline]
    #[must_use]
    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    /// Entry point of the flow
    #[must_use]
    pub fn first_step(&self) -> Step {
        self.steps
            .first()
            .map_or(Step::TermsAndConditions, |(step, _)| *step)
    }

    /// Whether the step belongs to the flow
    #[inline]
    #[must_use]
    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains_key(&step)
    }

    /// Definition of a step
    #[inline]
    #[must_use]
    pub fn definition(&self, step: Step) -> Option<&StepDefinition> {
        self.steps.get(&step)
    }

    /// Steps in table order
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps.keys().copied()
    }

    /// Confirmation step, or `None` for flows that never submit
    #[must_use]
    pub fn terminal_step(&self) -> Option<Step> {
        self.steps
            .values()
            .find(|def| def.gate == SubmissionGate::Submitted)
            .map(|def| def.step)
    }

    /// Whether the flow ends in a submission
    #[inline]
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.terminal_step().is_some()
    }

    /// Whether the step applies to the current state
    #[must_use]
    pub fn is_applicable(&self, step: Step, state: &WizardState) -> bool {
        self.definition(step)
            .is_some_and(|def| def.condition.holds(state))
    }

    /// Data steps a complete application must have saved
    #[must_use]
    pub fn required_data_steps(&self, state: &WizardState) -> Vec<Step> {
        if !self.is_submittable() {
            return Vec::new();
        }
        self.steps
            .values()
            .filter(|def| def.step.is_data() && def.condition.holds(state))
            .map(|def| def.step)
            .collect()
    }

    /// Applicable prerequisites of `step` with no saved payload, in flow order
    #[must_use]
    pub fn missing_prerequisites(&self, step: Step, state: &WizardState) -> Vec<Step> {
        self.definition(step)
            .map(|def| {
                def.requires
                    .iter()
                    .copied()
                    .filter(|req| self.is_applicable(*req, state) && !state.has(*req))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First applicable step reachable from `step` by following fallbacks
    ///
    /// Returns `step` itself when it applies.
    #[must_use]
    pub fn resolve_applicable(&self, step: Step, state: &WizardState) -> Step {
        let mut current = step;
        for _ in 0..=self.steps.len() {
            let Some(def) = self.definition(current) else {
                return self.first_step();
            };
            if def.condition.holds(state) {
                return current;
            }
            current = match def.fallback {
                Fallback::Redirect(to) => to,
                Fallback::Skip => match Self::raw_successor(def, state) {
                    Some(next) => next,
                    None => return current,
                },
            };
        }
        current
    }

    /// Back-navigation target
    ///
    /// Skips steps that do not apply. In edit mode data steps return to the
    /// review page.
    #[must_use]
    pub fn resolve_predecessor(&self, step: Step, state: &WizardState) -> Step {
        let Some(def) = self.definition(step) else {
            return self.first_step();
        };
        if state.edit_mode && step.is_data() && self.contains(Step::ReviewInformation) {
            return Step::ReviewInformation;
        }

        let mut current = def.predecessor;
        for _ in 0..self.steps.len() {
            match self.definition(current) {
                Some(prev) if !prev.condition.holds(state) && prev.predecessor != current => {
                    current = prev.predecessor;
                }
                _ => break,
            }
        }
        current
    }

    /// Forward target after a successful save of `step`
    ///
    /// Branches on saved answers and skips steps that do not apply. In edit
    /// mode data steps return to the review page, or to the earliest
    /// prerequisite the review page is now missing.
    #[must_use]
    pub fn resolve_successor(&self, step: Step, state: &WizardState) -> Step {
        let Some(def) = self.definition(step) else {
            return self.first_step();
        };

        if state.edit_mode && step.is_data() && self.contains(Step::ReviewInformation) {
            let review = self.resolve_applicable(Step::ReviewInformation, state);
            return self
                .missing_prerequisites(review, state)
                .first()
                .copied()
                .unwrap_or(review);
        }

        match Self::raw_successor(def, state) {
            Some(next) => self.resolve_applicable(next, state),
            None => step,
        }
    }

    fn raw_successor(def: &StepDefinition, state: &WizardState) -> Option<Step> {
        match def.successor {
            Successor::Next(next) => Some(next),
            Successor::Branch {
                when,
                to,
                otherwise,
            } => Some(if when.holds(state) { to } else { otherwise }),
            Successor::Terminal => None,
        }
    }
}

/// Incremental construction of a [`StepRegistry`]
///
/// Steps added with [`then`](Self::then) form the main chain: each requires
/// every data step before it and links forward to the next. Exit steps hang
/// off the chain behind a branch.
#[derive(Debug)]
pub struct RegistryBuilder {
    application_type: ApplicationType,
    steps: IndexMap<Step, StepDefinition>,
    chain: Vec<Step>,
    pending_exit: Option<(Step, Condition, Step)>,
}

/// Invalid registry table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No steps were added
    #[error("registry for {0} has no steps")]
    Empty(ApplicationType),
    /// A step was added twice
    #[error("step {0} declared twice")]
    Duplicate(Step),
    /// A rule targets a step that is not in the table
    #[error("step {from} refers to unknown step {to}")]
    DanglingTarget {
        /// Referring step
        from: Step,
        /// Missing target
        to: Step,
    },
}

impl RegistryBuilder {
    /// Append a step to the main chain
    #[must_use]
    pub fn then(mut self, step: Step) -> Self {
        let predecessor = self.chain.last().copied().unwrap_or(step);

        if let Some(prev) = self.chain.last().copied() {
            let successor = match self.pending_exit.take() {
                Some((owner, when, to)) if owner == prev => Successor::Branch {
                    when,
                    to,
                    otherwise: step,
                },
                _ => Successor::Next(step),
            };
            if let Some(def) = self.steps.get_mut(&prev) {
                def.successor = successor;
            }
        }

        let requires = if step.kind() == StepKind::Confirmation {
            Vec::new()
        } else {
            self.chain.iter().copied().filter(|s| s.is_data()).collect()
        };
        let gate = if step.kind() == StepKind::Confirmation {
            SubmissionGate::Submitted
        } else {
            SubmissionGate::Unsubmitted
        };

        self.insert(StepDefinition {
            step,
            requires,
            predecessor,
            successor: Successor::Terminal,
            condition: Condition::Always,
            fallback: Fallback::Skip,
            gate,
        });
        self.chain.push(step);
        self
    }

    /// Attach an applicability rule to the last added step
    #[must_use]
    pub fn when(mut self, condition: Condition, fallback: Fallback) -> Self {
        if let Some(def) = self.chain.last().and_then(|s| self.steps.get_mut(s)) {
            def.condition = condition;
            def.fallback = fallback;
        }
        self
    }

    /// Add an exit page reached from the last chain step when `when` holds
    #[must_use]
    pub fn exit(mut self, step: Step, when: Condition, fallback: Fallback) -> Self {
        let Some(owner) = self.chain.last().copied() else {
            return self;
        };
        self.insert(StepDefinition {
            step,
            requires: self.chain.iter().copied().filter(|s| s.is_data()).collect(),
            predecessor: owner,
            successor: Successor::Terminal,
            condition: when,
            fallback,
            gate: SubmissionGate::Unsubmitted,
        });
        self.pending_exit = Some((owner, when, step));
        self
    }

    fn insert(&mut self, def: StepDefinition) {
        // Duplicates are reported by `build`
        if self.steps.contains_key(&def.step) {
            self.chain.push(def.step);
            return;
        }
        self.steps.insert(def.step, def);
    }

    /// Finish the table
    pub fn build(self) -> Result<StepRegistry, RegistryError> {
        if self.steps.is_empty() {
            return Err(RegistryError::Empty(self.application_type));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.chain {
            if !seen.insert(*step) {
                return Err(RegistryError::Duplicate(*step));
            }
        }

        let known = |s: Step| self.steps.contains_key(&s);
        for def in self.steps.values() {
            let mut targets = vec![def.predecessor];
            targets.extend(def.requires.iter().copied());
            match def.successor {
                Successor::Next(to) => targets.push(to),
                Successor::Branch { to, otherwise, .. } => targets.extend([to, otherwise]),
                Successor::Terminal => {}
            }
            if let Fallback::Redirect(to) = def.fallback {
                targets.push(to);
            }
            if let Some(to) = targets.into_iter().find(|t| !known(*t)) {
                return Err(RegistryError::DanglingTarget { from: def.step, to });
            }
        }

        Ok(StepRegistry {
            application_type: self.application_type,
            steps: self.steps,
        })
    }
}

/// Step tables for every application type
#[derive(Debug, Clone)]
pub struct Registries {
    tables: HashMap<ApplicationType, StepRegistry>,
}

static STANDARD: Lazy<Registries> = Lazy::new(|| {
    let tables = ApplicationType::ALL
        .into_iter()
        .map(|ty| (ty, standard_table(ty)))
        .collect();
    Registries { tables }
});

impl Registries {
    /// Standard tables of the apply flows
    #[must_use]
    pub fn standard() -> &'static Registries {
        &STANDARD
    }

    /// Build from custom tables
    #[must_use]
    pub fn from_tables(tables: impl IntoIterator<Item = StepRegistry>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.application_type(), t))
                .collect(),
        }
    }

    /// Table for a flow
    #[must_use]
    pub fn get(&self, application_type: ApplicationType) -> Option<&StepRegistry> {
        self.tables.get(&application_type)
    }
}

fn standard_table(application_type: ApplicationType) -> StepRegistry {
    let eligible = (Condition::TaxesFiled, Fallback::Redirect(Step::FileYourTaxes));
    let tax_exit = |b: RegistryBuilder| {
        b.exit(
            Step::FileYourTaxes,
            Condition::TaxesNotFiled,
            Fallback::Redirect(Step::TaxFiling),
        )
    };

    let builder = StepRegistry::builder(application_type).then(Step::TermsAndConditions);
    let builder = match application_type {
        ApplicationType::Delegate => builder.then(Step::ApplicationDelegate),
        ApplicationType::Adult | ApplicationType::AdultChild => {
            let mut b = tax_exit(builder.then(Step::TaxFiling))
                .then(Step::DateOfBirth)
                .when(eligible.0, eligible.1)
                .then(Step::ApplicantInformation)
                .when(eligible.0, eligible.1)
                .then(Step::PartnerInformation)
                .when(Condition::PartnerRequired, Fallback::Skip);
            if application_type == ApplicationType::AdultChild {
                b = b.then(Step::ChildrenInformation).when(eligible.0, eligible.1);
            }
            b.then(Step::ContactInformation)
                .when(eligible.0, eligible.1)
                .then(Step::CommunicationPreference)
                .when(eligible.0, eligible.1)
                .then(Step::DentalInsurance)
                .when(eligible.0, eligible.1)
                .then(Step::FederalProvincialTerritorialBenefits)
                .when(eligible.0, eligible.1)
                .then(Step::ReviewInformation)
                .when(eligible.0, eligible.1)
                .then(Step::Confirmation)
        }
        ApplicationType::Child => tax_exit(builder.then(Step::TaxFiling))
            .then(Step::DateOfBirth)
            .when(eligible.0, eligible.1)
            .then(Step::ChildrenInformation)
            .when(eligible.0, eligible.1)
            .then(Step::ApplicantInformation)
            .when(eligible.0, eligible.1)
            .then(Step::PartnerInformation)
            .when(Condition::PartnerRequired, Fallback::Skip)
            .then(Step::ContactInformation)
            .when(eligible.0, eligible.1)
            .then(Step::CommunicationPreference)
            .when(eligible.0, eligible.1)
            .then(Step::ReviewInformation)
            .when(eligible.0, eligible.1)
            .then(Step::Confirmation),
    };

    match builder.build() {
        Ok(registry) => registry,
        Err(e) => unreachable!("standard {application_type} table is malformed: {e}"),
    }
}
