//! Forced-action state machine.
//!
//! ```text
//!            actions/force (valid, not ignored)
//!   Idle ──────────────────────────────────────▶ Awaiting
//!    ▲                                          │  Deciding ── operator choice ──▶ Sent
//!    │                                          │  Sent ── result(fail) ──▶ retry (Deciding | Sent)
//!    └──── result(success) | retry aborted ─────┘
//!    └──── startup (from any state) ────────────┘
//! ```
//!
//! The machine reads the registry but never mutates it. Every transition
//! returns a [`ForceStep`] telling the dispatcher what to send or show.

use crate::controls::Controls;
use crate::error::HarnessError;
use crate::ids::ActionIdGenerator;
use crate::operator::{ForceChoice, ForceDecision};
use crate::registry::ActionRegistry;
use crate::sampler::{prepare_payload, SchemaSampler};
use crate::types::{ForcePrompt, ForcedSummary};
use game_api_protocol::ActionInvocation;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// ForcedActionRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ForcedActionRequest {
    pub state: Option<String>,
    pub query: String,
    pub ephemeral: bool,
    /// Candidate names in delivery order, duplicates removed.
    pub candidates: Vec<String>,
    pub is_retry: bool,
}

impl ForcedActionRequest {
    pub fn new(
        state: Option<String>,
        query: impl Into<String>,
        ephemeral: bool,
        names: Vec<String>,
    ) -> Self {
        let mut candidates: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        Self {
            state,
            query: query.into(),
            ephemeral,
            candidates,
            is_retry: false,
        }
    }

    fn prompt(&self, prompt_id: u64, registry: &ActionRegistry) -> ForcePrompt {
        ForcePrompt {
            prompt_id,
            state: self.state.clone(),
            query: self.query.clone(),
            ephemeral: self.ephemeral,
            candidates: self
                .candidates
                .iter()
                .filter_map(|n| registry.get(n).cloned())
                .collect(),
            is_retry: self.is_retry,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Waiting for the operator; nothing sent yet.
    Deciding { prompt_id: u64 },
    /// Invocation `action_id` sent; waiting for `action/result`.
    Sent { action_id: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ForcedState {
    #[default]
    Idle,
    Awaiting {
        request: ForcedActionRequest,
        phase: Phase,
    },
}

// ---------------------------------------------------------------------------
// ForceStep
// ---------------------------------------------------------------------------

/// Why a forced request was discarded.
#[derive(Debug)]
pub enum ForceDrop {
    /// Another request is already active; the new one is discarded and the
    /// active one is untouched.
    Conflict,
    /// The request named no actions at all.
    NoCandidates,
    Invalid { missing: Vec<String> },
    Ignored,
    /// No payload could be generated for the chosen action.
    Sampler(HarnessError),
}

/// What the dispatcher has to do after a transition.
#[derive(Debug)]
pub enum ForceStep {
    Invoke(ActionInvocation),
    Prompt(ForcePrompt),
    Dropped(ForceDrop),
    /// Operator answer refused; the prompt stays open.
    Rejected(HarnessError),
    /// Operator closed the prompt; the request stays active.
    Cancelled { prompt_id: u64 },
    /// Answer to a prompt that is no longer outstanding.
    Stale,
    Completed,
    /// The result did not belong to a forced invocation.
    NotForced,
}

/// Borrowed collaborators for one transition.
pub struct ForceContext<'a> {
    pub registry: &'a ActionRegistry,
    pub controls: &'a Controls,
    pub sampler: &'a mut dyn SchemaSampler,
    pub ids: &'a mut ActionIdGenerator,
}

// ---------------------------------------------------------------------------
// ForcedActions
// ---------------------------------------------------------------------------

pub struct ForcedActions {
    state: ForcedState,
    rng: StdRng,
    next_prompt_id: u64,
}

impl ForcedActions {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Auto-mode choices are fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: ForcedState::Idle,
            rng,
            next_prompt_id: 0,
        }
    }

    pub fn state(&self) -> &ForcedState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ForcedState::Idle)
    }

    /// Id of the forced invocation whose result is outstanding.
    pub fn pending_action_id(&self) -> Option<&str> {
        match &self.state {
            ForcedState::Awaiting {
                phase: Phase::Sent { action_id },
                ..
            } => Some(action_id),
            _ => None,
        }
    }

    pub fn summary(&self) -> ForcedSummary {
        match &self.state {
            ForcedState::Idle => ForcedSummary::Idle,
            ForcedState::Awaiting { request, phase } => match phase {
                Phase::Deciding { prompt_id } => ForcedSummary::Deciding {
                    prompt_id: *prompt_id,
                    query: request.query.clone(),
                    candidates: request.candidates.clone(),
                    is_retry: request.is_retry,
                },
                Phase::Sent { action_id } => ForcedSummary::AwaitingResult {
                    action_id: action_id.clone(),
                    query: request.query.clone(),
                    candidates: request.candidates.clone(),
                    is_retry: request.is_retry,
                },
            },
        }
    }

    /// Handle a new `actions/force` request.
    pub fn begin(&mut self, request: ForcedActionRequest, ctx: &mut ForceContext<'_>) -> ForceStep {
        if !self.is_idle() {
            return ForceStep::Dropped(ForceDrop::Conflict);
        }
        if let Some(drop) = screen(&request, ctx) {
            return ForceStep::Dropped(drop);
        }
        self.respond(request, ctx)
    }

    /// Handle the operator's answer to prompt `prompt_id`.
    pub fn decide(
        &mut self,
        prompt_id: u64,
        decision: ForceDecision,
        ctx: &mut ForceContext<'_>,
    ) -> ForceStep {
        let ForcedState::Awaiting {
            request,
            phase: Phase::Deciding { prompt_id: current },
        } = &self.state
        else {
            return ForceStep::Stale;
        };
        if *current != prompt_id {
            return ForceStep::Stale;
        }

        let (choice, data) = match decision {
            ForceDecision::Cancel => return ForceStep::Cancelled { prompt_id },
            ForceDecision::Choose { choice, data } => (choice, data),
        };

        let name = match choice {
            ForceChoice::Name(name) => name,
            ForceChoice::Index(i) => match i.checked_sub(1).and_then(|i| request.candidates.get(i)) {
                Some(name) => name.clone(),
                None => return ForceStep::Rejected(HarnessError::NotACandidate(format!("#{i}"))),
            },
        };
        if !request.candidates.contains(&name) {
            return ForceStep::Rejected(HarnessError::NotACandidate(name));
        }
        let Some(action) = ctx.registry.get(&name) else {
            return ForceStep::Rejected(HarnessError::NotFound(name));
        };

        let data = match prepare_payload(action, data, ctx.controls, &mut *ctx.sampler) {
            Ok(data) => data,
            Err(e) => return ForceStep::Rejected(e),
        };

        let id = ctx.ids.next_id();
        if let ForcedState::Awaiting { phase, .. } = &mut self.state {
            *phase = Phase::Sent {
                action_id: id.clone(),
            };
        }
        ForceStep::Invoke(ActionInvocation { id, name, data })
    }

    /// The prompt for the active request, if it is waiting for the operator.
    pub fn reopen(&self, registry: &ActionRegistry) -> Option<ForcePrompt> {
        match &self.state {
            ForcedState::Awaiting {
                request,
                phase: Phase::Deciding { prompt_id },
            } => Some(request.prompt(*prompt_id, registry)),
            _ => None,
        }
    }

    /// Handle `action/result`. A failure re-validates the candidates and
    /// answers the same request again.
    pub fn on_result(&mut self, success: bool, ctx: &mut ForceContext<'_>) -> ForceStep {
        match std::mem::take(&mut self.state) {
            ForcedState::Awaiting {
                mut request,
                phase: Phase::Sent { .. },
            } => {
                if success {
                    return ForceStep::Completed;
                }
                request.is_retry = true;
                if let Some(drop) = screen(&request, ctx) {
                    return ForceStep::Dropped(drop);
                }
                self.respond(request, ctx)
            }
            other => {
                self.state = other;
                ForceStep::NotForced
            }
        }
    }

    /// Discard the active request without retrying. Returns the id of a
    /// prompt that must be dismissed.
    pub fn reset(&mut self) -> Option<u64> {
        match std::mem::take(&mut self.state) {
            ForcedState::Awaiting {
                phase: Phase::Deciding { prompt_id },
                ..
            } => Some(prompt_id),
            _ => None,
        }
    }

    fn respond(&mut self, request: ForcedActionRequest, ctx: &mut ForceContext<'_>) -> ForceStep {
        if !ctx.controls.auto_send {
            let prompt_id = self.next_prompt_id;
            self.next_prompt_id += 1;
            let prompt = request.prompt(prompt_id, ctx.registry);
            self.state = ForcedState::Awaiting {
                request,
                phase: Phase::Deciding { prompt_id },
            };
            return ForceStep::Prompt(prompt);
        }

        let available: Vec<&String> = request
            .candidates
            .iter()
            .filter(|n| ctx.registry.has(n))
            .collect();
        let Some(action) = available
            .choose(&mut self.rng)
            .and_then(|n| ctx.registry.get(n))
        else {
            self.state = ForcedState::Idle;
            return ForceStep::Dropped(ForceDrop::Invalid {
                missing: request.candidates.clone(),
            });
        };

        let data = match prepare_payload(action, None, ctx.controls, &mut *ctx.sampler) {
            Ok(data) => data,
            Err(e) => {
                self.state = ForcedState::Idle;
                return ForceStep::Dropped(ForceDrop::Sampler(e));
            }
        };

        let invocation = ActionInvocation {
            id: ctx.ids.next_id(),
            name: action.name.clone(),
            data,
        };
        self.state = ForcedState::Awaiting {
            request,
            phase: Phase::Sent {
                action_id: invocation.id.clone(),
            },
        };
        ForceStep::Invoke(invocation)
    }
}

/// Checks a request must pass before it is answered, in order.
fn screen(request: &ForcedActionRequest, ctx: &ForceContext<'_>) -> Option<ForceDrop> {
    if request.candidates.is_empty() {
        return Some(ForceDrop::NoCandidates);
    }
    let missing = ctx.registry.missing(&request.candidates);
    if !missing.is_empty() {
        return Some(ForceDrop::Invalid { missing });
    }
    if ctx.controls.ignore_forced_actions {
        return Some(ForceDrop::Ignored);
    }
    None
}

impl Default for ForcedActions {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
