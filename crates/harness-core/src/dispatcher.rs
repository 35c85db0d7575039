//! Routes decoded protocol commands and operator requests.
//!
//! The dispatcher owns the registry, the forced-action machine, the live
//! controls and the id generator. Exactly one task drives it (see
//! [`crate::runtime`]), so nothing here is shared or locked.

use crate::capability::{Outbound, Presentation, Transport, UiEvent};
use crate::controls::Controls;
use crate::forced::{ForceContext, ForceDrop, ForceStep, ForcedActionRequest, ForcedActions};
use crate::ids::ActionIdGenerator;
use crate::operator::OperatorRequest;
use crate::registry::ActionRegistry;
use crate::sampler::{prepare_payload, SchemaSampler};
use crate::types::{Action, HarnessSnapshot, LogLevel};
use crate::HarnessError;
use game_api_protocol::{ActionInvocation, Command, OutgoingCommand};

const NOT_IN_SPECIFICATION: &str = "This command is not in the official API specification.";

/// What caused a forced-action transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOrigin {
    Request,
    Retry,
    /// Operator answer to the prompt with this id.
    Operator(u64),
}

pub struct Dispatcher {
    registry: ActionRegistry,
    forced: ForcedActions,
    controls: Controls,
    ids: ActionIdGenerator,
    execution_locked: bool,
    invocations_sent: u64,
    presentation: Box<dyn Presentation>,
    transport: Box<dyn Transport>,
    sampler: Box<dyn SchemaSampler>,
}

impl Dispatcher {
    pub fn new(
        controls: Controls,
        presentation: Box<dyn Presentation>,
        transport: Box<dyn Transport>,
        sampler: Box<dyn SchemaSampler>,
    ) -> Self {
        Self {
            registry: ActionRegistry::new(),
            forced: ForcedActions::new(),
            controls,
            ids: ActionIdGenerator::new(),
            execution_locked: false,
            invocations_sent: 0,
            presentation,
            transport,
            sampler,
        }
    }

    /// Make forced-action selection deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.forced = ForcedActions::seeded(seed);
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn forced(&self) -> &ForcedActions {
        &self.forced
    }

    pub fn execution_locked(&self) -> bool {
        self.execution_locked
    }

    pub fn snapshot(&self) -> HarnessSnapshot {
        HarnessSnapshot {
            actions: self.registry.all(),
            controls: self.controls.clone(),
            execution_locked: self.execution_locked,
            forced: self.forced.summary(),
            invocations_sent: self.invocations_sent,
        }
    }

    // -----------------------------------------------------------------------
    // Protocol commands
    // -----------------------------------------------------------------------

    pub fn dispatch(&mut self, command: Command) {
        tracing::debug!(command = command.kind(), "dispatch");
        match command {
            Command::Startup { game } => self.on_startup(game),
            Command::Context { message, silent } => {
                self.log(LogLevel::Debug, "context command received.");
                self.context(message, silent, false);
            }
            Command::ActionsRegister { actions } => self.on_register(actions),
            Command::ActionsUnregister { names } => self.on_unregister(names),
            Command::ActionsForce {
                state,
                query,
                ephemeral,
                names,
            } => self.on_force(ForcedActionRequest::new(state, query, ephemeral, names)),
            Command::ActionResult {
                id,
                success,
                message,
            } => self.on_result(id, success, message),
            Command::ShutdownReady => {
                self.log(LogLevel::Debug, "shutdown/ready command received.");
                self.log(LogLevel::Warning, NOT_IN_SPECIFICATION);
            }
            Command::Unknown { raw } => {
                let kind = raw
                    .get("command")
                    .and_then(|c| c.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.to_string());
                self.log(
                    LogLevel::Warning,
                    format!("Unknown command received: {kind}"),
                );
            }
        }
    }

    fn on_startup(&mut self, game: Option<String>) {
        match game {
            Some(game) => self.log(LogLevel::Info, format!("startup command received from {game}.")),
            None => self.log(LogLevel::Info, "startup command received."),
        }

        self.registry.clear();
        self.presentation.post(UiEvent::ActionsCleared);

        if let Some(prompt_id) = self.forced.reset() {
            self.presentation
                .post(UiEvent::ForcePromptDismissed { prompt_id });
        }
        self.set_locked(false);
    }

    fn on_register(&mut self, actions: Vec<Action>) {
        self.log(LogLevel::Debug, "actions/register command received.");
        for action in actions {
            let name = action.name.clone();
            let description = action.description.clone();
            match self.registry.add(action.clone()) {
                Ok(()) => {
                    self.presentation.post(UiEvent::ActionAdded(action));
                    self.log(LogLevel::Debug, format!("Action registered: {name}"));
                    self.context(format!("{name}: {description}"), false, false);
                }
                Err(_) => self.log(
                    LogLevel::Warning,
                    format!("Action \"{name}\" already exists. Ignoring."),
                ),
            }
        }
    }

    fn on_unregister(&mut self, names: Vec<String>) {
        self.log(LogLevel::Debug, "actions/unregister command received.");
        for name in names {
            match self.registry.remove(&name) {
                Ok(_) => {
                    self.presentation.post(UiEvent::ActionRemoved(name.clone()));
                    self.log(LogLevel::Debug, format!("Action unregistered: {name}"));
                }
                Err(e) => self.log(LogLevel::Info, format!("{}.", capitalize(&e.to_string()))),
            }
        }
    }

    fn on_force(&mut self, request: ForcedActionRequest) {
        match request.state.as_deref() {
            Some(state) if !state.is_empty() => {
                self.context(state.to_string(), false, request.ephemeral)
            }
            _ => self.log(LogLevel::Info, "actions/force command contains no state."),
        }
        self.context(request.query.clone(), false, request.ephemeral);
        self.log(LogLevel::Debug, "actions/force command received.");

        let step = self.drive_forced(|forced, ctx| forced.begin(request, ctx));
        self.on_force_step(step, StepOrigin::Request);
    }

    fn on_result(&mut self, id: Option<String>, success: bool, message: Option<String>) {
        let outcome = if success { "success" } else { "failure" };
        self.log(
            LogLevel::Debug,
            format!("action/result command received: {outcome}"),
        );

        match &message {
            Some(message) => self.context(message.clone(), false, false),
            None if success => self.log(
                LogLevel::Info,
                "Successful action result contains no message.",
            ),
            None => self.log(
                LogLevel::Warning,
                "Failed action result contains no message.",
            ),
        }
        self.presentation
            .post(UiEvent::ActionResult { success, message });

        if let (Some(id), Some(pending)) = (id.as_deref(), self.forced.pending_action_id()) {
            if id != pending {
                let warning = format!(
                    "action/result for {id} does not match the pending forced action {pending}."
                );
                self.log(LogLevel::Warning, warning);
            }
        }

        self.set_locked(false);

        let step = self.drive_forced(|forced, ctx| forced.on_result(success, ctx));
        self.on_force_step(step, StepOrigin::Retry);
    }

    // -----------------------------------------------------------------------
    // Operator requests
    // -----------------------------------------------------------------------

    pub fn handle_operator(&mut self, request: OperatorRequest) {
        tracing::debug!(?request, "operator request");
        match request {
            OperatorRequest::Execute { name, data } => self.execute(name, data),
            OperatorRequest::Delete { name } => match self.registry.remove(&name) {
                Ok(_) => {
                    self.presentation.post(UiEvent::ActionRemoved(name.clone()));
                    self.log(LogLevel::Info, format!("Action deleted: {name}"));
                }
                Err(e) => self.log(LogLevel::Info, format!("{}.", capitalize(&e.to_string()))),
            },
            OperatorRequest::ReregisterAll => {
                self.registry.clear();
                self.presentation.post(UiEvent::ActionsCleared);
                self.send_admin(OutgoingCommand::ActionsReregisterAll);
            }
            OperatorRequest::ShutdownGraceful => {
                self.send_admin(OutgoingCommand::ShutdownGraceful {
                    wants_shutdown: true,
                })
            }
            OperatorRequest::ShutdownGracefulCancel => {
                self.send_admin(OutgoingCommand::ShutdownGraceful {
                    wants_shutdown: false,
                })
            }
            OperatorRequest::ShutdownImmediate => {
                self.send_admin(OutgoingCommand::ShutdownImmediate)
            }
            OperatorRequest::Unlock => {
                self.set_locked(false);
                self.log(LogLevel::Info, "Action execution unlocked.");
            }
            OperatorRequest::ForceDecision {
                prompt_id,
                decision,
            } => {
                let step = self.drive_forced(|forced, ctx| forced.decide(prompt_id, decision, ctx));
                self.on_force_step(step, StepOrigin::Operator(prompt_id));
            }
            OperatorRequest::ReopenForce => match self.forced.reopen(&self.registry) {
                Some(prompt) => self.presentation.post(UiEvent::ForcePrompt(prompt)),
                None => self.log(
                    LogLevel::Info,
                    "No forced action is waiting for a decision.",
                ),
            },
            OperatorRequest::SetControl(change) => {
                let description = change.to_string();
                match self.controls.apply(change) {
                    Ok(()) => {
                        self.presentation
                            .post(UiEvent::ControlsChanged(self.controls.clone()));
                        self.log(LogLevel::Info, format!("Set {description}"));
                    }
                    Err(e) => self.log(LogLevel::Warning, format!("Rejected {description}: {e}")),
                }
            }
            OperatorRequest::ListActions => {
                self.presentation
                    .post(UiEvent::ActionList(self.registry.all()));
            }
        }
    }

    fn execute(&mut self, name: String, data: Option<String>) {
        if self.execution_locked {
            self.log(LogLevel::Warning, HarnessError::ExecutionLocked.to_string());
            return;
        }
        let Some(action) = self.registry.get(&name) else {
            self.log(
                LogLevel::Warning,
                HarnessError::NotFound(name).to_string(),
            );
            return;
        };

        match prepare_payload(action, data, &self.controls, self.sampler.as_mut()) {
            Ok(data) => {
                let id = self.ids.next_id();
                self.send_action(ActionInvocation { id, name, data });
            }
            Err(e) => self.log(LogLevel::Warning, format!("Cannot execute {name}: {e}")),
        }
    }

    // -----------------------------------------------------------------------
    // Forced actions
    // -----------------------------------------------------------------------

    fn drive_forced<F>(&mut self, f: F) -> ForceStep
    where
        F: FnOnce(&mut ForcedActions, &mut ForceContext<'_>) -> ForceStep,
    {
        let mut ctx = ForceContext {
            registry: &self.registry,
            controls: &self.controls,
            sampler: self.sampler.as_mut(),
            ids: &mut self.ids,
        };
        f(&mut self.forced, &mut ctx)
    }

    fn on_force_step(&mut self, step: ForceStep, origin: StepOrigin) {
        let retrying = origin == StepOrigin::Retry;
        match step {
            ForceStep::Invoke(invocation) => {
                if retrying {
                    self.log(LogLevel::Info, "Retrying forced action.");
                }
                match origin {
                    StepOrigin::Operator(prompt_id) => self
                        .presentation
                        .post(UiEvent::ForcePromptDismissed { prompt_id }),
                    _ => self.log(LogLevel::Info, "Automatically sending random action."),
                }
                self.send_action(invocation);
            }
            ForceStep::Prompt(prompt) => {
                if retrying {
                    self.log(LogLevel::Info, "Retrying forced action.");
                }
                self.presentation.post(UiEvent::ForcePrompt(prompt));
            }
            ForceStep::Dropped(ForceDrop::Conflict) => self.log(
                LogLevel::Warning,
                format!("{}. Discarding the new actions/force.", HarnessError::ForceConflict),
            ),
            ForceStep::Dropped(ForceDrop::NoCandidates) => {
                let lead = if retrying {
                    "Cannot retry forced action"
                } else {
                    "actions/force without any actions received"
                };
                self.log(LogLevel::Warning, format!("{lead}. Discarding."));
            }
            ForceStep::Dropped(ForceDrop::Invalid { missing }) => {
                let lead = if retrying {
                    "Cannot retry forced action"
                } else {
                    "actions/force with invalid actions received"
                };
                let reason = HarnessError::InvalidForceRequest { missing };
                self.log(LogLevel::Warning, format!("{lead}. Discarding.\n{reason}"));
            }
            ForceStep::Dropped(ForceDrop::Ignored) => {
                let message = if retrying {
                    "Forced action retry ignored."
                } else {
                    "actions/force command received, but ignored."
                };
                self.log(LogLevel::Info, message);
            }
            ForceStep::Dropped(ForceDrop::Sampler(e)) => self.log(
                LogLevel::Warning,
                format!("Cannot answer forced action: {e}. Discarding."),
            ),
            ForceStep::Rejected(e) => {
                self.log(LogLevel::Warning, format!("Forced action not sent: {e}"));
                if let Some(prompt) = self.forced.reopen(&self.registry) {
                    self.presentation.post(UiEvent::ForcePrompt(prompt));
                }
            }
            ForceStep::Cancelled { prompt_id } => {
                self.presentation
                    .post(UiEvent::ForcePromptDismissed { prompt_id });
                self.log(LogLevel::Info, "Manually ignored forced action.");
            }
            ForceStep::Stale => self.log(
                LogLevel::Debug,
                "Discarding answer to a forced action prompt that is no longer open.",
            ),
            ForceStep::Completed => self.log(LogLevel::Debug, "Forced action completed."),
            ForceStep::NotForced => {}
        }
    }

    // -----------------------------------------------------------------------
    // Outgoing
    // -----------------------------------------------------------------------

    fn send_action(&mut self, invocation: ActionInvocation) {
        self.log(LogLevel::Info, format!("Sending action: {}", invocation.name));
        let outbound = Outbound {
            command: OutgoingCommand::Action(invocation),
            delay: self.controls.send_delay(),
        };
        match self.transport.send(outbound) {
            Ok(()) => {
                self.invocations_sent += 1;
                self.set_locked(true);
            }
            Err(e) => self.log(LogLevel::Warning, format!("Action not sent: {e}")),
        }
    }

    fn send_admin(&mut self, command: OutgoingCommand) {
        self.log(LogLevel::Info, format!("Sending {} command.", command.kind()));
        self.log(LogLevel::Warning, NOT_IN_SPECIFICATION);
        let outbound = Outbound {
            command,
            delay: self.controls.send_delay(),
        };
        if let Err(e) = self.transport.send(outbound) {
            self.log(LogLevel::Warning, format!("Command not sent: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // Presentation helpers
    // -----------------------------------------------------------------------

    fn set_locked(&mut self, locked: bool) {
        if self.execution_locked != locked {
            self.execution_locked = locked;
            self.presentation.post(UiEvent::ExecutionLocked(locked));
        }
    }

    fn context(&self, message: String, silent: bool, ephemeral: bool) {
        self.presentation.post(UiEvent::Context {
            message,
            silent,
            ephemeral,
        });
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        self.presentation.post(UiEvent::Log { level, message });
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
