//! Terminal presentation and operator console.
//!
//! One task renders [`UiEvent`]s from the dispatcher; another reads operator
//! lines from stdin and turns them into [`OperatorRequest`]s. The only state
//! they share is the id of the forced-action prompt currently open, so a
//! `force` line can be answered without repeating the id.

use crate::output::print_table;
use anyhow::bail;
use harness_core::controls::ControlChange;
use harness_core::operator::{ForceChoice, ForceDecision, OperatorRequest};
use harness_core::types::{Action, ForcePrompt, LogLevel};
use harness_core::{HarnessHandle, UiEvent};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  list                              show registered actions
  exec <name> [json]                execute an action (sampled data when json is omitted)
  delete <name>                     remove an action locally
  unlock                            allow execution while a result is pending
  reregister                        clear actions and send actions/reregister_all
  shutdown graceful|cancel|immediate
  force <n|name> [json]             answer the open forced-action prompt
  ignore                            close the forced-action prompt without sending
  reopen                            show the forced-action prompt again
  set auto-send|ignore-forced|validate on|off
  set delay <ms>                    0-10000
  status                            print the harness snapshot as JSON
  help
  quit";

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Operator(OperatorRequest),
    /// Answer for whichever prompt is open.
    Decide(ForceDecision),
    Status,
    Help,
    Quit,
}

/// Parse one operator line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = split_word(line);

    let command = match word {
        "list" | "ls" => ConsoleCommand::Operator(OperatorRequest::ListActions),
        "exec" | "x" => {
            let (name, data) = name_and_payload(rest, "exec <name> [json]")?;
            ConsoleCommand::Operator(OperatorRequest::Execute { name, data })
        }
        "delete" | "rm" => {
            if rest.is_empty() {
                bail!("usage: delete <name>");
            }
            ConsoleCommand::Operator(OperatorRequest::Delete {
                name: rest.to_string(),
            })
        }
        "unlock" => ConsoleCommand::Operator(OperatorRequest::Unlock),
        "reregister" => ConsoleCommand::Operator(OperatorRequest::ReregisterAll),
        "shutdown" => ConsoleCommand::Operator(match rest {
            "graceful" => OperatorRequest::ShutdownGraceful,
            "cancel" => OperatorRequest::ShutdownGracefulCancel,
            "immediate" => OperatorRequest::ShutdownImmediate,
            _ => bail!("usage: shutdown graceful|cancel|immediate"),
        }),
        "force" | "f" => {
            let (target, data) = name_and_payload(rest, "force <n|name> [json]")?;
            let choice = match target.parse::<usize>() {
                Ok(index) => ForceChoice::Index(index),
                Err(_) => ForceChoice::Name(target),
            };
            ConsoleCommand::Decide(ForceDecision::Choose { choice, data })
        }
        "ignore" => ConsoleCommand::Decide(ForceDecision::Cancel),
        "reopen" => ConsoleCommand::Operator(OperatorRequest::ReopenForce),
        "set" => ConsoleCommand::Operator(OperatorRequest::SetControl(parse_control(rest)?)),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (type `help`)"),
    };
    Ok(Some(command))
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

fn name_and_payload(rest: &str, usage: &str) -> anyhow::Result<(String, Option<String>)> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    let (name, payload) = split_word(rest);
    let payload = (!payload.is_empty()).then(|| payload.to_string());
    Ok((name.to_string(), payload))
}

fn parse_control(rest: &str) -> anyhow::Result<ControlChange> {
    let (option, value) = split_word(rest);
    if option == "delay" {
        let ms: i64 = value
            .parse()
            .map_err(|_| anyhow::anyhow!("usage: set delay <ms>"))?;
        return Ok(ControlChange::SendDelayMs(ms));
    }
    let on = match value {
        "on" | "true" | "yes" => true,
        "off" | "false" | "no" => false,
        _ => bail!("usage: set {option} on|off"),
    };
    Ok(match option {
        "auto-send" => ControlChange::AutoSend(on),
        "ignore-forced" => ControlChange::IgnoreForcedActions(on),
        "validate" => ControlChange::ValidateSchema(on),
        _ => bail!("unknown option '{option}'"),
    })
}

// ---------------------------------------------------------------------------
// PromptSlot
// ---------------------------------------------------------------------------

/// Id of the open forced-action prompt, shared by renderer and input loop.
#[derive(Clone, Default)]
pub struct PromptSlot(Arc<Mutex<Option<u64>>>);

impl PromptSlot {
    pub fn get(&self) -> Option<u64> {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, value: Option<u64>) {
        match self.0.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Track prompt open/close events.
    pub fn observe(&self, event: &UiEvent) {
        match event {
            UiEvent::ForcePrompt(prompt) => self.set(Some(prompt.prompt_id)),
            UiEvent::ForcePromptDismissed { prompt_id } if self.get() == Some(*prompt_id) => {
                self.set(None)
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Text for one event, or `None` when the event is not shown as a line.
pub fn format_event(event: &UiEvent) -> Option<String> {
    match event {
        UiEvent::Log { level, message } => {
            (*level >= LogLevel::Info).then(|| format!("[{}] {message}", level.as_str()))
        }
        UiEvent::Context {
            message,
            silent,
            ephemeral,
        } => {
            let mut tags = vec!["context"];
            if *silent {
                tags.push("silent");
            }
            if *ephemeral {
                tags.push("ephemeral");
            }
            Some(format!("[{}] {message}", tags.join(" ")))
        }
        UiEvent::ActionAdded(action) => Some(format!("+ {}", action.name)),
        UiEvent::ActionRemoved(name) => Some(format!("- {name}")),
        UiEvent::ActionsCleared => Some("actions cleared".to_string()),
        UiEvent::ActionList(_) => None,
        UiEvent::ExecutionLocked(true) => {
            Some("execution locked until a result arrives (`unlock` overrides)".to_string())
        }
        UiEvent::ExecutionLocked(false) => Some("execution unlocked".to_string()),
        UiEvent::ForcePrompt(prompt) => Some(format_prompt(prompt)),
        UiEvent::ForcePromptDismissed { prompt_id } => {
            Some(format!("forced action prompt #{prompt_id} closed"))
        }
        UiEvent::ActionResult { success, .. } => Some(format!(
            "result: {}",
            if *success { "success" } else { "failure" }
        )),
        UiEvent::ControlsChanged(c) => Some(format!(
            "controls: auto_send={} ignore_forced={} validate_schema={} delay={}ms",
            c.auto_send, c.ignore_forced_actions, c.validate_schema, c.send_delay_ms
        )),
    }
}

fn format_prompt(prompt: &ForcePrompt) -> String {
    let mut out = format!(
        "forced action #{}{}: {}",
        prompt.prompt_id,
        if prompt.is_retry { " (retry)" } else { "" },
        prompt.query
    );
    if let Some(state) = prompt.state.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("\n  state: {state}"));
    }
    for (i, action) in prompt.candidates.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}: {}", i + 1, action.name, action.description));
        if let Some(schema) = &action.schema {
            out.push_str(&format!("\n     schema: {schema}"));
        }
    }
    out.push_str("\n  answer with `force <n|name> [json]` or `ignore`");
    out
}

fn print_actions(actions: &[Action]) {
    if actions.is_empty() {
        println!("no actions registered");
        return;
    }
    let rows = actions
        .iter()
        .map(|a| {
            vec![
                a.name.clone(),
                if a.has_schema() { "yes" } else { "no" }.to_string(),
                a.description.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "SCHEMA", "DESCRIPTION"], rows);
}

/// Render events until the dispatcher goes away.
pub async fn render_events(mut events: mpsc::UnboundedReceiver<UiEvent>, prompt: PromptSlot) {
    while let Some(event) = events.recv().await {
        prompt.observe(&event);
        if let UiEvent::ActionList(actions) = &event {
            print_actions(actions);
            continue;
        }
        if let Some(text) = format_event(&event) {
            println!("{} {text}", chrono::Local::now().format("%H:%M:%S"));
        }
    }
}

// ---------------------------------------------------------------------------
// Input loop
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum InputEnd {
    Quit,
    Eof,
}

/// Read operator lines from stdin until `quit` or end of input.
pub async fn run_input(handle: HarnessHandle, prompt: PromptSlot) -> anyhow::Result<InputEnd> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match command {
            ConsoleCommand::Operator(request) => handle.operator(request).await?,
            ConsoleCommand::Decide(decision) => match prompt.get() {
                Some(prompt_id) => {
                    handle
                        .operator(OperatorRequest::ForceDecision {
                            prompt_id,
                            decision,
                        })
                        .await?
                }
                None => println!("no forced action is waiting for a decision"),
            },
            ConsoleCommand::Status => crate::output::print_json(&handle.snapshot().await?)?,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Ok(InputEnd::Quit),
        }
    }
    Ok(InputEnd::Eof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::controls::Controls;

    fn parsed(line: &str) -> ConsoleCommand {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn blank_line_is_nothing() {
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn exec_keeps_payload_verbatim() {
        assert_eq!(
            parsed(r#"exec say {"text": "hello world"}"#),
            ConsoleCommand::Operator(OperatorRequest::Execute {
                name: "say".into(),
                data: Some(r#"{"text": "hello world"}"#.into()),
            })
        );
        assert_eq!(
            parsed("exec jump"),
            ConsoleCommand::Operator(OperatorRequest::Execute {
                name: "jump".into(),
                data: None,
            })
        );
        assert!(parse_line("exec").is_err());
    }

    #[test]
    fn force_accepts_index_or_name() {
        assert_eq!(
            parsed("force 2"),
            ConsoleCommand::Decide(ForceDecision::Choose {
                choice: ForceChoice::Index(2),
                data: None,
            })
        );
        assert_eq!(
            parsed(r#"force say {"text":"x"}"#),
            ConsoleCommand::Decide(ForceDecision::Choose {
                choice: ForceChoice::Name("say".into()),
                data: Some(r#"{"text":"x"}"#.into()),
            })
        );
        assert_eq!(parsed("ignore"), ConsoleCommand::Decide(ForceDecision::Cancel));
    }

    #[test]
    fn shutdown_variants() {
        assert_eq!(
            parsed("shutdown graceful"),
            ConsoleCommand::Operator(OperatorRequest::ShutdownGraceful)
        );
        assert_eq!(
            parsed("shutdown cancel"),
            ConsoleCommand::Operator(OperatorRequest::ShutdownGracefulCancel)
        );
        assert_eq!(
            parsed("shutdown immediate"),
            ConsoleCommand::Operator(OperatorRequest::ShutdownImmediate)
        );
        assert!(parse_line("shutdown now").is_err());
    }

    #[test]
    fn set_controls() {
        assert_eq!(
            parsed("set auto-send on"),
            ConsoleCommand::Operator(OperatorRequest::SetControl(ControlChange::AutoSend(true)))
        );
        assert_eq!(
            parsed("set validate off"),
            ConsoleCommand::Operator(OperatorRequest::SetControl(
                ControlChange::ValidateSchema(false)
            ))
        );
        assert_eq!(
            parsed("set delay -5"),
            ConsoleCommand::Operator(OperatorRequest::SetControl(ControlChange::SendDelayMs(-5)))
        );
        assert!(parse_line("set delay soon").is_err());
        assert!(parse_line("set colour on").is_err());
        assert!(parse_line("set auto-send maybe").is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_line("dance").unwrap_err();
        assert!(err.to_string().contains("unknown command 'dance'"));
    }

    #[test]
    fn prompt_slot_tracks_open_prompt() {
        let slot = PromptSlot::default();
        let prompt = ForcePrompt {
            prompt_id: 3,
            state: None,
            query: "q".into(),
            ephemeral: false,
            candidates: vec![],
            is_retry: false,
        };
        slot.observe(&UiEvent::ForcePrompt(prompt));
        assert_eq!(slot.get(), Some(3));
        slot.observe(&UiEvent::ForcePromptDismissed { prompt_id: 2 });
        assert_eq!(slot.get(), Some(3));
        slot.observe(&UiEvent::ForcePromptDismissed { prompt_id: 3 });
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn debug_logs_are_not_rendered() {
        assert!(format_event(&UiEvent::Log {
            level: LogLevel::Debug,
            message: "x".into(),
        })
        .is_none());
        assert_eq!(
            format_event(&UiEvent::Log {
                level: LogLevel::Warning,
                message: "careful".into(),
            })
            .unwrap(),
            "[warning] careful"
        );
    }

    #[test]
    fn context_tags() {
        let text = format_event(&UiEvent::Context {
            message: "hi".into(),
            silent: true,
            ephemeral: true,
        })
        .unwrap();
        assert_eq!(text, "[context silent ephemeral] hi");
    }

    #[test]
    fn prompt_lists_numbered_candidates() {
        let prompt = ForcePrompt {
            prompt_id: 0,
            state: Some("in a room".into()),
            query: "pick one".into(),
            ephemeral: false,
            candidates: vec![
                Action::new("jump", "Jump"),
                Action::new("say", "Say")
                    .with_schema(serde_json::json!({"type": "object"})),
            ],
            is_retry: true,
        };
        let text = format_event(&UiEvent::ForcePrompt(prompt)).unwrap();
        assert!(text.starts_with("forced action #0 (retry): pick one"));
        assert!(text.contains("state: in a room"));
        assert!(text.contains("1. jump: Jump"));
        assert!(text.contains("2. say: Say"));
        assert!(text.contains(r#"schema: {"type":"object"}"#));
    }

    #[test]
    fn controls_line() {
        let text = format_event(&UiEvent::ControlsChanged(Controls::default())).unwrap();
        assert_eq!(
            text,
            "controls: auto_send=false ignore_forced=false validate_schema=true delay=0ms"
        );
    }
}
