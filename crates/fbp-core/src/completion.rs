//! Completion-session payloads and interaction-trace extraction.
//!
//! A completion session ends in one of three states: applied, cancelled, or
//! filtered (the developer kept typing and the IDE re-opened the lookup with
//! a narrowed proposal list). Filtered sessions are not traces of their own;
//! they are held back and merged into the automatically re-triggered
//! follow-up session.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventKind};

/// Kind-specific payload of a completion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    /// The document the completion ran in.
    pub document: Document,
    /// Analyzed syntactic context; `Null` when the analysis produced nothing.
    #[serde(default)]
    pub context: serde_json::Value,
    /// What opened the completion lookup.
    #[serde(default)]
    pub trigger: CompletionTrigger,
    /// How the session ended; absent for sessions cut off mid-flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_as: Option<TerminationState>,
    /// The typed prefix narrowing the proposal list.
    #[serde(default)]
    pub prefix: String,
    /// Proposal selections in the order the developer made them.
    #[serde(default)]
    pub selections: Vec<ProposalSelection>,
}

/// The document a completion event was recorded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Language tag, e.g. `CSharp`.
    #[serde(default)]
    pub language: String,
    /// File name, possibly anonymized upstream.
    #[serde(default)]
    pub file_name: String,
}

/// What opened a completion lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// Explicitly requested via keyboard shortcut.
    #[default]
    Shortcut,
    /// Re-opened by the IDE itself, e.g. after filtering.
    Automatic,
    /// Opened while typing.
    Typing,
    /// Opened via mouse click.
    Click,
}

/// How a completion session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationState {
    Applied,
    Cancelled,
    Filtered,
}

/// One selection change in the proposal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSelection {
    /// Index of the newly selected proposal.
    pub index: i32,
    /// Input device that moved the selection.
    #[serde(default)]
    pub via: SelectionSource,
}

/// Input device that moved a proposal selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    #[default]
    Keyboard,
    Mouse,
    Scrollbar,
}

/// Direction of a selection movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// One interaction in a completion session.
///
/// A genuine sum type: each variant carries exactly the payload that exists
/// for that interaction, so illegal field combinations are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CompletionAction {
    /// Single-row keyboard movement.
    Step { direction: Direction },
    /// Page-wise keyboard movement.
    PageStep { direction: Direction },
    /// Scrollbar movement landing on a proposal.
    Scroll { index: i32 },
    /// Mouse click directly onto a proposal.
    MouseGoto { index: i32 },
    /// The lookup was narrowed by typing a prefix.
    Filter { token: String },
    /// The selected proposal was applied.
    Apply,
    /// The lookup was dismissed.
    Cancel,
}

/// The extracted interaction trace of one completion session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionTrace {
    /// Total session duration, accumulated across filtered continuations.
    pub duration_ms: i64,
    /// Interactions in append order.
    pub actions: Vec<CompletionAction>,
}

impl CompletionTrace {
    /// Appends an action to the trace.
    pub fn append(&mut self, action: CompletionAction) {
        self.actions.push(action);
    }
}

/// Converts the completion events of one session into interaction traces.
///
/// Stateful: a `Filtered` termination parks the partial trace until the
/// automatically re-triggered follow-up arrives.
#[derive(Debug, Default)]
pub struct TraceExtractor {
    pending: Option<CompletionTrace>,
}

impl TraceExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one event; returns a finished trace when the event terminates a
    /// completion session.
    ///
    /// Non-completion events and events without a termination state are
    /// ignored. A pending filtered trace survives only into an
    /// `Automatic`-triggered follow-up; any other trigger discards it.
    pub fn process(&mut self, event: &Event) -> Option<CompletionTrace> {
        let EventKind::Completion(payload) = &event.kind else {
            return None;
        };
        let terminated_as = payload.terminated_as?;

        let mut trace = match self.pending.take() {
            Some(mut held) if payload.trigger == CompletionTrigger::Automatic => {
                held.append(CompletionAction::Filter {
                    token: payload.prefix.clone(),
                });
                held
            }
            _ => CompletionTrace::default(),
        };
        trace.duration_ms += event.duration_ms();

        let mut previous: Option<i32> = None;
        for selection in &payload.selections {
            if let Some(prev) = previous {
                if let Some(action) = selection_action(prev, *selection) {
                    trace.append(action);
                }
            }
            previous = Some(selection.index);
        }

        match terminated_as {
            TerminationState::Applied => {
                trace.append(CompletionAction::Apply);
                Some(trace)
            }
            TerminationState::Cancelled => {
                trace.append(CompletionAction::Cancel);
                Some(trace)
            }
            TerminationState::Filtered => {
                self.pending = Some(trace);
                None
            }
        }
    }

    /// Drops any pending filtered trace at stream end.
    pub fn flush(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("dropping filtered completion without follow-up");
        }
    }
}

/// Maps one selection movement to its interaction, `None` for no-ops.
fn selection_action(previous: i32, selection: ProposalSelection) -> Option<CompletionAction> {
    let delta = selection.index - previous;
    if delta == 0 {
        return None;
    }
    let action = match selection.via {
        SelectionSource::Keyboard => {
            let direction = if delta > 0 {
                Direction::Down
            } else {
                Direction::Up
            };
            if delta.abs() == 1 {
                CompletionAction::Step { direction }
            } else {
                CompletionAction::PageStep { direction }
            }
        }
        SelectionSource::Mouse => CompletionAction::MouseGoto {
            index: selection.index,
        },
        SelectionSource::Scrollbar => CompletionAction::Scroll {
            index: selection.index,
        },
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;
    use chrono::{TimeZone, Utc};

    fn completion_event(
        duration_ms: i64,
        trigger: CompletionTrigger,
        terminated_as: Option<TerminationState>,
        prefix: &str,
        selections: Vec<ProposalSelection>,
    ) -> Event {
        let start = Utc.with_ymd_and_hms(2015, 4, 21, 10, 0, 0).unwrap();
        Event {
            id: "c-1".into(),
            session_id: SessionId::new("sid").unwrap(),
            triggered_at: Some(start),
            terminated_at: Some(start + chrono::Duration::milliseconds(duration_ms)),
            app_version: None,
            kind: EventKind::Completion(CompletionPayload {
                document: Document {
                    language: "CSharp".into(),
                    file_name: "MyClass.cs".into(),
                },
                context: serde_json::json!({"type": "method"}),
                trigger,
                terminated_as,
                prefix: prefix.into(),
                selections,
            }),
        }
    }

    fn key(index: i32) -> ProposalSelection {
        ProposalSelection {
            index,
            via: SelectionSource::Keyboard,
        }
    }

    fn mouse(index: i32) -> ProposalSelection {
        ProposalSelection {
            index,
            via: SelectionSource::Mouse,
        }
    }

    #[test]
    fn applied_completion_yields_apply() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            5234,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Applied),
            "",
            vec![],
        );

        let trace = sut.process(&event).unwrap();

        assert_eq!(
            trace,
            CompletionTrace {
                duration_ms: 5234,
                actions: vec![CompletionAction::Apply],
            }
        );
    }

    #[test]
    fn cancelled_completion_yields_cancel() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            398,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Cancelled),
            "",
            vec![],
        );

        let trace = sut.process(&event).unwrap();

        assert_eq!(
            trace,
            CompletionTrace {
                duration_ms: 398,
                actions: vec![CompletionAction::Cancel],
            }
        );
    }

    #[test]
    fn keyboard_steps_map_to_step_actions() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            698,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Applied),
            "",
            vec![key(0), key(1), key(2), key(1)],
        );

        let trace = sut.process(&event).unwrap();

        assert_eq!(
            trace.actions,
            vec![
                CompletionAction::Step {
                    direction: Direction::Down
                },
                CompletionAction::Step {
                    direction: Direction::Down
                },
                CompletionAction::Step {
                    direction: Direction::Up
                },
                CompletionAction::Apply,
            ]
        );
    }

    #[test]
    fn mouse_jump_maps_to_mouse_goto() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            34,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Applied),
            "",
            vec![key(0), mouse(9)],
        );

        let trace = sut.process(&event).unwrap();

        assert_eq!(
            trace.actions,
            vec![
                CompletionAction::MouseGoto { index: 9 },
                CompletionAction::Apply
            ]
        );
    }

    #[test]
    fn page_jump_and_scroll_map_to_their_variants() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            100,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Cancelled),
            "",
            vec![
                key(0),
                key(8),
                ProposalSelection {
                    index: 20,
                    via: SelectionSource::Scrollbar,
                },
            ],
        );

        let trace = sut.process(&event).unwrap();

        assert_eq!(
            trace.actions,
            vec![
                CompletionAction::PageStep {
                    direction: Direction::Down
                },
                CompletionAction::Scroll { index: 20 },
                CompletionAction::Cancel,
            ]
        );
    }

    #[test]
    fn filtered_completion_emits_nothing() {
        let mut sut = TraceExtractor::new();
        let event = completion_event(
            66,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Filtered),
            "",
            vec![],
        );

        assert_eq!(sut.process(&event), None);
    }

    #[test]
    fn filtered_completion_continues_into_automatic_followup() {
        let mut sut = TraceExtractor::new();
        let first = completion_event(
            33,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Filtered),
            "",
            vec![],
        );
        let second = completion_event(
            42,
            CompletionTrigger::Automatic,
            Some(TerminationState::Cancelled),
            "Get",
            vec![],
        );

        assert_eq!(sut.process(&first), None);
        let trace = sut.process(&second).unwrap();

        assert_eq!(
            trace,
            CompletionTrace {
                duration_ms: 75,
                actions: vec![
                    CompletionAction::Filter {
                        token: "Get".into()
                    },
                    CompletionAction::Cancel,
                ],
            }
        );
    }

    #[test]
    fn stepping_before_and_after_filtering() {
        let mut sut = TraceExtractor::new();
        let first = completion_event(
            12,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Filtered),
            "",
            vec![key(0), key(1)],
        );
        let second = completion_event(
            23,
            CompletionTrigger::Automatic,
            Some(TerminationState::Applied),
            "isE",
            vec![key(0), mouse(3)],
        );

        assert_eq!(sut.process(&first), None);
        let trace = sut.process(&second).unwrap();

        assert_eq!(
            trace,
            CompletionTrace {
                duration_ms: 35,
                actions: vec![
                    CompletionAction::Step {
                        direction: Direction::Down
                    },
                    CompletionAction::Filter {
                        token: "isE".into()
                    },
                    CompletionAction::MouseGoto { index: 3 },
                    CompletionAction::Apply,
                ],
            }
        );
    }

    #[test]
    fn non_automatic_followup_discards_pending_trace() {
        let mut sut = TraceExtractor::new();
        let first = completion_event(
            33,
            CompletionTrigger::Shortcut,
            Some(TerminationState::Filtered),
            "",
            vec![],
        );
        let second = completion_event(
            42,
            CompletionTrigger::Click,
            Some(TerminationState::Applied),
            "",
            vec![],
        );

        assert_eq!(sut.process(&first), None);
        let trace = sut.process(&second).unwrap();

        assert_eq!(
            trace,
            CompletionTrace {
                duration_ms: 42,
                actions: vec![CompletionAction::Apply],
            }
        );
    }

    #[test]
    fn emits_one_trace_per_terminated_completion() {
        let mut sut = TraceExtractor::new();
        let states = [
            (55, CompletionTrigger::Shortcut, TerminationState::Applied),
            (42, CompletionTrigger::Shortcut, TerminationState::Applied),
            (23, CompletionTrigger::Shortcut, TerminationState::Cancelled),
            (666, CompletionTrigger::Shortcut, TerminationState::Filtered),
            (99, CompletionTrigger::Automatic, TerminationState::Applied),
            (69, CompletionTrigger::Shortcut, TerminationState::Cancelled),
        ];

        let emitted = states
            .iter()
            .filter_map(|&(dur, trigger, state)| {
                sut.process(&completion_event(dur, trigger, Some(state), "", vec![]))
            })
            .count();

        assert_eq!(emitted, 5);
    }

    #[test]
    fn action_serde_is_tagged() {
        let action = CompletionAction::Filter { token: "Get".into() };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"action":"filter","token":"Get"}"#);
        let parsed: CompletionAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, action);
    }
}
