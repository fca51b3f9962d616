//! Conversational research reports.
//!
//! Users report research without commands: a message naming a stop, followed
//! by a message from the same user naming the task. The follow-up may instead
//! report a shadow takeover ("shadow snorlax", "shadow gone"). Both parts may
//! also arrive as one two-line message.

use tracing::debug;

use crate::common::error::MapError;
use crate::common::text::title_case;
use crate::common::UserId;
use crate::research::{ResearchMap, StopId, TaskRegistry};

/// A stop message waiting for its follow-up.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingReport {
    author: UserId,
    stop: StopId,
    message: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Not a report.
    Ignored,
    /// Resolved to a stop; waiting for the follow-up.
    StopNoted,
    /// The report was applied. `earlier` is the stop message of a two-part report.
    Applied { earlier: Option<u64>, changed: bool },
    Rejected(MapError),
}

/// Per-community memory of the last stop message.
#[derive(Debug, Default)]
pub struct ReportTracker {
    pending: Option<PendingReport>,
}

impl ReportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the pending stop. Commands interrupt a report.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn handle(
        &mut self,
        map: &mut ResearchMap,
        tasks: &TaskRegistry,
        author: UserId,
        message: u64,
        content: &str,
    ) -> ReportOutcome {
        match self.pending.take() {
            Some(pending) if pending.author == author => {
                match apply_report(map, tasks, pending.stop, content) {
                    Ok(changed) => {
                        return ReportOutcome::Applied {
                            earlier: Some(pending.message),
                            changed,
                        }
                    }
                    // Not a report after all; it may still name another stop.
                    Err(MapError::TaskNotFound) => debug!("Follow-up names no task"),
                    Err(e) => return ReportOutcome::Rejected(e),
                }
            }
            other => self.pending = other,
        }

        match map.find_stop(content) {
            Ok(stop) => {
                self.pending = Some(PendingReport {
                    author,
                    stop: stop.id,
                    message,
                });
                ReportOutcome::StopNoted
            }
            Err(MapError::StopNotFound) => match content.split_once('\n') {
                Some((stop, report)) => {
                    let outcome = map
                        .find_stop(stop)
                        .map(|s| s.id)
                        .and_then(|id| apply_report(map, tasks, id, report));
                    match outcome {
                        Ok(changed) => ReportOutcome::Applied {
                            earlier: None,
                            changed,
                        },
                        Err(e) => {
                            debug!(error = %e, "Two-line report ignored");
                            ReportOutcome::Ignored
                        }
                    }
                }
                None => ReportOutcome::Ignored,
            },
            Err(e) => ReportOutcome::Rejected(e),
        }
    }
}

/// Apply a task or shadow report to a stop. Returns whether the map changed.
fn apply_report(
    map: &mut ResearchMap,
    tasks: &TaskRegistry,
    stop: StopId,
    report: &str,
) -> Result<bool, MapError> {
    let report = report.trim();
    let lower = report.to_lowercase();

    if lower.contains("shadow") {
        let last = report.split_whitespace().last().unwrap_or_default();
        if last.to_lowercase().contains("shadow") {
            map.set_event_overlay(stop, None)?;
        } else if lower.contains("gone") {
            map.clear_event_overlay(stop)?;
        } else {
            map.set_event_overlay(stop, Some(&title_case(last)))?;
        }
        return Ok(true);
    }

    let mut task = tasks.find_task(report)?;
    // Naming one of several rewards picks it as the icon.
    task.set_icon(report);
    match map.set_task(stop, &task) {
        Ok(()) => Ok(true),
        Err(MapError::TaskAlreadyAssigned { .. }) if same_reward(map, stop, &task.reward) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn same_reward(map: &ResearchMap, stop: StopId, reward: &str) -> bool {
    map.stop(stop)
        .and_then(|s| s.task.as_ref())
        .is_some_and(|t| t.reward == reward)
}
