use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use uuid::Uuid;

use crate::core::config::MarkingMode;
use crate::domain::StudentId;
#[cfg(test)]
use crate::domain::{LoadKind, WorkerId};
use crate::tasks::grading::events::GradingEvent;

/// Everything that happened during one run, in emission order.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport {
    pub(crate) run_id: Uuid,
    pub(crate) mode: MarkingMode,
    pub(crate) worker_count: usize,
    pub(crate) question_count: usize,
    pub(crate) started_at: String,
    pub(crate) finished_at: String,
    pub(crate) final_rubric: String,
    pub(crate) final_exam: u32,
    pub(crate) final_student: StudentId,
    pub(crate) summary: RunSummary,
    pub(crate) events: Vec<GradingEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct RunSummary {
    pub(crate) claims: usize,
    pub(crate) duplicate_claims: usize,
    pub(crate) exams_completed: usize,
    pub(crate) rubric_revisions: usize,
    pub(crate) workers_stopped: usize,
    pub(crate) workers_failed: usize,
}

impl RunSummary {
    fn from_events(events: &[GradingEvent]) -> Self {
        let mut summary = Self::default();
        let mut claimed = BTreeMap::<(u32, usize), usize>::new();

        for event in events {
            match event {
                GradingEvent::QuestionClaimed { exam, question, .. } => {
                    summary.claims += 1;
                    let seen = claimed.entry((*exam, *question)).or_default();
                    if *seen > 0 {
                        summary.duplicate_claims += 1;
                    }
                    *seen += 1;
                }
                GradingEvent::ExamCompleted { .. } => summary.exams_completed += 1,
                GradingEvent::RubricRevised { .. } => summary.rubric_revisions += 1,
                GradingEvent::WorkerStopped { .. } => summary.workers_stopped += 1,
                GradingEvent::WorkerFailed { .. } => summary.workers_failed += 1,
                GradingEvent::WorkerStarted { .. } | GradingEvent::ExamLoaded { .. } => {}
            }
        }

        summary
    }
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: Uuid,
        mode: MarkingMode,
        worker_count: usize,
        question_count: usize,
        started_at: String,
        finished_at: String,
        final_rubric: String,
        final_exam: u32,
        final_student: StudentId,
        events: Vec<GradingEvent>,
    ) -> Self {
        let summary = RunSummary::from_events(&events);
        Self {
            run_id,
            mode,
            worker_count,
            question_count,
            started_at,
            finished_at,
            final_rubric,
            final_exam,
            final_student,
            summary,
            events,
        }
    }

    pub(crate) async fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let body = serde_json::to_vec_pretty(self).context("Failed to serialize run report")?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write run report to {}", path.display()))
    }
}

#[cfg(test)]
impl RunReport {
    /// Questions claimed for exam `exam`, in claim order.
    pub(crate) fn claims_for(&self, exam: u32) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                GradingEvent::QuestionClaimed { exam: claimed, question, .. }
                    if *claimed == exam =>
                {
                    Some(*question)
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn completed_exams(&self) -> Vec<(u32, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                GradingEvent::ExamCompleted { exam, student, .. } => {
                    Some((*exam, student.to_string()))
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn loads(&self) -> Vec<(u32, LoadKind)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                GradingEvent::ExamLoaded { exam, outcome, .. } => Some((*exam, *outcome)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn stopped_workers(&self) -> Vec<WorkerId> {
        let mut workers: Vec<_> = self
            .events
            .iter()
            .filter_map(|event| match event {
                GradingEvent::WorkerStopped { worker } => Some(*worker),
                _ => None,
            })
            .collect();
        workers.sort();
        workers
    }

    /// Number of revisions recorded per question.
    pub(crate) fn revisions_per_question(&self) -> Vec<usize> {
        let mut counts = vec![0; self.question_count];
        for event in &self.events {
            if let GradingEvent::RubricRevised { question, .. } = event {
                counts[*question] += 1;
            }
        }
        counts
    }

    pub(crate) fn position(&self, predicate: impl Fn(&GradingEvent) -> bool) -> Option<usize> {
        self.events.iter().position(predicate)
    }
}
