use crate::lateness::{ClassificationMode, Lateness, LatenessClassifier};
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Dashboard counters over a task collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatenessStats {
    pub completed_on_time: usize,
    pub completed_overdue: usize,
    pub in_progress_on_time: usize,
    pub in_progress_overdue: usize,
    pub total_tracked: usize,
    pub performance_percentage: u32,
    pub tolerance_applied: bool,
}

impl LatenessStats {
    /// Tasks still waiting to be scheduled are left out entirely.
    pub fn collect<'a, I>(tasks: I, classifier: &LatenessClassifier) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut stats = LatenessStats {
            tolerance_applied: classifier.mode() == ClassificationMode::Tolerant,
            ..Default::default()
        };
        for task in tasks.into_iter().filter(|task| task.is_tracked()) {
            stats.record(task, classifier.classify(task));
        }
        stats.total_tracked = stats.completed_on_time
            + stats.completed_overdue
            + stats.in_progress_on_time
            + stats.in_progress_overdue;
        stats.performance_percentage = performance(stats.on_time(), stats.total_tracked);
        stats
    }

    fn record(&mut self, task: &Task, lateness: Lateness) {
        match (task.is_completed(), lateness.is_late()) {
            (true, false) => self.completed_on_time += 1,
            (true, true) => self.completed_overdue += 1,
            (false, false) => self.in_progress_on_time += 1,
            (false, true) => self.in_progress_overdue += 1,
        }
    }

    pub fn on_time(&self) -> usize {
        self.completed_on_time + self.in_progress_on_time
    }

    pub fn late(&self) -> usize {
        self.completed_overdue + self.in_progress_overdue
    }

    pub fn to_cli_summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("tracked={}", self.total_tracked));
        parts.push(format!("on_time={}", self.on_time()));
        if self.in_progress_overdue > 0 {
            parts.push(format!("overdue={}", self.in_progress_overdue));
        }
        if self.completed_overdue > 0 {
            parts.push(format!("completed_late={}", self.completed_overdue));
        }
        parts.push(format!("performance={}%", self.performance_percentage));
        if self.tolerance_applied {
            parts.push("tolerance".to_string());
        }
        parts.join(", ")
    }
}

/// Rounded share of on-time tasks; 0 when nothing is tracked.
fn performance(on_time: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (on_time as f64 / total as f64 * 100.0).round() as u32
}
