use lexifill::contexts::ResolutionState;
use std::io::{self, Write};
use std::time::Instant;

pub struct ProgressIndicator {
    total: usize,
    answered: usize,
    skipped: usize,
    saved: Option<String>,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            answered: 0,
            skipped: 0,
            saved: None,
            start_time: Instant::now(),
        }
    }

    /// Prints the question for the placeholder at `position` (zero based)
    pub fn show_question<W: Write>(
        &self,
        out: &mut W,
        position: usize,
        id: &str,
        question: &str,
    ) -> io::Result<()> {
        writeln!(out, "\n({} / {}) [{}] {}", position + 1, self.total, id, question)
    }

    /// Refreshes the counters from the latest state
    pub fn record(&mut self, state: &ResolutionState) {
        self.total = state.placeholders().len();
        self.skipped = state.skipped().len();
        self.answered = state
            .values()
            .keys()
            .filter(|id| !state.is_skipped(id))
            .count();
    }

    pub fn record_saved(&mut self, path: &str) {
        self.saved = Some(path.to_string());
    }

    pub fn finish<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let elapsed = self.start_time.elapsed();
        writeln!(out, "\n{}", "=".repeat(60))?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  Placeholders: {}", self.total)?;
        writeln!(out, "  Answered:     {}", self.answered)?;
        writeln!(out, "  Skipped:      {}", self.skipped)?;
        writeln!(out, "  Saved to:     {}", self.saved.as_deref().unwrap_or("(not saved)"))?;
        writeln!(out, "  Duration:     {:.2}s", elapsed.as_secs_f64())?;
        writeln!(out, "{}", "=".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexifill::data::Placeholder;

    fn state() -> ResolutionState {
        ResolutionState::new(vec![
            Placeholder::new("NAME", 1, "Name"),
            Placeholder::new("DATE", 2, "Date"),
            Placeholder::new("CITY", 3, "City"),
        ])
    }

    #[test]
    fn test_question_line_counts_from_one() {
        let progress = ProgressIndicator::new(3);
        let mut out = Vec::new();
        progress.show_question(&mut out, 0, "NAME", "What is your name?").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\n(1 / 3) [NAME] What is your name?\n");
    }

    #[test]
    fn test_summary_counts_answers_and_skips() {
        let state = state().submit("Ada").unwrap().skip("DATE").unwrap();
        let mut progress = ProgressIndicator::new(3);
        progress.record(&state);
        progress.record_saved("completed-document.txt");

        let mut out = Vec::new();
        progress.finish(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Answered:     1"));
        assert!(text.contains("Skipped:      1"));
        assert!(text.contains("Saved to:     completed-document.txt"));
    }
}
