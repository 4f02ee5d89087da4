use std::time::Instant;

use crate::round::Outcome;

/// Running tally for the current play session
#[derive(Debug, Clone)]
pub struct SessionTally {
    pub started_at: Instant,
    pub attempted: u32,
    pub correct: u32,
    pub timed_out: u32,
}

impl Default for SessionTally {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            attempted: 0,
            correct: 0,
            timed_out: 0,
        }
    }
}

impl SessionTally {
    pub fn record(&mut self, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Correct => self.correct += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Incorrect => {}
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.correct as f64 * 100.0 / self.attempted as f64
        }
    }

    /// "3/4 (75%)"
    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} ({:.0}%)",
            self.correct,
            self.attempted,
            self.accuracy()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_outcomes() {
        let mut tally = SessionTally::default();
        assert_eq!(tally.summary_line(), "0/0 (0%)");

        for outcome in [
            Outcome::Correct,
            Outcome::Correct,
            Outcome::TimedOut,
            Outcome::Correct,
        ] {
            tally.record(outcome);
        }
        assert_eq!(tally.attempted, 4);
        assert_eq!(tally.timed_out, 1);
        assert_eq!(tally.summary_line(), "3/4 (75%)");
    }
}
