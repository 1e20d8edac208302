// src/report.rs

use std::fmt;

use indexmap::IndexMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Applied,
    Restored,
    Unchanged,
    Skipped,
    Failed,
}

/// Result of one action against one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub subject: String,
    pub status: Status,
    pub detail: String,
}

impl Outcome {
    pub fn new(subject: impl Into<String>, status: Status, detail: impl ToString) -> Self {
        Self {
            subject: subject.into(),
            status,
            detail: detail.to_string(),
        }
    }

    pub fn applied(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(subject, Status::Applied, detail)
    }

    pub fn restored(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(subject, Status::Restored, detail)
    }

    pub fn unchanged(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(subject, Status::Unchanged, detail)
    }

    pub fn skipped(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(subject, Status::Skipped, detail)
    }

    pub fn failed(subject: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(subject, Status::Failed, detail)
    }

    pub fn is_failure(&self) -> bool {
        self.status == Status::Failed
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<9}] {}", self.status, self.subject)?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Everything an apply or undo pass did, grouped by section in run order.
#[derive(Debug, Default)]
pub struct Report {
    sections: IndexMap<String, Vec<Outcome>>,
    notes: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, section: impl Into<String>, outcomes: impl IntoIterator<Item = Outcome>) {
        self.sections
            .entry(section.into())
            .or_default()
            .extend(outcomes);
    }

    pub fn push(&mut self, section: impl Into<String>, outcome: Outcome) {
        self.extend(section, [outcome]);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn section(&self, name: &str) -> &[Outcome] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[Outcome])> {
        self.sections
            .iter()
            .map(|(name, outcomes)| (name.as_str(), outcomes.as_slice()))
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.sections.values().flatten()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn count(&self, status: Status) -> usize {
        self.outcomes().filter(|o| o.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes().any(Outcome::is_failure)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcomes) in &self.sections {
            writeln!(f, "== {} ==", name)?;
            if outcomes.is_empty() {
                writeln!(f, "  (nothing to do)")?;
            }
            for outcome in outcomes {
                writeln!(f, "  {}", outcome)?;
            }
        }
        if !self.notes.is_empty() {
            writeln!(f, "Notes:")?;
            for note in &self.notes {
                writeln!(f, "  - {}", note)?;
            }
        }
        let counts: Vec<String> = Status::iter()
            .map(|status| format!("{} {}", self.count(status), status))
            .collect();
        write!(f, "Summary: {}", counts.join(", "))
    }
}
