//! The control-surface boundary: status reports out, user intents in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Snapshot of session state shown to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Snapshots in the store.
    pub archived: usize,
    /// Nodes in the window region.
    pub expanded: usize,
    /// Current retention threshold.
    pub keep: usize,
    pub canvas_open: bool,
    pub aggressive_when_canvas: bool,
}

impl StatusReport {
    /// Whether there is anything to expand.
    pub fn has_history(&self) -> bool {
        self.archived > 0
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Archived: {}", self.archived)?;
        if self.expanded > 0 {
            write!(f, " | Expanded: {}", self.expanded)?;
        }
        write!(f, " | Keeping latest: {}", self.keep)?;
        if self.canvas_open {
            write!(f, " | Canvas mode")?;
        }
        Ok(())
    }
}

/// Receives a status report after every state change.
pub trait StatusSink {
    fn publish(&mut self, status: &StatusReport);
}

impl<F> StatusSink for F
where
    F: FnMut(&StatusReport),
{
    fn publish(&mut self, status: &StatusReport) {
        self(status)
    }
}

/// Sink that discards reports.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&mut self, _status: &StatusReport) {}
}

/// A user-triggered action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    ExpandChunk,
    Collapse,
    ExpandAll,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::ExpandChunk, Intent::Collapse, Intent::ExpandAll];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ExpandChunk => "expand-chunk",
            Intent::Collapse => "collapse",
            Intent::ExpandAll => "expand-all",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| format!("Unknown intent: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_summary() {
        let mut status = StatusReport {
            archived: 22,
            expanded: 0,
            keep: 18,
            canvas_open: false,
            aggressive_when_canvas: true,
        };
        assert_eq!(status.to_string(), "Archived: 22 | Keeping latest: 18");

        status.expanded = 5;
        status.canvas_open = true;
        status.keep = 10;
        assert_eq!(
            status.to_string(),
            "Archived: 22 | Expanded: 5 | Keeping latest: 10 | Canvas mode"
        );
    }

    #[test]
    fn test_has_history() {
        assert!(!StatusReport::default().has_history());
    }

    #[test]
    fn test_intent_parsing() {
        for intent in Intent::ALL {
            assert_eq!(intent.to_string().parse::<Intent>(), Ok(intent));
        }
        assert!("explode".parse::<Intent>().is_err());
    }

    #[test]
    fn test_intent_serde_matches_display() {
        let json = serde_json::to_string(&Intent::ExpandAll).unwrap();
        assert_eq!(json, "\"expand-all\"");
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |s: &StatusReport| seen.push(s.archived);
            sink.publish(&StatusReport {
                archived: 3,
                ..Default::default()
            });
        }
        assert_eq!(seen, vec![3]);
    }
}
