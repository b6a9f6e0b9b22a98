//! User-facing messages produced by the session, drained by the UI layer.

use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feedback {
    /// Fatal, shown until the session is rebuilt
    ErrorBanner(String),
    /// Loading status line, including progress text
    Loading(String),
    LoadFailed(String),
    SceneReady(String),
    /// Transient per-click error
    PickError(String),
    Saving(String),
    SaveOk(String),
    SaveFailed(String),
}

impl Feedback {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Feedback::ErrorBanner(_) | Feedback::LoadFailed(_) | Feedback::PickError(_) | Feedback::SaveFailed(_)
        )
    }

    pub fn message(&self) -> &str {
        match self {
            Feedback::ErrorBanner(m)
            | Feedback::Loading(m)
            | Feedback::LoadFailed(m)
            | Feedback::SceneReady(m)
            | Feedback::PickError(m)
            | Feedback::Saving(m)
            | Feedback::SaveOk(m)
            | Feedback::SaveFailed(m) => m,
        }
    }
}

#[derive(Debug, Default)]
pub struct FeedbackLog {
    entries: VecDeque<Feedback>,
}

impl FeedbackLog {
    pub fn push(&mut self, feedback: Feedback) {
        if feedback.is_error() {
            tracing::error!("{}", feedback.message());
        }
        self.entries.push_back(feedback);
    }

    pub fn last(&self) -> Option<&Feedback> {
        self.entries.back()
    }

    pub fn drain(&mut self) -> Vec<Feedback> {
        self.entries.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feedback> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_log() {
        let mut log = FeedbackLog::default();
        log.push(Feedback::Loading("S1".into()));
        log.push(Feedback::PickError("bad face".into()));
        assert_eq!(log.last(), Some(&Feedback::PickError("bad face".into())));
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained[1].is_error());
        assert!(log.is_empty());
    }
}
