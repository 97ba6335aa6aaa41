use crate::occurrence::Role;

/// One finished utterance. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

/// Append-only conversation log, ordered by arrival.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a final utterance. Blank text is discarded and `None` returned.
    pub fn record(&mut self, role: Role, text: &str) -> Option<&TranscriptEntry> {
        if text.trim().is_empty() {
            return None;
        }
        self.entries.push(TranscriptEntry {
            role,
            text: text.to_string(),
        });
        self.entries.last()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
