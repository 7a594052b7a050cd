//! The widget's conversation, held as an append-only list of entries

use crate::models::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Who an entry is shown as coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Extension-generated notice; never sent to the API
    Notice,
}

impl Speaker {
    pub fn css_class(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
            Speaker::Notice => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Done,
    Loading,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub speaker: Speaker,
    pub content: String,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    revision: u64,
}

impl Transcript {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Bumped on every change, so views can skip redrawing messages
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn push(&mut self, speaker: Speaker, content: impl Into<String>, status: EntryStatus) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            speaker,
            content: content.into(),
            status,
        });
        self.revision += 1;
        id
    }

    /// Replaces the content of a loading entry. Returns false if `id` is
    /// unknown or already resolved.
    pub fn resolve(&mut self, id: EntryId, content: impl Into<String>, status: EntryStatus) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id && entry.status == EntryStatus::Loading)
        else {
            return false;
        };
        entry.content = content.into();
        entry.status = status;
        self.revision += 1;
        true
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Completed user and assistant turns, in insertion order
    pub fn history(&self) -> Vec<Turn> {
        self.entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Done)
            .filter_map(|entry| match entry.speaker {
                Speaker::User => Some(Turn::user(entry.content.clone())),
                Speaker::Assistant => Some(Turn::assistant(entry.content.clone())),
                Speaker::Notice => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_skips_notices_placeholders_and_failures() {
        let mut transcript = Transcript::default();
        transcript.push(Speaker::User, "hi", EntryStatus::Done);
        transcript.push(Speaker::Assistant, "hello", EntryStatus::Done);
        transcript.push(Speaker::Notice, "Please set your API key", EntryStatus::Done);
        transcript.push(Speaker::Assistant, "Error: timeout", EntryStatus::Failed);
        transcript.push(Speaker::Assistant, "Thinking...", EntryStatus::Loading);

        assert_eq!(
            transcript.history(),
            vec![Turn::user("hi"), Turn::assistant("hello")]
        );
    }

    #[test]
    fn resolve_updates_only_the_matching_placeholder() {
        let mut transcript = Transcript::default();
        let first = transcript.push(Speaker::Assistant, "Thinking...", EntryStatus::Loading);
        let second = transcript.push(Speaker::Assistant, "Thinking...", EntryStatus::Loading);

        assert!(transcript.resolve(second, "second reply", EntryStatus::Done));
        assert_eq!(transcript.get(first).unwrap().status, EntryStatus::Loading);
        assert_eq!(transcript.get(second).unwrap().content, "second reply");

        assert!(!transcript.resolve(second, "again", EntryStatus::Done));
        assert_eq!(transcript.get(second).unwrap().content, "second reply");
    }

    #[test]
    fn every_change_bumps_the_revision() {
        let mut transcript = Transcript::default();
        let start = transcript.revision();
        let id = transcript.push(Speaker::Assistant, "Thinking...", EntryStatus::Loading);
        transcript.resolve(id, "done", EntryStatus::Done);
        assert_eq!(transcript.revision(), start + 2);
    }
}
