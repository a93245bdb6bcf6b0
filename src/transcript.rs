use indexmap::IndexMap;

use crate::token::TokenLine;
use crate::types::{TypeTable, WgslType};

/// What kind of function a transcript holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Helper { return_type: WgslType },
    /// The designated compute entry point, with its collapsed workgroup size.
    Entry { workgroup: u32 },
}

/// The stored, re-runnable form of one translated function: token lines,
/// the live type table, and the function kind. The token lines are never
/// re-tokenized; regeneration reruns generation over them with the table
/// as edited, and only the generated body is rebuilt.
#[derive(Clone, Debug)]
pub struct Transcript {
    pub name: String,
    pub kind: FunctionKind,
    pub lines: Vec<TokenLine>,
    pub vars: TypeTable,
    /// The most recently generated body.
    pub body: String,
}

/// Transcripts keyed by function name, in translation order. Translating
/// a name again replaces its transcript; the original position is kept.
#[derive(Default, Debug)]
pub struct TranscriptStore {
    entries: IndexMap<String, Transcript>,
}

impl TranscriptStore {
    pub fn insert(&mut self, transcript: Transcript) {
        self.entries.insert(transcript.name.clone(), transcript);
    }

    pub fn get(&self, name: &str) -> Option<&Transcript> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Transcript> {
        self.entries.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transcript> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Transcript> {
        self.entries.values_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
