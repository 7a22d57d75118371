//! Command-local status word tables
//!
//! The same status word can mean different things depending on the command
//! that produced it, so every command family carries its own table. Lookups
//! that match no entry resolve to the table's unknown sentinel.

use std::fmt;

use super::status::StatusWord;

/// One row of a [`StatusTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry<S> {
    value: u16,
    mask: u16,
    outcome: S,
}

impl<S: Copy> StatusEntry<S> {
    /// Match one exact status word
    pub const fn exact(status: u16, outcome: S) -> Self {
        Self {
            value: status,
            mask: 0xFFFF,
            outcome,
        }
    }

    /// Match every status word whose masked bits equal `status`
    pub const fn masked(status: u16, mask: u16, outcome: S) -> Self {
        Self {
            value: status & mask,
            mask,
            outcome,
        }
    }

    /// Whether this entry matches the status word
    pub const fn matches(&self, status: StatusWord) -> bool {
        status.to_u16() & self.mask == self.value
    }

    /// The outcome bound to this entry
    pub const fn outcome(&self) -> S {
        self.outcome
    }
}

/// Fixed mapping from status words to command-local outcomes
pub struct StatusTable<S: 'static> {
    entries: &'static [StatusEntry<S>],
    unknown: S,
}

impl<S: Copy + PartialEq> StatusTable<S> {
    /// Build a table. Entries are tried in order, the first match wins.
    pub const fn new(entries: &'static [StatusEntry<S>], unknown: S) -> Self {
        Self { entries, unknown }
    }

    /// Look up an outcome, falling back to the unknown sentinel
    pub fn lookup(&self, status: StatusWord) -> S {
        self.get(status).unwrap_or(self.unknown)
    }

    /// Look up an outcome without the fallback
    pub fn get(&self, status: StatusWord) -> Option<S> {
        self.entries
            .iter()
            .find(|entry| entry.matches(status))
            .map(StatusEntry::outcome)
    }

    /// Whether `outcome` is the unknown sentinel
    pub fn is_unknown(&self, outcome: S) -> bool {
        outcome == self.unknown
    }

    /// The unknown sentinel of this table
    pub const fn unknown(&self) -> S {
        self.unknown
    }

    /// All entries, in lookup order
    pub const fn entries(&self) -> &'static [StatusEntry<S>] {
        self.entries
    }
}

impl<S: fmt::Debug> fmt::Debug for StatusTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTable")
            .field("entries", &self.entries.len())
            .field("unknown", &self.unknown)
            .finish()
    }
}
