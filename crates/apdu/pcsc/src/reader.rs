//! Readers known to the PC/SC service

use std::fmt;

use pcsc::{ReaderState, State};

/// A reader and, when a card is in its field, the card's ATR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscReader {
    name: String,
    atr: Option<Vec<u8>>,
}

impl PcscReader {
    /// Reader without a card
    pub const fn empty(name: String) -> Self {
        Self { name, atr: None }
    }

    /// Reader holding a card that answered with `atr`
    pub const fn with_card(name: String, atr: Vec<u8>) -> Self {
        Self {
            name,
            atr: Some(atr),
        }
    }

    pub(crate) fn from_state(state: &ReaderState) -> Self {
        let name = state.name().to_string_lossy().into_owned();
        if card_present(state.event_state()) {
            Self::with_card(name, state.atr().to_vec())
        } else {
            Self::empty(name)
        }
    }

    /// Reader name as reported by PC/SC
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a card is in the field
    pub const fn has_card(&self) -> bool {
        self.atr.is_some()
    }

    /// Answer to reset of the card in the field
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }
}

impl fmt::Display for PcscReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A powered card that is not muted
pub(crate) fn card_present(state: State) -> bool {
    state.contains(State::PRESENT) && !state.intersects(State::EMPTY | State::MUTE)
}
