// ============================================================
// Layer 3 — Corpus and Split Types
// ============================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which corpus layout to read (see `data::loader`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Shakespeare,
    Openweb,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shakespeare => write!(f, "shakespeare"),
            Self::Openweb     => write!(f, "openweb"),
        }
    }
}

/// One of the three contiguous pieces of a prepared token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val   => "val",
            Self::Test  => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
