use serde::{Deserialize, Serialize};

use super::holder::HolderKind;

/// Selects which holders a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// Every holder.
    #[default]
    All,

    /// Snapshot holders are skipped, so a snapshot does not count as a child
    /// of its origin.
    Classic,
}

impl View {
    pub fn follows(self, holder: &HolderKind) -> bool {
        match self {
            View::All => true,
            View::Classic => !matches!(holder, HolderKind::Snapshot),
        }
    }
}
