use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

/// Lifecycle of a governance proposal, as stored in the low byte of its
/// packed storage word.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, FromRepr, Hash, PartialEq, Serialize,
)]
#[repr(u8)]
pub enum ProposalState {
    /// No proposal exists under this id.
    Null = 0,
    /// Submitted, voting not yet activated.
    Created = 1,
    /// Voting in progress.
    Active = 2,
    /// Passed and waiting out the execution cooldown.
    Queued = 3,
    /// Successfully executed.
    Executed = 4,
    /// Voting closed without reaching the bar.
    Failed = 5,
    /// Cancelled by its creator or the guardian.
    Cancelled = 6,
    /// Queued but never executed within the grace period.
    Expired = 7,
}

impl ProposalState {
    /// Decodes the state sub-field of a packed proposal word.
    pub fn from_word(word: U256) -> Option<Self> {
        u8::try_from(word).ok().and_then(Self::from_repr)
    }

    /// Final states never change again, which is what lets callers cache
    /// their records indefinitely.
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

/// Lifecycle of an executor payload (a queued batch of calls).
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, FromRepr, Hash, PartialEq, Serialize,
)]
#[repr(u8)]
pub enum PayloadState {
    /// No payload exists under this id.
    None = 0,
    /// Registered but not yet queued by a passed proposal.
    Created = 1,
    /// Queued and waiting out its timelock delay.
    Queued = 2,
    /// Successfully executed.
    Executed = 3,
    /// Cancelled by the guardian.
    Cancelled = 4,
    /// Queued but never executed within the grace period.
    Expired = 5,
}

impl PayloadState {
    /// Decodes the state sub-field of a packed payload word.
    pub fn from_word(word: U256) -> Option<Self> {
        u8::try_from(word).ok().and_then(Self::from_repr)
    }

    /// Whether the state can never change again.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled | Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_words_round_trip() {
        assert_eq!(ProposalState::from_word(U256::from(3)), Some(ProposalState::Queued));
        assert_eq!(ProposalState::from_word(U256::from(8)), None);
        assert_eq!(ProposalState::from_word(U256::from(300)), None);
        assert_eq!(PayloadState::from_word(U256::zero()), Some(PayloadState::None));
        assert_eq!(PayloadState::from_word(U256::from(6)), None);
    }

    #[test]
    fn finality() {
        use ProposalState::*;
        for state in [Executed, Failed, Cancelled, Expired] {
            assert!(state.is_final());
        }
        for state in [Null, Created, Active, Queued] {
            assert!(!state.is_final());
        }
        assert!(!PayloadState::Queued.is_final());
        assert!(PayloadState::Expired.is_final());
    }
}
