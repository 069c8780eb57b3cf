//! Transfer records held in the pending pool until a block captures them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender identifier used for mining rewards.
pub const REWARD_SENDER: &str = "0";

/// Amount credited to the miner for each forged block.
pub const MINING_REWARD: u64 = 1;

/// A numeric amount carried verbatim.
///
/// Integers stay integers and floats keep their shortest round-trip form, so
/// the canonical encoding of an amount is identical on every node that parsed
/// the same JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(serde_json::Number);

impl Amount {
    /// Build an amount from a float. NaN and infinities have no JSON form.
    pub fn from_f64(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).map(Amount)
    }

    pub fn as_number(&self) -> &serde_json::Number {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value.into())
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(value.into())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transfer between two parties. Balances and signatures are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: Amount,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: impl Into<Amount>) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// The reward paid to `recipient` for forging a block.
    pub fn reward(recipient: impl Into<String>) -> Self {
        Self::new(REWARD_SENDER, recipient, MINING_REWARD)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}
