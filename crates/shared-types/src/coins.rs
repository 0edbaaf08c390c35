//! Coin amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A non-negative rational coin amount.
///
/// `Coins` itself doesn't enforce non-negativity — balance invariants are a
/// branch-walk property (see `sim-chain`'s `branch_balance`), not a
/// property of a single value. A `Coins` can transiently go negative
/// during a debit so the caller can reject the transaction atomically.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Coins(pub f64);

impl Coins {
    pub const ZERO: Coins = Coins(0.0);

    pub fn is_negative(self) -> bool {
        self.0 < 0.0
    }
}

impl Add for Coins {
    type Output = Coins;

    fn add(self, rhs: Coins) -> Coins {
        Coins(self.0 + rhs.0)
    }
}

impl Sub for Coins {
    type Output = Coins;

    fn sub(self, rhs: Coins) -> Coins {
        Coins(self.0 - rhs.0)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
