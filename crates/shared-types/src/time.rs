//! The simulator's virtual clock value.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A point (or duration) on the simulation's logical clock, in virtual
/// milliseconds. Wraps `OrderedFloat` so it can key a priority queue —
/// plain `f64` isn't `Ord` because of `NaN`, which never occurs here since
/// every delay comes from a bounded exponential draw or a config constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualTime(OrderedFloat<f64>);

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime(OrderedFloat(0.0));

    pub fn from_millis(millis: f64) -> Self {
        Self(OrderedFloat(millis))
    }

    pub fn as_millis(self) -> f64 {
        self.0.into_inner()
    }
}

impl Add for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: VirtualTime) -> VirtualTime {
        VirtualTime::from_millis(self.as_millis() + rhs.as_millis())
    }
}

impl Sub for VirtualTime {
    type Output = VirtualTime;

    fn sub(self, rhs: VirtualTime) -> VirtualTime {
        VirtualTime::from_millis(self.as_millis() - rhs.as_millis())
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_value() {
        let a = VirtualTime::from_millis(1.0);
        let b = VirtualTime::from_millis(2.0);
        assert!(a < b);
        assert_eq!(a + b, VirtualTime::from_millis(3.0));
    }
}
