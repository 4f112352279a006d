// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Interval type, stored as 16 bytes: months, days and microseconds.
#[derive(
    PartialOrd, Ord, PartialEq, Eq, Debug, Copy, Clone, Default, Hash, Serialize, Deserialize,
)]
pub struct Interval {
    months: i32,
    days: i32,
    micros: i64,
}

impl Interval {
    pub const fn new(months: i32, days: i32, micros: i64) -> Self {
        Interval {
            months,
            days,
            micros,
        }
    }

    pub const fn from_days(days: i32) -> Self {
        Interval::new(0, days, 0)
    }

    pub const fn from_md(months: i32, days: i32) -> Self {
        Interval::new(months, days, 0)
    }

    pub const fn from_secs(seconds: i64) -> Self {
        Interval::new(0, 0, seconds * 1_000_000)
    }

    pub const fn num_months(&self) -> i32 {
        self.months
    }

    pub const fn days(&self) -> i32 {
        self.days
    }

    pub const fn micros(&self) -> i64 {
        self.micros
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} mons {} days", self.months, self.days)?;
        if self.micros != 0 {
            write!(f, " {} us", self.micros)?;
        }
        Ok(())
    }
}
