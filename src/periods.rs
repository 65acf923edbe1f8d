use crate::error::Result;
use crate::utils::{fiscal_month_ends, get_fiscal_month_index, validate_fiscal_year_end_month};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PERIODS_PER_YEAR: usize = 12;

/// Twelve period values derived from an annual amount, in fiscal order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodBuckets([f64; PERIODS_PER_YEAR]);

impl PeriodBuckets {
    pub fn values(&self) -> &[f64; PERIODS_PER_YEAR] {
        &self.0
    }

    pub fn get(&self, period: usize) -> Option<f64> {
        self.0.get(period).copied()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// How far the buckets fall short of (or exceed) the annual value they
    /// were split from. Equal rounded shares are not corrected, so this is
    /// frequently non-zero.
    pub fn drift(&self, annual: f64) -> f64 {
        annual - self.total()
    }
}

pub struct PeriodDistributor;

impl PeriodDistributor {
    /// Splits `annual` into twelve equal shares of `round(annual / 12)`.
    /// Halves round away from zero, so a negative annual of -18 gives
    /// shares of -2, not -1.
    pub fn distribute(annual: f64) -> PeriodBuckets {
        let share = (annual / PERIODS_PER_YEAR as f64).round();
        PeriodBuckets([share; PERIODS_PER_YEAR])
    }
}

/// Places period buckets on the calendar of a fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCalendar {
    fiscal_year_end_month: u32,
}

impl PeriodCalendar {
    pub fn new(fiscal_year_end_month: u32) -> Result<Self> {
        validate_fiscal_year_end_month(fiscal_year_end_month)?;
        Ok(Self {
            fiscal_year_end_month,
        })
    }

    pub fn fiscal_year_end_month(&self) -> u32 {
        self.fiscal_year_end_month
    }

    /// Month-end dates of the fiscal year that ends in `fiscal_year`.
    pub fn month_ends(&self, fiscal_year: i32) -> Result<Vec<NaiveDate>> {
        fiscal_month_ends(fiscal_year, self.fiscal_year_end_month)
    }

    /// Index of the bucket a calendar date falls into.
    pub fn period_of(&self, date: NaiveDate) -> usize {
        get_fiscal_month_index(date.month(), self.fiscal_year_end_month)
    }

    pub fn dated(
        &self,
        buckets: &PeriodBuckets,
        fiscal_year: i32,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        let dates = self.month_ends(fiscal_year)?;
        Ok(dates.into_iter().zip(buckets.values().iter().copied()).collect())
    }
}
