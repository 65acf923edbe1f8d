use crate::error::{EngineError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.checked_sub_days(Days::new(1)))
        .ok_or_else(|| {
            EngineError::DateError(format!("No month end for {:04}-{:02}", year, month))
        })
}

pub fn next_month_end(date: NaiveDate) -> Result<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    last_day_of_month(year, month)
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(EngineError::InvalidFiscalYearEndMonth(month));
    }
    Ok(())
}

/// First calendar month of a fiscal year that ends in `fiscal_year_end_month`.
pub fn fiscal_year_start_month(fiscal_year_end_month: u32) -> u32 {
    if fiscal_year_end_month == 12 {
        1
    } else {
        fiscal_year_end_month + 1
    }
}

/// The twelve month-end dates of the fiscal year ending in
/// `fiscal_year_end_month` of `year`, in fiscal order.
pub fn fiscal_month_ends(year: i32, fiscal_year_end_month: u32) -> Result<Vec<NaiveDate>> {
    validate_fiscal_year_end_month(fiscal_year_end_month)?;

    let start_month = fiscal_year_start_month(fiscal_year_end_month);
    let start_year = if fiscal_year_end_month == 12 {
        year
    } else {
        year - 1
    };

    let mut dates = Vec::with_capacity(12);
    let mut current = last_day_of_month(start_year, start_month)?;
    for _ in 0..12 {
        dates.push(current);
        current = next_month_end(current)?;
    }

    Ok(dates)
}

/// Returns the 0-based index of the month within the fiscal year.
///
/// # Examples
/// - If FY ends in Dec (12): Jan=0, Feb=1, ..., Dec=11
/// - If FY ends in June (6): July=0, Aug=1, ..., June=11
pub fn get_fiscal_month_index(calendar_month: u32, fiscal_year_end_month: u32) -> usize {
    let fy_start_month = fiscal_year_start_month(fiscal_year_end_month);

    if calendar_month >= fy_start_month {
        (calendar_month - fy_start_month) as usize
    } else {
        (calendar_month + 12 - fy_start_month) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_next_month_end() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(
            next_month_end(date).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
    }

    #[test]
    fn test_fiscal_month_ends_calendar_year() {
        let dates = fiscal_month_ends(2024, 12).unwrap();
        assert_eq!(dates.len(), 12);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(dates[11], NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_fiscal_month_ends_june_year_end() {
        let dates = fiscal_month_ends(2024, 6).unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2023, 7, 31).unwrap());
        assert_eq!(dates[11], NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    }

    #[test]
    fn test_fiscal_month_index() {
        assert_eq!(get_fiscal_month_index(1, 12), 0);
        assert_eq!(get_fiscal_month_index(12, 12), 11);

        // June year end (FY starts July)
        assert_eq!(get_fiscal_month_index(7, 6), 0);
        assert_eq!(get_fiscal_month_index(12, 6), 5);
        assert_eq!(get_fiscal_month_index(6, 6), 11);
    }

    #[test]
    fn test_invalid_fiscal_month() {
        assert!(fiscal_month_ends(2024, 0).is_err());
        assert!(validate_fiscal_year_end_month(13).is_err());
    }
}
