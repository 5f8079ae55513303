//! Country public-holiday calendars: lookup for day counting and import from Calendarific.

pub mod calendarific;

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};
use sqlx::MySqlPool;
use tracing::{info, instrument, warn};

use crate::domain::ledger;
use crate::error::{AppError, AppResult};
use crate::holidays::calendarific::{CalendarificClient, CalendarificError};
use crate::repo::public_holiday_repo;
use crate::utils::holiday_cache;

/// Holiday dates of `country_code` for every calendar year touched by `[start, end]`.
///
/// The range must pass [`ledger::check_span`], so at most two years are read.
pub async fn holidays_between(
    pool: &MySqlPool,
    country_code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<HashSet<NaiveDate>> {
    ledger::check_span(start, end)?;

    let mut dates = HashSet::new();
    for year in start.year()..=end.year() {
        dates.extend(year_calendar(pool, country_code, year).await?.iter().copied());
    }
    Ok(dates)
}

async fn year_calendar(
    pool: &MySqlPool,
    country_code: &str,
    year: i32,
) -> AppResult<holiday_cache::HolidaySet> {
    if let Some(set) = holiday_cache::get(country_code, year).await {
        return Ok(set);
    }

    let (from, to) = year_bounds(year)?;
    let dates = public_holiday_repo::dates_between(pool, country_code, from, to).await?;
    Ok(holiday_cache::put(country_code, year, dates.into_iter().collect()).await)
}

fn year_bounds(year: i32) -> AppResult<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1);
    let to = NaiveDate::from_ymd_opt(year, 12, 31);
    from.zip(to)
        .ok_or_else(|| AppError::validation(format!("Year {year} is out of range")))
}

/// Stores one holiday. Returns false when it already existed.
pub async fn create_holiday(
    pool: &MySqlPool,
    name: &str,
    date: NaiveDate,
    country_code: &str,
) -> AppResult<bool> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Holiday name must not be empty"));
    }
    let country_code = normalize_country(country_code)?;

    let created = public_holiday_repo::insert_ignore(pool, name, date, &country_code).await?;
    holiday_cache::invalidate(&country_code, date.year()).await;
    Ok(created)
}

pub fn normalize_country(country_code: &str) -> AppResult<String> {
    let code = country_code.trim().to_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation(
            "Country code must be two letters (ISO 3166-1 alpha-2)",
        ));
    }
    Ok(code)
}

/// Fetches the holidays of `country_code`/`year` and stores the new ones.
///
/// Returns how many were inserted; duplicates are skipped. A fetch failure
/// stores nothing. A storage failure part-way reports how many made it in.
#[instrument(skip(pool, client))]
pub async fn import_holidays(
    pool: &MySqlPool,
    client: &CalendarificClient,
    country_code: &str,
    year: i32,
) -> AppResult<u64> {
    let country_code = normalize_country(country_code)?;

    let fetched = client
        .fetch(&country_code, year)
        .await
        .map_err(|e| match e {
            CalendarificError::MissingApiKey => AppError::validation(e.to_string()),
            other => AppError::External {
                message: format!("Failed to fetch holidays: {other}"),
                imported: 0,
            },
        })?;

    let touched_years: BTreeSet<i32> = fetched.iter().map(|h| h.date.year()).collect();
    let mut imported = 0u64;
    let mut failure = None;

    for holiday in &fetched {
        match public_holiday_repo::insert_ignore(pool, &holiday.name, holiday.date, &country_code)
            .await
        {
            Ok(true) => imported += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, name = %holiday.name, "Failed to store holiday");
                failure = Some(e);
                break;
            }
        }
    }

    for y in touched_years.into_iter().chain(std::iter::once(year)) {
        holiday_cache::invalidate(&country_code, y).await;
    }

    if let Some(e) = failure {
        return Err(AppError::External {
            message: format!(
                "Stored {imported} holidays before the database failed: {e}"
            ),
            imported,
        });
    }

    info!(imported, fetched = fetched.len(), "Holiday import finished");
    Ok(imported)
}
