use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

pub type HolidaySet = Arc<HashSet<NaiveDate>>;

/// Public holiday dates keyed by (country code, year).
pub static HOLIDAY_CACHE: Lazy<Cache<(String, i32), HolidaySet>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

fn key(country_code: &str, year: i32) -> (String, i32) {
    (country_code.to_uppercase(), year)
}

pub async fn get(country_code: &str, year: i32) -> Option<HolidaySet> {
    HOLIDAY_CACHE.get(&key(country_code, year)).await
}

pub async fn put(country_code: &str, year: i32, dates: HashSet<NaiveDate>) -> HolidaySet {
    let set = Arc::new(dates);
    HOLIDAY_CACHE
        .insert(key(country_code, year), set.clone())
        .await;
    set
}

/// Drops the entry so the next lookup re-reads the table.
pub async fn invalidate(country_code: &str, year: i32) {
    HOLIDAY_CACHE.invalidate(&key(country_code, year)).await;
}

/// Loads every holiday of `years` into the cache, streaming rows.
pub async fn warmup_holiday_cache(pool: &MySqlPool, years: (i32, i32)) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, NaiveDate)>(
        r#"
        SELECT country_code, date
        FROM public_holidays
        WHERE YEAR(date) BETWEEN ? AND ?
        "#,
    )
    .bind(years.0)
    .bind(years.1)
    .fetch(pool);

    let mut grouped: HashMap<(String, i32), HashSet<NaiveDate>> = HashMap::new();
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let (country, date) = row?;
        grouped
            .entry(key(&country, chrono::Datelike::year(&date)))
            .or_default()
            .insert(date);
        total_count += 1;
    }

    let calendars = grouped.len();
    let inserts: Vec<_> = grouped
        .into_iter()
        .map(|(k, dates)| HOLIDAY_CACHE.insert(k, Arc::new(dates)))
        .collect();
    futures::future::join_all(inserts).await;

    log::info!(
        "Holiday cache warmup complete: {} dates in {} calendars ({}-{})",
        total_count,
        calendars,
        years.0,
        years.1
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn country_codes_are_case_insensitive() {
        let day = NaiveDate::from_ymd_opt(1999, 4, 30).unwrap();
        put("zz", 1999, HashSet::from([day])).await;

        let set = get("ZZ", 1999).await.unwrap();
        assert!(set.contains(&day));

        invalidate("Zz", 1999).await;
        assert!(get("zz", 1999).await.is_none());
    }
}
