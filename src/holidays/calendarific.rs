use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum CalendarificError {
    #[error("CALENDARIFIC_API_KEY is not configured")]
    MissingApiKey,
    #[error("holiday API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("holiday API answered {0}")]
    Status(StatusCode),
    #[error("Invalid response from API: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedHoliday {
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Clone)]
pub struct CalendarificClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CalendarificClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<FetchedHoliday>, CalendarificError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CalendarificError::MissingApiKey)?;

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("api_key", api_key),
                ("country", country_code),
                ("year", &year.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CalendarificError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        let holidays = parse_holidays(&body)?;
        debug!(count = holidays.len(), "Parsed holidays");
        Ok(holidays)
    }
}

/// Extracts `response.holidays[].{name, date.iso}`.
///
/// A missing envelope is an error; individual entries without a name or with an
/// unparsable date are skipped. `iso` may carry a time part, only the date is kept.
pub fn parse_holidays(body: &Value) -> Result<Vec<FetchedHoliday>, CalendarificError> {
    let entries = body
        .get("response")
        .and_then(|r| r.get("holidays"))
        .and_then(Value::as_array)
        .ok_or(CalendarificError::Malformed("missing response.holidays"))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?.trim();
            let iso = entry.get("date")?.get("iso")?.as_str()?;
            let date = NaiveDate::parse_from_str(iso.get(..10)?, "%Y-%m-%d").ok()?;
            (!name.is_empty()).then(|| FetchedHoliday {
                name: name.to_string(),
                date,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dates_and_skips_bad_entries() {
        let body = json!({
            "meta": { "code": 200 },
            "response": { "holidays": [
                { "name": "New Year's Day", "date": { "iso": "2025-01-01" } },
                { "name": "Daylight Saving Time starts", "date": { "iso": "2025-03-30T02:00:00+01:00" } },
                { "name": "Broken", "date": { "iso": "not-a-date" } },
                { "name": "No date" },
                { "name": "", "date": { "iso": "2025-05-05" } }
            ]}
        });

        let holidays = parse_holidays(&body).unwrap();
        assert_eq!(
            holidays,
            vec![
                FetchedHoliday {
                    name: "New Year's Day".into(),
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                },
                FetchedHoliday {
                    name: "Daylight Saving Time starts".into(),
                    date: NaiveDate::from_ymd_opt(2025, 3, 30).unwrap(),
                },
            ]
        );
    }

    #[test]
    fn missing_envelope_is_malformed() {
        // the API answers with an empty array on some errors
        let body = json!({ "meta": { "code": 401 }, "response": [] });
        assert!(matches!(
            parse_holidays(&body),
            Err(CalendarificError::Malformed(_))
        ));
    }

    #[actix_web::test]
    async fn fetch_without_api_key_fails_fast() {
        let client = CalendarificClient::new("http://127.0.0.1:9/holidays", None);
        assert!(matches!(
            client.fetch("NL", 2025).await,
            Err(CalendarificError::MissingApiKey)
        ));
    }
}
