/// Domain models for the application
use crate::errors::{ApiError, ApiResult};
use crate::utils::{non_empty, str_field};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// First day APOD published a picture.
pub const FIRST_APOD_DATE: (i32, u32, u32) = (1995, 6, 16);

/// A calendar day selected by the user.
///
/// Renders as `year-month-day` without zero padding, which is the form the
/// APOD service receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateKey {
    /// Today's date from the local clock.
    pub fn today() -> Self {
        Self::from_naive(Local::now().date_naive())
    }

    /// Validate a selection against `[FIRST_APOD_DATE, today]`.
    pub fn new(year: i32, month: u32, day: u32) -> ApiResult<Self> {
        Self::within(year, month, day, Self::today())
    }

    pub fn within(year: i32, month: u32, day: u32, today: DateKey) -> ApiResult<Self> {
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(ApiError::InvalidInput(format!(
                "{year}-{month}-{day} is not a calendar date"
            )));
        }

        let key = Self { year, month, day };
        let first = Self::first();
        if key < first || key > today {
            return Err(ApiError::InvalidInput(format!(
                "date {key} is outside {first}..={today}"
            )));
        }
        Ok(key)
    }

    pub fn first() -> Self {
        let (year, month, day) = FIRST_APOD_DATE;
        Self { year, month, day }
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

/// Kind of media attached to an APOD entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    /// Anything else the service reported, kept verbatim for logging.
    Unknown(String),
}

impl MediaType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            other => MediaType::Unknown(other.to_string()),
        }
    }
}

/// Metadata for one APOD day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApodRecord {
    pub service_version: String,
    pub date: String,
    pub title: String,
    pub explanation: String,
    pub copyright: Option<String>,
    pub media_type: MediaType,
    pub media_url: String,
    /// Not used for rendering yet.
    pub media_url_hd: String,
}

impl ApodRecord {
    /// Build a record from the service response. Never fails: each missing
    /// field becomes an empty string.
    pub fn from_json(v: &Value) -> Self {
        Self {
            service_version: str_field(v, "service_version"),
            date: str_field(v, "date"),
            title: str_field(v, "title"),
            explanation: str_field(v, "explanation"),
            copyright: non_empty(str_field(v, "copyright")),
            media_type: MediaType::parse(&str_field(v, "media_type")),
            media_url: str_field(v, "url"),
            media_url_hd: str_field(v, "hdurl"),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}
