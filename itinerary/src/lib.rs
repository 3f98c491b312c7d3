//! Trip itinerary domain
//!
//! Holds the request and itinerary types shared by the service, and the deterministic expansion
//! of a date range into per-day plans. Nothing here touches I/O - the same request always expands
//! into the same itinerary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid date range: {end} is before {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Date format accepted in requests and produced in day plans
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const MORNING: &str = "08:00";
const AFTERNOON: &str = "13:00";
const EVENING: &str = "18:00";

/// Parses a calendar date in the `YYYY-MM-DD` form
pub fn parse_date(date: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(date.to_owned()))
}

/// How densely the trip should be planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Relaxed,
    Normal,
    Tight,
}

impl Pace {
    fn evening_note(self) -> &'static str {
        match self {
            Pace::Relaxed => "Take it slow over a long dinner.",
            Pace::Normal => "Try local cuisine.",
            Pace::Tight => "Grab a quick bite and catch the evening highlights.",
        }
    }
}

/// Trip planning request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryRequest {
    pub origin: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interests: Vec<String>,
    pub pace: Pace,
}

impl ItineraryRequest {
    /// Ensures the trip doesn't end before it starts
    pub fn validate(&self) -> Result<(), Error> {
        if self.end_date < self.start_date {
            return Err(Error::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(())
    }

    /// Number of calendar days covered by the request, both ends inclusive
    pub fn days(&self) -> Result<usize, Error> {
        self.validate()?;
        let span = (self.end_date - self.start_date).num_days();
        Ok(span as usize + 1)
    }
}

/// Single activity within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    pub title: String,
    pub explain: String,
}

impl Slot {
    fn new(time: &str, title: impl Into<String>, explain: impl Into<String>) -> Self {
        Self {
            time: time.to_owned(),
            title: title.into(),
            explain: explain.into(),
        }
    }
}

/// Plan for a single calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub morning: Slot,
    pub afternoon: Slot,
    pub evening: Slot,
}

/// Day plans ordered by date
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Itinerary {
    pub days: Vec<DayPlan>,
}

/// Expands the request into one `DayPlan` per day in `[start_date, end_date]`.
pub fn expand(request: &ItineraryRequest) -> Result<Itinerary, Error> {
    let count = request.days()?;

    let days = request
        .start_date
        .iter_days()
        .take(count)
        .enumerate()
        .map(|(index, date)| plan_day(request, index, date))
        .collect();

    Ok(Itinerary { days })
}

fn plan_day(request: &ItineraryRequest, index: usize, date: NaiveDate) -> DayPlan {
    let destination = &request.destination;

    let morning = if index == 0 {
        Slot::new(
            MORNING,
            format!("Arrive in {destination}"),
            format!("Travel from {} and settle in.", request.origin),
        )
    } else {
        Slot::new(
            MORNING,
            format!("Morning walk in {destination}"),
            "Explore local streets.",
        )
    };

    let afternoon = match request.interests.get(index % request.interests.len().max(1)) {
        Some(interest) => Slot::new(
            AFTERNOON,
            format!("Afternoon of {interest}"),
            format!("Spend the afternoon on {interest} around {destination}."),
        ),
        None => Slot::new(AFTERNOON, "Museum visit", "Enjoy history and culture."),
    };

    let evening = Slot::new(EVENING, "Dinner & Nightlife", request.pace.evening_note());

    DayPlan {
        date,
        morning,
        afternoon,
        evening,
    }
}
