use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("remote store request failed: {0}")]
    Transport(String),

    #[error("unexpected document shape: {0}")]
    Decode(String),

    #[error("invalid time '{input}', expected {expected}")]
    InvalidTimeFormat {
        input: String,
        expected: &'static str,
    },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("no schedule for date {0}")]
    UnknownDate(String),

    #[error("no slot {time} on {date}")]
    UnknownSlot { date: String, time: String },

    #[error("slot {time} on {date} is booked by {booking_id}")]
    SlotBooked {
        date: String,
        time: String,
        booking_id: String,
    },

    #[error("slot labels of {date} differ from the first date: expected {expected:?}, found {found:?}")]
    MisalignedGrid {
        date: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("slot {time} on {date} can't be booked")]
    SlotUnavailable { date: String, time: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for ScheduleError {
    fn from(err: serde_json::Error) -> Self {
        ScheduleError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ScheduleError {
    fn from(err: reqwest::Error) -> Self {
        ScheduleError::Transport(err.to_string())
    }
}
