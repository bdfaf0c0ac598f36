use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

use crate::error::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: String,
    pub available: bool,
}

impl TimeSlot {
    pub fn new(time: impl Into<String>, available: bool) -> Self {
        Self {
            time: time.into(),
            available,
        }
    }
}

/// All slots of one calendar day, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSlotGrid {
    pub date: String,
    pub slots: Vec<TimeSlot>,
}

impl DateSlotGrid {
    pub fn labels(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.time.as_str()).collect()
    }
}

/// Immutable snapshot of every date's slot grid. A toggle produces a new one.
pub type Grid = Arc<Vec<DateSlotGrid>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Cancelled,
    Completed,
    Ongoing,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Ongoing => "ongoing",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Ongoing)
                | (Approved, Cancelled)
                | (Ongoing, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "approved" => Ok(BookingStatus::Approved),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "ongoing" => Ok(BookingStatus::Ongoing),
            other => Err(ScheduleError::Validation(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }
}

/// A booking record as stored under `/bookings/{id}`. The id is the
/// document key and is not part of the stored body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(skip)]
    pub id: String,
    pub date: String,
    pub time: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: BookingStatus,
}

/// Display state of a slot once bookings are overlaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Available,
    Unavailable,
    Booked(Booking),
}

impl SlotState {
    pub fn is_booked(&self) -> bool {
        matches!(self, SlotState::Booked(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub time: String,
    /// 12-hour rendering of `time`, when it is a valid 24-hour label.
    pub display_time: Option<String>,
    pub state: SlotState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateView {
    pub date: String,
    pub slots: Vec<SlotView>,
}
