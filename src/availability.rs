use crate::{
    backend::{DocumentStore, AVAILABLE_TIMES},
    error::{Result, ScheduleError},
    overlay::BookingOverlay,
    types::{DateSlotGrid, Grid, TimeSlot},
};
use chrono::NaiveDate;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info};

/// In-memory slot grids of every date, loaded once and toggled locally.
#[derive(Debug, Default)]
pub struct AvailabilityStore {
    grid: Grid,
    last_error: Option<ScheduleError>,
}

impl AvailabilityStore {
    pub fn from_grid(grid: Vec<DateSlotGrid>) -> Result<Self> {
        check_alignment(&grid)?;
        Ok(Self {
            grid: Arc::new(grid),
            last_error: None,
        })
    }

    /// Fetches `/available_times`. On failure the store is left empty and
    /// the error stays retrievable through `last_error`.
    pub async fn load<S: DocumentStore>(&mut self, store: &S) -> Result<Grid> {
        let loaded = match store.get(AVAILABLE_TIMES).await {
            Ok(document) => decode_grid(document).and_then(|grid| {
                check_alignment(&grid)?;
                Ok(grid)
            }),
            Err(err) => Err(err),
        };

        match loaded {
            Ok(grid) => {
                info!(dates = grid.len(), "Loaded available times");
                self.grid = Arc::new(grid);
                self.last_error = None;
                Ok(self.grid.clone())
            }
            Err(err) => {
                error!(?err, "Failed to load available times");
                self.grid = Arc::default();
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid.clone()
    }

    pub fn last_error(&self) -> Option<&ScheduleError> {
        self.last_error.as_ref()
    }

    pub fn slot(&self, date: &str, time: &str) -> Option<&TimeSlot> {
        self.grid
            .iter()
            .find(|grid| grid.date == date)
            .and_then(|grid| grid.slots.iter().find(|slot| slot.time == time))
    }

    /// Flips the slot's `available` flag and returns the new snapshot.
    /// Booked slots are refused, whatever the caller already checked.
    pub fn toggle(&mut self, date: &str, time: &str, overlay: &BookingOverlay) -> Result<Grid> {
        if let Some(booking) = overlay.find_booking(date, time) {
            return Err(ScheduleError::SlotBooked {
                date: date.to_string(),
                time: time.to_string(),
                booking_id: booking.id.clone(),
            });
        }

        let grid = Arc::make_mut(&mut self.grid);
        let day = grid
            .iter_mut()
            .find(|grid| grid.date == date)
            .ok_or_else(|| ScheduleError::UnknownDate(date.to_string()))?;
        let slot = day
            .slots
            .iter_mut()
            .find(|slot| slot.time == time)
            .ok_or_else(|| ScheduleError::UnknownSlot {
                date: date.to_string(),
                time: time.to_string(),
            })?;
        slot.available = !slot.available;

        Ok(self.grid.clone())
    }
}

/// Decodes the `date -> [slot]` document. Dates come back in key order,
/// which is chronological for `YYYY-MM-DD` keys.
pub fn decode_grid(document: Value) -> Result<Vec<DateSlotGrid>> {
    if document.is_null() {
        return Ok(vec![]);
    }
    let dates: BTreeMap<String, Value> = serde_json::from_value(document)?;

    dates
        .into_iter()
        .map(|(date, slots)| -> Result<DateSlotGrid> {
            NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| ScheduleError::InvalidDate(date.clone()))?;
            let slots = match slots {
                Value::Null => vec![],
                slots => serde_json::from_value::<Vec<Option<TimeSlot>>>(slots)?
                    .into_iter()
                    .flatten()
                    .collect(),
            };
            Ok(DateSlotGrid { date, slots })
        })
        .collect()
}

pub fn encode_slots(slots: &[TimeSlot]) -> Result<Value> {
    Ok(serde_json::to_value(slots)?)
}

/// Every date must list the same time labels in the same order.
pub fn check_alignment(grid: &[DateSlotGrid]) -> Result<()> {
    let Some((first, rest)) = grid.split_first() else {
        return Ok(());
    };
    let expected = first.labels();

    for day in rest {
        let found = day.labels();
        if found != expected {
            return Err(ScheduleError::MisalignedGrid {
                date: day.date.clone(),
                expected: expected.iter().map(|label| label.to_string()).collect(),
                found: found.iter().map(|label| label.to_string()).collect(),
            });
        }
    }
    Ok(())
}
