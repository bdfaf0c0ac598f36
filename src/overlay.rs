use crate::{
    backend::{DocumentStore, BOOKINGS},
    error::{Result, ScheduleError},
    time_format::{normalize, to_12_hour},
    types::{Booking, DateSlotGrid, DateView, SlotState, SlotView, TimeSlot},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Read-only booking list superimposed on the slot grid.
#[derive(Debug, Clone, Default)]
pub struct BookingOverlay {
    bookings: Vec<Booking>,
}

impl BookingOverlay {
    pub fn new(bookings: Vec<Booking>) -> Self {
        Self { bookings }
    }

    pub async fn load<S: DocumentStore>(store: &S) -> Result<Self> {
        let bookings = decode_bookings(store.get(BOOKINGS).await?)?;
        info!(bookings = bookings.len(), "Loaded bookings");
        Ok(Self::new(bookings))
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// First booking in list order whose date and time match the slot.
    /// 12-hour labels match their 24-hour equivalents.
    pub fn find_booking(&self, date: &str, time: &str) -> Option<&Booking> {
        let time = normalize(time);
        self.bookings
            .iter()
            .find(|booking| booking.date == date && normalize(&booking.time) == time)
    }

    pub fn slot_state(&self, date: &str, slot: &TimeSlot) -> SlotState {
        match self.find_booking(date, &slot.time) {
            Some(booking) => SlotState::Booked(booking.clone()),
            None if slot.available => SlotState::Available,
            None => SlotState::Unavailable,
        }
    }

    pub fn derive_view(&self, grid: &[DateSlotGrid]) -> Vec<DateView> {
        grid.iter()
            .map(|day| DateView {
                date: day.date.clone(),
                slots: day
                    .slots
                    .iter()
                    .map(|slot| SlotView {
                        time: slot.time.clone(),
                        display_time: to_12_hour(&slot.time).ok(),
                        state: self.slot_state(&day.date, slot),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Decodes the `id -> booking` document. Records that don't decode are
/// skipped so a single bad record can't hide the rest.
pub fn decode_bookings(document: Value) -> Result<Vec<Booking>> {
    let records: Map<String, Value> = match document {
        Value::Null => return Ok(vec![]),
        Value::Object(records) => records,
        other => {
            return Err(ScheduleError::Decode(format!(
                "bookings must be an object, got {other}"
            )))
        }
    };

    Ok(records
        .into_iter()
        .filter_map(|(id, record)| match serde_json::from_value::<Booking>(record) {
            Ok(booking) => Some(Booking { id, ..booking }),
            Err(err) => {
                warn!(%id, ?err, "Skipping undecodable booking");
                None
            }
        })
        .collect())
}
