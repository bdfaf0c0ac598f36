use crate::{
    backend::{booking_path, DocumentStore, BOOKINGS},
    error::{Result, ScheduleError},
    overlay::{decode_bookings, BookingOverlay},
    time_format::{is_valid_label, normalize, to_12_hour},
    types::{Booking, BookingStatus, DateSlotGrid},
};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

lazy_static! {
    static ref PHONE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").unwrap();
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBooking {
    #[validate(custom(function = "validate_date"))]
    pub date: String,
    #[validate(custom(function = "validate_time"))]
    pub time: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(regex(path = *PHONE))]
    pub phone: String,
}

fn validate_date(date: &str) -> std::result::Result<(), ValidationError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ValidationError::new("date"))
}

fn validate_time(time: &str) -> std::result::Result<(), ValidationError> {
    match is_valid_label(time) {
        true => Ok(()),
        false => Err(ValidationError::new("time")),
    }
}

/// Appointment requests and their status workflow.
#[derive(Clone)]
pub struct BookingDesk<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> BookingDesk<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Files a pending booking for an open, unbooked slot.
    pub async fn request(
        &self,
        new_booking: NewBooking,
        grid: &[DateSlotGrid],
        overlay: &BookingOverlay,
    ) -> Result<Booking> {
        new_booking
            .validate()
            .map_err(|err| ScheduleError::Validation(err.to_string()))?;

        let time = normalize(&new_booking.time).into_owned();
        let open = grid
            .iter()
            .find(|day| day.date == new_booking.date)
            .and_then(|day| day.slots.iter().find(|slot| normalize(&slot.time) == time))
            .is_some_and(|slot| slot.available);
        if !open || overlay.find_booking(&new_booking.date, &time).is_some() {
            warn!(date = %new_booking.date, time = %new_booking.time, "Refused booking request");
            return Err(ScheduleError::SlotUnavailable {
                date: new_booking.date,
                time: new_booking.time,
            });
        }

        let mut booking = Booking {
            id: String::new(),
            time: to_12_hour(&time).unwrap_or_else(|_| new_booking.time.clone()),
            date: new_booking.date,
            name: new_booking.name.trim().to_string(),
            phone: new_booking.phone,
            status: BookingStatus::Pending,
        };
        booking.id = self
            .store
            .post(BOOKINGS, serde_json::to_value(&booking)?)
            .await?;
        info!(id = %booking.id, date = %booking.date, time = %booking.time, "Booking requested");
        Ok(booking)
    }

    pub async fn booking(&self, id: &str) -> Result<Booking> {
        let record = self.store.get(&booking_path(id)).await?;
        if record.is_null() {
            return Err(ScheduleError::Validation(format!("no booking {id}")));
        }
        let mut records = Map::new();
        records.insert(id.to_string(), record);
        decode_bookings(Value::Object(records))?
            .pop()
            .ok_or_else(|| ScheduleError::Decode(format!("booking {id} is malformed")))
    }

    pub async fn set_status(&self, id: &str, status: BookingStatus) -> Result<Booking> {
        let mut booking = self.booking(id).await?;
        if !booking.status.can_transition_to(status) {
            return Err(ScheduleError::Validation(format!(
                "booking {id} can't move from {} to {status}",
                booking.status
            )));
        }
        self.store
            .patch(&booking_path(id), json!({ "status": status }))
            .await?;
        info!(id, from = %booking.status, to = %status, "Booking status changed");
        booking.status = status;
        Ok(booking)
    }

    pub async fn cancel(&self, id: &str) -> Result<Booking> {
        self.set_status(id, BookingStatus::Cancelled).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.delete(&booking_path(id)).await?;
        info!(id, "Booking removed");
        Ok(())
    }

    pub async fn bookings(&self) -> Result<Value> {
        self.store.get(BOOKINGS).await
    }
}
