use crate::{
    availability::AvailabilityStore,
    backend::DocumentStore,
    error::Result,
    overlay::BookingOverlay,
    persistence::{PersistenceController, SaveStatus},
    types::{Booking, DateView, Grid},
};
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;
use tracing::info;

/// One mounted schedule view: the slot grid, the bookings overlaid on it
/// and the controller persisting local toggles.
pub struct ScheduleSession<S: DocumentStore> {
    store: S,
    availability: AvailabilityStore,
    overlay: BookingOverlay,
    persistence: PersistenceController<S>,
}

impl<S: DocumentStore> ScheduleSession<S> {
    pub async fn open(store: S, flush_delay: Duration) -> Result<Self> {
        let mut availability = AvailabilityStore::default();
        availability.load(&store).await?;
        let overlay = BookingOverlay::load(&store).await?;

        Ok(Self {
            persistence: PersistenceController::new(store.clone(), flush_delay),
            store,
            availability,
            overlay,
        })
    }

    /// Saves pending changes, then fetches grid and bookings again.
    pub async fn reload(&mut self) -> Result<()> {
        self.persistence.flush_now().await?;
        self.availability.load(&self.store).await?;
        self.overlay = BookingOverlay::load(&self.store).await?;
        Ok(())
    }

    pub async fn refresh_bookings(&mut self) -> Result<()> {
        self.overlay = BookingOverlay::load(&self.store).await?;
        Ok(())
    }

    /// Toggles a free slot and schedules the write-back. Returns the slot's
    /// new `available` value.
    pub fn toggle(&mut self, date: &str, time: &str) -> Result<bool> {
        let grid = self.availability.toggle(date, time, &self.overlay)?;
        let available = self
            .availability
            .slot(date, time)
            .map(|slot| slot.available)
            .unwrap_or_default();
        info!(date, time, available, "Toggled slot");
        self.persistence.schedule(grid);
        Ok(available)
    }

    pub fn view(&self) -> Vec<DateView> {
        self.overlay.derive_view(&self.availability.grid())
    }

    pub fn grid(&self) -> Grid {
        self.availability.grid()
    }

    pub fn overlay(&self) -> &BookingOverlay {
        &self.overlay
    }

    pub fn find_booking(&self, date: &str, time: &str) -> Option<&Booking> {
        self.overlay.find_booking(date, time)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.persistence.has_pending()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.persistence.status()
    }

    pub fn save_status_stream(&self) -> WatchStream<SaveStatus> {
        self.persistence.status_stream()
    }

    pub async fn save_now(&self) -> Result<bool> {
        self.persistence.flush_now().await
    }

    /// The host is about to discard the page.
    pub async fn page_hidden(&self) -> Result<bool> {
        self.persistence.page_hidden().await
    }

    /// Tears the view down, saving anything still pending.
    pub async fn close(self) -> Result<bool> {
        self.persistence.shutdown().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::ScheduleError,
        persistence::DEFAULT_FLUSH_DELAY,
        testutils::MockDocumentStore,
        types::{SlotState, TimeSlot},
    };
    use serde_json::json;
    use tokio::time::sleep;

    fn remote() -> MockDocumentStore {
        MockDocumentStore::with_documents(json!({
            "available_times": {
                "2024-06-01": [
                    {"time": "09:00", "available": true},
                    {"time": "09:30", "available": false},
                ],
            },
            "bookings": {
                "b1": {"date": "2024-06-01", "time": "9:30 AM", "name": "Jane Doe", "phone": "555-0100", "status": "approved"},
            }
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_marks_booked_slot() {
        let session = ScheduleSession::open(remote(), DEFAULT_FLUSH_DELAY).await.unwrap();

        let view = session.view();

        assert_eq!(view[0].date, "2024-06-01");
        assert_eq!(view[0].slots[0].state, SlotState::Available);
        match &view[0].slots[1].state {
            SlotState::Booked(booking) => assert_eq!(booking.name, "Jane Doe"),
            state => panic!("expected booked slot, got {state:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_twice_flushes_original_value() {
        let remote = remote();
        let session_remote = remote.clone();
        let mut session = ScheduleSession::open(session_remote, DEFAULT_FLUSH_DELAY)
            .await
            .unwrap();

        assert!(!session.toggle("2024-06-01", "09:00").unwrap());
        assert!(session.toggle("2024-06-01", "09:00").unwrap());
        assert!(session.has_unsaved_changes());

        sleep(DEFAULT_FLUSH_DELAY + Duration::from_secs(1)).await;

        assert_eq!(remote.put_count(), 1);
        assert_eq!(
            remote.recorded_puts()[0].1,
            json!([
                {"time": "09:00", "available": true},
                {"time": "09:30", "available": false},
            ])
        );
        assert!(!session.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_booked_slot_cannot_be_toggled() {
        let remote = remote();
        let mut session = ScheduleSession::open(remote.clone(), DEFAULT_FLUSH_DELAY)
            .await
            .unwrap();

        let err = session.toggle("2024-06-01", "09:30").unwrap_err();

        assert!(matches!(err, ScheduleError::SlotBooked { .. }));
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.save_status(), SaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_toggle() {
        let remote = remote();
        let mut session = ScheduleSession::open(remote.clone(), DEFAULT_FLUSH_DELAY)
            .await
            .unwrap();

        session.toggle("2024-06-01", "09:00").unwrap();
        assert!(session.close().await.unwrap());

        assert_eq!(remote.put_count(), 1);
        assert_eq!(
            remote.0.documents.snapshot()["available_times"]["2024-06-01"][0],
            json!({"time": "09:00", "available": false})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_hidden_then_timer_does_not_double_flush() {
        let remote = remote();
        let mut session = ScheduleSession::open(remote.clone(), DEFAULT_FLUSH_DELAY)
            .await
            .unwrap();

        session.toggle("2024-06-01", "09:00").unwrap();
        assert!(session.page_hidden().await.unwrap());
        sleep(DEFAULT_FLUSH_DELAY * 2).await;

        assert_eq!(remote.put_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_picks_up_new_bookings() {
        let remote = remote();
        let mut session = ScheduleSession::open(remote.clone(), DEFAULT_FLUSH_DELAY)
            .await
            .unwrap();
        assert!(session.find_booking("2024-06-01", "09:00").is_none());

        remote
            .put(
                "/bookings/b2",
                json!({"date": "2024-06-01", "time": "9:00 AM", "name": "John Roe"}),
            )
            .await
            .unwrap();
        session.reload().await.unwrap();

        assert_eq!(
            session.find_booking("2024-06-01", "09:00").unwrap().id,
            "b2"
        );
        assert_eq!(session.grid()[0].slots[0], TimeSlot::new("09:00", true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_fails_on_transport_error() {
        let remote = remote();
        remote.fail(true);

        let result = ScheduleSession::open(remote, DEFAULT_FLUSH_DELAY).await;
        assert!(matches!(result, Err(ScheduleError::Transport(_))));
    }
}
