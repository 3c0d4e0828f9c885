use crate::domain::{BookId, MemberId, Reservation, ReservationId};
use crate::ports::Scan;
use crate::ports::reservation_repository::{
    ReservationRepository as ReservationRepositoryTrait, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::guard;

/// In-memory implementation of ReservationRepository
#[derive(Default)]
pub struct ReservationRepository {
    pub(super) reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl ReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    async fn save(&self, reservation: Reservation) -> Result<()> {
        guard(&self.reservations)?.insert(reservation.reservation_id, reservation);
        Ok(())
    }

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        Ok(guard(&self.reservations)?.get(&reservation_id).cloned())
    }

    async fn find_active_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>> {
        Ok(guard(&self.reservations)?
            .values()
            .filter(|r| r.book_id == book_id && r.is_active())
            .cloned()
            .collect())
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = guard(&self.reservations)?
            .values()
            .filter(|r| r.member_id == member_id)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.reserved_at);
        Ok(reservations)
    }

    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Scan<Reservation>> {
        Ok(Scan::complete(
            guard(&self.reservations)?
                .values()
                .filter(|r| r.is_active() && r.expiry_date < cutoff)
                .cloned()
                .collect(),
        ))
    }
}
