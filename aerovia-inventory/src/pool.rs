use aerovia_shared::{FlightCategory, SeatClass};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// One cabin's seats, tracked as explicit integer sets. The two sets
/// always partition the cabin's full seat range.
#[derive(Debug, Clone)]
pub struct ClassPool {
    available: BTreeSet<u32>,
    occupied: BTreeSet<u32>,
}

impl ClassPool {
    fn new(range: RangeInclusive<u32>) -> Self {
        Self {
            available: range.collect(),
            occupied: BTreeSet::new(),
        }
    }

    /// Move a uniformly random available seat to occupied, skipping
    /// `excluded` if given. Returns `None` when no candidate remains.
    fn assign_random(&mut self, excluded: Option<u32>) -> Option<u32> {
        let candidates: Vec<u32> = self
            .available
            .iter()
            .copied()
            .filter(|seat| Some(*seat) != excluded)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let seat = candidates[rand::rng().random_range(0..candidates.len())];
        self.available.remove(&seat);
        self.occupied.insert(seat);
        Some(seat)
    }

    /// Move a seat back to available. Returns false if it was not occupied.
    fn release(&mut self, seat: u32) -> bool {
        if self.occupied.remove(&seat) {
            self.available.insert(seat);
            true
        } else {
            false
        }
    }

    fn take(&mut self, seat: u32) -> bool {
        if self.available.remove(&seat) {
            self.occupied.insert(seat);
            true
        } else {
            false
        }
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_occupied(&self, seat: u32) -> bool {
        self.occupied.contains(&seat)
    }
}

/// A flight's full seat map: first class occupies seats `1..=first`,
/// tourist the remainder up to the category's total.
#[derive(Debug, Clone)]
pub struct SeatPool {
    pub flight_code: String,
    pub category: FlightCategory,
    pub cancelled: bool,
    first: ClassPool,
    tourist: ClassPool,
}

impl SeatPool {
    pub fn new(flight_code: impl Into<String>, category: FlightCategory) -> Self {
        let first_seats = category.first_class_seats();
        let total = category.total_seats();
        Self {
            flight_code: flight_code.into(),
            category,
            cancelled: false,
            first: ClassPool::new(1..=first_seats),
            tourist: ClassPool::new(first_seats + 1..=total),
        }
    }

    pub fn class(&self, seat_class: SeatClass) -> &ClassPool {
        match seat_class {
            SeatClass::First => &self.first,
            SeatClass::Tourist => &self.tourist,
        }
    }

    pub fn class_mut(&mut self, seat_class: SeatClass) -> &mut ClassPool {
        match seat_class {
            SeatClass::First => &mut self.first,
            SeatClass::Tourist => &mut self.tourist,
        }
    }

    pub fn assign(&mut self, seat_class: SeatClass) -> Option<u32> {
        self.class_mut(seat_class).assign_random(None)
    }

    pub fn release(&mut self, seat_class: SeatClass, seat: u32) -> bool {
        self.class_mut(seat_class).release(seat)
    }

    /// Release `old_seat` and assign a different one in a single step, so
    /// the freed seat cannot be observed by anyone else in between. The
    /// freed seat is excluded from the candidate set; if it was the last
    /// seat in the cabin it is restored and `None` is returned.
    pub fn reassign(&mut self, seat_class: SeatClass, old_seat: u32) -> Option<u32> {
        let pool = self.class_mut(seat_class);
        if !pool.release(old_seat) {
            return None;
        }
        match pool.assign_random(Some(old_seat)) {
            Some(seat) => Some(seat),
            None => {
                // Cabin otherwise full: give the old seat back.
                pool.take(old_seat);
                None
            }
        }
    }

    pub fn snapshot(&self) -> SeatPoolSnapshot {
        SeatPoolSnapshot {
            flight_code: self.flight_code.clone(),
            cancelled: self.cancelled,
            first_available: self.first.available_count(),
            first_occupied: self.first.occupied_count(),
            tourist_available: self.tourist.available_count(),
            tourist_occupied: self.tourist.occupied_count(),
        }
    }
}

/// Read-only view of a pool's occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatPoolSnapshot {
    pub flight_code: String,
    pub cancelled: bool,
    pub first_available: usize,
    pub first_occupied: usize,
    pub tourist_available: usize,
    pub tourist_occupied: usize,
}
