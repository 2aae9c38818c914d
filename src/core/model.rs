//! Entities materialized from a CarReport snapshot.
//!
//! Everything here is a plain value graph built once by the store and read
//! afterwards. Fuel types are shared between refuelings through `Arc`; a
//! refueling knows its vehicle only by id.

use std::sync::Arc;

/// Fuel type lookup row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelType {
    pub id: i64,
    pub name: String,
    pub category: String,
}

/// A single refueling event.
#[derive(Debug, Clone, PartialEq)]
pub struct Refueling {
    pub id: i64,
    pub vehicle_id: i64,
    /// Milliseconds since the Unix epoch.
    pub date_ms: i64,
    /// Odometer reading in km.
    pub mileage: i64,
    /// Liters.
    pub volume: f64,
    /// Total price paid.
    pub price: f64,
    pub partial: bool,
    pub note: String,
    pub fuel_type: Option<Arc<FuelType>>,
}

impl Refueling {
    pub fn fuel_type_name(&self) -> Option<&str> {
        self.fuel_type.as_deref().map(|fuel| fuel.name.as_str())
    }
}

/// A vehicle with its refuelings in chronological (insertion) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub name: String,
    pub initial_mileage: i64,
    /// Packed ARGB color. Only the low 24 bits are meaningful.
    pub color: i64,
    pub refuelings: Vec<Refueling>,
}

impl Vehicle {
    pub fn latest_refueling(&self) -> Option<&Refueling> {
        self.refuelings.last()
    }

    /// The refueling before the latest one.
    pub fn previous_refueling(&self) -> Option<&Refueling> {
        self.refuelings.len().checked_sub(2).map(|i| &self.refuelings[i])
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn refueling(id: i64, date_ms: i64, mileage: i64, volume: f64, price: f64) -> Refueling {
        Refueling {
            id,
            vehicle_id: 1,
            date_ms,
            mileage,
            volume,
            price,
            partial: false,
            note: String::new(),
            fuel_type: None,
        }
    }

    pub fn vehicle(name: &str, refuelings: Vec<Refueling>) -> Vehicle {
        Vehicle {
            id: 1,
            name: name.to_string(),
            initial_mileage: 500,
            color: 0xff33_6699,
            refuelings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};

    #[test]
    fn latest_and_previous_follow_insertion_order() {
        let car = vehicle(
            "My Car",
            vec![
                refueling(1, 1_000, 1000, 40.0, 60.0),
                refueling(2, 2_000, 1200, 35.0, 52.0),
                refueling(3, 3_000, 1500, 38.0, 57.0),
            ],
        );

        assert_eq!(car.latest_refueling().map(|r| r.id), Some(3));
        assert_eq!(car.previous_refueling().map(|r| r.id), Some(2));
    }

    #[test]
    fn short_histories_have_no_previous() {
        let empty = vehicle("Empty", vec![]);
        assert!(empty.latest_refueling().is_none());
        assert!(empty.previous_refueling().is_none());

        let single = vehicle("Single", vec![refueling(1, 0, 10, 1.0, 1.0)]);
        assert!(single.latest_refueling().is_some());
        assert!(single.previous_refueling().is_none());
    }

    #[test]
    fn fuel_type_name_is_optional() {
        let mut event = refueling(1, 0, 10, 1.0, 1.0);
        assert_eq!(event.fuel_type_name(), None);

        event.fuel_type = Some(Arc::new(FuelType {
            id: 7,
            name: "Super E10".into(),
            category: "Benzin".into(),
        }));
        assert_eq!(event.fuel_type_name(), Some("Super E10"));
    }
}
