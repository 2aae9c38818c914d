//! Derived metrics: everything the state payload reports that is not stored as such.
//!
//! All functions here are pure. Data-quality problems (zero volume, instants
//! outside the representable range) come back as [`MetricsError`] and end up
//! as `null` in the payload instead of NaN, infinity, or a panic.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::model::{Refueling, Vehicle};

/// Bits of the packed color that carry RGB.
const RGB_MASK: i64 = 0x00FF_FFFF;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("cannot compute price per unit for volume {0}")]
    InvalidVolume(f64),

    #[error("price per unit of {price} / {volume} is not a finite number")]
    NonFinite { price: f64, volume: f64 },

    #[error("timestamp {0} ms is outside the supported range")]
    InvalidTimestamp(i64),
}

/// Renders the low 24 bits of `color` as `#rrggbb`.
pub fn hex_color(color: i64) -> String {
    format!("#{:06x}", color & RGB_MASK)
}

/// Price divided by volume, rounded half away from zero to 3 decimals.
///
/// A zero or non-finite volume is rejected.
pub fn price_per_unit(price: f64, volume: f64) -> Result<f64, MetricsError> {
    if volume == 0.0 || !volume.is_finite() {
        return Err(MetricsError::InvalidVolume(volume));
    }

    let ratio = price / volume;
    if !ratio.is_finite() {
        return Err(MetricsError::NonFinite { price, volume });
    }

    Ok((ratio * 1000.0).round() / 1000.0)
}

/// Formats an epoch-millisecond instant as RFC 3339 in UTC, dropping sub-second precision.
pub fn rfc3339_timestamp(epoch_ms: i64) -> Result<String, MetricsError> {
    OffsetDateTime::from_unix_timestamp(epoch_ms / 1000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .ok_or(MetricsError::InvalidTimestamp(epoch_ms))
}

/// Change between two consecutive refuelings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefuelingDelta {
    /// Kilometers driven. Negative when the odometer data is inconsistent.
    pub mileage: i64,
    /// Whole seconds elapsed, truncated.
    pub seconds: i64,
}

impl RefuelingDelta {
    /// `None` when either difference does not fit in an `i64`.
    pub fn between(previous: &Refueling, latest: &Refueling) -> Option<Self> {
        Some(Self {
            mileage: latest.mileage.checked_sub(previous.mileage)?,
            seconds: latest.date_ms.checked_sub(previous.date_ms)? / 1000,
        })
    }

    /// Delta between the two most recent refuelings, if there are two.
    pub fn latest(vehicle: &Vehicle) -> Option<Self> {
        Self::between(vehicle.previous_refueling()?, vehicle.latest_refueling()?)
    }

    /// True when two refuelings exist but their delta overflows.
    pub fn overflows(vehicle: &Vehicle) -> bool {
        vehicle.previous_refueling().is_some() && Self::latest(vehicle).is_none()
    }
}

/// The state payload of one vehicle.
///
/// Field order is the wire order. Fields taken from the latest refueling are
/// `None` (JSON `null`) when the vehicle has none; deltas are `None` with
/// fewer than two refuelings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub name: String,
    pub color: String,
    pub mileage: Option<i64>,
    /// Empty when the latest refueling has no fuel type.
    pub fuel_type: Option<String>,
    pub volume: Option<f64>,
    pub price: Option<f64>,
    pub partial: Option<bool>,
    pub note: Option<String>,
    pub price_per_unit: Option<f64>,
    pub timestamp: Option<String>,
    pub delta_time: Option<i64>,
    pub delta_mileage: Option<i64>,
    pub initial_mileage: i64,
}

impl DerivedMetrics {
    pub fn compute(vehicle: &Vehicle) -> Self {
        let latest = vehicle.latest_refueling();
        let delta = RefuelingDelta::latest(vehicle);

        Self {
            name: vehicle.name.clone(),
            color: hex_color(vehicle.color),
            mileage: latest.map(|r| r.mileage),
            fuel_type: latest.map(|r| r.fuel_type_name().unwrap_or_default().to_string()),
            volume: latest.map(|r| r.volume),
            price: latest.map(|r| r.price),
            partial: latest.map(|r| r.partial),
            note: latest.map(|r| r.note.clone()),
            price_per_unit: latest.and_then(|r| price_per_unit(r.price, r.volume).ok()),
            timestamp: latest.and_then(|r| rfc3339_timestamp(r.date_ms).ok()),
            delta_time: delta.map(|d| d.seconds),
            delta_mileage: delta.map(|d| d.mileage),
            initial_mileage: vehicle.initial_mileage,
        }
    }

    /// Why the latest refueling's price per unit is missing, if it is.
    pub fn price_per_unit_issue(vehicle: &Vehicle) -> Option<MetricsError> {
        let latest = vehicle.latest_refueling()?;
        price_per_unit(latest.price, latest.volume).err()
    }
}
