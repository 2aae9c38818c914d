use std::{collections::HashMap, path::Path, sync::Arc};

use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, warn};

use super::StoreError;
use crate::core::model::{FuelType, Refueling, Vehicle};

const CARS: &str = "SELECT _id, car__name, initial_mileage, color FROM car ORDER BY _id";
const FUEL_TYPES: &str = "SELECT _id, fuel_type__name, category FROM fuel_type";
const REFUELINGS: &str = "SELECT _id, date, mileage, volume, price, partial, note, fuel_type_id, car_id
     FROM refueling
     ORDER BY car_id, _id";

/// Read-only handle on one snapshot file.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { conn })
    }

    /// Loads every car with its refuelings and their fuel types.
    pub fn load_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        let fuel_types = self.fuel_types()?;
        let mut vehicles = self.query(CARS, map_car)?;

        let index: HashMap<i64, usize> = vehicles
            .iter()
            .enumerate()
            .map(|(i, vehicle)| (vehicle.id, i))
            .collect();

        let refuelings = self.query(REFUELINGS, |row| map_refueling(row, &fuel_types))?;
        for refueling in refuelings {
            match index.get(&refueling.vehicle_id) {
                Some(&i) => vehicles[i].refuelings.push(refueling),
                None => warn!(
                    "Skipping refueling {} of unknown car {}",
                    refueling.id, refueling.vehicle_id
                ),
            }
        }

        debug!(
            "Loaded {} vehicles, {} fuel types",
            vehicles.len(),
            fuel_types.len()
        );
        Ok(vehicles)
    }

    fn fuel_types(&self) -> Result<HashMap<i64, Arc<FuelType>>, StoreError> {
        Ok(self
            .query(FUEL_TYPES, map_fuel_type)?
            .into_iter()
            .map(|fuel| (fuel.id, Arc::new(fuel)))
            .collect())
    }

    fn query<T, F>(&self, sql: &str, map: F) -> Result<Vec<T>, StoreError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn map_car(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get("_id")?,
        name: row.get("car__name")?,
        initial_mileage: row.get("initial_mileage")?,
        color: row.get("color")?,
        refuelings: Vec::new(),
    })
}

fn map_fuel_type(row: &Row<'_>) -> rusqlite::Result<FuelType> {
    Ok(FuelType {
        id: row.get("_id")?,
        name: row.get("fuel_type__name")?,
        category: row
            .get::<_, Option<String>>("category")?
            .unwrap_or_default(),
    })
}

fn map_refueling(
    row: &Row<'_>,
    fuel_types: &HashMap<i64, Arc<FuelType>>,
) -> rusqlite::Result<Refueling> {
    let fuel_type_id: Option<i64> = row.get("fuel_type_id")?;
    Ok(Refueling {
        id: row.get("_id")?,
        vehicle_id: row.get("car_id")?,
        date_ms: row.get("date")?,
        mileage: row.get("mileage")?,
        volume: row.get("volume")?,
        price: row.get("price")?,
        partial: row.get("partial")?,
        note: row.get::<_, Option<String>>("note")?.unwrap_or_default(),
        fuel_type: fuel_type_id.and_then(|id| fuel_types.get(&id).cloned()),
    })
}
