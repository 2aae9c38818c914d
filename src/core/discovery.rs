//! Home Assistant MQTT discovery: the sensor catalogue, device identity and topic layout.
//!
//! Every vehicle becomes one Home Assistant device with one sensor per
//! [`Measurement`]. Sensors read their value out of the shared state topic
//! through a `value_json` template, so one state publish updates them all.

use serde::Serialize;

/// Prefix of every device identifier.
pub const DEVICE_ID_PREFIX: &str = "car_report_";
/// Reported as the device manufacturer.
pub const MANUFACTURER: &str = "CarReport";

/// One sensor announced per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Key of the value in the state payload. Also the last topic level.
    pub key: &'static str,
    pub name: &'static str,
    /// Material Design icon name, without the `mdi:` prefix.
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub device_class: Option<&'static str>,
}

impl Measurement {
    const fn text(key: &'static str, name: &'static str, icon: &'static str) -> Self {
        Self {
            key,
            name,
            icon,
            unit: None,
            state_class: None,
            device_class: None,
        }
    }

    const fn numeric(
        key: &'static str,
        name: &'static str,
        icon: &'static str,
        unit: &'static str,
        device_class: &'static str,
    ) -> Self {
        Self {
            key,
            name,
            icon,
            unit: Some(unit),
            state_class: Some("measurement"),
            device_class: Some(device_class),
        }
    }
}

pub static MEASUREMENTS: &[Measurement] = &[
    Measurement::text("name", "Name", "car-outline"),
    Measurement::text("color", "Color", "palette"),
    Measurement::numeric("mileage", "Mileage", "counter", "km", "distance"),
    Measurement::text("fuel_type", "Fuel type", "gas-station-outline"),
    Measurement::numeric("volume", "Volume", "fuel", "L", "volume"),
    Measurement::numeric("price", "Total price", "currency-eur", "€", "monetary"),
    Measurement::numeric(
        "price_per_unit",
        "Price per unit",
        "currency-eur",
        "€/L",
        "monetary",
    ),
];

/// Identity of one vehicle on the Home Assistant side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    /// `car_report_` + display name, whitespace replaced by `_`.
    pub id: String,
    /// Lowercase form of [`id`](Self::id), used in topics and entity ids.
    pub lower: String,
}

impl DeviceId {
    pub fn from_name(name: &str) -> Self {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        let id = format!("{DEVICE_ID_PREFIX}{sanitized}");
        let lower = id.to_lowercase();
        Self { id, lower }
    }
}

/// Topic layout under a discovery prefix.
#[derive(Debug, Clone)]
pub struct Topics<'a> {
    prefix: &'a str,
    device: &'a DeviceId,
}

impl<'a> Topics<'a> {
    pub fn new(prefix: &'a str, device: &'a DeviceId) -> Self {
        Self { prefix, device }
    }

    pub fn config(&self, measurement: &Measurement) -> String {
        format!(
            "{}/sensor/{}/{}/config",
            self.prefix, self.device.lower, measurement.key
        )
    }

    pub fn state(&self) -> String {
        format!("{}/sensor/{}/state", self.prefix, self.device.lower)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor<'a> {
    /// Model, the vehicle's display name.
    pub mdl: &'a str,
    pub name: &'a str,
    /// Manufacturer.
    pub mf: &'static str,
    pub identifiers: [&'a str; 2],
}

/// Sensor config message. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryPayload<'a> {
    pub name: &'static str,
    pub value_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    pub icon: String,
    pub state_topic: String,
    pub object_id: String,
    pub unique_id: String,
    pub device: DeviceDescriptor<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
}

impl<'a> DiscoveryPayload<'a> {
    pub fn new(
        measurement: &Measurement,
        vehicle_name: &'a str,
        device: &'a DeviceId,
        state_topic: String,
    ) -> Self {
        let entity_id = format!("{}_{}", device.lower, measurement.key);
        Self {
            name: measurement.name,
            value_template: format!("{{{{ value_json.{} }}}}", measurement.key),
            unit_of_measurement: measurement.unit,
            icon: format!("mdi:{}", measurement.icon),
            state_topic,
            object_id: entity_id.clone(),
            unique_id: entity_id,
            device: DeviceDescriptor {
                mdl: vehicle_name,
                name: &device.lower,
                mf: MANUFACTURER,
                identifiers: [&device.id, &device.lower],
            },
            state_class: measurement.state_class,
            device_class: measurement.device_class,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(key: &str) -> &'static Measurement {
        MEASUREMENTS.iter().find(|m| m.key == key).unwrap()
    }

    #[test]
    fn device_id_replaces_whitespace_only() {
        let device = DeviceId::from_name("My Car");
        assert_eq!(device.id, "car_report_My_Car");
        assert_eq!(device.lower, "car_report_my_car");

        let device = DeviceId::from_name("Golf\tGTI  Ö-7");
        assert_eq!(device.id, "car_report_Golf_GTI__Ö-7");
        assert_eq!(device.lower, "car_report_golf_gti__ö-7");
    }

    #[test]
    fn catalogue_keys_match_state_payload() {
        let keys: Vec<_> = MEASUREMENTS.iter().map(|m| m.key).collect();
        assert_eq!(
            keys,
            [
                "name",
                "color",
                "mileage",
                "fuel_type",
                "volume",
                "price",
                "price_per_unit"
            ]
        );
    }

    #[test]
    fn text_sensors_have_no_state_class() {
        for key in ["name", "color", "fuel_type"] {
            let m = measurement(key);
            assert_eq!(m.state_class, None, "{key}");
            assert_eq!(m.device_class, None, "{key}");
            assert_eq!(m.unit, None, "{key}");
        }
        for key in ["mileage", "volume", "price", "price_per_unit"] {
            assert_eq!(measurement(key).state_class, Some("measurement"), "{key}");
        }
    }

    #[test]
    fn topics_use_lowercase_device_id() {
        let device = DeviceId::from_name("My Car");
        let topics = Topics::new("homeassistant", &device);

        assert_eq!(
            topics.config(measurement("mileage")),
            "homeassistant/sensor/car_report_my_car/mileage/config"
        );
        assert_eq!(
            topics.state(),
            "homeassistant/sensor/car_report_my_car/state"
        );
        assert_eq!(
            Topics::new("ha/test", &device).state(),
            "ha/test/sensor/car_report_my_car/state"
        );
    }

    #[test]
    fn numeric_sensor_payload_is_byte_exact() {
        let device = DeviceId::from_name("My Car");
        let topics = Topics::new("homeassistant", &device);
        let payload =
            DiscoveryPayload::new(measurement("mileage"), "My Car", &device, topics.state());

        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            concat!(
                r#"{"name":"Mileage","value_template":"{{ value_json.mileage }}","#,
                r#""unit_of_measurement":"km","icon":"mdi:counter","#,
                r#""state_topic":"homeassistant/sensor/car_report_my_car/state","#,
                r#""object_id":"car_report_my_car_mileage","unique_id":"car_report_my_car_mileage","#,
                r#""device":{"mdl":"My Car","name":"car_report_my_car","mf":"CarReport","#,
                r#""identifiers":["car_report_My_Car","car_report_my_car"]},"#,
                r#""state_class":"measurement","device_class":"distance"}"#
            )
        );
    }

    #[test]
    fn text_sensor_payload_omits_optional_fields() {
        let device = DeviceId::from_name("My Car");
        let topics = Topics::new("homeassistant", &device);
        let payload =
            DiscoveryPayload::new(measurement("fuel_type"), "My Car", &device, topics.state());

        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            concat!(
                r#"{"name":"Fuel type","value_template":"{{ value_json.fuel_type }}","#,
                r#""icon":"mdi:gas-station-outline","#,
                r#""state_topic":"homeassistant/sensor/car_report_my_car/state","#,
                r#""object_id":"car_report_my_car_fuel_type","unique_id":"car_report_my_car_fuel_type","#,
                r#""device":{"mdl":"My Car","name":"car_report_my_car","mf":"CarReport","#,
                r#""identifiers":["car_report_My_Car","car_report_my_car"]}}"#
            )
        );
    }

    #[test]
    fn unit_symbols_are_utf8() {
        let device = DeviceId::from_name("Car");
        let payload = DiscoveryPayload::new(
            measurement("price_per_unit"),
            "Car",
            &device,
            Topics::new("homeassistant", &device).state(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["unit_of_measurement"], "€/L");
        assert_eq!(json["device_class"], "monetary");
    }
}
