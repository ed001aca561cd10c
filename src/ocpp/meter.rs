//! Meter-sample extraction
//!
//! A MeterValues payload carries a sequence of meter value elements, each
//! with a list of sampled values. This module reduces that structure to the
//! fixed set of readings the session store tracks. Parsing is deliberately
//! lenient: devices in the field omit measurands, send numbers as strings or
//! strings as numbers, and mix units. Junk contributes 0 rather than errors.

use serde::Serialize;
use serde_json::Value;

/// One reduced meter observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeterReading {
    /// Instantaneous active power in watts
    pub power_w: f64,
    /// Cumulative energy register in kWh
    pub energy_kwh: f64,
    /// L1-N voltage in volts
    pub voltage_v: f64,
    /// L1-N import current in amps
    pub current_a: f64,
    /// Temperature in celsius
    pub temperature_c: f64,
}

/// Reduce a `meterValue` array to a single reading; later samples win.
pub fn parse_meter_values(meter_value: &[Value]) -> MeterReading {
    let mut reading = MeterReading::default();

    for element in meter_value {
        let Some(samples) = element.get("sampledValue").and_then(|v| v.as_array()) else {
            continue;
        };
        for sample in samples {
            // Absent measurand means the energy register per OCPP 1.6
            let measurand = sample
                .get("measurand")
                .and_then(|v| v.as_str())
                .unwrap_or("Energy.Active.Import.Register");
            let phase = sample.get("phase").and_then(|v| v.as_str());
            let value = numeric_value(sample.get("value"));

            match measurand {
                "Power.Active.Import" => reading.power_w = value,
                "Energy.Active.Import.Register" => {
                    let unit = sample.get("unit").and_then(|v| v.as_str()).unwrap_or("Wh");
                    reading.energy_kwh = if unit == "kWh" { value } else { value / 1000.0 };
                }
                "Voltage" if phase == Some("L1-N") => reading.voltage_v = value,
                "Current.Import" if phase == Some("L1-N") => reading.current_a = value,
                "Temperature" => reading.temperature_c = value,
                _ => {}
            }
        }
    }

    reading
}

fn numeric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
