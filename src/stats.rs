use crate::models::{Consumption, Summary};

pub fn summarize(readings: &[Consumption]) -> Summary {
    let total_kwh: f64 = readings.iter().map(|reading| reading.kwh).sum();
    let average_kwh = if readings.is_empty() {
        0.0
    } else {
        total_kwh / readings.len() as f64
    };

    Summary {
        total_kwh,
        average_kwh,
        variation_pct: variation(readings),
        reading_count: readings.len(),
    }
}

// Percentage change between the two most recent readings in insertion order.
// With fewer than two readings, or a previous reading of zero, this reports
// 0.0 so that no non-finite value reaches callers.
fn variation(readings: &[Consumption]) -> f64 {
    if readings.len() < 2 {
        return 0.0;
    }

    let previous = readings[readings.len() - 2].kwh;
    let last = readings[readings.len() - 1].kwh;
    if previous == 0.0 {
        return 0.0;
    }

    (last - previous) / previous * 100.0
}
