//! In-process weather station simulator.
//!
//! Produces the same wire format as real hardware over an in-memory duplex
//! stream, so the whole stack from frame sync to analysis runs unmodified
//! against it. Conditions drift around a calm baseline with occasional
//! thermal pulses: temperature climbing while wind dies down.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use windsock_types::{MeasurementBatch, NodeMeasurement};

use crate::transport::BoxedLink;

const BASELINE_TEMP: f64 = 22.0;
const BASELINE_WIND: f64 = 3.0;
/// Chance per tick of a thermal pulse starting.
const PULSE_CHANCE: f64 = 0.02;
/// How many ticks a thermal pulse lasts.
const PULSE_TICKS: u32 = 45;
const TICK: Duration = Duration::from_secs(1);

/// Open a simulator link: the returned stream yields one framed measurement
/// per second until the link is dropped.
#[must_use]
pub fn spawn_link() -> BoxedLink {
    spawn_link_with_tick(TICK)
}

/// Open a simulator link with a custom measurement interval.
#[must_use]
pub fn spawn_link_with_tick(tick: Duration) -> BoxedLink {
    let (near, far) = tokio::io::duplex(4096);
    tokio::spawn(run(far, tick));
    Box::new(near)
}

async fn run(mut link: tokio::io::DuplexStream, tick: Duration) {
    debug!("simulator started");
    let mut temperature = BASELINE_TEMP;
    let mut wind = BASELINE_WIND;
    let mut pulse_remaining = 0_u32;

    loop {
        tokio::time::sleep(tick).await;

        if pulse_remaining > 0 {
            pulse_remaining -= 1;
            temperature += rand::random_range(0.04..0.06);
            wind -= rand::random_range(0.15..0.25);
            if wind < 0.1 {
                // The thermal has consumed the surface wind; cycle over.
                pulse_remaining = 0;
            }
        } else if rand::random::<f64>() < PULSE_CHANCE {
            trace!("thermal pulse starting");
            pulse_remaining = PULSE_TICKS;
        } else {
            // Drift back toward the baseline with a little jitter.
            temperature += (BASELINE_TEMP - temperature) * 0.1 + rand::random_range(-0.05..0.05);
            wind += (BASELINE_WIND - wind) * 0.1 + rand::random_range(-0.1..0.1);
        }
        wind = wind.max(0.1);

        let frame = encode_frame(wind, temperature);
        if link.write_all(frame.as_bytes()).await.is_err() {
            debug!("simulator link closed");
            break;
        }
    }
}

fn encode_frame(wind_speed: f64, temperature: f64) -> String {
    let batch = MeasurementBatch {
        version: 1,
        number_of_nodes: 1,
        measurements: vec![NodeMeasurement {
            wind_speed,
            temperature,
            node_id: 0,
        }],
    };
    // The batch is plain data; serialization cannot fail.
    let json = serde_json::to_string(&batch).unwrap_or_default();
    format!("WS_{json}_end")
}
