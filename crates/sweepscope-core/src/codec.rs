//! Text encoding of published messages
//!
//! Both messages are flat, whitespace-separated number sequences with a
//! trailing space after every value:
//!
//! ```text
//! scan:    <freq_hz> <power_dbm> <freq_hz> <power_dbm> ...
//! signal:  <center_mhz> <bandwidth_mhz> <continuity_pct> <spread_db> ...
//! ```
//!
//! Floats are written with Rust's shortest round-trip representation, so
//! decoding an encoded message yields bit-identical values.

use crate::types::{Sample, SignalSummary, SweepDetections, SweepError, SweepResult};

/// Values per signal descriptor in a signal message.
pub const SIGNAL_FIELDS: usize = 4;

/// Encode one sweep's detections as a scan message.
pub fn encode_scan(detections: &SweepDetections) -> String {
    let mut message = String::with_capacity(detections.len() * 24);
    for s in detections.iter() {
        message.push_str(&format!("{} {} ", s.frequency_hz, s.power_dbm));
    }
    message
}

/// Decode a scan message back into `(frequency, power)` samples, in order.
pub fn decode_scan(message: &str) -> SweepResult<Vec<Sample>> {
    let tokens: Vec<&str> = message.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return Err(SweepError::Decode(format!(
            "scan message has an odd number of values ({})",
            tokens.len()
        )));
    }

    tokens
        .chunks_exact(2)
        .map(|pair| {
            let freq = pair[0]
                .parse::<u64>()
                .map_err(|e| SweepError::Decode(format!("frequency {:?}: {}", pair[0], e)))?;
            let power = parse_f64(pair[1])?;
            Ok(Sample::new(freq, power))
        })
        .collect()
}

/// Encode signal descriptors as a signal message.
pub fn encode_signals(signals: &[SignalSummary]) -> String {
    let mut message = String::with_capacity(signals.len() * 64);
    for s in signals {
        message.push_str(&format!(
            "{} {} {} {} ",
            s.center_frequency_mhz, s.bandwidth_mhz, s.continuity_percent, s.power_spread_dbm
        ));
    }
    message
}

/// Decode a signal message.
pub fn decode_signals(message: &str) -> SweepResult<Vec<SignalSummary>> {
    let values = message
        .split_whitespace()
        .map(parse_f64)
        .collect::<SweepResult<Vec<f64>>>()?;
    if values.len() % SIGNAL_FIELDS != 0 {
        return Err(SweepError::Decode(format!(
            "signal message length {} is not a multiple of {}",
            values.len(),
            SIGNAL_FIELDS
        )));
    }

    Ok(values
        .chunks_exact(SIGNAL_FIELDS)
        .map(|v| SignalSummary {
            center_frequency_mhz: v[0],
            bandwidth_mhz: v[1],
            continuity_percent: v[2],
            power_spread_dbm: v[3],
        })
        .collect())
}

fn parse_f64(token: &str) -> SweepResult<f64> {
    token
        .parse::<f64>()
        .map_err(|e| SweepError::Decode(format!("value {:?}: {}", token, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scan_format() {
        let d = SweepDetections::from_samples(&[
            Sample::new(433_920_000, -62.5),
            Sample::new(433_930_000, -58.1),
        ]);
        assert_eq!(encode_scan(&d), "433920000 -62.5 433930000 -58.1 ");
    }

    #[test]
    fn test_scan_round_trip_preserves_order() {
        let samples: Vec<Sample> = (0..50)
            .map(|i| Sample::new(1_000_000_000 - i * 100_000, -30.0 - i as f64 / 7.0))
            .collect();
        let d = SweepDetections::from_samples(&samples);
        assert_eq!(decode_scan(&encode_scan(&d)).unwrap(), samples);
    }

    #[test]
    fn test_empty_scan() {
        assert_eq!(encode_scan(&SweepDetections::new()), "");
        assert!(decode_scan("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_scan_errors() {
        assert!(matches!(decode_scan("433920000"), Err(SweepError::Decode(_))));
        assert!(matches!(decode_scan("abc -1.0"), Err(SweepError::Decode(_))));
    }

    #[test]
    fn test_signal_message() {
        let signals = vec![
            SignalSummary {
                center_frequency_mhz: 433.005,
                bandwidth_mhz: 0.01,
                continuity_percent: 200.0,
                power_spread_dbm: 2.0,
            },
            SignalSummary {
                center_frequency_mhz: 915.25,
                bandwidth_mhz: 0.5,
                continuity_percent: 75.0,
                power_spread_dbm: 6.5,
            },
        ];
        let msg = encode_signals(&signals);
        assert_eq!(msg, "433.005 0.01 200 2 915.25 0.5 75 6.5 ");
        assert_eq!(decode_signals(&msg).unwrap(), signals);
    }

    #[test]
    fn test_decode_signals_bad_length() {
        assert!(matches!(decode_signals("1 2 3"), Err(SweepError::Decode(_))));
    }
}
