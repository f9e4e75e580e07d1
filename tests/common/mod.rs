//! Synthetic measurement data shared by unit tests, integration tests and
//! benchmarks

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STATIONS: &[&str] = &[
    "Abha",
    "Addis Ababa",
    "Bridgetown",
    "Bulawayo",
    "Conakry",
    "Cracow",
    "Hamburg",
    "Istanbul",
    "Palembang",
    "St. John's",
    "Tromsø",
    "Zürich",
];

const SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// Reproducible `station;value` lines with values in [-100.0, 100.0]
///
/// Values move in quarter steps so every grouping of the sums is exact.
/// No line is longer than 20 bytes including its newline.
pub fn generated_measurements(lines: usize) -> String {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut out = String::with_capacity(lines * 16);
    for _ in 0..lines {
        let station = STATIONS[rng.random_range(0..STATIONS.len())];
        let quarters: i32 = rng.random_range(-400..=400);
        out.push_str(&format!("{};{:.2}\n", station, quarters as f64 * 0.25));
    }
    out
}
