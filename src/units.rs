//! Unit conversions for loosely formatted tool output.
//!
//! Inventory tools report quantities with trailing unit words (`16 GB`,
//! `3200 MT/s`, `64 bits`, `1.2 V`). Everything numeric in this crate is
//! canonical at parse time: sizes in bytes, clocks in MHz, percentages as
//! fractions in `[0.0, 1.0]`.

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;
pub const TIB: u64 = 1024 * 1024 * 1024 * 1024;

/// Parses a size with a unit word into bytes, e.g. `"16 GB"` or `"8192 MB"`.
///
/// Memory inventory tools use binary multiples regardless of the letter, so
/// `GB` is treated as GiB. Returns `None` for non-numeric values such as
/// `"No Module Installed"`.
pub fn parse_size_bytes(raw: &str) -> Option<u64> {
    let mut parts = raw.split_whitespace();
    let value = parts.next()?.parse::<u64>().ok()?;
    let multiplier = match parts.next() {
        None | Some("B") | Some("bytes") => 1,
        Some("kB") | Some("KB") | Some("KiB") => KIB,
        Some("MB") | Some("MiB") => MIB,
        Some("GB") | Some("GiB") => GIB,
        Some("TB") | Some("TiB") => TIB,
        Some(_) => return None,
    };
    value.checked_mul(multiplier)
}

/// Parses a clock value like `"3200 MT/s"` or `"2667 MHz"` into MHz.
pub fn parse_mhz(raw: &str) -> Option<f64> {
    let mut parts = raw.split_whitespace();
    let value = parts.next()?.parse::<f64>().ok()?;
    match parts.next() {
        None | Some("MHz") | Some("MT/s") => Some(value),
        Some("GHz") | Some("GT/s") => Some(value * 1000.0),
        Some(_) => None,
    }
}

/// Parses a bus width like `"64 bits"` into bits.
pub fn parse_bits(raw: &str) -> Option<u64> {
    let mut parts = raw.split_whitespace();
    let value = parts.next()?.parse::<u64>().ok()?;
    match parts.next() {
        None | Some("bits") | Some("bit") => Some(value),
        Some(_) => None,
    }
}

/// Parses a voltage like `"1.2 V"`.
pub fn parse_volts(raw: &str) -> Option<f64> {
    let mut parts = raw.split_whitespace();
    let value = parts.next()?.parse::<f64>().ok()?;
    match parts.next() {
        None | Some("V") => Some(value),
        Some(_) => None,
    }
}

/// Converts a 0-100 percentage into a fraction, clamped to `[0.0, 1.0]`.
pub fn fraction(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}
