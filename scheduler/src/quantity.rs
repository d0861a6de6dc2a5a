//! Arithmetic over Kubernetes quantity strings.
//!
//! `k8s-openapi` keeps quantities opaque; the fit check needs to sum
//! per-container requests and compare them against allocatable capacity.
//! Parsing to integer milli-units keeps "500m" + "500m" == "1" exact.

/// Multiplier table for the decimal and binary suffixes.
const SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("m", 0.001),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid quantity {0:?}")]
    Invalid(String),
}

/// Parses a quantity string into milli-units, so "1" == 1000, "500m" ==
/// 500 and "1Ki" == 1_024_000. i128 leaves headroom for the Ei range.
pub fn parse_millis(quantity: &str) -> Result<i128, QuantityError> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return Err(QuantityError::Invalid(quantity.to_string()));
    }

    let (number, multiplier) = split_suffix(quantity);
    let value: f64 = number
        .parse()
        .map_err(|_| QuantityError::Invalid(quantity.to_string()))?;
    if !value.is_finite() {
        return Err(QuantityError::Invalid(quantity.to_string()));
    }
    Ok((value * multiplier * 1000.0).round() as i128)
}

fn split_suffix(quantity: &str) -> (&str, f64) {
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return (number, *multiplier);
        }
    }
    (quantity, 1.0)
}
