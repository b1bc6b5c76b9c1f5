use std::fmt;

use serde_json::Value;

/// Currency amounts are plain floating point, exactly as the backend serves them.
/// Fee ledgers here are dashboard summaries, not a ledger of record.
pub type Amount = f64;

/// Amounts closer than this are treated as equal when comparing backend
/// denormalized totals against recomputed ones.
pub const AMOUNT_EPSILON: Amount = 0.005;

/// Coerce a raw JSON field into an amount, degrading to zero.
///
/// Finite numbers pass through, numeric strings are parsed, and everything
/// else (`null`, booleans, objects, arrays, garbage text) becomes `0.0`.
pub fn coerce_amount(value: &Value) -> Amount {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_amount(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Format an amount with two decimals.
/// Example: 1234.5 -> "1234.50", -12.3 -> "-12.30"
pub fn format_amount(amount: Amount) -> String {
    // Avoid printing "-0.00" for tiny negative residues.
    let rounded = (amount * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.2}", rounded)
}

/// Format an amount prefixed with a currency symbol, keeping the sign in front.
/// Example: ("₹", -50.0) -> "-₹50.00"
pub fn format_currency(symbol: &str, amount: Amount) -> String {
    let formatted = format_amount(amount);
    match formatted.strip_prefix('-') {
        Some(abs) => format!("-{}{}", symbol, abs),
        None => format!("{}{}", symbol, formatted),
    }
}

/// Parse a decimal string into an amount.
/// Example: "50.00" -> 50.0, " 12.5 " -> 12.5, "" -> 0.0
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0.0);
    }

    let value: f64 = input.parse().map_err(|_| ParseAmountError::InvalidFormat)?;
    if !value.is_finite() {
        return Err(ParseAmountError::NotFinite);
    }
    Ok(value)
}

/// Clamp an owed amount so an overpayment never shows up as a credit.
pub fn clamp_due(expected: Amount, paid: Amount) -> Amount {
    (expected - paid).max(0.0)
}

/// Percentage of `part` in `whole`, zero when `whole` is not positive.
pub fn percentage(part: Amount, whole: Amount) -> f64 {
    if whole > 0.0 {
        part * 100.0 / whole
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    NotFinite,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
            ParseAmountError::NotFinite => write!(f, "amount must be a finite number"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
