use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision
/// issues. €12.50 = 1250 cents. Balances, prices and the stock cost basis
/// all use this type.
pub type Cents = i64;

/// Coffee mass is tracked in whole grams. A dose is a handful of grams, so
/// sub-gram precision buys nothing.
pub type Grams = i64;

/// Format cents as a human-readable currency string.
/// Example: 1250 -> "12.50", -50 -> "-0.50"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into cents.
/// Example: "12.50" -> 1250, "5" -> 500, "0.5" -> 50
/// More than two decimal places are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, input) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimal)) => (units, decimal),
        None => (input, ""),
    };

    if !decimal_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        if decimal_str.is_empty() {
            return Err(ParseCentsError::InvalidFormat);
        }
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        // A single digit like "5" means 50 cents
        1 => {
            decimal_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        _ => decimal_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units * 100 + decimal_cents;
    Ok(if negative { -cents } else { cents })
}

/// Integer division rounded half away from zero. The denominator must be
/// positive; callers guard against empty stock before dividing.
pub fn div_round(numerator: i128, denominator: i128) -> Cents {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as Cents
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
