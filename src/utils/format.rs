use anyhow::{Context, Result, bail};

/// Convert a raw base-unit amount (integer string with `decimals` fractional
/// digits, e.g. yoctoNEAR with 24) into a human-readable decimal string.
/// Trailing zeros in the fraction are trimmed.
///
/// # Examples
/// ```
/// use near_block_scanner::utils::format::format_amount;
///
/// assert_eq!(format_amount("5000000000000000000000000", 24).unwrap(), "5");
/// assert_eq!(format_amount("1500000000000000000000000", 24).unwrap(), "1.5");
/// assert_eq!(format_amount("0", 24).unwrap(), "0");
/// ```
pub fn format_amount(raw: &str, decimals: u32) -> Result<String> {
    if decimals > 38 {
        bail!("Unsupported decimals: {}", decimals);
    }

    let value: u128 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid raw amount: {}", raw))?;

    if decimals == 0 {
        return Ok(value.to_string());
    }

    let scale = 10u128.pow(decimals);
    let integral = value / scale;
    let fraction = value % scale;

    if fraction == 0 {
        return Ok(integral.to_string());
    }

    let mut fraction_digits = format!("{:0width$}", fraction, width = decimals as usize);
    while fraction_digits.ends_with('0') {
        fraction_digits.pop();
    }

    Ok(format!("{}.{}", integral, fraction_digits))
}
