//! Tier guessing from numeric name suffixes (`foo-mk02` -> `foo-mk03`)

use std::sync::LazyLock;

use regex::Regex;

/// Last run of digits that follows at least one non-digit. Text after it is
/// not part of a guess.
static TIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*\D)(\d+)\D*$").expect("tier pattern is valid"));

/// Tier-1 names in some mod sets lack a suffix; their tier-2 sibling is `<name>-mk02`.
const MISSING_TIER_FALLBACK: &str = "-mk02";

/// Add `step` to a digit run, padding with zeros back to its original width.
/// `None` if the result would be negative or does not fit.
fn shift_digits(digits: &str, step: i64) -> Option<String> {
    let value: i64 = digits.parse().ok()?;
    let shifted = value.checked_add(step)?;
    if shifted < 0 {
        return None;
    }
    Some(format!("{:0width$}", shifted, width = digits.len()))
}

fn shift_tier(name: &str, step: i64) -> Option<Option<String>> {
    let caps = TIER_RE.captures(name)?;
    Some(shift_digits(&caps[2], step).map(|digits| format!("{}{}", &caps[1], digits)))
}

/// Guess the name of the next tier up
pub fn guess_upgraded(name: &str) -> Option<String> {
    match shift_tier(name, 1) {
        Some(guess) => guess,
        None => Some(format!("{name}{MISSING_TIER_FALLBACK}")),
    }
}

/// Guess the name of the next tier down. Names without a tier have no guess.
pub fn guess_downgraded(name: &str) -> Option<String> {
    shift_tier(name, -1).flatten()
}
