//! Best-offer selection.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::quote::SuccessQuote;

/// Relative tolerance under which an amount counts as equal to the best one.
pub fn amount_tolerance() -> Decimal {
    Decimal::new(1, 9)
}

/// Pick the best offer among successful quotes.
///
/// The highest converted amount sets the bar. Every quote within
/// [`amount_tolerance`] of that amount is a contender; among contenders the
/// lower latency wins, then the provider id that sorts first. Tolerance is
/// always measured against the maximum, never between contenders, so the
/// result does not depend on input order. Returns `None` for an empty input.
pub fn select<'a, I>(quotes: I) -> Option<SuccessQuote>
where
    I: IntoIterator<Item = &'a SuccessQuote>,
{
    let candidates: Vec<&SuccessQuote> = quotes.into_iter().collect();
    let best_amount = candidates.iter().map(|q| q.converted_amount()).max()?;

    candidates
        .into_iter()
        .filter(|q| within_tolerance(q.converted_amount(), best_amount))
        .min_by(|a, b| preference(a, b))
        .cloned()
}

/// Ordering among contenders; `Less` means `a` is preferred.
fn preference(a: &SuccessQuote, b: &SuccessQuote) -> Ordering {
    a.latency()
        .cmp(&b.latency())
        .then_with(|| a.provider_id().cmp(b.provider_id()))
        .then_with(|| b.converted_amount().cmp(&a.converted_amount()))
}

fn within_tolerance(amount: Decimal, best: Decimal) -> bool {
    (best - amount).abs() <= best.abs() * amount_tolerance()
}
