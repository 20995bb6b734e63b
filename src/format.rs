//! Human-readable rendering for the CLI. JSON output never goes through here.

use std::fmt::Write as _;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::DisplayConfig;
use crate::portfolio::{ExchangeStatus, PortfolioSnapshot};

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok()
}

fn group_int_digits(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

fn pad_fraction(s: &str, dp: u32) -> String {
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if dp == 0 {
        return int_part.to_string();
    }
    let mut frac: String = frac_part.chars().take(dp as usize).collect();
    while frac.len() < dp as usize {
        frac.push('0');
    }
    format!("{int_part}.{frac}")
}

fn render(value: Decimal, decimals: Option<u32>, display: &DisplayConfig) -> String {
    let rounded = match decimals {
        Some(dp) => value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        None => value,
    };

    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let mut s = rounded.abs().normalize().to_string();
    if let (true, Some(dp)) = (display.currency_fixed_decimals, decimals) {
        s = pad_fraction(&s, dp);
    }
    if display.currency_grouping {
        s = match s.split_once('.') {
            Some((i, f)) => format!("{}.{f}", group_int_digits(i)),
            None => group_int_digits(&s),
        };
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if let Some(symbol) = &display.currency_symbol {
        out.push_str(symbol);
    }
    out.push_str(&s);
    out
}

/// A USD value, rounded per `display.currency_decimals`.
pub fn format_usd(value: f64, display: &DisplayConfig) -> String {
    match to_decimal(value) {
        Some(d) => render(d, display.currency_decimals, display),
        None => value.to_string(),
    }
}

/// A unit price. Never rounded, so sub-cent prices stay visible.
pub fn format_price(price: Option<f64>, display: &DisplayConfig) -> String {
    match price.and_then(to_decimal) {
        Some(d) => render(d, None, display),
        None => "-".to_string(),
    }
}

/// An asset quantity with trailing zeros stripped.
pub fn format_amount(amount: f64) -> String {
    match to_decimal(amount) {
        Some(d) => d.normalize().to_string(),
        None => amount.to_string(),
    }
}

fn status_label(status: &ExchangeStatus) -> String {
    match status {
        ExchangeStatus::Ok => "ok".to_string(),
        ExchangeStatus::Unsupported => "unsupported".to_string(),
        ExchangeStatus::ClientUnavailable { error } => format!("client unavailable: {error}"),
        ExchangeStatus::BalanceFetchFailed { error } => format!("balance fetch failed: {error}"),
        ExchangeStatus::SkippedDeadline => "skipped (deadline)".to_string(),
    }
}

/// Plain-text table of a snapshot: one row per holding, then totals and
/// per-exchange status.
pub fn render_snapshot(snapshot: &PortfolioSnapshot, display: &DisplayConfig) -> String {
    let rows: Vec<[String; 5]> = snapshot
        .details
        .iter()
        .map(|d| {
            [
                d.exchange.to_string(),
                d.asset.clone(),
                format_amount(d.amount),
                format_price(d.price_usd, display),
                format_usd(d.value_usd, display),
            ]
        })
        .collect();

    let header = ["EXCHANGE", "ASSET", "AMOUNT", "PRICE", "VALUE"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 5]| {
        let _ = writeln!(
            out,
            "{:<w0$}  {:<w1$}  {:>w2$}  {:>w3$}  {:>w4$}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            cells[4],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
        );
    };
    line(header);
    for row in &rows {
        line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str(), row[4].as_str()]);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total: {}", format_usd(snapshot.total_usd, display));
    for report in &snapshot.exchanges {
        let _ = writeln!(
            out,
            "  {}: {} ({} holdings)",
            report.exchange,
            status_label(&report.status),
            report.holdings
        );
    }
    out
}
