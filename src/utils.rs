use chrono::{Days, NaiveTime};

use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// `1234567.5` in `VND` renders as `1,234,567.5 VND`.
pub fn format_money(amount: Decimal, currency: &str) -> String {
  let text = amount.normalize().abs().to_string();
  let (int, frac) = text.split_once('.').unwrap_or((&text, ""));

  let mut grouped = String::with_capacity(int.len() + int.len() / 3);
  for (i, ch) in int.chars().enumerate() {
    if i > 0 && (int.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(ch);
  }

  let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
  if frac.is_empty() {
    format!("{sign}{grouped} {currency}")
  } else {
    format!("{sign}{grouped}.{frac} {currency}")
  }
}

/// Calendar-month arithmetic. Day overflow clamps to the end of the target
/// month, so Jan 31 + 1 month is the last day of February.
pub fn add_months(date: DateTime, months: i32) -> Result<DateTime> {
  let delta = Months::new(months.unsigned_abs());
  let shifted = if months >= 0 {
    date.checked_add_months(delta)
  } else {
    date.checked_sub_months(delta)
  };
  shifted.ok_or_else(|| Error::InvalidInput("Date out of range".into()))
}

/// Midnight of the first day of `now`'s month.
pub fn start_of_month(now: DateTime) -> DateTime {
  (now.date() - Days::new(u64::from(now.day0()))).and_time(NaiveTime::MIN)
}

pub fn start_of_day(now: DateTime) -> DateTime {
  now.date().and_time(NaiveTime::MIN)
}

pub fn total_pages(total: u64, limit: u64) -> u64 {
  if limit == 0 { 0 } else { total.div_ceil(limit) }
}

/// Maximum message length for Telegram Bot API (4096 characters).
/// We use a slightly smaller limit to account for potential HTML entity expansion.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4000;

/// Splits a long message into chunks at line boundaries. Lines longer than
/// the limit are split on char boundaries.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
  let max_len =
    if max_len == 0 { TELEGRAM_MAX_MESSAGE_LENGTH } else { max_len };

  if text.len() <= max_len {
    return vec![text.to_string()];
  }

  let mut chunks = Vec::new();
  let mut current = String::new();

  for line in text.lines() {
    if !current.is_empty() && current.len() + line.len() + 1 > max_len {
      chunks.push(std::mem::take(&mut current));
    }

    if line.len() > max_len {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
      }
      for ch in line.chars() {
        if current.len() + ch.len_utf8() > max_len {
          chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
      }
    } else {
      if !current.is_empty() {
        current.push('\n');
      }
      current.push_str(line);
    }
  }

  if !current.is_empty() {
    chunks.push(current);
  }

  chunks
}
