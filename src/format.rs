//! Locale-aware fixed-precision number formatting.
//!
//! Stateless: every call takes the format by reference, so the summary tables,
//! the file preview stats and the parameter summary all render identically.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub grouping: Option<char>,
    pub decimal: char,
}

impl NumberFormat {
    /// Russian convention: no-break space grouping, comma decimal separator
    pub fn ru() -> Self {
        Self { grouping: Some('\u{a0}'), decimal: ',' }
    }

    pub fn en() -> Self {
        Self { grouping: Some(','), decimal: '.' }
    }

    /// Plain machine-readable output, no grouping
    pub fn plain() -> Self {
        Self { grouping: None, decimal: '.' }
    }

    pub fn for_locale(tag: &str) -> Option<Self> {
        let lang = tag.split(|c: char| c == '-' || c == '_').next().unwrap_or("").to_ascii_lowercase();
        match lang.as_str() {
            "ru" => Some(Self::ru()),
            "en" => Some(Self::en()),
            "c" | "plain" => Some(Self::plain()),
            _ => None,
        }
    }

    /// Format with exactly `decimals` fraction digits.
    pub fn fixed(&self, value: f64, decimals: usize) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            return if value > 0.0 { "∞".to_string() } else { "-∞".to_string() };
        }

        let digits = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (digits.as_str(), None),
        };

        let mut out = String::with_capacity(digits.len() + int_part.len() / 3 + 1);
        let is_zero = digits.bytes().all(|b| b == b'0' || b == b'.');
        if value < 0.0 && !is_zero {
            out.push('-');
        }
        out.push_str(&group_digits(int_part, self.grouping));
        if let Some(frac) = frac_part {
            out.push(self.decimal);
            out.push_str(frac);
        }
        out
    }

    /// Relative change in percent, or `None` when the baseline is zero.
    pub fn percent_change(&self, baseline: f64, current: f64, decimals: usize) -> Option<String> {
        if baseline == 0.0 || !baseline.is_finite() {
            return None;
        }
        Some(self.fixed((current - baseline) / baseline * 100.0, decimals))
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::ru()
    }
}

fn group_digits(int_part: &str, sep: Option<char>) -> String {
    let Some(sep) = sep else {
        return int_part.to_string();
    };
    let len = int_part.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}
