use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Serialize a serde-backed enum into its wire name (e.g. `concluido`).
pub fn serde_enum_name<T: Serialize>(val: &T) -> Option<String> {
    serde_json::to_value(val).ok()?.as_str().map(|s| s.to_string())
}

/// Integer prefix of `raw`: leading whitespace, an optional sign, then digits.
/// Trailing text is ignored ("3 salas" -> 3); no digits at all yields `None`.
/// Values that do not fit in an `i64` saturate.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end]
        .bytes()
        .fold(0i64, |acc, b| acc.saturating_mul(10).saturating_add(i64::from(b - b'0')));
    Some(if negative { -magnitude } else { magnitude })
}

/// Outcome message of a user action. Success and error are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Success(m) => write!(f, "ok: {}", m),
            Notice::Error(m) => write!(f, "error: {}", m),
        }
    }
}

/// Single-slot holder for the latest [`Notice`]: starting a new action clears the
/// previous message, so messages never stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeSlot(Option<Notice>);

impl NoticeSlot {
    pub fn begin(&mut self) {
        self.0 = None;
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.0 = Some(Notice::Success(message.into()));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.0 = Some(Notice::Error(message.into()));
    }

    pub fn current(&self) -> Option<&Notice> {
        self.0.as_ref()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.0, Some(Notice::Error(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::escala::StatusJob;

    #[test]
    fn leading_int_prefix() {
        assert_eq!(parse_leading_int("12"), Some(12));
        assert_eq!(parse_leading_int("  7x"), Some(7));
        assert_eq!(parse_leading_int("-4"), Some(-4));
        assert_eq!(parse_leading_int("+5"), Some(5));
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int("x7"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn notice_slot_is_single_and_exclusive() {
        let mut slot = NoticeSlot::default();
        slot.error("boom");
        assert!(slot.is_error());
        slot.begin();
        assert_eq!(slot.current(), None);
        slot.success("saved");
        assert_eq!(slot.current(), Some(&Notice::Success("saved".into())));
        assert!(!slot.is_error());
    }

    #[test]
    fn enum_names_match_wire_format() {
        assert_eq!(serde_enum_name(&StatusJob::Concluido).as_deref(), Some("concluido"));
    }
}
