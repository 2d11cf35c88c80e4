use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Collects every failing field of a request so the caller sees them all at once.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(format!("{field}: {message}"));
    }

    /// Sanitised, non-empty string.
    pub fn required(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<String> {
        match value.map(sanitize) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.fail(field, message);
                None
            }
        }
    }

    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        let parsed = value.and_then(parse_date);
        if parsed.is_none() {
            self.fail(field, "Date must be in YYYY-MM-DD format");
        }
        parsed
    }

    pub fn time(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let parsed = value.and_then(normalize_time);
        if parsed.is_none() {
            self.fail(field, "Time must be in HH:MM format");
        }
        parsed
    }

    pub fn at_least(&mut self, field: &str, value: Option<i64>, min: i64, message: &str) -> Option<u32> {
        match value {
            Some(v) if v >= min => u32::try_from(v).ok().or_else(|| {
                self.fail(field, message);
                None
            }),
            _ => {
                self.fail(field, message);
                None
            }
        }
    }

    pub fn at_most(&mut self, field: &str, value: Option<u32>, max: u32, message: &str) -> Option<u32> {
        match value {
            Some(v) if v > max => {
                self.fail(field, message);
                None
            }
            other => other,
        }
    }

    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Trim and strip angle brackets from user-supplied text.
pub fn sanitize(input: &str) -> String {
    input.trim().replace(['<', '>'], "")
}

/// Strict `YYYY-MM-DD` that is also a real calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Accepts `H:MM` or `HH:MM` between 00:00 and 23:59 and returns zero-padded `HH:MM`.
pub fn normalize_time(s: &str) -> Option<String> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-06-01"),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
        assert_eq!(parse_date("2025-6-01"), None);
        assert_eq!(parse_date("2025/06/01"), None);
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("16:00").as_deref(), Some("16:00"));
        assert_eq!(normalize_time("9:30").as_deref(), Some("09:30"));
        assert_eq!(normalize_time("24:00"), None);
        assert_eq!(normalize_time("12:60"), None);
        assert_eq!(normalize_time("12:5"), None);
        assert_eq!(normalize_time("ab:cd"), None);
        assert_eq!(normalize_time("1600"), None);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  <b>Team</b> "), "bTeam/b");
    }

    #[test]
    fn test_checks_collect_every_failure() {
        let mut checks = Checks::new();
        checks.required("team1", Some("   "), "Team 1 name is required");
        checks.date("date", Some("01-06-2025"));
        checks.time("time", Some("16:00"));
        checks.at_least("maxPlayers", Some(1), 2, "Maximum players must be at least 2");
        match checks.finish() {
            Err(Error::Validation(errors)) => {
                assert_eq!(
                    errors,
                    vec![
                        "team1: Team 1 name is required",
                        "date: Date must be in YYYY-MM-DD format",
                        "maxPlayers: Maximum players must be at least 2",
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_at_most() {
        let mut checks = Checks::new();
        assert_eq!(checks.at_most("maxPlayers", Some(50), 50, "too many"), Some(50));
        assert_eq!(checks.at_most("maxPlayers", None, 50, "too many"), None);
        assert!(checks.finish().is_ok());

        let mut checks = Checks::new();
        assert_eq!(checks.at_most("maxPlayers", Some(51), 50, "too many"), None);
        assert!(checks.finish().is_err());
    }
}
