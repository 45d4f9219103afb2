use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Warm,
    Natural,
    #[default]
    Both,
}

/// One schedule window as received from the client. Times are `HH:MM` or
/// ISO-8601 datetime strings; records missing either time are kept in the
/// list but ignored by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "lightType", default)]
    pub light_type: LightType,
    #[serde(default = "default_brightness")]
    pub brightness: i64,
}

fn default_brightness() -> i64 {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelTarget {
    pub active: bool,
    pub brightness: u8,
}

impl ChannelTarget {
    fn engage(&mut self, brightness: u8) {
        self.active = true;
        self.brightness = self.brightness.max(brightness);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightTargets {
    pub warm: ChannelTarget,
    pub natural: ChannelTarget,
}

/// Parses `"HH:MM"` or an ISO-8601 datetime to minutes since midnight,
/// keeping only the time-of-day component. Anything unrecognized resolves
/// to minute 0; this is long-standing client-facing behavior, not an error.
pub fn parse_time_to_minutes(raw: &str) -> u16 {
    if raw.len() <= 5 && raw.contains(':') {
        return clock_minutes(raw).unwrap_or_else(|| {
            debug!(raw, "unparseable clock time, defaulting to minute 0");
            0
        });
    }

    if let Some((_, time_part)) = raw.split_once('T') {
        // Drop the timezone offset and sub-minute precision.
        let clock = time_part.split(['Z', '+', '-', '.']).next().unwrap_or("");
        return clock_minutes(clock).unwrap_or_else(|| {
            debug!(raw, "unparseable datetime, defaulting to minute 0");
            0
        });
    }

    debug!(raw, "unrecognized time format, defaulting to minute 0");
    0
}

fn clock_minutes(text: &str) -> Option<u16> {
    let mut parts = text.split(':');
    let hours: u16 = parts.next()?.parse().ok()?;
    let minutes: u16 = parts.next()?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Computes the required state of both channels for the given time of day.
///
/// A window with `end <= start` crosses midnight and is active when
/// `now >= start || now < end`; otherwise it is active when
/// `start <= now < end`. The end boundary is exclusive in both cases. When
/// several active windows cover the same channel the highest brightness
/// wins, regardless of list order.
pub fn resolve(schedules: &[ScheduleRecord], now_minutes: u16) -> LightTargets {
    let mut targets = LightTargets::default();

    for record in schedules {
        let start_raw = record.start_time.as_deref().filter(|raw| !raw.is_empty());
        let end_raw = record.end_time.as_deref().filter(|raw| !raw.is_empty());
        let (Some(start_raw), Some(end_raw)) = (start_raw, end_raw) else {
            debug!(?record, "schedule record missing start or end time, skipping");
            continue;
        };

        let start = parse_time_to_minutes(start_raw);
        let end = parse_time_to_minutes(end_raw);

        let active = if end <= start {
            now_minutes >= start || now_minutes < end
        } else {
            start <= now_minutes && now_minutes < end
        };
        if !active {
            continue;
        }

        let brightness = record.brightness.clamp(0, 100) as u8;
        if matches!(record.light_type, LightType::Warm | LightType::Both) {
            targets.warm.engage(brightness);
        }
        if matches!(record.light_type, LightType::Natural | LightType::Both) {
            targets.natural.engage(brightness);
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(start: &str, end: &str, light_type: LightType, brightness: i64) -> ScheduleRecord {
        ScheduleRecord {
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            light_type,
            brightness,
        }
    }

    #[test]
    fn parses_clock_and_datetime_forms() {
        assert_eq!(parse_time_to_minutes("14:30"), 870);
        assert_eq!(parse_time_to_minutes("00:00"), 0);
        assert_eq!(parse_time_to_minutes("2023-10-27T08:05:00Z"), 485);
        assert_eq!(parse_time_to_minutes("2023-10-27T08:05:00.250+02:00"), 485);
        assert_eq!(parse_time_to_minutes("2023-10-27T08:05:00-07:00"), 485);
    }

    #[test]
    fn unparseable_input_defaults_to_minute_zero() {
        assert_eq!(parse_time_to_minutes("noon"), 0);
        assert_eq!(parse_time_to_minutes("25:99"), 0);
        assert_eq!(parse_time_to_minutes("14.30"), 0);
        assert_eq!(parse_time_to_minutes(""), 0);
    }

    #[test]
    fn brightest_overlapping_schedule_wins_in_either_order() {
        let dim = record("08:00", "12:00", LightType::Warm, 30);
        let bright = record("09:00", "11:00", LightType::Warm, 80);

        for schedules in [
            vec![dim.clone(), bright.clone()],
            vec![bright.clone(), dim.clone()],
        ] {
            let targets = resolve(&schedules, 10 * 60);
            assert_eq!(
                targets.warm,
                ChannelTarget {
                    active: true,
                    brightness: 80
                }
            );
        }
    }

    #[test]
    fn midnight_wrapping_window() {
        let schedules = vec![record("22:00", "06:00", LightType::Both, 50)];

        assert!(resolve(&schedules, 23 * 60).warm.active);
        assert!(resolve(&schedules, 60).warm.active);
        assert!(!resolve(&schedules, 12 * 60).warm.active);
        // End boundary is exclusive.
        assert!(!resolve(&schedules, 6 * 60).warm.active);
    }

    #[test]
    fn start_equal_to_end_covers_the_whole_day() {
        let schedules = vec![record("08:00", "08:00", LightType::Natural, 40)];

        assert!(resolve(&schedules, 0).natural.active);
        assert!(resolve(&schedules, 12 * 60).natural.active);
        assert!(resolve(&schedules, 23 * 60 + 59).natural.active);
        // The boundary instant itself: now < end fails and now >= start holds,
        // so 08:00 is still covered by the wrap branch.
        assert!(resolve(&schedules, 8 * 60).natural.active);
    }

    #[test]
    fn both_applies_to_both_channels() {
        let schedules = vec![record("10:00", "20:00", LightType::Both, 70)];
        let targets = resolve(&schedules, 15 * 60);

        assert_eq!(targets.warm.brightness, 70);
        assert_eq!(targets.natural.brightness, 70);
        assert!(targets.warm.active && targets.natural.active);
    }

    #[test]
    fn records_without_times_are_skipped() {
        let schedules = vec![
            ScheduleRecord {
                start_time: None,
                end_time: Some("23:59".to_string()),
                light_type: LightType::Warm,
                brightness: 100,
            },
            record("", "23:59", LightType::Warm, 100),
        ];

        assert_eq!(resolve(&schedules, 12 * 60), LightTargets::default());
    }

    #[test]
    fn brightness_is_clamped_on_use() {
        let schedules = vec![record("00:00", "23:59", LightType::Warm, 250)];
        assert_eq!(resolve(&schedules, 12 * 60).warm.brightness, 100);

        let schedules = vec![record("00:00", "23:59", LightType::Warm, -5)];
        let warm = resolve(&schedules, 12 * 60).warm;
        assert!(warm.active);
        assert_eq!(warm.brightness, 0);
    }

    #[test]
    fn unrecognized_start_resolves_to_minute_zero() {
        // Start falls back to 0, end stays 06:00: plain same-day window.
        let schedules = vec![record("whenever", "06:00", LightType::Warm, 60)];

        assert!(resolve(&schedules, 3 * 60).warm.active);
        assert!(!resolve(&schedules, 7 * 60).warm.active);
    }

    #[test]
    fn records_deserialize_with_defaults_and_round_trip() {
        let parsed: Vec<ScheduleRecord> =
            serde_json::from_str(r#"[{"startTime":"08:00","endTime":"17:00"}]"#).unwrap();
        assert_eq!(parsed[0].light_type, LightType::Both);
        assert_eq!(parsed[0].brightness, 100);

        let full = vec![record("22:00", "06:00", LightType::Natural, 35)];
        let json = serde_json::to_string(&full).unwrap();
        let reloaded: Vec<ScheduleRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, full);
    }
}
