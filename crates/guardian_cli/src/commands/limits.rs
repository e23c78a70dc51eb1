use chrono::{DateTime, Utc};
use clap::ValueEnum;

use guardian::github::RateLimitTelemetry;

use crate::commands::build_client;
use crate::config::Config;

/// Output format for tables.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Print the current GraphQL budget.
pub(crate) async fn handle_limits(
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(config, config.scan.workers)?;
    let telemetry = client.rate_limit().await?;
    RateLimitDisplay::from_telemetry(&telemetry, Utc::now()).print(output)
}

/// Rate limit information for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
}

impl RateLimitDisplay {
    pub(crate) fn from_telemetry(telemetry: &RateLimitTelemetry, now: DateTime<Utc>) -> Self {
        let unknown = || "?".to_string();

        let used = telemetry
            .limit
            .zip(telemetry.remaining)
            .map(|(limit, remaining)| limit.saturating_sub(remaining));
        let usage_percent = match (used, telemetry.limit) {
            (Some(used), Some(limit)) if limit > 0 => {
                format!("{:.1}%", f64::from(used) / f64::from(limit) * 100.0)
            }
            _ => unknown(),
        };

        let (reset_at, reset_in) = match telemetry.parse_reset_at() {
            Some(Ok(reset_at)) => {
                let left = reset_at.signed_duration_since(now);
                let reset_in = if left.num_seconds() > 0 {
                    format_duration(left)
                } else {
                    "now".to_string()
                };
                (reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(), reset_in)
            }
            _ => (unknown(), unknown()),
        };

        Self {
            limit: telemetry.limit.map_or_else(unknown, |v| v.to_string()),
            used: used.map_or_else(unknown, |v| v.to_string()),
            remaining: telemetry.remaining.map_or_else(unknown, |v| v.to_string()),
            usage_percent,
            reset_at,
            reset_in,
        }
    }

    pub(crate) fn print(self, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(vec![self]);
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&self)?);
            }
        }
        Ok(())
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let (mins, secs) = (total_secs / 60, total_secs % 60);
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let (hours, mins) = (total_secs / 3600, (total_secs % 3600) / 60);
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-08-11T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn output_format_default_is_table() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn format_duration_handles_seconds_minutes_and_hours() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::seconds(120)), "2m");
        assert_eq!(format_duration(chrono::Duration::seconds(125)), "2m 5s");
        assert_eq!(format_duration(chrono::Duration::seconds(3600)), "1h");
        assert_eq!(format_duration(chrono::Duration::seconds(3900)), "1h 5m");
    }

    #[test]
    fn display_from_full_telemetry() {
        let telemetry = RateLimitTelemetry {
            limit: Some(5000),
            cost: Some(1),
            remaining: Some(3750),
            reset_at: Some("2025-08-11T07:33:48Z".to_string()),
        };
        let display = RateLimitDisplay::from_telemetry(&telemetry, now());

        assert_eq!(display.limit, "5000");
        assert_eq!(display.used, "1250");
        assert_eq!(display.remaining, "3750");
        assert_eq!(display.usage_percent, "25.0%");
        assert_eq!(display.reset_at, "2025-08-11 07:33:48 UTC");
        assert_eq!(display.reset_in, "33m 48s");
    }

    #[test]
    fn display_tolerates_missing_fields() {
        let telemetry = RateLimitTelemetry {
            remaining: Some(10),
            reset_at: Some("not a timestamp".to_string()),
            ..Default::default()
        };
        let display = RateLimitDisplay::from_telemetry(&telemetry, now());

        assert_eq!(display.limit, "?");
        assert_eq!(display.used, "?");
        assert_eq!(display.remaining, "10");
        assert_eq!(display.usage_percent, "?");
        assert_eq!(display.reset_in, "?");
    }

    #[test]
    fn past_reset_is_now() {
        let telemetry = RateLimitTelemetry {
            reset_at: Some("2025-08-11T06:00:00Z".to_string()),
            ..Default::default()
        };
        assert_eq!(
            RateLimitDisplay::from_telemetry(&telemetry, now()).reset_in,
            "now"
        );
    }

    #[test]
    fn print_supports_json_and_table() {
        let display = RateLimitDisplay::from_telemetry(&RateLimitTelemetry::default(), now());
        display.clone().print(OutputFormat::Json).unwrap();
        display.print(OutputFormat::Table).unwrap();
    }
}
