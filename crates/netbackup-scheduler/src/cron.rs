//! Compiles a `BackupSchedule`'s frequency/hour/day-of-week into the 7-field
//! (seconds-first) cron expression `tokio-cron-scheduler` expects (§4.I).

use netbackup_core::{BackupSchedule, ScheduleFrequency};

/// UTC cron expression, always firing at minute/second zero.
///
/// `BackupSchedule.day_of_week` is Monday=0..Sunday=6 (spec §3); cron's
/// day-of-week field is Sunday=0..Saturday=6, so weekly schedules remap it.
pub fn build_cron_expression(schedule: &BackupSchedule) -> String {
    match schedule.frequency {
        ScheduleFrequency::Hourly => "0 0 * * * *".to_string(),
        ScheduleFrequency::Daily => format!("0 0 {} * * *", schedule.hour),
        ScheduleFrequency::Weekly => {
            let cron_dow = (schedule.day_of_week as u32 + 1) % 7;
            format!("0 0 {} * * {}", schedule.hour, cron_dow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(frequency: ScheduleFrequency, hour: u8, day_of_week: u8) -> BackupSchedule {
        BackupSchedule::new("test", frequency, hour, day_of_week, None)
    }

    #[test]
    fn hourly_fires_every_hour_at_minute_zero() {
        assert_eq!(
            build_cron_expression(&schedule(ScheduleFrequency::Hourly, 0, 0)),
            "0 0 * * * *"
        );
    }

    #[test]
    fn daily_fires_at_the_configured_hour() {
        assert_eq!(
            build_cron_expression(&schedule(ScheduleFrequency::Daily, 3, 0)),
            "0 0 3 * * *"
        );
    }

    #[test]
    fn weekly_remaps_monday_zero_to_cron_sunday_zero_scheme() {
        // domain Monday=0 -> cron Monday=1
        assert_eq!(
            build_cron_expression(&schedule(ScheduleFrequency::Weekly, 2, 0)),
            "0 0 2 * * 1"
        );
        // domain Sunday=6 -> cron Sunday=0
        assert_eq!(
            build_cron_expression(&schedule(ScheduleFrequency::Weekly, 2, 6)),
            "0 0 2 * * 0"
        );
    }
}
