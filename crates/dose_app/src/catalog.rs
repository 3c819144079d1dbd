use dose_core::display::Translator;

/// Built-in English strings for the display helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl Translator for EnglishCatalog {
    fn translate(&self, key: &str) -> String {
        let text = match key {
            "schedule.kind.everyDay" => "Every day",
            "schedule.kind.everyOtherDay" => "Every other day",
            "schedule.kind.everyXDays" => "Every {days} days",
            "schedule.kind.specificWeekDays" => "On {days}",
            "schedule.kind.onlyAsNeeded" => "Only as needed",
            "schedule.nextDose" => "Next dose",
            "schedule.overdue" => "Overdue",
            "schedule.asNeeded" => "As needed",
            "schedule.finished" => "Finished",
            "weekday.sun" => "Sun",
            "weekday.mon" => "Mon",
            "weekday.tue" => "Tue",
            "weekday.wed" => "Wed",
            "weekday.thu" => "Thu",
            "weekday.fri" => "Fri",
            "weekday.sat" => "Sat",
            other => other,
        };
        text.to_string()
    }
}
