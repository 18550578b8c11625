//! Static-field resolution at ticket-creation time.
//!
//! Every static field definition on the source template resolves to a
//! concrete [`StaticValue`] for the new ticket. Counters advance on the
//! template itself; the caller persists the template immediately afterwards
//! so no two tickets observe the same counter value. The clock is injected
//! so resolution is deterministic under test.
//!
//! Date encodings are fixed and locale-independent: day and month are
//! zero-padded two-digit numbers, the year is four digits, and the time
//! stamp is `HHMMSS` on a 24-hour clock with no separators.

use time::OffsetDateTime;

use crate::field::StaticKind;
use crate::template::Template;
use crate::ticket::StaticValue;

/// Inputs to static-field resolution for one new ticket.
#[derive(Debug, Clone, Copy)]
pub struct TicketSeed<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    /// Sequence number assigned to the new ticket by the store.
    pub sequence: u64,
    pub now: OffsetDateTime,
}

#[must_use]
pub fn day_text(now: OffsetDateTime) -> String {
    format!("{:02}", now.day())
}

#[must_use]
pub fn month_text(now: OffsetDateTime) -> String {
    format!("{:02}", u8::from(now.month()))
}

#[must_use]
pub fn year_text(now: OffsetDateTime) -> String {
    format!("{:04}", now.year())
}

#[must_use]
pub fn time_stamp_text(now: OffsetDateTime) -> String {
    format!("{:02}{:02}{:02}", now.hour(), now.minute(), now.second())
}

/// Resolve every static field on `template` to a concrete value for a new
/// ticket. Counter fields are incremented by one on the template and the
/// new value is what the ticket receives; the caller must re-persist the
/// template before the ticket is considered created.
pub fn resolve_statics(template: &mut Template, seed: &TicketSeed<'_>) -> Vec<StaticValue> {
    template
        .statics_mut()
        .iter_mut()
        .map(|field| {
            let text = match &mut field.kind {
                StaticKind::CustomerFirstName => seed.first_name.to_string(),
                StaticKind::CustomerLastName => seed.last_name.to_string(),
                StaticKind::Counter { value, .. } => {
                    *value += 1;
                    value.to_string()
                }
                StaticKind::Day => day_text(seed.now),
                StaticKind::Month => month_text(seed.now),
                StaticKind::Year => year_text(seed.now),
                StaticKind::TimeStamp => time_stamp_text(seed.now),
                StaticKind::TemplateId => seed.sequence.to_string(),
            };
            StaticValue {
                name: field.name.clone(),
                x: field.x,
                y: field.y,
                font_size: field.font_size,
                width: field.width(),
                height: field.height(),
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::{Date, Month, PrimitiveDateTime, Time};

    use super::*;
    use crate::field::StaticField;

    fn fixture_now() -> OffsetDateTime {
        let date = match Date::from_calendar_date(2024, Month::March, 7) {
            Ok(date) => date,
            Err(err) => panic!("fixture date: {err}"),
        };
        let clock = match Time::from_hms(9, 5, 30) {
            Ok(time) => time,
            Err(err) => panic!("fixture time: {err}"),
        };
        PrimitiveDateTime::new(date, clock).assume_utc()
    }

    fn seed(sequence: u64) -> TicketSeed<'static> {
        TicketSeed { first_name: "Ada", last_name: "Lovelace", sequence, now: fixture_now() }
    }

    fn template_with_all_statics() -> Template {
        let mut template = Template::new("/docs/workorder.pdf");
        template.name = "Work Order".to_string();
        template.add_static(StaticKind::CustomerFirstName);
        template.add_static(StaticKind::CustomerLastName);
        template.add_static(StaticKind::Counter { value: 7, reset_annually: true });
        template.add_static(StaticKind::Day);
        template.add_static(StaticKind::Month);
        template.add_static(StaticKind::Year);
        template.add_static(StaticKind::TimeStamp);
        template.add_static(StaticKind::TemplateId);
        template
    }

    fn value_of<'a>(values: &'a [StaticValue], name: &str) -> &'a str {
        match values.iter().find(|v| v.name == name) {
            Some(value) => &value.text,
            None => panic!("missing static value {name}"),
        }
    }

    #[test]
    fn test_resolution_of_every_kind() {
        let mut template = template_with_all_statics();
        let values = resolve_statics(&mut template, &seed(4));

        assert_eq!(value_of(&values, "Customer First Name"), "Ada");
        assert_eq!(value_of(&values, "Customer Last Name"), "Lovelace");
        assert_eq!(value_of(&values, "Counter"), "8");
        assert_eq!(value_of(&values, "Day"), "07");
        assert_eq!(value_of(&values, "Month"), "03");
        assert_eq!(value_of(&values, "Year"), "2024");
        assert_eq!(value_of(&values, "Time Stamp"), "090530");
        assert_eq!(value_of(&values, "Template ID"), "4");
    }

    #[test]
    fn test_counter_advances_once_per_resolution() {
        let mut template = template_with_all_statics();
        let first = resolve_statics(&mut template, &seed(1));
        let second = resolve_statics(&mut template, &seed(2));

        assert_eq!(value_of(&first, "Counter"), "8");
        assert_eq!(value_of(&second, "Counter"), "9");

        // The template's own counter reflects the second value.
        let stored = template.statics().iter().find_map(|field| match field {
            StaticField { kind: StaticKind::Counter { value, .. }, .. } => Some(*value),
            StaticField { .. } => None,
        });
        assert_eq!(stored, Some(9));
    }

    #[test]
    fn test_geometry_carried_onto_values() {
        let mut template = template_with_all_statics();
        assert!(template
            .set_static_position("Counter", 100.0, 200.0, crate::field::PageBounds::a4())
            .is_ok());
        let values = resolve_statics(&mut template, &seed(1));
        let counter = match values.iter().find(|v| v.name == "Counter") {
            Some(value) => value,
            None => panic!("missing counter value"),
        };
        assert!((counter.x - 100.0).abs() < 1e-9);
        assert!((counter.y - 200.0).abs() < 1e-9);
        assert!(counter.width > 0.0);
        assert!(counter.height > 0.0);
    }
}
