//! Persistence codec for template and ticket aggregates.
//!
//! The wire format is a nested JSON document headed by a format version:
//! one named section per aggregate scalar and one repeated element per
//! field instance, tagged by field kind. Loading is all-or-nothing — a
//! missing or ill-typed section fails the whole load and never partially
//! populates an aggregate. The codec only (de)serializes structure; it
//! never interprets field semantics (it does not know that counters
//! increment).
//!
//! Counter values travel as decimal text, as do all resolved static
//! values. Line-break markers inside textbox text are ordinary character
//! data; the codec adds no escaping of its own.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ticketsmith_core::ticket::{CheckboxValue, StaticValue, TextboxValue};
use ticketsmith_core::{Checkbox, StaticField, StaticKind, Template, Textbox, Ticket};

/// Format tag written at the head of every persisted document.
pub const FORMAT_VERSION: &str = "ticketsmith.v1";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to write document: {0}")]
    Write(#[source] serde_json::Error),
    #[error("malformed document: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum StaticKindDoc {
    CustomerFirstName,
    CustomerLastName,
    Counter,
    Day,
    Month,
    Year,
    TimeStamp,
    TemplateId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum FieldDoc {
    #[serde(rename_all = "camelCase")]
    Textbox {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        priority: u32,
        required: bool,
        width: f64,
        height: f64,
    },
    #[serde(rename_all = "camelCase")]
    Checkbox {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        priority: u32,
        required: bool,
        scale: f64,
    },
    #[serde(rename_all = "camelCase")]
    Static {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        static_kind: StaticKindDoc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        counter_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reset_annually: Option<bool>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateDoc {
    format: String,
    name: String,
    document_path: String,
    fields: Vec<FieldDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum TicketFieldDoc {
    #[serde(rename_all = "camelCase")]
    Textbox {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        priority: u32,
        required: bool,
        width: f64,
        height: f64,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Checkbox {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        priority: u32,
        required: bool,
        scale: f64,
        checked: bool,
    },
    #[serde(rename_all = "camelCase")]
    Static {
        name: String,
        x: f64,
        y: f64,
        font_size: f64,
        width: f64,
        height: f64,
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketDoc {
    format: String,
    document_path: String,
    customer_first_name: String,
    customer_last_name: String,
    fields: Vec<TicketFieldDoc>,
}

fn static_to_doc(field: &StaticField) -> FieldDoc {
    let (static_kind, counter_value, reset_annually) = match &field.kind {
        StaticKind::CustomerFirstName => (StaticKindDoc::CustomerFirstName, None, None),
        StaticKind::CustomerLastName => (StaticKindDoc::CustomerLastName, None, None),
        StaticKind::Counter { value, reset_annually } => {
            (StaticKindDoc::Counter, Some(value.to_string()), Some(*reset_annually))
        }
        StaticKind::Day => (StaticKindDoc::Day, None, None),
        StaticKind::Month => (StaticKindDoc::Month, None, None),
        StaticKind::Year => (StaticKindDoc::Year, None, None),
        StaticKind::TimeStamp => (StaticKindDoc::TimeStamp, None, None),
        StaticKind::TemplateId => (StaticKindDoc::TemplateId, None, None),
    };
    FieldDoc::Static {
        name: field.name.clone(),
        x: field.x,
        y: field.y,
        font_size: field.font_size,
        static_kind,
        counter_value,
        reset_annually,
    }
}

fn static_from_doc(
    name: String,
    x: f64,
    y: f64,
    font_size: f64,
    static_kind: StaticKindDoc,
    counter_value: Option<String>,
    reset_annually: Option<bool>,
) -> Result<StaticField, CodecError> {
    let kind = match static_kind {
        StaticKindDoc::CustomerFirstName => StaticKind::CustomerFirstName,
        StaticKindDoc::CustomerLastName => StaticKind::CustomerLastName,
        StaticKindDoc::Counter => {
            let raw = counter_value.ok_or_else(|| {
                CodecError::Malformed(format!("counter {name} is missing its value"))
            })?;
            let value: u64 = raw.parse().map_err(|_| {
                CodecError::Malformed(format!(
                    "counter {name} value is not a non-negative integer: {raw}"
                ))
            })?;
            StaticKind::Counter { value, reset_annually: reset_annually.unwrap_or(false) }
        }
        StaticKindDoc::Day => StaticKind::Day,
        StaticKindDoc::Month => StaticKind::Month,
        StaticKindDoc::Year => StaticKind::Year,
        StaticKindDoc::TimeStamp => StaticKind::TimeStamp,
        StaticKindDoc::TemplateId => StaticKind::TemplateId,
    };
    Ok(StaticField { name, x, y, font_size, kind })
}

fn template_to_doc(template: &Template) -> TemplateDoc {
    let mut fields = Vec::with_capacity(
        template.statics().len() + template.textboxes().len() + template.checkboxes().len(),
    );
    fields.extend(template.statics().iter().map(static_to_doc));
    fields.extend(template.textboxes().iter().map(|t| FieldDoc::Textbox {
        name: t.name.clone(),
        x: t.x,
        y: t.y,
        font_size: t.font_size,
        priority: t.priority,
        required: t.required,
        width: t.width,
        height: t.height,
    }));
    fields.extend(template.checkboxes().iter().map(|c| FieldDoc::Checkbox {
        name: c.name.clone(),
        x: c.x,
        y: c.y,
        font_size: c.font_size,
        priority: c.priority,
        required: c.required,
        scale: c.scale,
    }));
    TemplateDoc {
        format: FORMAT_VERSION.to_string(),
        name: template.name.clone(),
        document_path: template.document_path.clone(),
        fields,
    }
}

fn check_format(found: &str) -> Result<(), CodecError> {
    if found == FORMAT_VERSION {
        Ok(())
    } else {
        Err(CodecError::Malformed(format!("unsupported format: {found}")))
    }
}

fn template_from_doc(doc: TemplateDoc) -> Result<Template, CodecError> {
    check_format(&doc.format)?;
    let mut textboxes = Vec::new();
    let mut checkboxes = Vec::new();
    let mut statics = Vec::new();
    for field in doc.fields {
        match field {
            FieldDoc::Textbox { name, x, y, font_size, priority, required, width, height } => {
                textboxes.push(Textbox {
                    name,
                    x,
                    y,
                    font_size,
                    priority,
                    required,
                    width,
                    height,
                });
            }
            FieldDoc::Checkbox { name, x, y, font_size, priority, required, scale } => {
                checkboxes.push(Checkbox { name, x, y, font_size, priority, required, scale });
            }
            FieldDoc::Static {
                name,
                x,
                y,
                font_size,
                static_kind,
                counter_value,
                reset_annually,
            } => {
                statics.push(static_from_doc(
                    name,
                    x,
                    y,
                    font_size,
                    static_kind,
                    counter_value,
                    reset_annually,
                )?);
            }
        }
    }
    Ok(Template::from_parts(doc.name, doc.document_path, textboxes, checkboxes, statics))
}

fn ticket_to_doc(ticket: &Ticket) -> TicketDoc {
    let mut fields = Vec::with_capacity(
        ticket.statics().len() + ticket.textboxes().len() + ticket.checkboxes().len(),
    );
    fields.extend(ticket.statics().iter().map(|s| TicketFieldDoc::Static {
        name: s.name.clone(),
        x: s.x,
        y: s.y,
        font_size: s.font_size,
        width: s.width,
        height: s.height,
        text: s.text.clone(),
    }));
    fields.extend(ticket.textboxes().iter().map(|t| TicketFieldDoc::Textbox {
        name: t.name.clone(),
        x: t.x,
        y: t.y,
        font_size: t.font_size,
        priority: t.priority,
        required: t.required,
        width: t.width,
        height: t.height,
        text: t.text.clone(),
    }));
    fields.extend(ticket.checkboxes().iter().map(|c| TicketFieldDoc::Checkbox {
        name: c.name.clone(),
        x: c.x,
        y: c.y,
        font_size: c.font_size,
        priority: c.priority,
        required: c.required,
        scale: c.scale,
        checked: c.checked,
    }));
    TicketDoc {
        format: FORMAT_VERSION.to_string(),
        document_path: ticket.document_path.clone(),
        customer_first_name: ticket.customer_first_name.clone(),
        customer_last_name: ticket.customer_last_name.clone(),
        fields,
    }
}

fn ticket_from_doc(doc: TicketDoc) -> Result<Ticket, CodecError> {
    check_format(&doc.format)?;
    let mut textboxes = Vec::new();
    let mut checkboxes = Vec::new();
    let mut statics = Vec::new();
    for field in doc.fields {
        match field {
            TicketFieldDoc::Textbox {
                name,
                x,
                y,
                font_size,
                priority,
                required,
                width,
                height,
                text,
            } => {
                textboxes.push(TextboxValue {
                    name,
                    x,
                    y,
                    font_size,
                    priority,
                    required,
                    width,
                    height,
                    text,
                });
            }
            TicketFieldDoc::Checkbox {
                name,
                x,
                y,
                font_size,
                priority,
                required,
                scale,
                checked,
            } => {
                checkboxes.push(CheckboxValue {
                    name,
                    x,
                    y,
                    font_size,
                    priority,
                    required,
                    scale,
                    checked,
                });
            }
            TicketFieldDoc::Static { name, x, y, font_size, width, height, text } => {
                statics.push(StaticValue { name, x, y, font_size, width, height, text });
            }
        }
    }
    Ok(Ticket::from_parts(
        doc.customer_first_name,
        doc.customer_last_name,
        doc.document_path,
        textboxes,
        checkboxes,
        statics,
    ))
}

/// Serialize a template to `sink`. Fails if the sink cannot be written.
pub fn save_template<W: Write>(template: &Template, sink: W) -> Result<(), CodecError> {
    serde_json::to_writer_pretty(sink, &template_to_doc(template)).map_err(CodecError::Write)
}

/// Deserialize a template from `source`, all-or-nothing.
pub fn load_template<R: Read>(source: R) -> Result<Template, CodecError> {
    let doc: TemplateDoc =
        serde_json::from_reader(source).map_err(|e| CodecError::Malformed(e.to_string()))?;
    template_from_doc(doc)
}

/// Serialize a ticket to `sink`. Fails if the sink cannot be written.
pub fn save_ticket<W: Write>(ticket: &Ticket, sink: W) -> Result<(), CodecError> {
    serde_json::to_writer_pretty(sink, &ticket_to_doc(ticket)).map_err(CodecError::Write)
}

/// Deserialize a ticket from `source`, all-or-nothing.
pub fn load_ticket<R: Read>(source: R) -> Result<Ticket, CodecError> {
    let doc: TicketDoc =
        serde_json::from_reader(source).map_err(|e| CodecError::Malformed(e.to_string()))?;
    ticket_from_doc(doc)
}

#[cfg(test)]
mod tests {
    use time::{Date, Month, PrimitiveDateTime, Time};
    use ticketsmith_core::{PageBounds, TicketInput};

    use super::*;

    fn fixture_now() -> time::OffsetDateTime {
        let date = match Date::from_calendar_date(2024, Month::March, 7) {
            Ok(date) => date,
            Err(err) => panic!("fixture date: {err}"),
        };
        let clock = match Time::from_hms(16, 45, 0) {
            Ok(time) => time,
            Err(err) => panic!("fixture time: {err}"),
        };
        PrimitiveDateTime::new(date, clock).assume_utc()
    }

    fn full_template() -> Template {
        let mut template = Template::new("/docs/workorder.pdf");
        template.name = "Work Order".to_string();
        template.add_textbox("Notes");
        template.add_checkbox("Rush");
        template.add_static(StaticKind::Counter { value: 7, reset_annually: true });
        template.add_static(StaticKind::Day);
        template.add_static(StaticKind::TemplateId);
        assert!(template.set_textbox_required("Notes", true).is_ok());
        assert!(template
            .set_textbox_position("Notes", 120.0, 300.5, PageBounds::a4())
            .is_ok());
        assert!(template.set_checkbox_scale("Rush", 1.5, PageBounds::a4()).is_ok());
        template
    }

    fn roundtrip_template(template: &Template) -> Template {
        let mut buffer = Vec::new();
        match save_template(template, &mut buffer) {
            Ok(()) => {}
            Err(err) => panic!("save failed: {err}"),
        }
        match load_template(buffer.as_slice()) {
            Ok(loaded) => loaded,
            Err(err) => panic!("load failed: {err}"),
        }
    }

    #[test]
    fn test_template_roundtrip_zero_fields() {
        let mut template = Template::new("/docs/blank.pdf");
        template.name = "Blank".to_string();
        assert_eq!(roundtrip_template(&template), template);
    }

    #[test]
    fn test_template_roundtrip_all_kinds() {
        let template = full_template();
        assert_eq!(roundtrip_template(&template), template);
    }

    #[test]
    fn test_counter_value_travels_as_text() {
        let template = full_template();
        let mut buffer = Vec::new();
        match save_template(&template, &mut buffer) {
            Ok(()) => {}
            Err(err) => panic!("save failed: {err}"),
        }
        let raw = String::from_utf8_lossy(&buffer);
        assert!(raw.contains("\"counterValue\": \"7\""));
    }

    #[test]
    fn test_load_rejects_bad_counter_value() {
        let template = full_template();
        let mut buffer = Vec::new();
        match save_template(&template, &mut buffer) {
            Ok(()) => {}
            Err(err) => panic!("save failed: {err}"),
        }
        let tampered = String::from_utf8_lossy(&buffer).replace("\"7\"", "\"-7\"");
        assert!(matches!(
            load_template(tampered.as_bytes()),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_rejects_missing_section() {
        let missing_name = r#"{"format":"ticketsmith.v1","documentPath":"/d.pdf","fields":[]}"#;
        assert!(matches!(
            load_template(missing_name.as_bytes()),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_rejects_unknown_format() {
        let wrong = r#"{"format":"other.v9","name":"X","documentPath":"/d.pdf","fields":[]}"#;
        assert!(matches!(load_template(wrong.as_bytes()), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_ticket_roundtrip_with_line_breaks() {
        let mut template = full_template();
        let mut input = TicketInput {
            customer_first_name: "Ada".to_string(),
            customer_last_name: "Lovelace".to_string(),
            ..TicketInput::default()
        };
        input.texts.insert("Notes".to_string(), "first\nsecond\nthird".to_string());
        input.checks.insert("Rush".to_string(), true);
        let ticket = match Ticket::from_template(&mut template, &input, 3, fixture_now()) {
            Ok(ticket) => ticket,
            Err(err) => panic!("creation failed: {err}"),
        };

        let mut buffer = Vec::new();
        match save_ticket(&ticket, &mut buffer) {
            Ok(()) => {}
            Err(err) => panic!("save failed: {err}"),
        }
        let loaded = match load_ticket(buffer.as_slice()) {
            Ok(loaded) => loaded,
            Err(err) => panic!("load failed: {err}"),
        };
        assert_eq!(loaded, ticket);
        let notes = match loaded.textboxes().iter().find(|t| t.name == "Notes") {
            Some(value) => value,
            None => panic!("missing Notes"),
        };
        assert_eq!(notes.text, "first\nsecond\nthird");
    }
}
