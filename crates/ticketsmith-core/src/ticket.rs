//! The job ticket aggregate: one filled instance of a template.
//!
//! A ticket is created once from a template snapshot plus user-supplied
//! values and is self-contained from then on; later edits to the template
//! do not propagate. After creation a ticket is only replaced wholesale or
//! deleted.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::compose::{merge_by_priority, Merged, Prioritized};
use crate::field::{Change, FieldError};
use crate::resolve::{resolve_statics, TicketSeed};
use crate::template::Template;

/// Marker carried inside textbox text where the user entered a line break.
/// It rides through persistence as ordinary character data.
pub const LINE_BREAK: char = '\n';

/// A filled textbox: the definition's geometry plus the entered text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextboxValue {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub priority: u32,
    pub required: bool,
    pub width: f64,
    pub height: f64,
    pub text: String,
}

/// A filled checkbox: the definition's geometry plus its state.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckboxValue {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub priority: u32,
    pub required: bool,
    pub scale: f64,
    pub checked: bool,
}

/// A resolved static field: geometry plus the resolved text.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticValue {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
}

impl Prioritized for TextboxValue {
    fn priority(&self) -> u32 {
        self.priority
    }
}

impl Prioritized for CheckboxValue {
    fn priority(&self) -> u32 {
        self.priority
    }
}

/// User-entered values for one new ticket, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct TicketInput {
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub texts: BTreeMap<String, String>,
    pub checks: BTreeMap<String, bool>,
}

/// One filled, independently persisted instance of a template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ticket {
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub document_path: String,
    textboxes: Vec<TextboxValue>,
    checkboxes: Vec<CheckboxValue>,
    statics: Vec<StaticValue>,
}

impl Ticket {
    /// Create a ticket from a template snapshot and user input.
    ///
    /// Validation runs before anything is touched: the template must have a
    /// document path, every input key must name a field, and every required
    /// textbox must receive non-blank text. Only then are the template's
    /// counters advanced (the caller re-persists the template immediately).
    /// `sequence` is the store-assigned ticket number; `now` feeds the date
    /// and time statics.
    pub fn from_template(
        template: &mut Template,
        input: &TicketInput,
        sequence: u64,
        now: OffsetDateTime,
    ) -> Result<Self, FieldError> {
        if template.document_path.trim().is_empty() {
            return Err(FieldError::RequiredEmpty("document path".to_string()));
        }
        for name in input.texts.keys() {
            if !template.textboxes().iter().any(|t| &t.name == name) {
                return Err(FieldError::NotFound(name.clone()));
            }
        }
        for name in input.checks.keys() {
            if !template.checkboxes().iter().any(|c| &c.name == name) {
                return Err(FieldError::NotFound(name.clone()));
            }
        }
        for textbox in template.textboxes() {
            let entered = input.texts.get(&textbox.name).map_or("", String::as_str);
            if textbox.required && entered.trim().is_empty() {
                return Err(FieldError::RequiredEmpty(textbox.name.clone()));
            }
        }

        let textboxes = template
            .textboxes()
            .iter()
            .map(|t| TextboxValue {
                name: t.name.clone(),
                x: t.x,
                y: t.y,
                font_size: t.font_size,
                priority: t.priority,
                required: t.required,
                width: t.width,
                height: t.height,
                text: input.texts.get(&t.name).cloned().unwrap_or_default(),
            })
            .collect();
        let checkboxes = template
            .checkboxes()
            .iter()
            .map(|c| CheckboxValue {
                name: c.name.clone(),
                x: c.x,
                y: c.y,
                font_size: c.font_size,
                priority: c.priority,
                required: c.required,
                scale: c.scale,
                checked: input.checks.get(&c.name).copied().unwrap_or(false),
            })
            .collect();

        let seed = TicketSeed {
            first_name: &input.customer_first_name,
            last_name: &input.customer_last_name,
            sequence,
            now,
        };
        let statics = resolve_statics(template, &seed);

        Ok(Self {
            customer_first_name: input.customer_first_name.clone(),
            customer_last_name: input.customer_last_name.clone(),
            document_path: template.document_path.clone(),
            textboxes,
            checkboxes,
            statics,
        })
    }

    #[must_use]
    pub fn textboxes(&self) -> &[TextboxValue] {
        &self.textboxes
    }

    #[must_use]
    pub fn checkboxes(&self) -> &[CheckboxValue] {
        &self.checkboxes
    }

    #[must_use]
    pub fn statics(&self) -> &[StaticValue] {
        &self.statics
    }

    /// The combined walk order; agrees with the template that produced this
    /// ticket.
    #[must_use]
    pub fn fields_in_order(&self) -> Vec<Merged<'_, TextboxValue, CheckboxValue>> {
        merge_by_priority(&self.textboxes, &self.checkboxes)
    }

    /// Replace a textbox's text (modify-and-resave flow).
    pub fn set_textbox_text(&mut self, name: &str, text: &str) -> Result<Change, FieldError> {
        let value = self
            .textboxes
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
        if value.text == text {
            return Ok(Change::Noop);
        }
        value.text = text.to_string();
        Ok(Change::Applied)
    }

    /// Replace a checkbox's state (modify-and-resave flow).
    pub fn set_checkbox_checked(&mut self, name: &str, checked: bool) -> Result<Change, FieldError> {
        let value = self
            .checkboxes
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
        if value.checked == checked {
            return Ok(Change::Noop);
        }
        value.checked = checked;
        Ok(Change::Applied)
    }

    /// Restore a ticket from already-validated parts. Used by the
    /// persistence layer.
    #[must_use]
    pub fn from_parts(
        customer_first_name: String,
        customer_last_name: String,
        document_path: String,
        textboxes: Vec<TextboxValue>,
        checkboxes: Vec<CheckboxValue>,
        statics: Vec<StaticValue>,
    ) -> Self {
        Self {
            customer_first_name,
            customer_last_name,
            document_path,
            textboxes,
            checkboxes,
            statics,
        }
    }
}
