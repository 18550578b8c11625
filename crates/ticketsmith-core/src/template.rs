//! The template aggregate: a reusable field layout anchored to a source
//! document.
//!
//! All field mutation is name-keyed. Collections are kept sorted ascending
//! by priority (new fields are appended with the next-highest priority, and
//! reprioritizing re-sorts unless the caller defers), so the merge composer
//! can interleave them directly. Every mutator reports whether it changed
//! anything via [`Change`]; rejected mutations leave the template untouched.

use crate::compose::{merge_by_priority, Merged, Prioritized};
use crate::field::{
    sanitize_name, Change, Checkbox, FieldError, PageBounds, StaticField, StaticKind, Textbox,
    DEFAULT_CHECKBOX_NAME, DEFAULT_TEXTBOX_NAME, MAX_CHECKBOX_SCALE, MAX_FONT_SIZE, MAX_PRIORITY,
    MIN_CHECKBOX_SCALE, MIN_FONT_SIZE,
};

impl Prioritized for Textbox {
    fn priority(&self) -> u32 {
        self.priority
    }
}

impl Prioritized for Checkbox {
    fn priority(&self) -> u32 {
        self.priority
    }
}

/// A reusable ticket layout: named fields anchored to a background document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub name: String,
    pub document_path: String,
    textboxes: Vec<Textbox>,
    checkboxes: Vec<Checkbox>,
    statics: Vec<StaticField>,
}

impl Template {
    /// A new, empty template anchored to `document_path`.
    #[must_use]
    pub fn new(document_path: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            document_path: document_path.into(),
            textboxes: Vec::new(),
            checkboxes: Vec::new(),
            statics: Vec::new(),
        }
    }

    #[must_use]
    pub fn textboxes(&self) -> &[Textbox] {
        &self.textboxes
    }

    #[must_use]
    pub fn checkboxes(&self) -> &[Checkbox] {
        &self.checkboxes
    }

    #[must_use]
    pub fn statics(&self) -> &[StaticField] {
        &self.statics
    }

    pub(crate) fn statics_mut(&mut self) -> &mut [StaticField] {
        &mut self.statics
    }

    /// The combined textbox/checkbox walk order shared by form layout,
    /// listings, and print composition.
    #[must_use]
    pub fn fields_in_order(&self) -> Vec<Merged<'_, Textbox, Checkbox>> {
        merge_by_priority(&self.textboxes, &self.checkboxes)
    }

    /// Priority assigned to the next added field: one past the highest
    /// priority across both collections, so new fields land at the end of
    /// the combined order.
    fn next_priority(&self) -> u32 {
        let highest = self
            .textboxes
            .iter()
            .map(|t| t.priority)
            .chain(self.checkboxes.iter().map(|c| c.priority))
            .max();
        match highest {
            Some(p) => p.saturating_add(1).min(MAX_PRIORITY),
            None => 0,
        }
    }

    /// Uniquify `want` against `taken` by appending ` (n)` with the lowest
    /// free `n`.
    fn uniquify<'a>(want: &str, taken: impl Iterator<Item = &'a str> + Clone) -> String {
        if !taken.clone().any(|name| name == want) {
            return want.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{want} ({n})");
            if !taken.clone().any(|name| name == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a textbox. The name is sanitized and uniquified; the accepted
    /// name is returned.
    pub fn add_textbox(&mut self, name: &str) -> String {
        let sanitized = sanitize_name(name, DEFAULT_TEXTBOX_NAME);
        let accepted = Self::uniquify(&sanitized, self.textboxes.iter().map(|t| t.name.as_str()));
        let mut textbox = Textbox::new(accepted.clone());
        textbox.priority = self.next_priority();
        self.textboxes.push(textbox);
        accepted
    }

    /// Add a checkbox. The name is sanitized and uniquified; the accepted
    /// name is returned.
    pub fn add_checkbox(&mut self, name: &str) -> String {
        let sanitized = sanitize_name(name, DEFAULT_CHECKBOX_NAME);
        let accepted = Self::uniquify(&sanitized, self.checkboxes.iter().map(|c| c.name.as_str()));
        let mut checkbox = Checkbox::new(accepted.clone());
        checkbox.priority = self.next_priority();
        self.checkboxes.push(checkbox);
        accepted
    }

    /// Add a static field of the given kind, named after its label and
    /// uniquified. Returns the accepted name.
    pub fn add_static(&mut self, kind: StaticKind) -> String {
        let mut field = StaticField::new(kind);
        let accepted =
            Self::uniquify(&field.name, self.statics.iter().map(|s| s.name.as_str()));
        field.name = accepted.clone();
        self.statics.push(field);
        accepted
    }

    fn textbox_index(&self, name: &str) -> Result<usize, FieldError> {
        self.textboxes
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))
    }

    fn checkbox_index(&self, name: &str) -> Result<usize, FieldError> {
        self.checkboxes
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))
    }

    fn static_index(&self, name: &str) -> Result<usize, FieldError> {
        self.statics
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))
    }

    /// Rename a textbox. The new name is sanitized; renaming to a name held
    /// by another textbox is rejected with [`FieldError::Collision`] and the
    /// original name is retained. Returns the accepted name.
    pub fn rename_textbox(&mut self, old: &str, new: &str) -> Result<String, FieldError> {
        let index = self.textbox_index(old)?;
        let sanitized = sanitize_name(new, DEFAULT_TEXTBOX_NAME);
        if sanitized == self.textboxes[index].name {
            return Ok(sanitized);
        }
        if self.textboxes.iter().any(|t| t.name == sanitized) {
            return Err(FieldError::Collision(sanitized));
        }
        self.textboxes[index].name = sanitized.clone();
        Ok(sanitized)
    }

    /// Rename a checkbox; same rules as [`Template::rename_textbox`].
    pub fn rename_checkbox(&mut self, old: &str, new: &str) -> Result<String, FieldError> {
        let index = self.checkbox_index(old)?;
        let sanitized = sanitize_name(new, DEFAULT_CHECKBOX_NAME);
        if sanitized == self.checkboxes[index].name {
            return Ok(sanitized);
        }
        if self.checkboxes.iter().any(|c| c.name == sanitized) {
            return Err(FieldError::Collision(sanitized));
        }
        self.checkboxes[index].name = sanitized.clone();
        Ok(sanitized)
    }

    fn check_point(bounds: PageBounds, x: f64, y: f64) -> Result<(), FieldError> {
        if !bounds.contains_point(x, y) {
            let (quantity, value, max) = if (0.0..=bounds.width).contains(&x) {
                ("y", y, bounds.height)
            } else {
                ("x", x, bounds.width)
            };
            return Err(FieldError::OutOfRange { quantity, value, min: 0.0, max });
        }
        Ok(())
    }

    fn check_font_size(size: f64) -> Result<(), FieldError> {
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            return Err(FieldError::OutOfRange {
                quantity: "font size",
                value: size,
                min: MIN_FONT_SIZE,
                max: MAX_FONT_SIZE,
            });
        }
        Ok(())
    }

    fn check_priority(value: u32) -> Result<(), FieldError> {
        if value > MAX_PRIORITY {
            return Err(FieldError::OutOfRange {
                quantity: "priority",
                value: f64::from(value),
                min: 0.0,
                max: f64::from(MAX_PRIORITY),
            });
        }
        Ok(())
    }

    pub fn set_textbox_position(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        bounds: PageBounds,
    ) -> Result<Change, FieldError> {
        let index = self.textbox_index(name)?;
        Self::check_point(bounds, x, y)?;
        let textbox = &mut self.textboxes[index];
        if textbox.x == x && textbox.y == y {
            return Ok(Change::Noop);
        }
        textbox.x = x;
        textbox.y = y;
        Ok(Change::Applied)
    }

    pub fn set_textbox_size(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
        bounds: PageBounds,
    ) -> Result<Change, FieldError> {
        let index = self.textbox_index(name)?;
        if !bounds.fits_box(width, height) {
            return Err(FieldError::OutOfRange {
                quantity: "dimensions",
                value: width.max(height),
                min: 0.0,
                max: bounds.width.max(bounds.height),
            });
        }
        let textbox = &mut self.textboxes[index];
        if textbox.width == width && textbox.height == height {
            return Ok(Change::Noop);
        }
        textbox.width = width;
        textbox.height = height;
        Ok(Change::Applied)
    }

    pub fn set_textbox_font_size(&mut self, name: &str, size: f64) -> Result<Change, FieldError> {
        let index = self.textbox_index(name)?;
        Self::check_font_size(size)?;
        let textbox = &mut self.textboxes[index];
        if textbox.font_size == size {
            return Ok(Change::Noop);
        }
        textbox.font_size = size;
        Ok(Change::Applied)
    }

    pub fn set_textbox_required(&mut self, name: &str, required: bool) -> Result<Change, FieldError> {
        let index = self.textbox_index(name)?;
        let textbox = &mut self.textboxes[index];
        if textbox.required == required {
            return Ok(Change::Noop);
        }
        textbox.required = required;
        Ok(Change::Applied)
    }

    /// Update a textbox's merge priority. Unless `defer_resort` is set the
    /// collection is re-sorted immediately so the combined order stays
    /// consistent; deferring callers must call [`Template::resort`] before
    /// composing.
    pub fn set_textbox_priority(
        &mut self,
        name: &str,
        value: u32,
        defer_resort: bool,
    ) -> Result<Change, FieldError> {
        let index = self.textbox_index(name)?;
        Self::check_priority(value)?;
        if self.textboxes[index].priority == value {
            return Ok(Change::Noop);
        }
        self.textboxes[index].priority = value;
        if !defer_resort {
            self.textboxes.sort_by_key(|t| t.priority);
        }
        Ok(Change::Applied)
    }

    pub fn remove_textbox(&mut self, name: &str) -> Result<(), FieldError> {
        let index = self.textbox_index(name)?;
        self.textboxes.remove(index);
        Ok(())
    }

    pub fn set_checkbox_position(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        bounds: PageBounds,
    ) -> Result<Change, FieldError> {
        let index = self.checkbox_index(name)?;
        Self::check_point(bounds, x, y)?;
        let checkbox = &mut self.checkboxes[index];
        if checkbox.x == x && checkbox.y == y {
            return Ok(Change::Noop);
        }
        checkbox.x = x;
        checkbox.y = y;
        Ok(Change::Applied)
    }

    /// Update a checkbox's scale. The scale must stay in range and the
    /// scaled box must still fit on the page.
    pub fn set_checkbox_scale(
        &mut self,
        name: &str,
        scale: f64,
        bounds: PageBounds,
    ) -> Result<Change, FieldError> {
        let index = self.checkbox_index(name)?;
        let edge = crate::field::CHECKBOX_BASE_EDGE * scale;
        if !(MIN_CHECKBOX_SCALE..=MAX_CHECKBOX_SCALE).contains(&scale)
            || !bounds.fits_box(edge, edge)
        {
            return Err(FieldError::OutOfRange {
                quantity: "scale",
                value: scale,
                min: MIN_CHECKBOX_SCALE,
                max: MAX_CHECKBOX_SCALE,
            });
        }
        let checkbox = &mut self.checkboxes[index];
        if checkbox.scale == scale {
            return Ok(Change::Noop);
        }
        checkbox.scale = scale;
        Ok(Change::Applied)
    }

    pub fn set_checkbox_font_size(&mut self, name: &str, size: f64) -> Result<Change, FieldError> {
        let index = self.checkbox_index(name)?;
        Self::check_font_size(size)?;
        let checkbox = &mut self.checkboxes[index];
        if checkbox.font_size == size {
            return Ok(Change::Noop);
        }
        checkbox.font_size = size;
        Ok(Change::Applied)
    }

    pub fn set_checkbox_required(
        &mut self,
        name: &str,
        required: bool,
    ) -> Result<Change, FieldError> {
        let index = self.checkbox_index(name)?;
        let checkbox = &mut self.checkboxes[index];
        if checkbox.required == required {
            return Ok(Change::Noop);
        }
        checkbox.required = required;
        Ok(Change::Applied)
    }

    /// Update a checkbox's merge priority; see
    /// [`Template::set_textbox_priority`] for resort semantics.
    pub fn set_checkbox_priority(
        &mut self,
        name: &str,
        value: u32,
        defer_resort: bool,
    ) -> Result<Change, FieldError> {
        let index = self.checkbox_index(name)?;
        Self::check_priority(value)?;
        if self.checkboxes[index].priority == value {
            return Ok(Change::Noop);
        }
        self.checkboxes[index].priority = value;
        if !defer_resort {
            self.checkboxes.sort_by_key(|c| c.priority);
        }
        Ok(Change::Applied)
    }

    pub fn remove_checkbox(&mut self, name: &str) -> Result<(), FieldError> {
        let index = self.checkbox_index(name)?;
        self.checkboxes.remove(index);
        Ok(())
    }

    /// Re-sort both collections by priority. Needed after a batch of
    /// deferred priority updates (for example while loading).
    pub fn resort(&mut self) {
        self.textboxes.sort_by_key(|t| t.priority);
        self.checkboxes.sort_by_key(|c| c.priority);
    }

    pub fn set_static_position(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        bounds: PageBounds,
    ) -> Result<Change, FieldError> {
        let index = self.static_index(name)?;
        Self::check_point(bounds, x, y)?;
        let field = &mut self.statics[index];
        if field.x == x && field.y == y {
            return Ok(Change::Noop);
        }
        field.x = x;
        field.y = y;
        Ok(Change::Applied)
    }

    /// Update a static field's font size; the derived display box follows
    /// automatically.
    pub fn set_static_font_size(&mut self, name: &str, size: f64) -> Result<Change, FieldError> {
        let index = self.static_index(name)?;
        Self::check_font_size(size)?;
        let field = &mut self.statics[index];
        if field.font_size == size {
            return Ok(Change::Noop);
        }
        field.font_size = size;
        Ok(Change::Applied)
    }

    /// Set the annual-reset flag on a counter static field. A name that is
    /// missing or does not belong to a counter is [`FieldError::NotFound`].
    pub fn set_counter_reset_annually(
        &mut self,
        name: &str,
        flag: bool,
    ) -> Result<Change, FieldError> {
        let field = self
            .statics
            .iter_mut()
            .find(|s| s.name == name && s.kind.is_counter())
            .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
        if let StaticKind::Counter { reset_annually, .. } = &mut field.kind {
            if *reset_annually == flag {
                return Ok(Change::Noop);
            }
            *reset_annually = flag;
        }
        Ok(Change::Applied)
    }

    pub fn remove_static(&mut self, name: &str) -> Result<(), FieldError> {
        let index = self.static_index(name)?;
        self.statics.remove(index);
        Ok(())
    }

    /// Zero every counter's running value, regardless of its annual-reset
    /// flag. Non-counter statics are untouched.
    pub fn reset_counters(&mut self) -> Change {
        let mut change = Change::Noop;
        for field in &mut self.statics {
            if let StaticKind::Counter { value, .. } = &mut field.kind {
                if *value != 0 {
                    *value = 0;
                    change = Change::Applied;
                }
            }
        }
        change
    }

    /// Zero only the counters flagged to reset annually. This is the entry
    /// point the store's year-rollover policy invokes.
    pub fn reset_annual_counters(&mut self) -> Change {
        let mut change = Change::Noop;
        for field in &mut self.statics {
            if let StaticKind::Counter { value, reset_annually: true } = &mut field.kind {
                if *value != 0 {
                    *value = 0;
                    change = Change::Applied;
                }
            }
        }
        change
    }

    /// Restore a template from already-validated parts. Used by the
    /// persistence layer; collections are re-sorted on entry.
    #[must_use]
    pub fn from_parts(
        name: String,
        document_path: String,
        textboxes: Vec<Textbox>,
        checkboxes: Vec<Checkbox>,
        statics: Vec<StaticField>,
    ) -> Self {
        let mut template = Self { name, document_path, textboxes, checkboxes, statics };
        template.resort();
        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Template {
        let mut template = Template::new("/docs/workorder.pdf");
        template.name = "Work Order".to_string();
        template.add_textbox("Customer Notes");
        template.add_checkbox("Rush");
        template
    }

    #[test]
    fn test_add_assigns_increasing_priorities() {
        let mut template = Template::new("/docs/base.pdf");
        let a = template.add_textbox("A");
        let b = template.add_checkbox("B");
        let c = template.add_textbox("C");
        assert_eq!(template.textboxes()[0].name, a);
        assert_eq!(template.textboxes()[0].priority, 0);
        assert_eq!(template.checkboxes()[0].name, b);
        assert_eq!(template.checkboxes()[0].priority, 1);
        assert_eq!(template.textboxes()[1].name, c);
        assert_eq!(template.textboxes()[1].priority, 2);
    }

    #[test]
    fn test_add_uniquifies_names() {
        let mut template = Template::new("/docs/base.pdf");
        assert_eq!(template.add_textbox("Notes"), "Notes");
        assert_eq!(template.add_textbox("Notes"), "Notes (1)");
        assert_eq!(template.add_textbox("Notes"), "Notes (2)");
        // The same name is free in the other collection.
        assert_eq!(template.add_checkbox("Notes"), "Notes");
    }

    #[test]
    fn test_rename_collision_rejected_and_name_retained() {
        let mut template = Template::new("/docs/base.pdf");
        template.add_textbox("First");
        template.add_textbox("Second");
        let err = template.rename_textbox("Second", "First");
        assert_eq!(err, Err(FieldError::Collision("First".to_string())));
        assert!(template.textboxes().iter().any(|t| t.name == "Second"));
    }

    #[test]
    fn test_rename_sanitizes_and_applies() {
        let mut template = sample();
        let accepted = match template.rename_textbox("Customer Notes", "Inner/Notes") {
            Ok(name) => name,
            Err(err) => panic!("rename failed: {err}"),
        };
        assert_eq!(accepted, "InnerNotes");
        assert!(template.textboxes().iter().any(|t| t.name == "InnerNotes"));
    }

    #[test]
    fn test_rename_missing_is_not_found() {
        let mut template = sample();
        assert_eq!(
            template.rename_textbox("Ghost", "Anything"),
            Err(FieldError::NotFound("Ghost".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_position_leaves_template_unchanged() {
        let mut template = sample();
        let before = template.clone();
        let result =
            template.set_textbox_position("Customer Notes", -5.0, 10.0, PageBounds::a4());
        assert!(matches!(result, Err(FieldError::OutOfRange { .. })));
        assert_eq!(template, before);
    }

    #[test]
    fn test_font_size_bounds() {
        let mut template = sample();
        assert!(template.set_textbox_font_size("Customer Notes", 7.9).is_err());
        assert!(template.set_textbox_font_size("Customer Notes", 101.0).is_err());
        let change = template.set_textbox_font_size("Customer Notes", 14.0);
        assert_eq!(change, Ok(Change::Applied));
        // Setting the same size again is a no-op.
        assert_eq!(
            template.set_textbox_font_size("Customer Notes", 14.0),
            Ok(Change::Noop)
        );
    }

    #[test]
    fn test_priority_bounds_and_resort() {
        let mut template = Template::new("/docs/base.pdf");
        template.add_textbox("A");
        template.add_textbox("B");
        assert!(template.set_textbox_priority("A", 1001, false).is_err());

        assert_eq!(template.set_textbox_priority("A", 9, false), Ok(Change::Applied));
        assert_eq!(template.textboxes()[0].name, "B");
        assert_eq!(template.textboxes()[1].name, "A");

        // Deferred resort leaves the sequence alone until `resort`.
        assert_eq!(template.set_textbox_priority("B", 20, true), Ok(Change::Applied));
        assert_eq!(template.textboxes()[0].name, "B");
        template.resort();
        assert_eq!(template.textboxes()[0].name, "A");
    }

    #[test]
    fn test_merge_scenario_b_c_a() {
        let mut template = Template::new("/docs/base.pdf");
        template.add_textbox("A");
        template.add_textbox("B");
        template.add_checkbox("C");
        assert!(template.set_textbox_priority("A", 5, false).is_ok());
        assert!(template.set_textbox_priority("B", 2, false).is_ok());
        assert!(template.set_checkbox_priority("C", 3, false).is_ok());

        let names: Vec<&str> = template
            .fields_in_order()
            .into_iter()
            .map(|m| match m {
                Merged::Textbox(t) => t.name.as_str(),
                Merged::Checkbox(c) => c.name.as_str(),
            })
            .collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_checkbox_scale_bounds() {
        let mut template = sample();
        assert!(template.set_checkbox_scale("Rush", 0.05, PageBounds::a4()).is_err());
        assert!(template.set_checkbox_scale("Rush", 21.0, PageBounds::a4()).is_err());
        assert_eq!(
            template.set_checkbox_scale("Rush", 2.0, PageBounds::a4()),
            Ok(Change::Applied)
        );
    }

    #[test]
    fn test_reset_counters_zeroes_all() {
        let mut template = Template::new("/docs/base.pdf");
        template.add_static(StaticKind::Counter { value: 41, reset_annually: false });
        template.add_static(StaticKind::Counter { value: 7, reset_annually: true });
        template.add_static(StaticKind::Day);

        assert_eq!(template.reset_counters(), Change::Applied);
        for field in template.statics() {
            if let StaticKind::Counter { value, .. } = field.kind {
                assert_eq!(value, 0);
            }
        }
        // Non-counter statics untouched.
        assert!(template.statics().iter().any(|s| s.kind == StaticKind::Day));
        // Nothing left to reset.
        assert_eq!(template.reset_counters(), Change::Noop);
    }

    #[test]
    fn test_reset_annual_counters_respects_flag() {
        let mut template = Template::new("/docs/base.pdf");
        let keep = template.add_static(StaticKind::Counter { value: 41, reset_annually: false });
        let reset = template.add_static(StaticKind::Counter { value: 7, reset_annually: true });

        assert_eq!(template.reset_annual_counters(), Change::Applied);
        let value_of = |template: &Template, name: &str| -> u64 {
            match template.statics().iter().find(|s| s.name == name) {
                Some(StaticField { kind: StaticKind::Counter { value, .. }, .. }) => *value,
                other => panic!("expected counter {name}, found {other:?}"),
            }
        };
        assert_eq!(value_of(&template, &keep), 41);
        assert_eq!(value_of(&template, &reset), 0);
    }

    #[test]
    fn test_static_names_uniquified_by_label() {
        let mut template = Template::new("/docs/base.pdf");
        assert_eq!(
            template.add_static(StaticKind::Counter { value: 0, reset_annually: true }),
            "Counter"
        );
        assert_eq!(
            template.add_static(StaticKind::Counter { value: 0, reset_annually: false }),
            "Counter (1)"
        );
    }

    #[test]
    fn test_remove_by_name() {
        let mut template = sample();
        assert!(template.remove_textbox("Customer Notes").is_ok());
        assert_eq!(
            template.remove_textbox("Customer Notes"),
            Err(FieldError::NotFound("Customer Notes".to_string()))
        );
        assert!(template.remove_checkbox("Rush").is_ok());
    }
}
