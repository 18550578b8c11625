//! Field value types shared by templates and job tickets.
//!
//! A field is identified by its name within its owning collection. Geometry
//! is expressed in pixels on the background document page; validation bounds
//! are supplied by the caller as [`PageBounds`].

use thiserror::Error;

/// Smallest accepted font size, in points.
pub const MIN_FONT_SIZE: f64 = 8.0;
/// Largest accepted font size, in points.
pub const MAX_FONT_SIZE: f64 = 100.0;
/// Largest accepted priority value.
pub const MAX_PRIORITY: u32 = 1000;
/// Edge length of an unscaled checkbox, in pixels.
pub const CHECKBOX_BASE_EDGE: f64 = 10.0;
/// Smallest accepted checkbox scale factor.
pub const MIN_CHECKBOX_SCALE: f64 = 0.1;
/// Largest accepted checkbox scale factor.
pub const MAX_CHECKBOX_SCALE: f64 = 20.0;
/// Height of a static field's display box relative to its font size.
pub const STATIC_HEIGHT_FACTOR: f64 = 1.66;

/// Defaults applied when a field is first added.
pub const DEFAULT_FONT_SIZE: f64 = 11.0;
pub const DEFAULT_TEXTBOX_WIDTH: f64 = 10.0;
pub const DEFAULT_TEXTBOX_HEIGHT: f64 = 10.0;
pub const DEFAULT_CHECKBOX_SCALE: f64 = 1.0;
pub const DEFAULT_TEXTBOX_NAME: &str = "Textbox";
pub const DEFAULT_CHECKBOX_NAME: &str = "Checkbox";

/// Characters stripped from field names: field names feed into on-disk
/// entity file names, so the filename-unsafe set is removed up front.
const UNSAFE_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Extents of the rendering surface used to validate geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBounds {
    pub width: f64,
    pub height: f64,
}

impl PageBounds {
    /// The A4 page raster used for background documents.
    #[must_use]
    pub const fn a4() -> Self {
        Self { width: 1240.0, height: 1754.0 }
    }

    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    #[must_use]
    pub fn fits_box(&self, width: f64, height: f64) -> bool {
        width > 0.0 && height > 0.0 && width <= self.width && height <= self.height
    }
}

impl Default for PageBounds {
    fn default() -> Self {
        Self::a4()
    }
}

/// Outcome of a mutation: whether the aggregate actually changed.
///
/// Callers use this to decide when to re-render; mutations that find the
/// value already in place report [`Change::Noop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Change {
    Applied,
    Noop,
}

impl Change {
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Combine two signals: changed if either changed.
    pub fn or(self, other: Self) -> Self {
        if self.changed() || other.changed() {
            Self::Applied
        } else {
            Self::Noop
        }
    }
}

/// Errors raised by field-level operations. Every failing operation leaves
/// its aggregate untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("field not found: {0}")]
    NotFound(String),
    #[error("field name already in use: {0}")]
    Collision(String),
    #[error("{quantity} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("required field is empty: {0}")]
    RequiredEmpty(String),
}

/// Sanitize a raw field name: strip control characters and the
/// filename-unsafe set, trim surrounding whitespace, and fall back to
/// `fallback` when nothing remains. Deterministic and idempotent.
#[must_use]
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !UNSAFE_NAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// A free-text entry box anchored to the background page.
#[derive(Debug, Clone, PartialEq)]
pub struct Textbox {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub priority: u32,
    pub required: bool,
    pub width: f64,
    pub height: f64,
}

impl Textbox {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0.0,
            y: 0.0,
            font_size: DEFAULT_FONT_SIZE,
            priority: 0,
            required: false,
            width: DEFAULT_TEXTBOX_WIDTH,
            height: DEFAULT_TEXTBOX_HEIGHT,
        }
    }
}

/// A boolean checkbox anchored to the background page. Its rendered box is
/// a square of [`CHECKBOX_BASE_EDGE`] scaled by `scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkbox {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub priority: u32,
    pub required: bool,
    pub scale: f64,
}

impl Checkbox {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0.0,
            y: 0.0,
            font_size: DEFAULT_FONT_SIZE,
            priority: 0,
            required: false,
            scale: DEFAULT_CHECKBOX_SCALE,
        }
    }

    /// Edge length of the rendered square.
    #[must_use]
    pub fn edge(&self) -> f64 {
        CHECKBOX_BASE_EDGE * self.scale
    }
}

/// The kind of an auto-resolved static field.
///
/// `Counter` carries its running value and the annual-reset flag as
/// dedicated attributes of the variant arm; editable fields carry their own
/// `required` flag and the two never share storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticKind {
    CustomerFirstName,
    CustomerLastName,
    Counter { value: u64, reset_annually: bool },
    Day,
    Month,
    Year,
    TimeStamp,
    TemplateId,
}

impl StaticKind {
    /// Human-readable label, also the default field name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomerFirstName => "Customer First Name",
            Self::CustomerLastName => "Customer Last Name",
            Self::Counter { .. } => "Counter",
            Self::Day => "Day",
            Self::Month => "Month",
            Self::Year => "Year",
            Self::TimeStamp => "Time Stamp",
            Self::TemplateId => "Template ID",
        }
    }

    /// Widest value this kind can resolve to, in characters. Drives the
    /// derived display box.
    #[must_use]
    pub fn max_chars(&self) -> u32 {
        match self {
            Self::CustomerFirstName | Self::CustomerLastName => 10,
            Self::Counter { .. } => 12,
            Self::Day | Self::Month => 2,
            Self::Year => 4,
            Self::TimeStamp => 11,
            Self::TemplateId => 9,
        }
    }

    #[must_use]
    pub fn is_counter(&self) -> bool {
        matches!(self, Self::Counter { .. })
    }
}

/// An auto-resolved field definition: position, font size, and kind. The
/// display box is derived from the font size and the kind's widest value.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticField {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub kind: StaticKind,
}

impl StaticField {
    #[must_use]
    pub fn new(kind: StaticKind) -> Self {
        Self {
            name: kind.label().to_string(),
            x: 0.0,
            y: 0.0,
            font_size: DEFAULT_FONT_SIZE,
            kind,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.font_size * f64::from(self.kind.max_chars()) + 1.0
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.font_size * STATIC_HEIGHT_FACTOR
    }
}
