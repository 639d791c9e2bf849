use crate::error::RollPressError;
use crate::roster;
use crate::types::{Pt, Rect, Size};

/// What fills a body cell: a record field, or fixed placeholder text that
/// renders identically on every row (answer-sheet and signature cells are
/// signed physically, so they never carry data).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnContent {
    Field(String),
    Placeholder(String),
}

#[derive(Debug, Clone)]
pub struct Column {
    pub label: String,
    pub width: Pt,
    pub content: ColumnContent,
    /// Character budget for greedy wrapping. `None` renders a single line
    /// regardless of length.
    pub wrap: Option<usize>,
}

impl Column {
    pub fn field(label: &str, width: f32, field: &str) -> Self {
        Self {
            label: label.to_string(),
            width: Pt::from_f32(width),
            content: ColumnContent::Field(field.to_string()),
            wrap: None,
        }
    }

    pub fn placeholder(label: &str, width: f32, text: &str) -> Self {
        Self {
            label: label.to_string(),
            width: Pt::from_f32(width),
            content: ColumnContent::Placeholder(text.to_string()),
            wrap: None,
        }
    }

    pub fn with_wrap(mut self, budget: usize) -> Self {
        self.wrap = Some(budget);
        self
    }
}

/// Super-header drawn in the upper band across `span` consecutive columns
/// starting at `start`.
#[derive(Debug, Clone)]
pub struct SpanLabel {
    pub label: String,
    pub start: usize,
    pub span: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterRule {
    LastPageOnly,
    EveryPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStyle {
    None,
    /// One rule under the column-header band.
    HeaderUnderline,
    /// Outer rectangle around the table region plus column separators.
    Boxed,
}

/// Signature labels drawn after the table, as (x offset from the left
/// margin, label) pairs.
#[derive(Debug, Clone)]
pub struct FooterBlock {
    pub labels: Vec<(Pt, String)>,
    pub rule: FooterRule,
    /// Vertical drop from the row cursor to the label baseline.
    pub gap: Pt,
}

/// Maps a group's center-type tag to a named banner asset. Unrecognized or
/// absent tags fall back to the default asset; resolution never fails.
#[derive(Debug, Clone, Default)]
pub struct ArtworkRule {
    by_tag: Vec<(String, String)>,
    default_asset: Option<String>,
}

impl ArtworkRule {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_default(asset: &str) -> Self {
        Self {
            by_tag: Vec::new(),
            default_asset: Some(asset.to_string()),
        }
    }

    pub fn tag(mut self, tag: &str, asset: &str) -> Self {
        self.by_tag.push((tag.to_string(), asset.to_string()));
        self
    }

    /// Tags match case-insensitively after trimming, so sheet values like
    /// `"Main "` still hit the `"MAIN"` rule.
    pub fn resolve(&self, tag: &str) -> Option<&str> {
        let tag = tag.trim();
        for (candidate, asset) in &self.by_tag {
            if candidate.eq_ignore_ascii_case(tag) {
                return Some(asset);
            }
        }
        self.default_asset.as_deref()
    }
}

#[derive(Debug, Clone)]
pub enum IdSource {
    GroupKey,
    CenterName,
    DistrictName,
    ExamDate,
}

/// One line of the center-identification block, e.g. `CENTER CODE: 12`.
/// Empty values render the template's dotted blank fill instead.
#[derive(Debug, Clone)]
pub struct IdLine {
    pub label: String,
    pub source: IdSource,
}

impl IdLine {
    pub fn new(label: &str, source: IdSource) -> Self {
        Self {
            label: label.to_string(),
            source,
        }
    }
}

/// All geometry constants, column specs, and header/footer rules for one
/// visual roll variant. Everything the composer draws is driven from here;
/// no layout constant lives in the composer itself.
#[derive(Debug, Clone)]
pub struct RollTemplate {
    pub name: String,
    pub page_size: Size,
    pub margin_x: Pt,
    /// Registered font drawn with; falls back to a built-in face when no
    /// asset under this name was registered.
    pub font_name: String,
    pub masthead: Vec<String>,
    pub masthead_size: Pt,
    pub title: String,
    pub id_lines: Vec<IdLine>,
    pub blank_fill: String,
    /// Baseline of the first masthead line.
    pub masthead_top: Pt,
    /// Vertical rhythm of the masthead and identification block.
    pub leading: Pt,
    pub body_size: Pt,
    pub columns: Vec<Column>,
    pub spans: Vec<SpanLabel>,
    pub band_height: Pt,
    /// Drop between the column-header band and the first row baseline.
    pub header_gap: Pt,
    pub base_row_height: Pt,
    pub lines_per_row_unit: usize,
    /// Rows stop when the cursor would descend past this; the footer block
    /// lives inside the reserve.
    pub footer_reserve: Pt,
    pub footer: FooterBlock,
    pub grid: GridStyle,
    /// Fixed banner region at the top of every page; drawn only when the
    /// artwork rule resolves to a registered image.
    pub banner: Option<Rect>,
    pub artwork: ArtworkRule,
}

impl RollTemplate {
    /// The NMMSE 2024-25 signature roll. Page 600x850, Devanagari masthead,
    /// seven columns under PAPER-I/PAPER-II super-headers, 20pt row rhythm,
    /// footer on the last page.
    pub fn nmmse() -> Self {
        Self {
            name: "nmmse-2024-25".to_string(),
            page_size: Size::new(600.0, 850.0),
            margin_x: Pt::from_f32(50.0),
            font_name: "NotoSansDevanagari".to_string(),
            masthead: vec![
                "छत्तीसगढ़ माध्यमिक शिक्षा मण्डल, रायपुर द्वारा आयोजित".to_string(),
                "राष्ट्रीय साधन सह-प्रावीण्य छात्रवृत्ति (NMMSE) परीक्षा - 2024-25".to_string(),
                "मुख्य केंद्र".to_string(),
            ],
            masthead_size: Pt::from_f32(12.0),
            title: "SIGNATURE ROLL".to_string(),
            id_lines: vec![
                IdLine::new("CENTER CODE: ", IdSource::GroupKey),
                IdLine::new("CENTER NAME: ", IdSource::CenterName),
                IdLine::new("DISTRICT: ", IdSource::DistrictName),
                IdLine::new("EXAM DATE: ", IdSource::ExamDate),
            ],
            blank_fill: "..........".to_string(),
            masthead_top: Pt::from_f32(800.0),
            leading: Pt::from_f32(20.0),
            body_size: Pt::from_f32(10.0),
            columns: vec![
                Column::field("NO.", 50.0, roster::FIELD_SERIAL),
                Column::field("ROLL NUMBER", 100.0, roster::FIELD_ROLL_NUMBER),
                Column::field(
                    "STUDENT NAME/FATHER'S NAME",
                    200.0,
                    roster::FIELD_CANDIDATE_NAME,
                )
                .with_wrap(35),
                Column::placeholder("OMR SHEET No.", 50.0, "OMR SHEET No."),
                Column::placeholder("SIGNATURE", 50.0, "SIGNATURE"),
                Column::placeholder("OMR SHEET No.", 50.0, "OMR SHEET No."),
                Column::placeholder("SIGNATURE", 50.0, "SIGNATURE"),
            ],
            spans: vec![
                SpanLabel {
                    label: "PAPER-I".to_string(),
                    start: 3,
                    span: 2,
                },
                SpanLabel {
                    label: "PAPER-II".to_string(),
                    start: 5,
                    span: 2,
                },
            ],
            band_height: Pt::from_f32(20.0),
            header_gap: Pt::from_f32(20.0),
            base_row_height: Pt::from_f32(20.0),
            lines_per_row_unit: 1,
            footer_reserve: Pt::from_f32(60.0),
            footer: FooterBlock {
                labels: vec![
                    (Pt::ZERO, "SIGNATURE ROOM SUPERVISOR".to_string()),
                    (Pt::from_f32(150.0), "SIGNATURE EXAM INCHARGE".to_string()),
                    (Pt::from_f32(350.0), "SIGNATURE EXAM SUPRITENDENT".to_string()),
                ],
                rule: FooterRule::LastPageOnly,
                gap: Pt::from_f32(40.0),
            },
            grid: GridStyle::HeaderUnderline,
            banner: Some(Rect {
                x: Pt::from_f32(50.0),
                y: Pt::from_f32(805.0),
                width: Pt::from_f32(500.0),
                height: Pt::from_f32(40.0),
            }),
            artwork: ArtworkRule::with_default("banner-main")
                .tag("MAIN", "banner-main")
                .tag("SUB", "banner-sub"),
        }
    }

    /// Left edge of column `index`.
    pub fn column_x(&self, index: usize) -> Pt {
        let mut x = self.margin_x;
        for column in &self.columns[..index] {
            x += column.width;
        }
        x
    }

    pub fn content_width(&self) -> Pt {
        self.columns.iter().map(|c| c.width).sum()
    }

    /// Left edge and total width of a super-header's spanned region.
    pub fn span_region(&self, span: &SpanLabel) -> (Pt, Pt) {
        let x = self.column_x(span.start);
        let width = self.columns[span.start..span.start + span.span]
            .iter()
            .map(|c| c.width)
            .sum();
        (x, width)
    }

    pub fn validate(&self) -> Result<(), RollPressError> {
        let invalid = |message: String| Err(RollPressError::InvalidConfiguration(message));
        if self.page_size.width <= Pt::ZERO || self.page_size.height <= Pt::ZERO {
            return invalid(format!(
                "page size must be positive, got {}x{}",
                self.page_size.width.to_f32(),
                self.page_size.height.to_f32()
            ));
        }
        if self.columns.is_empty() {
            return invalid("template declares no columns".to_string());
        }
        for column in &self.columns {
            if column.width <= Pt::ZERO {
                return invalid(format!("column {:?} has non-positive width", column.label));
            }
            if column.wrap == Some(0) {
                return invalid(format!("column {:?} has a zero wrap budget", column.label));
            }
        }
        if self.margin_x + self.content_width() > self.page_size.width {
            return invalid(format!(
                "columns are {}pt wide but only {}pt fit after the margin",
                self.content_width().to_f32(),
                (self.page_size.width - self.margin_x).to_f32()
            ));
        }
        for span in &self.spans {
            if span.span == 0 || span.start + span.span > self.columns.len() {
                return invalid(format!(
                    "super-header {:?} spans columns {}..{} but there are {}",
                    span.label,
                    span.start,
                    span.start + span.span,
                    self.columns.len()
                ));
            }
        }
        if self.base_row_height <= Pt::ZERO
            || self.leading <= Pt::ZERO
            || self.band_height <= Pt::ZERO
        {
            return invalid("row height, leading and band height must be positive".to_string());
        }
        if self.lines_per_row_unit == 0 {
            return invalid("lines_per_row_unit must be at least 1".to_string());
        }
        if self.footer_reserve < Pt::ZERO || self.footer_reserve >= self.masthead_top {
            return invalid("footer reserve must sit below the masthead".to_string());
        }
        if self.masthead_top >= self.page_size.height {
            return invalid("masthead starts above the page".to_string());
        }
        if self.body_size <= Pt::ZERO || self.masthead_size <= Pt::ZERO {
            return invalid("font sizes must be positive".to_string());
        }
        Ok(())
    }
}
