mod archive;
mod assets;
mod batch;
mod canvas;
mod composer;
mod debug;
mod error;
mod flate;
mod font;
mod metrics;
mod pdf;
mod roster;
mod template;
mod types;
mod wrap;

pub use archive::{ArchiveSink, ZipSink};
pub use assets::{Asset, AssetKind, AssetStore};
pub use batch::{GroupFailurePolicy, RunReport, SkippedGroup};
pub use canvas::{Canvas, Command, Document, Page};
pub use composer::{META_PAGE, META_ROW};
use debug::DebugLogger;
pub use error::RollPressError;
use font::FontRegistry;
pub use metrics::{GroupMetrics, PageMetrics, RunMetrics};
pub use pdf::document_to_pdf;
pub use roster::{
    FIELD_CANDIDATE_NAME, FIELD_CENTER_CODE, FIELD_CENTER_NAME, FIELD_CENTER_TYPE,
    FIELD_DISTRICT_NAME, FIELD_EXAM_DATE, FIELD_ROLL_NUMBER, FIELD_SERIAL, FieldValue, Group,
    GroupMeta, Record, group_records, require_group_field, sort_by_numeric_field,
};
pub use template::{
    ArtworkRule, Column, ColumnContent, FooterBlock, FooterRule, GridStyle, IdLine, IdSource,
    RollTemplate, SpanLabel,
};
pub use types::{Color, Pt, Rect, Size};
pub use wrap::{chars_for_width, required_units, sanitize, wrap_text};

use std::sync::Arc;

const DOCUMENT_EXTENSION: &str = "pdf";

/// The configured engine: groups a roster by center, renders one signature
/// roll per center, and bundles the documents into a ZIP archive. Fonts and
/// artwork load once at build time and are shared read-only across groups.
pub struct RollPress {
    template: RollTemplate,
    group_field: String,
    allow_missing_group_key: bool,
    failure_policy: GroupFailurePolicy,
    fonts: Arc<FontRegistry>,
    assets: Arc<AssetStore>,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Clone)]
pub struct RollPressBuilder {
    template: RollTemplate,
    group_field: String,
    allow_missing_group_key: bool,
    failure_policy: GroupFailurePolicy,
    assets: AssetStore,
    debug_path: Option<std::path::PathBuf>,
}

impl RollPress {
    pub fn builder() -> RollPressBuilder {
        RollPressBuilder::new()
    }

    /// Renders the full pipeline and returns the archive bytes.
    pub fn render_archive(&self, records: Vec<Record>) -> Result<Vec<u8>, RollPressError> {
        self.render_archive_with_report(records)
            .map(|(bytes, _)| bytes)
    }

    /// Renders the full pipeline: strict input checks, grouping, one
    /// document per group in first-appearance order, then a single sealed
    /// archive. Under the default `Abort` policy any failing group fails
    /// the run; under `SkipAndReport` the report names what was dropped.
    pub fn render_archive_with_report(
        &self,
        records: Vec<Record>,
    ) -> Result<(Vec<u8>, RunReport), RollPressError> {
        if records.is_empty() {
            return Err(RollPressError::EmptyRoster);
        }
        if !self.allow_missing_group_key {
            roster::require_group_field(&records, &self.group_field)?;
        }
        let row_count = records.len();
        let groups = roster::group_records(records, &self.group_field);
        if let Some(logger) = self.debug.as_deref() {
            logger.run_start(groups.len(), row_count);
        }
        let result = batch::run_batch(
            &groups,
            DOCUMENT_EXTENSION,
            self.failure_policy,
            ZipSink::new(),
            self.debug.as_deref(),
            |group| self.render_group(group),
        );
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary("render_archive");
            logger.flush();
        }
        result
    }

    /// Composes one group without serializing, for callers that bring their
    /// own rendering backend for the command stream.
    pub fn compose_document(&self, group: &Group) -> Document {
        composer::compose_group(
            group,
            &self.template,
            &self.fonts,
            &self.assets,
            self.debug.as_deref(),
        )
        .0
    }

    /// Serializes one group's signature roll to PDF bytes.
    pub fn render_group_pdf(&self, group: &Group) -> Result<Vec<u8>, RollPressError> {
        self.render_group(group).map(|(bytes, _)| bytes)
    }

    fn render_group(&self, group: &Group) -> Result<(Vec<u8>, GroupMetrics), RollPressError> {
        let (document, mut metrics) = composer::compose_group(
            group,
            &self.template,
            &self.fonts,
            &self.assets,
            self.debug.as_deref(),
        );
        let bytes = pdf::document_to_pdf_with_resources(&document, &self.fonts, &self.assets)?;
        metrics.document_bytes = bytes.len();
        Ok((bytes, metrics))
    }
}

impl RollPressBuilder {
    pub fn new() -> Self {
        Self {
            template: RollTemplate::nmmse(),
            group_field: FIELD_CENTER_CODE.to_string(),
            allow_missing_group_key: false,
            failure_policy: GroupFailurePolicy::Abort,
            assets: AssetStore::new(),
            debug_path: None,
        }
    }

    pub fn template(mut self, template: RollTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn group_field(mut self, field: impl Into<String>) -> Self {
        self.group_field = field.into();
        self
    }

    pub fn failure_policy(mut self, policy: GroupFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Accept records with no value in the grouping field; they gather
    /// under the empty-string key instead of failing the run up front.
    pub fn allow_missing_group_key(mut self, allow: bool) -> Self {
        self.allow_missing_group_key = allow;
        self
    }

    pub fn asset(mut self, asset: Asset) -> Self {
        self.assets.add(asset);
        self
    }

    pub fn font(self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.asset(Asset::new(name, AssetKind::Font, data))
    }

    pub fn image(self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.asset(Asset::new(name, AssetKind::Image, data))
    }

    pub fn debug_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<RollPress, RollPressError> {
        self.template.validate()?;
        if self.group_field.is_empty() {
            return Err(RollPressError::InvalidConfiguration(
                "grouping field name is empty".to_string(),
            ));
        }
        let mut registry = FontRegistry::new();
        for asset in self.assets.fonts() {
            registry.register_bytes(&asset.name, asset.data.clone())?;
        }
        let debug = match self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        Ok(RollPress {
            template: self.template,
            group_field: self.group_field,
            allow_missing_group_key: self.allow_missing_group_key,
            failure_policy: self.failure_policy,
            fonts: Arc::new(registry),
            assets: Arc::new(self.assets),
            debug,
        })
    }
}

impl Default for RollPressBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(center: f64, roll: &str, name: &str) -> Record {
        Record::from_pairs([
            (FIELD_CENTER_CODE, FieldValue::number(center)),
            (FIELD_ROLL_NUMBER, FieldValue::text(roll)),
            (FIELD_CANDIDATE_NAME, FieldValue::text(name)),
            (FIELD_CENTER_NAME, FieldValue::text("GOVT HS DURG")),
            (FIELD_EXAM_DATE, FieldValue::text("16/02/2025")),
        ])
    }

    fn engine() -> RollPress {
        RollPress::builder().build().unwrap()
    }

    fn zip_name_positions(archive: &[u8], name: &str) -> Vec<usize> {
        archive
            .windows(name.len())
            .enumerate()
            .filter(|(_, window)| *window == name.as_bytes())
            .map(|(at, _)| at)
            .collect()
    }

    #[test]
    fn empty_roster_is_an_input_error_with_no_archive() {
        let result = engine().render_archive(Vec::new());
        assert!(matches!(result, Err(RollPressError::EmptyRoster)));
    }

    #[test]
    fn keys_five_five_three_produce_two_entries_in_first_seen_order() {
        let archive = engine()
            .render_archive(vec![
                record(5.0, "1001", "ANITA SAHU"),
                record(5.0, "1002", "RAVI VERMA"),
                record(3.0, "1003", "MOHAN LAL"),
            ])
            .unwrap();
        // ZIP local headers stream in group order: 5.pdf before 3.pdf.
        let five = zip_name_positions(&archive, "5.pdf");
        let three = zip_name_positions(&archive, "3.pdf");
        // Each name appears twice: local header and central directory.
        assert_eq!(five.len(), 2);
        assert_eq!(three.len(), 2);
        assert!(five[0] < three[0]);
    }

    #[test]
    fn missing_group_field_fails_before_rendering_by_default() {
        let result = engine().render_archive(vec![
            record(5.0, "1001", "ANITA SAHU"),
            Record::from_pairs([(FIELD_ROLL_NUMBER, FieldValue::text("1002"))]),
        ]);
        assert!(matches!(
            result,
            Err(RollPressError::MissingGroupField { index: 1, .. })
        ));
    }

    #[test]
    fn missing_group_field_can_be_allowed_through() {
        let engine = RollPress::builder()
            .allow_missing_group_key(true)
            .build()
            .unwrap();
        let archive = engine
            .render_archive(vec![Record::from_pairs([(
                FIELD_ROLL_NUMBER,
                FieldValue::text("1002"),
            )])])
            .unwrap();
        assert!(!zip_name_positions(&archive, ".pdf").is_empty());
    }

    #[test]
    fn invalid_template_geometry_fails_at_build_time() {
        let mut template = RollTemplate::nmmse();
        template.columns[0].width = Pt::from_f32(900.0);
        let result = RollPress::builder().template(template).build();
        assert!(matches!(
            result,
            Err(RollPressError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_group_field_name_fails_at_build_time() {
        let result = RollPress::builder().group_field("").build();
        assert!(matches!(
            result,
            Err(RollPressError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn garbage_font_asset_fails_at_build_time() {
        let result = RollPress::builder()
            .font("NotoSansDevanagari", vec![0, 1, 2, 3])
            .build();
        assert!(matches!(result, Err(RollPressError::Asset(_))));
    }

    #[test]
    fn corrupt_banner_asset_fails_the_run_even_under_skip_policy() {
        // Build succeeds (images decode lazily at serialization time), but
        // the run must fail outright: a broken shared asset is not a
        // per-group condition the skip policy may paper over.
        let engine = RollPress::builder()
            .image("banner-main", vec![1, 2, 3, 4])
            .failure_policy(GroupFailurePolicy::SkipAndReport)
            .build()
            .unwrap();
        let result = engine.render_archive_with_report(vec![
            record(5.0, "1001", "ANITA SAHU"),
            record(3.0, "1002", "MOHAN LAL"),
        ]);
        assert!(matches!(result, Err(RollPressError::Asset(_))));
    }

    #[test]
    fn rerunning_identical_input_yields_byte_identical_archives() {
        let rows = || {
            vec![
                record(12.0, "2001", "KAVITA DEVI / RAM PRASAD"),
                record(12.0, "2002", "SUNIL KUMAR / SHYAM LAL"),
                record(7.0, "2003", "GEETA BAI / HARI RAM"),
            ]
        };
        let first = engine().render_archive(rows()).unwrap();
        let second = engine().render_archive(rows()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn report_carries_metrics_and_a_status_line() {
        let (_, report) = engine()
            .render_archive_with_report(vec![
                record(5.0, "1001", "ANITA SAHU"),
                record(5.0, "1002", "RAVI VERMA"),
                record(3.0, "1003", "MOHAN LAL"),
            ])
            .unwrap();
        assert_eq!(report.rendered, ["5", "3"]);
        assert_eq!(report.status_line(), "rendered 2 centers");
        assert_eq!(report.metrics.groups.len(), 2);
        assert_eq!(report.metrics.row_count(), 3);
        assert!(report.metrics.archive_bytes > 0);
        assert_eq!(report.metrics.groups[0].key, "5");
        assert_eq!(report.metrics.groups[0].row_count, 2);
    }

    #[test]
    fn group_pdf_parses_and_carries_its_pages() {
        let groups = group_records(
            vec![
                record(9.0, "3001", "ASHA KUMARI / DINESH SINGH"),
                record(9.0, "3002", "VIJAY SINGH / MOHAN SINGH"),
            ],
            FIELD_CENTER_CODE,
        );
        let bytes = engine().render_group_pdf(&groups[0]).unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).expect("valid pdf");
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn compose_document_exposes_the_command_stream() {
        let groups = group_records(vec![record(4.0, "4001", "NEHA SONI")], FIELD_CENTER_CODE);
        let document = engine().compose_document(&groups[0]);
        assert_eq!(document.pages.len(), 1);
        let drew_title = document.pages[0].commands.iter().any(|cmd| {
            matches!(cmd, Command::DrawString { text, .. } if text == "SIGNATURE ROLL")
        });
        assert!(drew_title);
    }
}
