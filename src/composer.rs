use std::time::Instant;

use crate::assets::AssetStore;
use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::font::FontRegistry;
use crate::metrics::{GroupMetrics, PageMetrics};
use crate::roster::{Group, Record};
use crate::template::{ColumnContent, FooterRule, GridStyle, IdSource, RollTemplate};
use crate::types::{Color, Pt};
use crate::wrap;

/// Meta keys recorded into the command stream for page-aware reporting and
/// tests. Backends ignore them.
pub const META_PAGE: &str = "roll.page";
pub const META_ROW: &str = "roll.row";

// Inset from a column's left rule to its cell text.
const CELL_PAD: f32 = 2.0;

/// Per-page layout state. One cursor per group, created at NEW_DOCUMENT and
/// discarded at FINALIZE; nothing in it survives the group.
struct PageCursor {
    /// Baseline of the next data row.
    y: Pt,
    page_number: usize,
    rows_on_page: usize,
    /// Top of the table region, for the boxed grid style.
    table_top: Pt,
}

/// Renders one group's complete document: masthead, identification block,
/// column header band(s), data rows with overflow to fresh pages (each of
/// which redraws the masthead and table header), and the signature footer
/// per the template's rule. Never fails: absent fields render blank and an
/// unresolvable banner is simply not drawn.
pub(crate) fn compose_group(
    group: &Group,
    template: &RollTemplate,
    fonts: &FontRegistry,
    assets: &AssetStore,
    debug: Option<&DebugLogger>,
) -> (Document, GroupMetrics) {
    let start = Instant::now();

    // Artwork resolves once per group; a tag with no rule and no default,
    // or a rule pointing at an unregistered image, means no banner.
    let artwork = template
        .artwork
        .resolve(&group.meta.center_type)
        .filter(|name| assets.image(name).is_some())
        .map(str::to_string);

    let mut canvas = Canvas::new(template.page_size);
    let mut cursor = PageCursor {
        y: Pt::ZERO,
        page_number: 0,
        rows_on_page: 0,
        table_top: Pt::ZERO,
    };
    let mut metrics = GroupMetrics {
        key: group.key.clone(),
        ..GroupMetrics::default()
    };

    start_page(&mut canvas, &mut cursor, template, group, fonts, artwork.as_deref());

    for (row_index, record) in group.records.iter().enumerate() {
        let cells = row_cells(record, template);
        let line_count = cells.iter().map(Vec::len).max().unwrap_or(1);
        let units = wrap::required_units(line_count, template.lines_per_row_unit);
        let required = template.base_row_height * units as i32;

        // Overflow: the row moves whole to a fresh page. A row too tall for
        // even a fresh page stays on one page and overruns the reserve.
        if cursor.y - required < template.footer_reserve && cursor.rows_on_page > 0 {
            if let Some(logger) = debug {
                logger.page_break(
                    &group.key,
                    cursor.page_number,
                    cursor.page_number + 1,
                    "row_overflow",
                );
            }
            finish_page(&mut canvas, &mut cursor, template, &mut metrics, false);
            start_page(&mut canvas, &mut cursor, template, group, fonts, artwork.as_deref());
        }

        canvas.meta(META_ROW, row_index.to_string());
        draw_row(&mut canvas, &cursor, template, &cells);
        cursor.y -= required;
        cursor.rows_on_page += 1;
        metrics.row_count += 1;
    }

    finish_page(&mut canvas, &mut cursor, template, &mut metrics, true);
    let document = canvas.finish();
    metrics.render_ms = start.elapsed().as_secs_f64() * 1000.0;
    (document, metrics)
}

/// Draws everything above the first data row and leaves `cursor.y` at that
/// row's baseline. Runs once per page, so continuation pages repeat the
/// masthead and the full table header.
fn start_page(
    canvas: &mut Canvas,
    cursor: &mut PageCursor,
    template: &RollTemplate,
    group: &Group,
    fonts: &FontRegistry,
    artwork: Option<&str>,
) {
    cursor.page_number += 1;
    cursor.rows_on_page = 0;
    canvas.meta(META_PAGE, cursor.page_number.to_string());

    if let (Some(region), Some(asset)) = (template.banner, artwork) {
        canvas.draw_image(region.x, region.y, region.width, region.height, asset);
    }

    canvas.set_font_name(&template.font_name);
    canvas.set_fill_color(Color::BLACK);
    canvas.set_font_size(template.masthead_size);
    let mut y = template.masthead_top;
    for line in &template.masthead {
        draw_centered(canvas, fonts, template, line, template.masthead_size, y);
        y -= template.leading;
    }
    draw_centered(canvas, fonts, template, &template.title, template.masthead_size, y);
    y -= template.leading;

    canvas.set_font_size(template.body_size);
    for id in &template.id_lines {
        let value = match id.source {
            IdSource::GroupKey => group.key.clone(),
            IdSource::CenterName => group.meta.center_name.clone(),
            IdSource::DistrictName => group.meta.district_name.clone(),
            IdSource::ExamDate => group.meta.exam_date.clone(),
        };
        let value = if value.trim().is_empty() {
            template.blank_fill.clone()
        } else {
            value
        };
        canvas.draw_string(template.margin_x, y, format!("{}{}", id.label, value));
        y -= template.leading;
    }

    cursor.table_top = y + template.band_height;

    // Upper band: super-headers spanning their sub-columns.
    if !template.spans.is_empty() {
        for span in &template.spans {
            let (x, width) = template.span_region(span);
            let text_width = fonts.measure_text_width(&template.font_name, template.body_size, &span.label);
            let centered = x + ((width - text_width) / 2).max(Pt::ZERO);
            canvas.draw_string(centered, y, span.label.clone());
        }
        y -= template.band_height;
    }

    // Lower band: one label per column, centered in its column.
    for (index, column) in template.columns.iter().enumerate() {
        let x = template.column_x(index);
        let text_width = fonts.measure_text_width(&template.font_name, template.body_size, &column.label);
        let centered = x + ((column.width - text_width) / 2).max(Pt::ZERO);
        canvas.draw_string(centered, y, column.label.clone());
    }

    if matches!(template.grid, GridStyle::HeaderUnderline | GridStyle::Boxed) {
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_line_width(Pt::from_f32(0.75));
        let rule_y = y - template.band_height / 2;
        canvas.draw_line(
            template.margin_x,
            rule_y,
            template.margin_x + template.content_width(),
            rule_y,
        );
    }

    cursor.y = y - template.header_gap;
}

/// Ends the current page: signature footer per the template's rule, boxed
/// grid lines if configured, page metrics, then the page itself.
fn finish_page(
    canvas: &mut Canvas,
    cursor: &mut PageCursor,
    template: &RollTemplate,
    metrics: &mut GroupMetrics,
    last_page: bool,
) {
    let draw_footer = match template.footer.rule {
        FooterRule::EveryPage => true,
        FooterRule::LastPageOnly => last_page,
    };
    if draw_footer {
        canvas.set_font_size(template.body_size);
        let y = cursor.y - template.footer.gap;
        for (offset, label) in &template.footer.labels {
            canvas.draw_string(template.margin_x + *offset, y, label.clone());
        }
    }

    if template.grid == GridStyle::Boxed {
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_line_width(Pt::from_f32(0.75));
        let bottom = cursor.y;
        canvas.draw_rect(
            template.margin_x,
            bottom,
            template.content_width(),
            cursor.table_top - bottom,
        );
        for index in 1..template.columns.len() {
            let x = template.column_x(index);
            canvas.draw_line(x, bottom, x, cursor.table_top);
        }
    }

    metrics.pages.push(PageMetrics {
        page_number: cursor.page_number,
        row_count: cursor.rows_on_page,
        command_count: canvas.current_command_count(),
    });
    canvas.show_page();
}

/// Wrapped display lines per column for one record. Always one entry per
/// column; a cell with nothing to show is a single empty line.
fn row_cells(record: &Record, template: &RollTemplate) -> Vec<Vec<String>> {
    template
        .columns
        .iter()
        .map(|column| {
            let raw = match &column.content {
                ColumnContent::Field(name) => record.display(name),
                ColumnContent::Placeholder(text) => text.clone(),
            };
            let text = wrap::sanitize(&raw);
            match column.wrap {
                Some(budget) => {
                    let lines = wrap::wrap_text(&text, budget);
                    if lines.is_empty() { vec![String::new()] } else { lines }
                }
                None => vec![text],
            }
        })
        .collect()
}

fn draw_row(canvas: &mut Canvas, cursor: &PageCursor, template: &RollTemplate, cells: &[Vec<String>]) {
    canvas.set_font_name(&template.font_name);
    canvas.set_font_size(template.body_size);
    canvas.set_fill_color(Color::BLACK);
    let line_step = template.base_row_height / template.lines_per_row_unit.max(1) as i32;
    for (index, lines) in cells.iter().enumerate() {
        let x = template.column_x(index) + Pt::from_f32(CELL_PAD);
        for (line_index, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            canvas.draw_string(x, cursor.y - line_step * line_index as i32, line.clone());
        }
    }
}

fn draw_centered(
    canvas: &mut Canvas,
    fonts: &FontRegistry,
    template: &RollTemplate,
    text: &str,
    size: Pt,
    y: Pt,
) {
    if text.is_empty() {
        return;
    }
    let text_width = fonts.measure_text_width(&template.font_name, size, text);
    let x = template.margin_x + ((template.content_width() - text_width) / 2).max(Pt::ZERO);
    canvas.draw_string(x, y, text.to_string());
}
