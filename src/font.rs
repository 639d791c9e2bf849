use crate::error::RollPressError;
use crate::types::Pt;
use std::collections::HashMap;

/// Registered TrueType faces, loaded once per run from the asset store and
/// shared read-only across every group's document.
#[derive(Debug, Default)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    /// PostScript name from the face's name table, used as the PDF
    /// BaseFont. Falls back to the registry name with spaces stripped.
    pub(crate) base_font: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

/// Descriptor metrics scaled to a 1000-unit em, the form PDF wants.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) is_fixed_pitch: bool,
}

/// Glyph ids and their advances (1000-unit em) for one string, mapped
/// codepoint by codepoint. Unmapped codepoints become glyph 0.
#[derive(Debug, Clone)]
pub(crate) struct MappedText {
    pub(crate) gids: Vec<u16>,
    pub(crate) advances: Vec<u16>,
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers font bytes under `name`; a later registration under the
    /// same name shadows the earlier one.
    pub(crate) fn register_bytes(&mut self, name: &str, data: Vec<u8>) -> Result<(), RollPressError> {
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(RollPressError::Asset(format!(
                "font {name:?} is not a parseable TrueType/OpenType face"
            )));
        };
        let base_font = postscript_name(&face)
            .unwrap_or_else(|| name.chars().filter(|c| !c.is_whitespace()).collect());
        let metrics = FontMetrics::from_face(&face);
        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            base_font,
            data,
            metrics,
            program_kind,
        });
        self.lookup.insert(normalize_name(name), index);
        Ok(())
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
    }

    pub(crate) fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Maps a string to glyph ids with no shaping: each codepoint looks up
    /// its own glyph. Returns `None` when the font is not registered.
    pub(crate) fn map_text(&self, name: &str, text: &str) -> Option<MappedText> {
        let font = self.resolve(name)?;
        let face = ttf_parser::Face::parse(&font.data, 0).ok()?;
        let units = face.units_per_em().max(1) as i64;
        let mut gids = Vec::with_capacity(text.chars().count());
        let mut advances = Vec::with_capacity(gids.capacity());
        for ch in text.chars() {
            let gid = face.glyph_index(ch).map(|g| g.0).unwrap_or(0);
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .unwrap_or(0) as i64;
            let scaled = ((advance * 1000 + units / 2) / units).clamp(0, u16::MAX as i64);
            gids.push(gid);
            advances.push(scaled as u16);
        }
        Some(MappedText { gids, advances })
    }

    /// Width of `text` at `font_size`. Unregistered fonts use the flat
    /// 0.6 x size per-char estimate, so measurement never fails.
    pub(crate) fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        if let Some(mapped) = self.map_text(name, text) {
            let total: i64 = mapped.advances.iter().map(|&a| a as i64).sum();
            if total <= 0 {
                return Pt::ZERO;
            }
            let total = total.clamp(0, i32::MAX as i64) as i32;
            return font_size.mul_ratio(total, 1000);
        }
        let char_width = (font_size * 0.6).max(Pt::from_f32(1.0));
        char_width * (text.chars().count() as i32)
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        Self {
            ascent,
            descent,
            cap_height,
            italic_angle,
            stem_v: 80,
            bbox,
            is_fixed_pitch: face.is_monospaced(),
        }
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;
    face.names()
        .into_iter()
        .find(|entry| entry.name_id == name_id::POST_SCRIPT_NAME)
        .and_then(|entry| entry.to_string())
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}
