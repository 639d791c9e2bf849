use std::collections::{BTreeMap, BTreeSet, HashMap};

use image::GenericImageView;
use sha2::{Digest, Sha256};

use crate::assets::AssetStore;
use crate::canvas::{Command, Document, Page};
use crate::error::RollPressError;
use crate::flate;
use crate::font::{FontProgramKind, FontRegistry, RegisteredFont};
use crate::types::Pt;

const DEFAULT_FONT: &str = "Helvetica";

/// Serializes a document using built-in fonts only. Text set in a face that
/// was never registered renders as WinAnsi-encoded Type1 output.
pub fn document_to_pdf(document: &Document) -> Result<Vec<u8>, RollPressError> {
    document_to_pdf_with_resources(document, &FontRegistry::new(), &AssetStore::new())
}

/// Serializes a document against a font registry and asset store. Registered
/// faces embed as Identity-H CID fonts; image assets embed as XObjects,
/// deduplicated by content hash. Page content streams are Flate-compressed.
///
/// Coordinates in the command stream are already PDF-native (origin at the
/// lower-left corner), so no axis conversion happens here.
pub(crate) fn document_to_pdf_with_resources(
    document: &Document,
    registry: &FontRegistry,
    assets: &AssetStore,
) -> Result<Vec<u8>, RollPressError> {
    let used_fonts = collect_used_fonts(document);
    let used_images = collect_used_images(document);
    let (images, image_map) = prepare_images(&used_images, assets)?;

    let mut font_slots: BTreeMap<String, FontSlot> = BTreeMap::new();
    for (index, name) in used_fonts.iter().enumerate() {
        font_slots.insert(
            name.clone(),
            FontSlot {
                resource: format!("F{}", index + 1),
                embedded: registry.is_registered(name),
            },
        );
    }

    let mut usages: HashMap<String, FontUsage> = HashMap::new();
    let mut contents = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        contents.push(render_page(
            page,
            &font_slots,
            &image_map,
            registry,
            &mut usages,
        ));
    }

    // Object ids are assigned up front: catalog, pages and the shared
    // resources dictionary first, then a content/page pair per page, then
    // font and image objects, with the info dictionary last.
    let catalog_id = 1usize;
    let pages_id = 2usize;
    let resources_id = 3usize;
    let first_page_id = 4usize;
    let page_count = document.pages.len();
    let mut next_id = first_page_id + 2 * page_count;

    let mut font_refs: Vec<(String, usize)> = Vec::new();
    let mut font_objects: Vec<String> = Vec::new();
    for (name, slot) in &font_slots {
        if slot.embedded {
            let font = registry
                .resolve(name)
                .ok_or_else(|| RollPressError::Asset(format!("font {name:?} vanished")))?;
            let usage = usages.get(name).cloned().unwrap_or_default();
            let (objects, type0_id, after) = build_cidfont_objects(font, &usage, next_id);
            font_objects.extend(objects);
            font_refs.push((slot.resource.clone(), type0_id));
            next_id = after;
        } else {
            font_objects.push(font_object(name));
            font_refs.push((slot.resource.clone(), next_id));
            next_id += 1;
        }
    }

    let mut image_refs: Vec<(String, usize)> = Vec::new();
    let mut image_objects: Vec<String> = Vec::new();
    for prepared in &images {
        let smask_id = prepared.image.alpha.as_ref().map(|alpha| {
            let id = next_id;
            next_id += 1;
            image_objects.push(image_smask_object(prepared.image.width, prepared.image.height, alpha));
            id
        });
        image_objects.push(image_object(&prepared.image, smask_id));
        image_refs.push((prepared.resource.clone(), next_id));
        next_id += 1;
    }

    let info_id = next_id;

    let mut objects: Vec<Vec<u8>> = Vec::with_capacity(info_id);
    objects.push(format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id).into_bytes());

    let kids = (0..page_count)
        .map(|index| format!("{} 0 R", first_page_id + 2 * index + 1))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids, page_count
        )
        .into_bytes(),
    );

    objects.push(resources_object(&font_refs, &image_refs).into_bytes());

    for (index, content) in contents.iter().enumerate() {
        objects.push(content_stream_object(content));
        let content_id = first_page_id + 2 * index;
        objects.push(
            format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
                pages_id,
                fmt_pt(document.page_size.width),
                fmt_pt(document.page_size.height),
                resources_id,
                content_id,
            )
            .into_bytes(),
        );
    }

    for object in font_objects {
        objects.push(object.into_bytes());
    }
    for object in image_objects {
        objects.push(object.into_bytes());
    }

    objects.push(b"<< /Producer (RollPress) >>".to_vec());

    Ok(build_pdf(objects, catalog_id, info_id))
}

struct FontSlot {
    resource: String,
    embedded: bool,
}

/// Glyphs one embedded face actually set, collected while rendering. Keys
/// the /W width array and the ToUnicode reverse map.
#[derive(Debug, Default, Clone)]
struct FontUsage {
    glyph_map: BTreeMap<u16, String>,
    advances: BTreeMap<u16, u16>,
}

fn collect_used_fonts(document: &Document) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for page in &document.pages {
        let mut current = DEFAULT_FONT.to_string();
        for command in &page.commands {
            match command {
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { text, .. } if !text.is_empty() => {
                    used.insert(current.clone());
                }
                _ => {}
            }
        }
    }
    used
}

fn collect_used_images(document: &Document) -> Vec<String> {
    let mut order = Vec::new();
    for page in &document.pages {
        for command in &page.commands {
            if let Command::DrawImage { resource_id, .. } = command {
                if !order.contains(resource_id) {
                    order.push(resource_id.clone());
                }
            }
        }
    }
    order
}

fn render_page(
    page: &Page,
    font_slots: &BTreeMap<String, FontSlot>,
    image_map: &HashMap<String, String>,
    registry: &FontRegistry,
    usages: &mut HashMap<String, FontUsage>,
) -> String {
    let mut out = String::new();
    let mut current_font = DEFAULT_FONT.to_string();
    let mut current_size = Pt::from_f32(12.0);

    for command in &page.commands {
        match command {
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => {
                out.push_str(&format!(
                    "{} {} {} rg\n",
                    fmt(color.r),
                    fmt(color.g),
                    fmt(color.b)
                ));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!(
                    "{} {} {} RG\n",
                    fmt(color.r),
                    fmt(color.g),
                    fmt(color.b)
                ));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => current_font = name.clone(),
            Command::SetFontSize(size) => current_size = *size,
            Command::DrawString { x, y, text } => {
                if text.is_empty() {
                    continue;
                }
                let Some(slot) = font_slots.get(&current_font) else {
                    continue;
                };
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", slot.resource, fmt_pt(current_size)));
                out.push_str(&format!("{} {} Td\n", fmt_pt(*x), fmt_pt(*y)));
                if slot.embedded {
                    if let Some(mapped) = registry.map_text(&current_font, text) {
                        let usage = usages.entry(current_font.clone()).or_default();
                        let mut hex = String::with_capacity(mapped.gids.len() * 4 + 2);
                        hex.push('<');
                        for ((ch, gid), advance) in text
                            .chars()
                            .zip(mapped.gids.iter())
                            .zip(mapped.advances.iter())
                        {
                            usage.glyph_map.entry(*gid).or_insert_with(|| ch.to_string());
                            usage.advances.entry(*gid).or_insert(*advance);
                            hex.push_str(&format!("{:04X}", gid));
                        }
                        hex.push('>');
                        out.push_str(&format!("{} Tj\n", hex));
                    }
                } else {
                    out.push_str(&format!("({}) Tj\n", encode_winansi(text)));
                }
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nS\n",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawLine { x1, y1, x2, y2 } => {
                out.push_str(&format!(
                    "{} {} m\n{} {} l\nS\n",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some(name) = image_map.get(resource_id) {
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(*y)
                    ));
                    out.push_str(&format!("/{} Do\n", name));
                    out.push_str("Q\n");
                }
            }
        }
    }

    out
}

struct PreparedImage {
    resource: String,
    image: ImageData,
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

fn prepare_images(
    names: &[String],
    assets: &AssetStore,
) -> Result<(Vec<PreparedImage>, HashMap<String, String>), RollPressError> {
    let mut prepared: Vec<PreparedImage> = Vec::new();
    let mut name_map: HashMap<String, String> = HashMap::new();
    let mut content_map: HashMap<String, String> = HashMap::new();

    for name in names {
        let Some(asset) = assets.image(name) else {
            continue;
        };
        let digest = sha256_hex(&asset.data);
        if let Some(resource) = content_map.get(&digest) {
            name_map.insert(name.clone(), resource.clone());
            continue;
        }
        let image = decode_image(&asset.data).ok_or_else(|| {
            RollPressError::Asset(format!("image {name:?} is not decodable PNG or JPEG data"))
        })?;
        let resource = format!("Im{}", prepared.len() + 1);
        name_map.insert(name.clone(), resource.clone());
        content_map.insert(digest, resource.clone());
        prepared.push(PreparedImage { resource, image });
    }

    Ok((prepared, name_map))
}

fn decode_image(data: &[u8]) -> Option<ImageData> {
    let format = image::guess_format(data).ok();
    let decoded = image::load_from_memory(data).ok()?;
    let (width, height) = decoded.dimensions();

    // JPEG passes through untouched so recompression never degrades it.
    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate::zlib_deflate_parallel(&rgb),
        alpha: has_alpha.then(|| flate::zlib_deflate_parallel(&alpha)),
    })
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(width: u32, height: u32, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        width,
        height,
        stream_data.len(),
        stream_data
    )
}

/// Builds the five-object Identity-H chain for one embedded face: font file,
/// descriptor, CIDFontType2, ToUnicode CMap and the Type0 wrapper. Returns
/// the objects, the Type0 id and the next free id.
fn build_cidfont_objects(
    font: &RegisteredFont,
    usage: &FontUsage,
    start_id: usize,
) -> (Vec<String>, usize, usize) {
    let font_file_id = start_id;
    let descriptor_id = start_id + 1;
    let cid_font_id = start_id + 2;
    let to_unicode_id = start_id + 3;
    let type0_font_id = start_id + 4;

    let mut objects = Vec::with_capacity(5);
    objects.push(font_file_object(&font.data, font.program_kind));
    objects.push(font_descriptor_object(font, font_file_id));

    let w_entries = usage
        .advances
        .iter()
        .map(|(gid, advance)| format!("{} [{}]", gid, advance))
        .collect::<Vec<_>>();
    let w_array = if w_entries.is_empty() {
        String::new()
    } else {
        format!("/W [{}] ", w_entries.join(" "))
    };

    let base = sanitize_font_name(&font.base_font);
    objects.push(format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} 0 R {}/CIDToGIDMap /Identity >>",
        base, descriptor_id, w_array
    ));

    objects.push(stream_object(&to_unicode_cmap(&usage.glyph_map)));

    objects.push(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        base, cid_font_id, to_unicode_id
    ));

    (objects, type0_font_id, start_id + 5)
}

fn font_file_object(data: &[u8], kind: FontProgramKind) -> String {
    let mut stream_data = ascii_hex_encode(data);
    stream_data.push('>');
    stream_data.push('\n');
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode",
        stream_data.len(),
        data.len()
    );
    if matches!(kind, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    dict.push_str(" >>\nstream\n");
    format!("{}{}endstream", dict, stream_data)
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /{} {} 0 R >>",
        sanitize_font_name(&font.base_font),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.stem_v,
        font_file_entry,
        font_file_id
    )
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn resources_object(fonts: &[(String, usize)], images: &[(String, usize)]) -> String {
    let mut sections = Vec::new();
    if !fonts.is_empty() {
        let entries = fonts
            .iter()
            .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
            .collect::<Vec<_>>()
            .join(" ");
        sections.push(format!("/Font << {} >>", entries));
    }
    if !images.is_empty() {
        let entries = images
            .iter()
            .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
            .collect::<Vec<_>>()
            .join(" ");
        sections.push(format!("/XObject << {} >>", entries));
    }
    if sections.is_empty() {
        "<< >>".to_string()
    } else {
        format!("<< {} >>", sections.join(" "))
    }
}

fn content_stream_object(content: &str) -> Vec<u8> {
    let compressed = flate::zlib_deflate_parallel(content.as_bytes());
    let mut out = Vec::with_capacity(compressed.len() + 64);
    out.extend_from_slice(
        format!(
            "<< /Length {} /Filter /FlateDecode >>\nstream\n",
            compressed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed);
    out.extend_from_slice(b"\nendstream");
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn build_pdf(objects: Vec<Vec<u8>>, catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            objects.len() + 1,
            catalog_id,
            info_id,
            xref_start
        )
        .as_bytes(),
    );

    out
}

fn to_unicode_cmap(glyph_map: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(u16, &String)> = glyph_map.iter().map(|(g, s)| (*g, s)).collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let mut idx = 0usize;
    while idx < entries.len() {
        let end = (idx + 100).min(entries.len());
        out.push_str(&format!("{} beginbfchar\n", end - idx));
        for (gid, text) in &entries[idx..end] {
            let mut unicode = String::new();
            for ch in text.chars() {
                let code = ch as u32;
                if code <= 0xFFFF {
                    unicode.push_str(&format!("{:04X}", code));
                } else {
                    let code = code - 0x1_0000;
                    let high = 0xD800 | (code >> 10);
                    let low = 0xDC00 | (code & 0x3FF);
                    unicode.push_str(&format!("{:04X}{:04X}", high, low));
                }
            }
            out.push_str(&format!("<{:04X}> <{}>\n", gid, unicode));
        }
        out.push_str("endbfchar\n");
        idx = end;
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '+' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn encode_winansi(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7F => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn fmt(value: f32) -> String {
    format_milli(Pt::from_f32(value).to_milli_i64())
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontMetrics;
    use crate::types::{Color, Size};

    fn one_page_document(commands: Vec<Command>) -> Document {
        Document {
            page_size: Size::new(600.0, 850.0),
            pages: vec![Page { commands }],
        }
    }

    fn count_token(bytes: &[u8], token: &[u8]) -> usize {
        if token.is_empty() || bytes.len() < token.len() {
            return 0;
        }
        bytes.windows(token.len()).filter(|w| *w == token).count()
    }

    fn page_content(bytes: &[u8]) -> String {
        let doc = lopdf::Document::load_mem(bytes).expect("parse pdf");
        let pages = doc.get_pages();
        let (_, page_id) = pages.iter().next().expect("one page");
        let content = doc.get_page_content(*page_id).expect("page content");
        String::from_utf8_lossy(&content).into_owned()
    }

    #[test]
    fn draw_string_lands_in_the_decoded_content_stream() {
        let doc = one_page_document(vec![Command::DrawString {
            x: Pt::from_f32(50.0),
            y: Pt::from_f32(740.0),
            text: "SIGNATURE ROLL".to_string(),
        }]);
        let bytes = document_to_pdf(&doc).unwrap();
        let content = page_content(&bytes);
        assert!(content.contains("(SIGNATURE ROLL) Tj"));
        assert!(content.contains("50 740 Td"));
    }

    #[test]
    fn content_streams_are_flate_compressed() {
        let doc = one_page_document(vec![Command::DrawString {
            x: Pt::from_f32(50.0),
            y: Pt::from_f32(740.0),
            text: "SIGNATURE ROLL".to_string(),
        }]);
        let bytes = document_to_pdf(&doc).unwrap();
        assert_eq!(count_token(&bytes, b"/Filter /FlateDecode"), 1);
        assert_eq!(count_token(&bytes, b"(SIGNATURE ROLL)"), 0);
    }

    #[test]
    fn coordinates_pass_through_without_flipping() {
        let doc = one_page_document(vec![
            Command::DrawLine {
                x1: Pt::from_f32(50.0),
                y1: Pt::from_f32(675.0),
                x2: Pt::from_f32(550.0),
                y2: Pt::from_f32(675.0),
            },
            Command::DrawRect {
                x: Pt::from_f32(50.0),
                y: Pt::from_f32(80.0),
                width: Pt::from_f32(500.0),
                height: Pt::from_f32(700.0),
            },
        ]);
        let bytes = document_to_pdf(&doc).unwrap();
        let content = page_content(&bytes);
        assert!(content.contains("50 675 m\n550 675 l\nS"));
        assert!(content.contains("50 80 500 700 re\nS"));
    }

    #[test]
    fn pages_and_media_box_survive_a_parse() {
        let mut pages = Vec::new();
        for _ in 0..3 {
            pages.push(Page {
                commands: vec![Command::DrawString {
                    x: Pt::ZERO,
                    y: Pt::ZERO,
                    text: "x".to_string(),
                }],
            });
        }
        let document = Document {
            page_size: Size::new(600.0, 850.0),
            pages,
        };
        let bytes = document_to_pdf(&document).unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).expect("parse pdf");
        assert_eq!(parsed.get_pages().len(), 3);
        let lossy = String::from_utf8_lossy(&bytes);
        assert!(lossy.contains("/MediaBox [0 0 600 850]"));
        assert!(lossy.starts_with("%PDF-1.7"));
        assert!(lossy.ends_with("%%EOF"));
    }

    #[test]
    fn serialization_is_byte_identical_across_runs() {
        let doc = one_page_document(vec![
            Command::SetFontSize(Pt::from_f32(10.0)),
            Command::SetFillColor(Color::rgb(0.2, 0.4, 0.6)),
            Command::DrawString {
                x: Pt::from_f32(100.0),
                y: Pt::from_f32(680.0),
                text: "ROLL NUMBER".to_string(),
            },
        ]);
        let first = document_to_pdf(&doc).unwrap();
        let second = document_to_pdf(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn winansi_escapes_string_delimiters() {
        let doc = one_page_document(vec![Command::DrawString {
            x: Pt::ZERO,
            y: Pt::ZERO,
            text: "A (B) \\ C".to_string(),
        }]);
        let bytes = document_to_pdf(&doc).unwrap();
        let content = page_content(&bytes);
        assert!(content.contains("(A \\(B\\) \\\\ C) Tj"));
    }

    #[test]
    fn unmappable_chars_fall_back_to_question_marks() {
        assert_eq!(encode_winansi("क Z"), "? Z");
        assert_eq!(encode_winansi("caf\u{00E9}"), "caf\\351");
    }

    #[test]
    fn to_unicode_cmap_handles_surrogates() {
        let mut map = BTreeMap::new();
        map.insert(3u16, "A".to_string());
        map.insert(4u16, "\u{1F600}".to_string());
        let cmap = to_unicode_cmap(&map);
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<0004> <D83DDE00>"));
    }

    #[test]
    fn cidfont_chain_links_descriptor_widths_and_encoding() {
        let font = RegisteredFont {
            base_font: "TestFace-Regular".to_string(),
            data: vec![0x00, 0x01, 0x02, 0x03],
            metrics: FontMetrics {
                ascent: 800,
                descent: -200,
                cap_height: 700,
                italic_angle: 0,
                stem_v: 80,
                bbox: (-100, -250, 1100, 900),
                is_fixed_pitch: false,
            },
            program_kind: FontProgramKind::TrueType,
        };
        let mut usage = FontUsage::default();
        usage.glyph_map.insert(5, "क".to_string());
        usage.advances.insert(5, 520);

        let (objects, type0_id, next_id) = build_cidfont_objects(&font, &usage, 10);
        assert_eq!(objects.len(), 5);
        assert_eq!(type0_id, 14);
        assert_eq!(next_id, 15);
        assert!(objects[0].contains("/Length1 4"));
        assert!(objects[0].contains("/Filter /ASCIIHexDecode"));
        assert!(objects[1].contains("/FontFile2 10 0 R"));
        assert!(objects[1].contains("/FontName /TestFace-Regular"));
        assert!(objects[2].contains("/W [5 [520]]"));
        assert!(objects[2].contains("/CIDToGIDMap /Identity"));
        assert!(objects[3].contains("<0005> <0915>"));
        assert!(objects[4].contains("/Encoding /Identity-H"));
        assert!(objects[4].contains("/DescendantFonts [12 0 R]"));
    }

    #[test]
    fn png_assets_embed_with_smask_and_dedup_by_content() {
        use crate::assets::{Asset, AssetKind};

        let mut pixels = image::RgbaImage::new(2, 2);
        for (index, pixel) in pixels.pixels_mut().enumerate() {
            *pixel = image::Rgba([255, 0, 0, if index == 0 { 128 } else { 255 }]);
        }
        let mut png = Vec::new();
        pixels
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode png");

        let mut assets = AssetStore::new();
        assets.add(Asset::new("banner-main", AssetKind::Image, png.clone()));
        assets.add(Asset::new("banner-sub", AssetKind::Image, png));

        let doc = one_page_document(vec![
            Command::DrawImage {
                x: Pt::from_f32(50.0),
                y: Pt::from_f32(805.0),
                width: Pt::from_f32(500.0),
                height: Pt::from_f32(40.0),
                resource_id: "banner-main".to_string(),
            },
            Command::DrawImage {
                x: Pt::from_f32(50.0),
                y: Pt::from_f32(760.0),
                width: Pt::from_f32(500.0),
                height: Pt::from_f32(40.0),
                resource_id: "banner-sub".to_string(),
            },
        ]);
        let bytes =
            document_to_pdf_with_resources(&doc, &FontRegistry::new(), &assets).unwrap();
        let lossy = String::from_utf8_lossy(&bytes);
        assert!(lossy.contains("/SMask"));
        // Identical bytes under two names collapse to one image XObject.
        assert_eq!(count_token(&bytes, b"/Subtype /Image"), 2); // image + smask
        let content = page_content(&bytes);
        assert_eq!(content.matches("/Im1 Do").count(), 2);
        assert!(content.contains("500 0 0 40 50 805 cm"));
    }

    #[test]
    fn jpeg_assets_pass_through_as_dct() {
        use crate::assets::{Asset, AssetKind};

        let pixels = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut jpeg = Vec::new();
        pixels
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .expect("encode jpeg");

        let mut assets = AssetStore::new();
        assets.add(Asset::new("banner-main", AssetKind::Image, jpeg));

        let doc = one_page_document(vec![Command::DrawImage {
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::from_f32(10.0),
            height: Pt::from_f32(10.0),
            resource_id: "banner-main".to_string(),
        }]);
        let bytes =
            document_to_pdf_with_resources(&doc, &FontRegistry::new(), &assets).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("/DCTDecode"));
    }

    #[test]
    fn missing_image_assets_are_skipped_not_fatal() {
        let doc = one_page_document(vec![Command::DrawImage {
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::from_f32(10.0),
            height: Pt::from_f32(10.0),
            resource_id: "nowhere".to_string(),
        }]);
        let bytes = document_to_pdf(&doc).unwrap();
        let lossy = String::from_utf8_lossy(&bytes);
        assert!(!lossy.contains("/XObject"));
        assert!(!page_content(&bytes).contains("Do"));
    }

    #[test]
    fn corrupt_image_assets_are_an_asset_error() {
        use crate::assets::{Asset, AssetKind};

        let mut assets = AssetStore::new();
        assets.add(Asset::new(
            "banner-main",
            AssetKind::Image,
            vec![1, 2, 3, 4],
        ));
        let doc = one_page_document(vec![Command::DrawImage {
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::from_f32(10.0),
            height: Pt::from_f32(10.0),
            resource_id: "banner-main".to_string(),
        }]);
        let result = document_to_pdf_with_resources(&doc, &FontRegistry::new(), &assets);
        assert!(matches!(result, Err(RollPressError::Asset(_))));
    }

    #[test]
    fn format_milli_trims_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_000), "12");
        assert_eq!(format_milli(12_500), "12.5");
        assert_eq!(format_milli(-333), "-0.333");
    }
}
