use crate::types::Pt;

/// Strips codepoints that upload pipelines smuggle into cell text and that
/// no roll font encodes: zero-width spaces and byte-order marks.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\u{200B}' && c != '\u{FEFF}')
        .collect()
}

/// Greedy word wrap on a character-count budget. A word joins the current
/// line while `chars(line) + 1 + chars(word) <= budget`; otherwise the line
/// closes and the word starts the next one. Words longer than the budget
/// get a line of their own, unbroken; nothing is ever truncated. Counts
/// are `char` counts, so non-ASCII names wrap the same way every run.
pub fn wrap_text(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= budget {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// How many base-row units a row needs to fit `line_count` wrapped lines
/// when one unit holds `lines_per_unit` lines. Never less than one unit.
pub fn required_units(line_count: usize, lines_per_unit: usize) -> usize {
    let lines_per_unit = lines_per_unit.max(1);
    line_count.max(1).div_ceil(lines_per_unit)
}

/// Width-derived character budget for a column, using the engine's flat
/// 0.6 x font-size advance estimate.
pub fn chars_for_width(width: Pt, font_size: Pt) -> usize {
    let per_char = font_size.to_f32() * 0.6;
    if per_char <= 0.0 {
        return 1;
    }
    let budget = (width.to_f32() / per_char).floor() as i64;
    budget.max(1) as usize
}
