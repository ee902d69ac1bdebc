//! Entry name validation and legacy name decoding.
//!
//! Archive formats in this family predate any name-encoding standard, so
//! stored names may be ASCII, UTF-8, or a legacy 8-bit code page depending
//! on which tool produced the file.

/// Returns true if every byte is printable 7-bit ASCII territory (1..=127).
pub(crate) fn is_ascii(s: &str) -> bool {
    !s.bytes().any(|b| b == 0 || b > 127)
}

/// Returns true if the name contains C0 control characters.
pub(crate) fn has_control_chars(s: &str) -> bool {
    s.chars().any(|c| (c as u32) < 0x20)
}

/// Replace host path separators with the canonical `/`.
pub(crate) fn canonical_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Decode a fixed-size name field from a directory table.
///
/// The field is NUL-padded; decoding tries strict ASCII, then UTF-8, then
/// falls back to Windows-1252 since there is no way to tell which legacy
/// code page a pre-standard tool used.
pub(crate) fn decode_table_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let bytes = &field[..end];

    if bytes.iter().all(|&b| b > 0 && b < 128) {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}

/// High half of code page 437, the classic IBM PC character set used by
/// DOS-era tooling for table names.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Decode a NUL-padded CP437 name field.
pub(crate) fn decode_cp437(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end]
        .iter()
        .map(|&b| {
            if b < 128 {
                b as char
            } else {
                CP437_HIGH[(b - 128) as usize]
            }
        })
        .collect()
}

/// Encode a name into CP437 bytes; characters outside the code page become `_`.
pub(crate) fn encode_cp437(name: &str) -> Vec<u8> {
    name.chars()
        .map(|c| {
            if c.is_ascii() {
                c as u8
            } else {
                CP437_HIGH
                    .iter()
                    .position(|&t| t == c)
                    .map_or(b'_', |i| (i + 128) as u8)
            }
        })
        .collect()
}

/// Check a name against the classic DOS 8.3 uppercase convention:
/// 1-8 alphanumeric characters, a dot, 0-3 alphanumeric characters.
pub(crate) fn is_dos_83(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    (1..=8).contains(&stem.len())
        && ext.len() <= 3
        && stem.chars().all(|c| c.is_ascii_alphanumeric())
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
