//! Braille dot layout and glyph table

/// First code point of the Unicode braille block (no dots raised).
pub const BRAILLE_BASE: u32 = 0x2800;

/// Glyph for a tile with no ink.
pub const BLANK_GLYPH: char = '\u{2800}';

/// Glyph for a tile with all eight dots inked.
pub const FULL_GLYPH: char = '\u{28FF}';

/// Tile width in samples.
pub const TILE_COLS: usize = 2;

/// Tile height in samples.
pub const TILE_ROWS: usize = 4;

/// Dot positions as `(column, row, bit)`, in braille dot order 1..=8.
///
/// ```text
/// 1 4
/// 2 5
/// 3 6
/// 7 8
/// ```
pub const DOT_LAYOUT: [(usize, usize, u8); 8] = [
    (0, 0, 0),
    (0, 1, 1),
    (0, 2, 2),
    (1, 0, 3),
    (1, 1, 4),
    (1, 2, 5),
    (0, 3, 6),
    (1, 3, 7),
];

/// Code to glyph table covering all 256 dot patterns.
pub static GLYPH_TABLE: [char; 256] = build_table();

const fn build_table() -> [char; 256] {
    let mut table = [BLANK_GLYPH; 256];
    let mut code = 0;
    while code < 256 {
        table[code] = match char::from_u32(BRAILLE_BASE + code as u32) {
            Some(glyph) => glyph,
            None => BLANK_GLYPH,
        };
        code += 1;
    }
    table
}

/// Map a dot code to its glyph. Codes outside the table render blank.
pub fn glyph_for(code: u32) -> char {
    GLYPH_TABLE.get(code as usize).copied().unwrap_or(BLANK_GLYPH)
}

/// Pack the ink pattern of one tile into its dot code.
///
/// `ink(col, row)` reports whether the sample at that tile offset is inked.
pub fn pack_tile(ink: impl Fn(usize, usize) -> bool) -> u32 {
    DOT_LAYOUT
        .iter()
        .filter(|(col, row, _)| ink(*col, *row))
        .fold(0u32, |code, (_, _, bit)| code | (1 << bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_spans_the_braille_block() {
        assert_eq!(GLYPH_TABLE[0], BLANK_GLYPH);
        assert_eq!(GLYPH_TABLE[255], FULL_GLYPH);
        assert_eq!(glyph_for(0b0000_0001), '⠁');
        assert_eq!(glyph_for(0b0100_0000), '⡀');
        assert_eq!(glyph_for(0b1000_0000), '⢀');
    }

    #[test]
    fn out_of_range_codes_render_blank() {
        assert_eq!(glyph_for(256), BLANK_GLYPH);
        assert_eq!(glyph_for(u32::MAX), BLANK_GLYPH);
    }

    #[test]
    fn dots_follow_braille_numbering() {
        // dot 1 only (top-left)
        assert_eq!(pack_tile(|c, r| c == 0 && r == 0), 0b0000_0001);
        // dot 4 only (top-right)
        assert_eq!(pack_tile(|c, r| c == 1 && r == 0), 0b0000_1000);
        // dots 7 and 8 (bottom row)
        assert_eq!(pack_tile(|_, r| r == 3), 0b1100_0000);
        // left column: dots 1, 2, 3, 7
        assert_eq!(pack_tile(|c, _| c == 0), 0b0100_0111);
        assert_eq!(pack_tile(|_, _| true), 0xFF);
        assert_eq!(pack_tile(|_, _| false), 0);
    }
}
