use serde::{Deserialize, Serialize};

// provincial abbreviations, only valid at the region character position
pub const REGION_GLYPHS: [char; 31] = [
    '京', '沪', '津', '渝', '冀', '晋', '蒙', '辽', '吉', '黑', '苏', '浙', '皖', '闽', '赣', '鲁',
    '豫', '鄂', '湘', '粤', '桂', '琼', '川', '贵', '云', '藏', '陕', '甘', '青', '宁', '新',
];

pub const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

// I and O are never issued, they read as 1 and 0
pub const LETTERS: [char; 24] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolClass {
    Digit,
    Letter,
    Region,
}

impl SymbolClass {
    pub fn of(symbol: char) -> Option<Self> {
        if DIGITS.contains(&symbol) {
            Some(SymbolClass::Digit)
        } else if LETTERS.contains(&symbol) {
            Some(SymbolClass::Letter)
        } else if REGION_GLYPHS.contains(&symbol) {
            Some(SymbolClass::Region)
        } else {
            None
        }
    }
}

/// Which classes a character position may take.
///
/// `body_index` counts positions after the region character, so the first
/// body character is 0 whether or not the plate has a region character.
pub fn allowed_classes(is_region_char: bool, body_index: usize, letter_positions: &[usize]) -> &'static [SymbolClass] {
    if is_region_char {
        &[SymbolClass::Region]
    } else if letter_positions.contains(&body_index) {
        &[SymbolClass::Letter]
    } else {
        &[SymbolClass::Digit, SymbolClass::Letter]
    }
}
