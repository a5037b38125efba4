//! Keyboard schemes and the configuration codes that select them.
//!
//! The configuration stores an integer per family. Each family has a fixed
//! lookup table from that integer to a scheme; codes outside the table select
//! nothing, and the context keeps whatever scheme it had before.

use std::fmt;

use crate::engine::Family;

/// Double pinyin (shuangpin) layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoublePinyinScheme {
    /// Microsoft Shuangpin (微软双拼)
    Microsoft,
    /// ZiRanMa (自然码)
    ZiRanMa,
    /// ABC (智能ABC)
    Abc,
    /// ZiGuang (紫光)
    ZiGuang,
    /// PinYin JiaJia (拼音加加)
    PinYinJiaJia,
    /// XiaoHe (小鹤)
    XiaoHe,
}

/// Bopomofo keyboard layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChewingScheme {
    Standard,
    Ibm,
    Ginyieh,
    Eten,
}

/// A scheme selection pushed into a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyboardScheme {
    DoublePinyin(DoublePinyinScheme),
    Chewing(ChewingScheme),
}

/// `double_pinyin_schema` code → scheme.
pub const DOUBLE_PINYIN_KEYBOARDS: &[(i32, DoublePinyinScheme)] = &[
    (0, DoublePinyinScheme::Microsoft),
    (1, DoublePinyinScheme::ZiRanMa),
    (2, DoublePinyinScheme::Abc),
    (3, DoublePinyinScheme::ZiGuang),
    (4, DoublePinyinScheme::PinYinJiaJia),
    (5, DoublePinyinScheme::XiaoHe),
];

/// `bopomofo_keyboard_mapping` code → scheme.
pub const CHEWING_KEYBOARDS: &[(i32, ChewingScheme)] = &[
    (0, ChewingScheme::Standard),
    (1, ChewingScheme::Ginyieh),
    (2, ChewingScheme::Eten),
    (3, ChewingScheme::Ibm),
];

impl DoublePinyinScheme {
    pub fn from_keyboard(code: i32) -> Option<Self> {
        DOUBLE_PINYIN_KEYBOARDS
            .iter()
            .find(|(keyboard, _)| *keyboard == code)
            .map(|(_, scheme)| *scheme)
    }

    /// Value of libpinyin's `DoublePinyinScheme` enum.
    pub fn raw(self) -> i32 {
        match self {
            DoublePinyinScheme::ZiRanMa => 1,
            DoublePinyinScheme::Microsoft => 2,
            DoublePinyinScheme::ZiGuang => 3,
            DoublePinyinScheme::Abc => 4,
            DoublePinyinScheme::PinYinJiaJia => 6,
            DoublePinyinScheme::XiaoHe => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DoublePinyinScheme::Microsoft => "Microsoft",
            DoublePinyinScheme::ZiRanMa => "ZiRanMa",
            DoublePinyinScheme::Abc => "ABC",
            DoublePinyinScheme::ZiGuang => "ZiGuang",
            DoublePinyinScheme::PinYinJiaJia => "PinYinJiaJia",
            DoublePinyinScheme::XiaoHe => "XiaoHe",
        }
    }
}

impl ChewingScheme {
    pub fn from_keyboard(code: i32) -> Option<Self> {
        CHEWING_KEYBOARDS
            .iter()
            .find(|(keyboard, _)| *keyboard == code)
            .map(|(_, scheme)| *scheme)
    }

    /// Value of libpinyin's `ChewingScheme` enum.
    pub fn raw(self) -> i32 {
        match self {
            ChewingScheme::Standard => 1,
            ChewingScheme::Ibm => 2,
            ChewingScheme::Ginyieh => 3,
            ChewingScheme::Eten => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChewingScheme::Standard => "Standard",
            ChewingScheme::Ibm => "IBM",
            ChewingScheme::Ginyieh => "Ginyieh",
            ChewingScheme::Eten => "ETen",
        }
    }
}

impl KeyboardScheme {
    /// Look `code` up in the table belonging to `family`.
    pub fn for_family(family: Family, code: i32) -> Option<Self> {
        match family {
            Family::Pinyin => DoublePinyinScheme::from_keyboard(code).map(KeyboardScheme::DoublePinyin),
            Family::Bopomofo => ChewingScheme::from_keyboard(code).map(KeyboardScheme::Chewing),
        }
    }

    pub fn family(self) -> Family {
        match self {
            KeyboardScheme::DoublePinyin(_) => Family::Pinyin,
            KeyboardScheme::Chewing(_) => Family::Bopomofo,
        }
    }
}

impl fmt::Display for KeyboardScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyboardScheme::DoublePinyin(s) => write!(f, "double pinyin {}", s.name()),
            KeyboardScheme::Chewing(s) => write!(f, "chewing {}", s.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinyin_table_order() {
        let schemes: Vec<_> = (0..6).filter_map(DoublePinyinScheme::from_keyboard).collect();
        assert_eq!(
            schemes,
            vec![
                DoublePinyinScheme::Microsoft,
                DoublePinyinScheme::ZiRanMa,
                DoublePinyinScheme::Abc,
                DoublePinyinScheme::ZiGuang,
                DoublePinyinScheme::PinYinJiaJia,
                DoublePinyinScheme::XiaoHe,
            ]
        );
    }

    #[test]
    fn chewing_table_order() {
        assert_eq!(ChewingScheme::from_keyboard(0), Some(ChewingScheme::Standard));
        assert_eq!(ChewingScheme::from_keyboard(1), Some(ChewingScheme::Ginyieh));
        assert_eq!(ChewingScheme::from_keyboard(2), Some(ChewingScheme::Eten));
        assert_eq!(ChewingScheme::from_keyboard(3), Some(ChewingScheme::Ibm));
    }

    #[test]
    fn out_of_range_codes_select_nothing() {
        assert_eq!(KeyboardScheme::for_family(Family::Pinyin, 6), None);
        assert_eq!(KeyboardScheme::for_family(Family::Pinyin, -1), None);
        assert_eq!(KeyboardScheme::for_family(Family::Bopomofo, 4), None);
    }

    #[test]
    fn lookup_stays_within_family() {
        let scheme = KeyboardScheme::for_family(Family::Bopomofo, 1).unwrap();
        assert_eq!(scheme, KeyboardScheme::Chewing(ChewingScheme::Ginyieh));
        assert_eq!(scheme.family(), Family::Bopomofo);
    }

    #[test]
    fn raw_values_match_libpinyin() {
        assert_eq!(DoublePinyinScheme::Microsoft.raw(), 2);
        assert_eq!(DoublePinyinScheme::XiaoHe.raw(), 7);
        assert_eq!(ChewingScheme::Standard.raw(), 1);
        assert_eq!(ChewingScheme::Eten.raw(), 4);
    }
}
