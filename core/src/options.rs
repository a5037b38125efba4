//! Engine behaviour flags.
//!
//! Bit positions follow libpinyin's `pinyin_option_t` so the set can be handed
//! to the C library unchanged.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EngineOptions: u32 {
        const IS_CHEWING = 1 << 1;
        const IS_PINYIN = 1 << 2;
        const PINYIN_INCOMPLETE = 1 << 3;
        const CHEWING_INCOMPLETE = 1 << 4;
        const USE_TONE = 1 << 5;
        const USE_DIVIDED_TABLE = 1 << 6;
        const USE_RESPLIT_TABLE = 1 << 7;
        const DYNAMIC_ADJUST = 1 << 8;

        const PINYIN_AMB_C_CH = 1 << 9;
        const PINYIN_AMB_S_SH = 1 << 10;
        const PINYIN_AMB_Z_ZH = 1 << 11;
        const PINYIN_AMB_F_H = 1 << 12;
        const PINYIN_AMB_G_K = 1 << 13;
        const PINYIN_AMB_L_N = 1 << 14;
        const PINYIN_AMB_L_R = 1 << 15;
        const PINYIN_AMB_AN_ANG = 1 << 16;
        const PINYIN_AMB_EN_ENG = 1 << 17;
        const PINYIN_AMB_IN_ING = 1 << 18;

        const PINYIN_CORRECT_GN_NG = 1 << 21;
        const PINYIN_CORRECT_MG_NG = 1 << 22;
        const PINYIN_CORRECT_IOU_IU = 1 << 23;
        const PINYIN_CORRECT_UEI_UI = 1 << 24;
        const PINYIN_CORRECT_UEN_UN = 1 << 25;
        const PINYIN_CORRECT_UE_VE = 1 << 26;
        const PINYIN_CORRECT_V_U = 1 << 27;
        const PINYIN_CORRECT_ON_ONG = 1 << 28;

        const PINYIN_AMB_ALL = Self::PINYIN_AMB_C_CH.bits()
            | Self::PINYIN_AMB_S_SH.bits()
            | Self::PINYIN_AMB_Z_ZH.bits()
            | Self::PINYIN_AMB_F_H.bits()
            | Self::PINYIN_AMB_G_K.bits()
            | Self::PINYIN_AMB_L_N.bits()
            | Self::PINYIN_AMB_L_R.bits()
            | Self::PINYIN_AMB_AN_ANG.bits()
            | Self::PINYIN_AMB_EN_ENG.bits()
            | Self::PINYIN_AMB_IN_ING.bits();

        const PINYIN_CORRECT_ALL = Self::PINYIN_CORRECT_GN_NG.bits()
            | Self::PINYIN_CORRECT_MG_NG.bits()
            | Self::PINYIN_CORRECT_IOU_IU.bits()
            | Self::PINYIN_CORRECT_UEI_UI.bits()
            | Self::PINYIN_CORRECT_UEN_UN.bits()
            | Self::PINYIN_CORRECT_UE_VE.bits()
            | Self::PINYIN_CORRECT_V_U.bits()
            | Self::PINYIN_CORRECT_ON_ONG.bits();
    }
}

/// Ambiguity pairs understood in `fuzzy` rule lists, either order.
const AMBIGUITY_RULES: &[(&str, &str, EngineOptions)] = &[
    ("c", "ch", EngineOptions::PINYIN_AMB_C_CH),
    ("s", "sh", EngineOptions::PINYIN_AMB_S_SH),
    ("z", "zh", EngineOptions::PINYIN_AMB_Z_ZH),
    ("f", "h", EngineOptions::PINYIN_AMB_F_H),
    ("g", "k", EngineOptions::PINYIN_AMB_G_K),
    ("l", "n", EngineOptions::PINYIN_AMB_L_N),
    ("l", "r", EngineOptions::PINYIN_AMB_L_R),
    ("an", "ang", EngineOptions::PINYIN_AMB_AN_ANG),
    ("en", "eng", EngineOptions::PINYIN_AMB_EN_ENG),
    ("in", "ing", EngineOptions::PINYIN_AMB_IN_ING),
];

impl EngineOptions {
    /// Map a fuzzy rule such as `"zh=z"` or `"an=ang:1.0"` to its ambiguity
    /// flag. The optional `:weight` suffix is accepted and ignored.
    pub fn from_fuzzy_rule(rule: &str) -> Option<EngineOptions> {
        let rule = rule.split(':').next()?.trim();
        let (lhs, rhs) = rule.split_once('=')?;
        let (lhs, rhs) = (lhs.trim(), rhs.trim());
        AMBIGUITY_RULES
            .iter()
            .find(|(a, b, _)| (*a == lhs && *b == rhs) || (*a == rhs && *b == lhs))
            .map(|(_, _, flag)| *flag)
    }
}
