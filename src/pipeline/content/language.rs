//! Canonical language resolution and the fixed per-language lookup tables.
//!
//! Tables are immutable and built once. Every lookup walks the same tier:
//! requested language → English → raw passthrough. Japanese is a recognised
//! language with no explicit table, so it always resolves through English.
//!
//! The nationality table is deliberately incomplete: it covers the handful of
//! countries the intake form has historically seen. Anything else is returned
//! exactly as the patient typed it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::models::{Gender, Language};

/// Field labels used when rendering a patient label sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub name: &'static str,
    pub age: &'static str,
    pub gender: &'static str,
    pub nationality: &'static str,
    pub symptoms: &'static str,
    pub visit_purpose: &'static str,
}

/// Per-medicine fields, in the order every explanation must list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicineField {
    Efficacy,
    Usage,
    Precautions,
    Interactions,
    SideEffects,
    Storage,
}

impl MedicineField {
    pub const ORDER: [MedicineField; 6] = [
        MedicineField::Efficacy,
        MedicineField::Usage,
        MedicineField::Precautions,
        MedicineField::Interactions,
        MedicineField::SideEffects,
        MedicineField::Storage,
    ];

    fn index(self) -> usize {
        match self {
            MedicineField::Efficacy => 0,
            MedicineField::Usage => 1,
            MedicineField::Precautions => 2,
            MedicineField::Interactions => 3,
            MedicineField::SideEffects => 4,
            MedicineField::Storage => 5,
        }
    }
}

struct LanguageTable {
    labels: Labels,
    medicine_labels: [&'static str; 6],
    not_available: &'static str,
    default_visit_purpose: &'static str,
    prescription_title: &'static str,
    male: &'static str,
    female: &'static str,
}

struct Nationality {
    aliases: &'static [&'static str],
    names: &'static [(Language, &'static str)],
}

struct Registry {
    tables: BTreeMap<Language, LanguageTable>,
    fallback: LanguageTable,
    nationalities: Vec<Nationality>,
}

impl Registry {
    fn table(&self, lang: Language) -> &LanguageTable {
        self.tables.get(&lang).unwrap_or(&self.fallback)
    }
}

fn english_table() -> LanguageTable {
    LanguageTable {
        labels: Labels {
            name: "Name",
            age: "Age",
            gender: "Gender",
            nationality: "Nationality",
            symptoms: "Symptoms",
            visit_purpose: "Visit purpose",
        },
        medicine_labels: [
            "Efficacy",
            "Usage",
            "Precautions",
            "Drug interactions",
            "Side effects",
            "Storage",
        ],
        not_available: "Not available",
        default_visit_purpose: "Symptom consultation",
        prescription_title: "Prescription medicine details",
        male: "Male",
        female: "Female",
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let mut tables = BTreeMap::new();
    tables.insert(Language::English, english_table());
    tables.insert(
        Language::Korean,
        LanguageTable {
            labels: Labels {
                name: "이름",
                age: "나이",
                gender: "성별",
                nationality: "국적",
                symptoms: "증상",
                visit_purpose: "방문 목적",
            },
            medicine_labels: ["효능", "사용법", "주의사항", "약물 상호작용", "부작용", "보관법"],
            not_available: "정보 없음",
            default_visit_purpose: "증상 상담",
            prescription_title: "처방전 약품 상세 정보",
            male: "남성",
            female: "여성",
        },
    );
    tables.insert(
        Language::Chinese,
        LanguageTable {
            labels: Labels {
                name: "姓名",
                age: "年龄",
                gender: "性别",
                nationality: "国籍",
                symptoms: "症状",
                visit_purpose: "就诊目的",
            },
            medicine_labels: ["功效", "用法", "注意事项", "药物相互作用", "副作用", "储存方法"],
            not_available: "暂无信息",
            default_visit_purpose: "症状咨询",
            prescription_title: "处方药品详细信息",
            male: "男",
            female: "女",
        },
    );

    let nationalities = vec![
        Nationality {
            aliases: &[
                "us",
                "usa",
                "u.s.",
                "u.s.a.",
                "united states",
                "united states of america",
                "america",
                "american",
            ],
            names: &[
                (Language::English, "United States"),
                (Language::Korean, "미국"),
                (Language::Chinese, "美国"),
            ],
        },
        Nationality {
            aliases: &["cn", "china", "prc", "chinese", "中国"],
            names: &[
                (Language::English, "China"),
                (Language::Korean, "중국"),
                (Language::Chinese, "中国"),
            ],
        },
        Nationality {
            aliases: &["kr", "korea", "south korea", "republic of korea", "korean", "한국", "대한민국"],
            names: &[
                (Language::English, "Korea"),
                (Language::Korean, "한국"),
                (Language::Chinese, "韩国"),
            ],
        },
        Nationality {
            aliases: &["jp", "japan", "japanese", "日本"],
            names: &[
                (Language::English, "Japan"),
                (Language::Korean, "일본"),
                (Language::Chinese, "日本"),
            ],
        },
    ];

    Registry {
        tables,
        fallback: english_table(),
        nationalities,
    }
});

/// Resolves free-form language identifiers against a configured default.
#[derive(Debug, Clone, Copy)]
pub struct LanguageNormalizer {
    default: Language,
}

impl LanguageNormalizer {
    pub fn new(default: Language) -> Self {
        Self { default }
    }

    /// Blank or unrecognised input resolves to the default, never an error.
    pub fn normalize(&self, input: &str) -> Language {
        Language::from_identifier(input).unwrap_or(self.default)
    }
}

impl Default for LanguageNormalizer {
    fn default() -> Self {
        Self::new(Language::English)
    }
}

pub fn labels(lang: Language) -> Labels {
    REGISTRY.table(lang).labels
}

/// Label for one medicine field, e.g. `부작용` for side effects in Korean.
pub fn medicine_label(field: MedicineField, lang: Language) -> &'static str {
    REGISTRY.table(lang).medicine_labels[field.index()]
}

/// Marker written in place of an unknown medicine field.
pub fn not_available_marker(lang: Language) -> &'static str {
    REGISTRY.table(lang).not_available
}

pub fn default_visit_purpose(lang: Language) -> &'static str {
    REGISTRY.table(lang).default_visit_purpose
}

/// Fixed title of prescription explanation records.
pub fn prescription_title(lang: Language) -> &'static str {
    REGISTRY.table(lang).prescription_title
}

/// M/F become the localized word; any other code is returned unchanged.
pub fn localize_gender(gender: &Gender, lang: Language) -> String {
    let table = REGISTRY.table(lang);
    match gender {
        Gender::Male => table.male.to_string(),
        Gender::Female => table.female.to_string(),
        Gender::Other(raw) => raw.clone(),
    }
}

/// Localize a nationality token. Unknown countries pass through unchanged.
pub fn localize_nationality(token: &str, lang: Language) -> String {
    let key = token.trim().to_lowercase();
    let Some(entry) = REGISTRY
        .nationalities
        .iter()
        .find(|n| n.aliases.iter().any(|alias| *alias == key))
    else {
        return token.to_string();
    };

    let lookup = |wanted: Language| {
        entry
            .names
            .iter()
            .find(|(l, _)| *l == wanted)
            .map(|(_, name)| (*name).to_string())
    };
    lookup(lang)
        .or_else(|| lookup(Language::English))
        .unwrap_or_else(|| token.to_string())
}

/// Recognise a medicine field heading such as `Side effects:` or `효능`.
///
/// The heading's own language is tried first, then every other table, so a
/// model that answers with an English heading inside the Korean block is
/// still understood.
pub fn parse_medicine_field(heading: &str, lang: Language) -> Option<MedicineField> {
    let cleaned = heading
        .trim()
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    let matches_table = |table: &LanguageTable| {
        MedicineField::ORDER
            .into_iter()
            .find(|field| table.medicine_labels[field.index()].to_lowercase() == cleaned)
    };

    matches_table(REGISTRY.table(lang))
        .or_else(|| REGISTRY.tables.values().find_map(matches_table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_full_words_case_insensitive() {
        let n = LanguageNormalizer::new(Language::Korean);
        assert_eq!(n.normalize("ENGLISH"), Language::English);
        assert_eq!(n.normalize("Chinese"), Language::Chinese);
        assert_eq!(n.normalize("en"), Language::English);
    }

    #[test]
    fn blank_and_unknown_fall_back_to_default() {
        let n = LanguageNormalizer::new(Language::English);
        assert_eq!(n.normalize(""), Language::English);
        assert_eq!(n.normalize("xx"), Language::English);

        let n = LanguageNormalizer::new(Language::Chinese);
        assert_eq!(n.normalize("  "), Language::Chinese);
    }

    #[test]
    fn labels_per_language() {
        assert_eq!(labels(Language::English).name, "Name");
        assert_eq!(labels(Language::Korean).visit_purpose, "방문 목적");
        assert_eq!(labels(Language::Chinese).symptoms, "症状");
    }

    #[test]
    fn language_without_table_uses_english_labels() {
        assert_eq!(labels(Language::Japanese), labels(Language::English));
        assert_eq!(not_available_marker(Language::Japanese), "Not available");
    }

    #[test]
    fn gender_localized_and_unknown_passthrough() {
        assert_eq!(localize_gender(&Gender::Male, Language::Korean), "남성");
        assert_eq!(localize_gender(&Gender::Female, Language::Chinese), "女");
        assert_eq!(localize_gender(&Gender::Female, Language::Japanese), "Female");
        assert_eq!(
            localize_gender(&Gender::Other("X".into()), Language::Korean),
            "X"
        );
    }

    #[test]
    fn nationality_lookup_and_passthrough() {
        assert_eq!(localize_nationality("USA", Language::Korean), "미국");
        assert_eq!(localize_nationality("china", Language::English), "China");
        assert_eq!(localize_nationality(" Korea ", Language::Chinese), "韩国");
        assert_eq!(localize_nationality("Japan", Language::Japanese), "Japan");
        // Not in the table: returned exactly as given.
        assert_eq!(localize_nationality("Vietnam", Language::Korean), "Vietnam");
        assert_eq!(localize_nationality("", Language::Korean), "");
    }

    #[test]
    fn medicine_labels_in_fixed_order() {
        let ko: Vec<_> = MedicineField::ORDER
            .iter()
            .map(|f| medicine_label(*f, Language::Korean))
            .collect();
        assert_eq!(ko, vec!["효능", "사용법", "주의사항", "약물 상호작용", "부작용", "보관법"]);
    }

    #[test]
    fn medicine_headings_recognised() {
        assert_eq!(
            parse_medicine_field("Side effects:", Language::English),
            Some(MedicineField::SideEffects)
        );
        assert_eq!(
            parse_medicine_field("보관법:", Language::Korean),
            Some(MedicineField::Storage)
        );
        assert_eq!(
            parse_medicine_field("功效：", Language::Chinese),
            Some(MedicineField::Efficacy)
        );
        // Cross-language heading still resolves.
        assert_eq!(
            parse_medicine_field("usage", Language::Korean),
            Some(MedicineField::Usage)
        );
        assert_eq!(parse_medicine_field("Dosage notes:", Language::English), None);
    }

    #[test]
    fn default_visit_purpose_per_language() {
        assert_eq!(default_visit_purpose(Language::English), "Symptom consultation");
        assert_eq!(default_visit_purpose(Language::Korean), "증상 상담");
    }
}
