//! Entity resolver and metric glossary data.
//!
//! Two static tables: place-name variants (romanized, phonetic and Korean
//! spellings) mapped to canonical location codes, and glossary entries for
//! the document handler. The location table is rendered into the
//! SQL-generation prompt (the actual fuzzy resolution happens inside the
//! model), but `canonical_location_code` gives an exact-match lookup for
//! deterministic call sites and tests.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

pub struct LocationMapping {
    pub code: &'static str,
    pub variants: &'static [&'static str],
}

pub const LOCATION_MAPPINGS: &[LocationMapping] = &[
    LocationMapping { code: "CNSHG", variants: &["Shanghai", "Sanghai", "상해", "상하이", "SH"] },
    LocationMapping { code: "JPOSA", variants: &["Osaka", "Osaca", "오사카", "오사카항"] },
    LocationMapping { code: "CNRZH", variants: &["Rizhao", "Rizo", "일조", "리자오"] },
    LocationMapping { code: "CNLYG", variants: &["Lianyungang", "Lianyun", "연운항"] },
    LocationMapping { code: "CNNBG", variants: &["Ningbo", "Ningpo", "닝보"] },
    LocationMapping { code: "VNSGN", variants: &["Hochiminh", "HCMC", "호치민"] },
    LocationMapping { code: "VNHPH", variants: &["Haiphong", "하이퐁"] },
    LocationMapping { code: "KRICN", variants: &["Incheon", "ICN", "인천"] },
    LocationMapping { code: "KRPUS", variants: &["Busan", "Pusan", "부산"] },
];

/// Render the code-mapping table as prompt text.
pub fn location_mapping_prompt() -> String {
    let mut out = String::from("Code mapping guide (interpret location names as follows):\n");
    for mapping in LOCATION_MAPPINGS {
        out.push_str("- ");
        out.push_str(&mapping.variants.join(", "));
        out.push_str(" -> '");
        out.push_str(mapping.code);
        out.push_str("'\n");
    }
    out
}

/// Exact (case-insensitive) variant lookup. Spelling distance beyond the
/// listed variants is left to the model.
pub fn canonical_location_code(name: &str) -> Option<&'static str> {
    let needle = name.trim();
    for mapping in LOCATION_MAPPINGS {
        if mapping
            .variants
            .iter()
            .any(|v| v.eq_ignore_ascii_case(needle) || *v == needle)
        {
            return Some(mapping.code);
        }
    }
    None
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

lazy_static! {
    /// Whitepaper vocabulary served by the document handler. Static, loaded
    /// once, never mutated.
    pub static ref GLOSSARY: Vec<GlossaryEntry> = vec![
        GlossaryEntry {
            term: "일탈률".to_string(),
            definition: "일탈률(deviation/excursion rate)은 허용 임계값을 벗어난 측정치 또는 운송 건의 비율입니다. \
                집계 수준에 따라 두 가지 정의가 있습니다: 기간 기준(해당 기간의 전체 측정치 중 임계값 초과 측정치 비율)과 \
                운송 건 기준(전체 운송 건 중 임계값 초과가 한 번이라도 발생한 건의 비율). 두 정의는 혼용할 수 없습니다."
                .to_string(),
        },
        GlossaryEntry {
            term: "누적 충격 지수".to_string(),
            definition: "누적 충격 지수(cumulative shock index, 피로도)는 운송 전 구간에서 발생한 충격 측정치를 \
                합산해 미리 계산한 값으로, 화물이 받은 누적 스트레스를 나타냅니다.".to_string(),
        },
        GlossaryEntry {
            term: "위험 등급".to_string(),
            definition: "위험 등급(risk level)은 운송 건별로 산출되는 Low / Medium / High / Critical 네 단계 \
                등급으로, 충격·온도 이탈·경로 위험도를 종합해 결정됩니다.".to_string(),
        },
        GlossaryEntry {
            term: "온도 이탈".to_string(),
            definition: "온도 이탈(temperature excursion)은 화물 온도가 허용 범위를 벗어난 상태를 말하며, \
                이탈 지속 시간(분)이 운송 건별로 집계됩니다.".to_string(),
        },
        GlossaryEntry {
            term: "물동량".to_string(),
            definition: "물동량(transport volume)은 기간 내 처리한 운송 건수 또는 물량을 뜻합니다. \
                출고 기준(기간 내 출발한 건)과 운송중 기준(기간 중 운송이 진행된 건)의 두 해석이 있어 \
                날짜 범위와 기준을 함께 지정해야 합니다.".to_string(),
        },
        GlossaryEntry {
            term: "파손율".to_string(),
            definition: "파손율(damage rate)은 전체 운송 건 중 파손이 확인된 건의 비율입니다.".to_string(),
        },
    ];
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whitespace-insensitive substring containment of each glossary term in
/// the question. Empty result means the caller should fall back to the
/// whole glossary as context.
pub fn match_glossary_entries(question: &str) -> Vec<&'static GlossaryEntry> {
    let compact_question = strip_whitespace(question);
    GLOSSARY
        .iter()
        .filter(|entry| compact_question.contains(&strip_whitespace(&entry.term)))
        .collect()
}
