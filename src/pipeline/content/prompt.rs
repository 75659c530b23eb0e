use crate::models::{DocumentKind, IntakeRequest, Language};

use super::language::{medicine_label, not_available_marker, MedicineField};

/// Opening fence for a language section, e.g. `<<<BEGIN_KO>>>`.
pub fn begin_fence(lang: Language) -> String {
    format!("<<<BEGIN_{}>>>", lang.fence_tag())
}

/// Closing fence for a language section, e.g. `<<<END_KO>>>`.
pub fn end_fence(lang: Language) -> String {
    format!("<<<END_{}>>>", lang.fence_tag())
}

const INTAKE_SYSTEM_PROMPT: &str = r#"
You are a clinical intake assistant for pre-visit triage.

Return ONLY a valid JSON object with exactly these keys:
  - "title": one-line summary of the patient's symptoms/context, written in {LANG} (string)
  - "content": patient's symptoms in a single, coherent paragraph, written in {LANG}.
  - "koreanContent": patient's symptoms in a single, coherent paragraph, written in Korean.

======================
SYMPTOMS PARAGRAPH COMPOSITION (both {LANG} & Korean):
Write a single, well-structured paragraph in this order when information exists:
  1) Onset & duration
  2) Location
  3) Character/quality
  4) Severity if provided (do NOT invent)
  5) Associated symptoms actually reported
  6) Modifying factors (medications tried and response)
  7) Course/progression
  8) Functional impact if stated
- Include every piece of provided information; describe each symptom in detail.
- Do NOT include patient information (Name, Age, Gender, etc.) or the visit purpose in "content" or "koreanContent".
- "content" and "koreanContent" must each be one continuous paragraph without any newlines.

======================
NORMALIZATION / STYLE:
  - Clinical, neutral tone; no diagnosis or recommendations.
  - Convert relative dates if needed.
  - NEVER fabricate severity, symptoms or any data not present in the input.

======================
TITLE RULES:
  - Concise (<= 12 words), reflect main symptoms + notable context.

======================
GLOBAL RULES:
  - No markdown/explanations outside JSON.
  - No extra keys beyond the specified.
"#;

const PRESCRIPTION_SYSTEM_PROMPT: &str = r#"
You are a pharmacist fluent in Korean drug information. Explain every medicine on the
patient's prescription clearly and in detail.
Output ONLY the document in the exact frame below. Write nothing before or after it
(no explanations, warnings, summaries, quotes or code blocks).

ABSOLUTE RULES:
1) Cover only the medicines in the list, exactly in the given order (no additions, omissions or reordering).
2) Produce {VERSIONS}, each wrapped in its own fence pair as shown.
3) Start each entry with the medicine name on its own line, exactly as written in the list.
4) Each entry lists these fields in this order: {FIELDS}.
   The interactions field names medicines that are dangerous to take together with it.
5) Indent every description line with exactly one tab character (\t); never indent with spaces.
6) No markdown, numbering, bullets, links or extra commentary.
7) Exactly one blank line between entries; no other blank lines.
8) If a field is unknown, write the marker for that version instead of omitting the field: {MARKERS}.

OUTPUT FRAME:
{FRAME}
"#;

/// Build the fixed instruction prompt for a document kind and target language.
pub fn build_instruction_prompt(kind: DocumentKind, lang: Language) -> String {
    match kind {
        DocumentKind::Intake => INTAKE_SYSTEM_PROMPT.replace("{LANG}", lang.display_name()),
        DocumentKind::Prescription => build_prescription_instruction(lang),
    }
}

/// Languages that get a fenced section, Korean first.
pub fn section_languages(target: Language) -> Vec<Language> {
    if target.is_korean() {
        vec![Language::Korean]
    } else {
        vec![Language::Korean, target]
    }
}

fn build_prescription_instruction(target: Language) -> String {
    let langs = section_languages(target);

    let versions = if target.is_korean() {
        "one Korean version".to_string()
    } else {
        format!("two versions, one in Korean and one in {}", target.display_name())
    };

    let fields = MedicineField::ORDER
        .iter()
        .map(|field| {
            let names: Vec<&str> = langs.iter().map(|l| medicine_label(*field, *l)).collect();
            names.join(" / ")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let markers = langs
        .iter()
        .map(|l| format!("{} \"{}\"", l.display_name(), not_available_marker(*l)))
        .collect::<Vec<_>>()
        .join(", ");

    let frame = langs
        .iter()
        .map(|l| render_section_frame(*l))
        .collect::<Vec<_>>()
        .join("\n");

    PRESCRIPTION_SYSTEM_PROMPT
        .replace("{VERSIONS}", &versions)
        .replace("{FIELDS}", &fields)
        .replace("{MARKERS}", &markers)
        .replace("{FRAME}", &frame)
}

fn render_section_frame(lang: Language) -> String {
    let entry = |placeholder: &str| {
        let mut lines = vec![placeholder.to_string()];
        for field in MedicineField::ORDER {
            lines.push(format!("{}:", medicine_label(field, lang)));
            lines.push("\t...".to_string());
        }
        lines.join("\n")
    };

    format!(
        "{}\n{}\n\n{}\n{}",
        begin_fence(lang),
        entry("MEDICINE NAME 1"),
        entry("MEDICINE NAME 2"),
        end_fence(lang)
    )
}

/// Input fields serialized into the data (user) message.
#[derive(Debug, Clone, Copy)]
pub enum DataFields<'a> {
    Intake {
        request: &'a IntakeRequest,
        language: Language,
        include_description: bool,
    },
    Prescription {
        medicines: &'a [String],
    },
}

/// Serialize the request fields for the data message.
///
/// Free-text values are quote-escaped before interpolation; the numeric age
/// is written bare; absent values become empty strings.
pub fn build_data_prompt(fields: &DataFields<'_>) -> String {
    match fields {
        DataFields::Intake {
            request,
            language,
            include_description,
        } => {
            let age = request.age.map(|a| a.to_string()).unwrap_or_else(|| "\"\"".to_string());
            let description = if *include_description {
                escape_quotes(&request.description)
            } else {
                String::new()
            };
            format!(
                r#"{{
  "language": "{}",
  "name": "{}",
  "age": {},
  "nationality": "{}",
  "gender": "{}",
  "description": "{}"
}}"#,
                language.display_name(),
                escape_quotes(&request.name),
                age,
                escape_quotes(&request.nationality),
                escape_quotes(request.gender.code()),
                description,
            )
        }
        DataFields::Prescription { medicines } => {
            format!("Medicine list:\n{}", medicines.join("\n"))
        }
    }
}

const TRANSLATION_SYSTEM_PROMPT: &str = "\
You are a highly skilled medical interpreter facilitating communication between a doctor and a patient.
Your task is to accurately translate the user's message into {LANG}.
Maintain a professional and clear tone suitable for a medical consultation.
Do not add any extra information, explanations, or conversational remarks. Provide only the direct translation of the given text.";

/// Instruction prompt for chat message translation.
pub fn build_translation_prompt(target: Language) -> String {
    TRANSLATION_SYSTEM_PROMPT.replace("{LANG}", target.display_name())
}

/// Data message for chat message translation.
pub fn build_translation_data(text: &str, target: Language) -> String {
    format!(
        "Original Text: \"{}\"\n\nTranslated Text in {}:",
        escape_quotes(text),
        target.display_name()
    )
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
