use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::CompositionMode;
use crate::models::{
    DocumentKind, IntakeRequest, Language, NormalizedRecord, PatientFields, RecordPatch,
};

use super::language::{
    default_visit_purpose, labels, localize_gender, localize_nationality, prescription_title,
};
use super::parser::ParseOutcome;

/// Blank visit purpose resolves to the fixed phrase for the language.
pub fn resolve_visit_purpose(raw: &str, lang: Language) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default_visit_purpose(lang).to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render a `label: value` sheet for one language from the submitted form.
///
/// Line order: name, age, gender, nationality, visit purpose, symptoms.
pub fn render_label_sheet(request: &IntakeRequest, symptoms: &str, lang: Language) -> String {
    let l = labels(lang);
    let age = request.age.map(|a| a.to_string()).unwrap_or_default();
    [
        format!("{}: {}", l.name, request.name.trim()),
        format!("{}: {}", l.age, age),
        format!("{}: {}", l.gender, localize_gender(&request.gender, lang)),
        format!(
            "{}: {}",
            l.nationality,
            localize_nationality(request.nationality.trim(), lang)
        ),
        format!(
            "{}: {}",
            l.visit_purpose,
            resolve_visit_purpose(&request.visit_purpose, lang)
        ),
        format!("{}: {}", l.symptoms, symptoms),
    ]
    .join("\n")
}

/// Fields stored on the record; the visit purpose is resolved in the
/// patient's language.
pub fn patient_fields(request: &IntakeRequest, lang: Language) -> PatientFields {
    PatientFields {
        name: request.name.trim().to_string(),
        age: request.age,
        nationality: request.nationality.trim().to_string(),
        gender: request.gender.clone(),
        description: request.description.clone(),
        visit_purpose: resolve_visit_purpose(&request.visit_purpose, lang),
    }
}

/// Compose an intake record from the request and the parsed narrative.
pub fn assemble_intake(
    request: &IntakeRequest,
    lang: Language,
    outcome: &ParseOutcome,
    composition: CompositionMode,
    created_at: NaiveDate,
) -> NormalizedRecord {
    let patient = patient_fields(request, lang);
    let narrative = outcome.content.text(lang).to_string();
    let korean_narrative = outcome.content.text(Language::Korean).to_string();

    let (content, korean_content) = match composition {
        CompositionMode::AiNarrative => (narrative, korean_narrative),
        CompositionMode::LabelSheet => (
            render_label_sheet(request, &narrative, lang),
            render_label_sheet(request, &korean_narrative, Language::Korean),
        ),
    };

    NormalizedRecord {
        id: Uuid::new_v4(),
        kind: DocumentKind::Intake,
        language: lang,
        title: outcome.content.title.clone(),
        content,
        korean_content,
        patient: Some(patient),
        medicines: Vec::new(),
        quality: outcome.quality,
        created_at,
    }
}

/// Compose a prescription record. A degraded parse keeps the whole response
/// as Korean text and leaves the target-language content empty.
pub fn assemble_prescription(
    lang: Language,
    medicines: &[String],
    outcome: &ParseOutcome,
    created_at: NaiveDate,
) -> NormalizedRecord {
    NormalizedRecord {
        id: Uuid::new_v4(),
        kind: DocumentKind::Prescription,
        language: lang,
        title: prescription_title(lang).to_string(),
        content: outcome.content.text(lang).to_string(),
        korean_content: outcome.content.text(Language::Korean).to_string(),
        patient: None,
        medicines: medicines.to_vec(),
        quality: outcome.quality,
        created_at,
    }
}

/// Whether an existing record qualifies for a blank-field refresh.
pub fn needs_refresh(record: &NormalizedRecord) -> bool {
    record.kind == DocumentKind::Intake && record.has_blank_ai_fields()
}

/// Patch that fills only the fields that were blank on `record`.
///
/// Fields that were populated are never overwritten, and a freshly generated
/// value that is itself blank is not written.
pub fn build_refresh_patch(record: &NormalizedRecord, outcome: &ParseOutcome) -> RecordPatch {
    let fresh = &outcome.content;
    let pick = |current: &str, candidate: &str| {
        (current.trim().is_empty() && !candidate.trim().is_empty()).then(|| candidate.to_string())
    };

    RecordPatch {
        title: pick(&record.title, &fresh.title),
        content: pick(&record.content, fresh.text(record.language)),
        korean_content: pick(&record.korean_content, fresh.text(Language::Korean)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentQuality, Gender};
    use crate::pipeline::content::parser::parse_response;

    fn request() -> IntakeRequest {
        IntakeRequest {
            language: "english".into(),
            name: "Jane Doe".into(),
            age: Some(34),
            nationality: "USA".into(),
            gender: Gender::Female,
            description: "Fever for 3 days".into(),
            visit_purpose: String::new(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn intake_outcome() -> ParseOutcome {
        parse_response(
            DocumentKind::Intake,
            Language::English,
            r#"{"title":"Fever","content":"Fever for three days.","koreanContent":"3일간 발열."}"#,
        )
        .unwrap()
    }

    #[test]
    fn blank_visit_purpose_uses_default() {
        assert_eq!(resolve_visit_purpose("", Language::English), "Symptom consultation");
        assert_eq!(resolve_visit_purpose("   ", Language::Korean), "증상 상담");
        assert_eq!(resolve_visit_purpose("Follow-up", Language::Korean), "Follow-up");
    }

    #[test]
    fn label_sheet_in_fixed_order() {
        let sheet = render_label_sheet(&request(), "발열", Language::Korean);
        let lines: Vec<&str> = sheet.lines().collect();
        assert_eq!(
            lines,
            vec![
                "이름: Jane Doe",
                "나이: 34",
                "성별: 여성",
                "국적: 미국",
                "방문 목적: 증상 상담",
                "증상: 발열",
            ]
        );
    }

    #[test]
    fn label_sheet_passes_unknown_values_through() {
        let mut req = request();
        req.nationality = "Vietnam".into();
        req.gender = Gender::Other("X".into());
        req.age = None;
        let sheet = render_label_sheet(&req, "", Language::English);
        assert!(sheet.contains("Nationality: Vietnam"));
        assert!(sheet.contains("Gender: X"));
        assert!(sheet.contains("Age: \n"));
    }

    #[test]
    fn intake_record_narrative_mode() {
        let record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::AiNarrative,
            date(),
        );
        assert_eq!(record.kind, DocumentKind::Intake);
        assert_eq!(record.title, "Fever");
        assert_eq!(record.content, "Fever for three days.");
        assert_eq!(record.korean_content, "3일간 발열.");
        assert_eq!(record.quality, ContentQuality::Complete);
        let patient = record.patient.unwrap();
        assert_eq!(patient.visit_purpose, "Symptom consultation");
        assert_eq!(patient.name, "Jane Doe");
    }

    #[test]
    fn intake_record_label_sheet_mode() {
        let record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::LabelSheet,
            date(),
        );
        assert!(record.content.starts_with("Name: Jane Doe\n"));
        assert!(record.content.ends_with("Symptoms: Fever for three days."));
        assert!(record.korean_content.starts_with("이름: Jane Doe\n"));
        assert!(record.korean_content.ends_with("증상: 3일간 발열."));
    }

    #[test]
    fn label_sheets_default_visit_purpose_per_language() {
        let record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::LabelSheet,
            date(),
        );
        assert!(record.content.contains("Visit purpose: Symptom consultation\n"));
        assert!(record.korean_content.contains("방문 목적: 증상 상담\n"));
        assert!(!record.korean_content.contains("Symptom consultation"));
        assert_eq!(record.patient.unwrap().visit_purpose, "Symptom consultation");
    }

    #[test]
    fn given_visit_purpose_is_kept_in_both_sheets() {
        let mut req = request();
        req.visit_purpose = "Follow-up".into();
        let record = assemble_intake(
            &req,
            Language::English,
            &intake_outcome(),
            CompositionMode::LabelSheet,
            date(),
        );
        assert!(record.content.contains("Visit purpose: Follow-up\n"));
        assert!(record.korean_content.contains("방문 목적: Follow-up\n"));
    }

    #[test]
    fn prescription_record_keeps_medicine_order() {
        let outcome = parse_response(
            DocumentKind::Prescription,
            Language::English,
            "<<<BEGIN_KO>>>\n이부프로펜\n<<<END_KO>>>\n<<<BEGIN_EN>>>\nIbuprofen\n<<<END_EN>>>",
        )
        .unwrap();
        let meds = vec!["Ibuprofen".to_string(), "Loratadine".to_string()];
        let record = assemble_prescription(Language::English, &meds, &outcome, date());
        assert_eq!(record.medicines, meds);
        assert_eq!(record.title, "Prescription medicine details");
        assert_eq!(record.content, "Ibuprofen");
        assert_eq!(record.korean_content, "이부프로펜");
    }

    #[test]
    fn korean_prescription_fills_both_fields() {
        let outcome = parse_response(
            DocumentKind::Prescription,
            Language::Korean,
            "<<<BEGIN_KO>>>\n타이레놀\n<<<END_KO>>>",
        )
        .unwrap();
        let record = assemble_prescription(Language::Korean, &["타이레놀".into()], &outcome, date());
        assert_eq!(record.title, "처방전 약품 상세 정보");
        assert_eq!(record.content, "타이레놀");
        assert_eq!(record.korean_content, "타이레놀");
    }

    #[test]
    fn refresh_patch_only_fills_blank_fields() {
        let mut record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::AiNarrative,
            date(),
        );
        record.content = String::new();
        assert!(needs_refresh(&record));

        let fresh = parse_response(
            DocumentKind::Intake,
            Language::English,
            r#"{"title":"Other title","content":"New paragraph.","koreanContent":"새 문단."}"#,
        )
        .unwrap();
        let patch = build_refresh_patch(&record, &fresh);
        assert_eq!(patch.title, None);
        assert_eq!(patch.content.as_deref(), Some("New paragraph."));
        assert_eq!(patch.korean_content, None);
    }

    #[test]
    fn blank_fresh_value_is_not_written() {
        let mut record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::AiNarrative,
            date(),
        );
        record.title = String::new();
        let fresh = parse_response(DocumentKind::Intake, Language::English, r#"{"title":"  "}"#).unwrap();
        assert!(build_refresh_patch(&record, &fresh).is_empty());
    }

    #[test]
    fn populated_record_needs_no_refresh() {
        let record = assemble_intake(
            &request(),
            Language::English,
            &intake_outcome(),
            CompositionMode::AiNarrative,
            date(),
        );
        assert!(!needs_refresh(&record));
    }

    #[test]
    fn prescriptions_are_not_refreshed() {
        let outcome = parse_response(DocumentKind::Prescription, Language::English, "no fences").unwrap();
        let record = assemble_prescription(Language::English, &["A".into()], &outcome, date());
        assert_eq!(record.quality, ContentQuality::Degraded);
        assert!(record.has_blank_ai_fields());
        assert!(!needs_refresh(&record));
    }
}
