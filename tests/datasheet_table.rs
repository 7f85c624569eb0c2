//! Datasheet reconstruction: row-count gate, multi-model detection, and
//! the column repairs that make fractured tables parseable.

use partscribe::error::EnrichError;
use partscribe::pdf::repair::{repair_columns, split_spec_row};
use partscribe::pdf::table::{detect_models, parse_datasheet_text, MIN_SPEC_ROWS};

/// A twenty-model header like scenario 6 describes.
fn twenty_models() -> Vec<String> {
    let mut models = Vec::new();
    for voltage in [1120, 1240, 1277, 1480] {
        for phase in 1..=5 {
            models.push(format!("M{phase}-{voltage}-3"));
        }
    }
    models
}

fn datasheet_text(rows: usize) -> String {
    let models = twenty_models();
    let mut text = String::from(
        "SurgePure M-Series Surge Protective Devices\n\
         The series isolates downline equipment and protects panels in commercial facilities.\n",
    );
    text.push_str(&format!("Model Number {}\n", models.join(" ")));
    for i in 0..rows {
        text.push_str(&format!("Metric Row {i}  {}\n", vec!["10 kA"; 20].join(" ")));
    }
    text.push_str("KEY FEATURES\n• Field-replaceable modules\n");
    text
}

#[test]
fn all_twenty_models_detected() {
    let parse = parse_datasheet_text(&datasheet_text(20)).unwrap();
    let models = twenty_models();
    for model in &models {
        assert!(
            parse.detected_models.contains(model),
            "missing model {model}"
        );
    }
    assert_eq!(parse.detected_models.len(), models.len());
}

#[test]
fn eighteen_rows_pass_seventeen_throw() {
    assert!(parse_datasheet_text(&datasheet_text(MIN_SPEC_ROWS)).is_ok());

    let err = parse_datasheet_text(&datasheet_text(MIN_SPEC_ROWS - 1)).unwrap_err();
    match err {
        EnrichError::PdfRowUnderflow { rows, minimum } => {
            assert_eq!(rows, MIN_SPEC_ROWS - 1);
            assert_eq!(minimum, MIN_SPEC_ROWS);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fused_header_is_repaired_before_detection() {
    let fused = "Model NumberM1-1120-3 M1-1240-3";
    let repaired = repair_columns(fused);
    assert!(repaired.starts_with("Model Number M1-1120-3"));
    assert_eq!(detect_models(&repaired).len(), 2);
}

#[test]
fn spaced_model_tokens_canonicalize_to_hyphenated() {
    let models = detect_models("MODEL NUMBER: M1 1120 3");
    assert!(models.contains(&"M1-1120-3".to_string()));
}

#[test]
fn label_dictionary_restores_column_broken_labels() {
    for (line, expected) in [
        ("Nomi 120 240 480", "Nominal AC Line Voltage (VRMS)"),
        ("Freq 50/60 Hz 50/60 Hz", "Frequency Range - USA/Euro Std"),
        ("Warr 10 yr 10 yr", "Warranty"),
        ("Encl osure Size 10x8x4 12x10x6", "Enclosure Size (HxWxD)"),
    ] {
        let (key, _) = split_spec_row(line).unwrap();
        assert_eq!(key, expected, "for line {line:?}");
    }
}

#[test]
fn features_deduplicate() {
    let mut text = datasheet_text(18);
    text.push_str("• Field-replaceable modules\n");
    let parse = parse_datasheet_text(&text).unwrap();
    assert_eq!(
        parse
            .features
            .iter()
            .filter(|f| f.contains("Field-replaceable"))
            .count(),
        1
    );
}
