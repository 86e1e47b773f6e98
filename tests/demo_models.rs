use prediction_server::{InferenceEngine, ModelStore};
use serde_json::json;
use std::path::Path;

fn engine() -> InferenceEngine {
    let models = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
    InferenceEngine::new(ModelStore::new(models))
}

#[test]
fn shipped_models_are_listed() {
    assert_eq!(
        engine().list_available_models(),
        vec!["blood", "diabetes", "house_price"]
    );
}

#[test]
fn diabetes_accepts_form_style_payload() {
    let prediction = engine()
        .predict(
            "diabetes",
            &json!({
                "age": "50",
                "bmi": "33.6",
                "blood_pressure": "72",
                "glucose": "148",
                "pregnancies": "6",
            }),
        )
        .unwrap();

    assert_eq!(prediction.result(), &json!(1.0));
    assert_eq!(prediction.probabilities().unwrap().as_array().unwrap().len(), 2);
}

#[test]
fn house_price_is_a_plain_value() {
    let prediction = engine()
        .predict(
            "house_price",
            &json!({ "square_feet": "1,500", "bedrooms": 3, "age": 10 }),
        )
        .unwrap();

    // 24500 + 142.5 * 1500 + 9875 * 3 - 412 * 10
    assert_eq!(prediction.to_body(), json!({ "result": 263755.0 }));
}

#[test]
fn blood_rules_return_their_own_result_object() {
    let prediction = engine()
        .predict("blood", &json!({ "hemoglobin": "10.1" }))
        .unwrap();

    assert_eq!(
        prediction.to_body(),
        json!({ "result": "anemic", "severity": "moderate" })
    );
}
