use serde_json::{Number, Value};

use super::mask::{NumberMask, SelectMask};
use super::Submission;

/// Select/rename keys and coerce numeric strings. The input is never mutated.
///
/// With both masks empty this returns an equal copy of `submission`.
pub fn normalize(submission: &Submission, select: &SelectMask, numbers: &NumberMask) -> Submission {
    let mut output = if select.is_empty() {
        submission.clone()
    } else {
        let mut selected = Submission::new();
        for selector in select.iter() {
            if let Some(value) = submission.get(&selector.source) {
                selected.insert(selector.target.clone(), value.clone());
            }
        }
        selected
    };

    if !numbers.is_empty() {
        for (key, value) in output.iter_mut() {
            if !numbers.matches(key) {
                continue;
            }
            if let Some(number) = coerce_number(value) {
                *value = number;
            }
        }
    }

    output
}

/// Parse a string value as a JSON number.
///
/// Returns `None` (leave the value as it is) for non-strings, empty or
/// non-numeric strings, and non-finite results.
pub fn coerce_number(value: &Value) -> Option<Value> {
    let Value::String(s) = value else {
        return None;
    };

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(value: Value) -> Submission {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_masks_are_identity() {
        let input = submission(json!({
            "_id": 7,
            "grp/name": "Ana",
            "grp/age": "42",
            "tags": ["a", "b"],
            "meta": { "x": null }
        }));

        let output = normalize(&input, &SelectMask::default(), &NumberMask::default());
        assert_eq!(output, input);
    }

    #[test]
    fn select_mask_renames_and_orders() {
        let input = submission(json!({ "b": 2, "c": 3, "a": 1 }));
        let output = normalize(&input, &SelectMask::parse("a:x, b"), &NumberMask::default());

        let keys: Vec<&str> = output.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x", "b"]);
        assert_eq!(output["x"], json!(1));
        assert_eq!(output["b"], json!(2));
    }

    #[test]
    fn select_mask_skips_missing_sources() {
        let input = submission(json!({ "a": 1 }));
        let output = normalize(&input, &SelectMask::parse("missing, a"), &NumberMask::default());
        assert_eq!(output, submission(json!({ "a": 1 })));
    }

    #[test]
    fn number_mask_coerces_valid_strings_only() {
        let input = submission(json!({
            "n": "42",
            "f": " 3.5 ",
            "bad": "abc",
            "empty": "",
            "nan": "NaN",
            "already": 5,
            "other": "7"
        }));

        let output = normalize(
            &input,
            &SelectMask::default(),
            &NumberMask::parse("n, f, bad, empty, nan, already"),
        );

        assert_eq!(output["n"], json!(42));
        assert_eq!(output["f"], json!(3.5));
        assert_eq!(output["bad"], json!("abc"));
        assert_eq!(output["empty"], json!(""));
        assert_eq!(output["nan"], json!("NaN"));
        assert_eq!(output["already"], json!(5));
        assert_eq!(output["other"], json!("7"));
    }

    #[test]
    fn number_mask_applies_to_renamed_keys() {
        let input = submission(json!({ "grp/count": "12" }));
        let output = normalize(&input, &SelectMask::parse("grp/count:total"), &NumberMask::parse("total"));
        assert_eq!(output["total"], json!(12));
    }

    #[test]
    fn input_is_not_mutated() {
        let input = submission(json!({ "n": "1" }));
        let before = input.clone();
        let _ = normalize(&input, &SelectMask::parse("n"), &NumberMask::parse("n"));
        assert_eq!(input, before);
    }
}
