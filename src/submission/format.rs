use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::Submission;
use super::mask::{KeyMask, NumberMask, SelectMask};
use super::normalize::normalize;

/// How incoming submissions are reshaped before they are handed out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Nest grouped keys and parse geo values on top of the masks.
    pub reformat: bool,
    pub select_mask: SelectMask,
    pub number_mask: NumberMask,
    /// Keys holding space-separated multiple-choice answers.
    pub multi_select_mask: KeyMask,
}

/// Apply the masks, then (when `options.reformat` is set) split
/// multi-select answers, parse geo strings and nest grouped keys.
pub fn reformat(submission: &Submission, options: &FormatOptions) -> Submission {
    let normalized = normalize(submission, &options.select_mask, &options.number_mask);
    if !options.reformat {
        return normalized;
    }

    let mut output = Submission::new();
    for (key, value) in normalized {
        let value = if options.multi_select_mask.matches(&key) {
            split_multi_select(value)
        } else {
            parse_geo(value)
        };
        insert_nested(&mut output, &key, value);
    }

    if let Some(geolocation) = output.get("geolocation").and_then(lat_lon) {
        output.insert("geolocation".to_string(), geolocation);
    }

    output
}

fn split_multi_select(value: Value) -> Value {
    match value {
        Value::String(s) => Value::Array(
            s.split(' ')
                .filter(|choice| !choice.is_empty())
                .map(|choice| Value::String(choice.to_string()))
                .collect(),
        ),
        other => other,
    }
}

/// `"lat lon alt accuracy"` as `[lon, lat]` (GeoJSON order).
pub fn parse_geo_point(text: &str) -> Option<[f64; 2]> {
    let parts: Vec<&str> = text.trim().split(' ').collect();
    if parts.len() != 4 || !parts.iter().all(|p| is_plain_decimal(p)) {
        return None;
    }

    let lat = parts[0].parse::<f64>().ok()?;
    let lon = parts[1].parse::<f64>().ok()?;
    Some([lon, lat])
}

fn is_plain_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut halves = digits.splitn(2, '.');
    let whole = halves.next().unwrap_or_default();
    let fraction = halves.next();

    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_geo(value: Value) -> Value {
    let Value::String(text) = &value else {
        return value;
    };

    if let Some([lon, lat]) = parse_geo_point(text) {
        return json!({ "type": "Point", "coordinates": [lon, lat] });
    }

    let segments: Vec<&str> = text
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() <= 2 {
        return value;
    }

    let Some(points) = segments
        .iter()
        .map(|s| parse_geo_point(s))
        .collect::<Option<Vec<[f64; 2]>>>()
    else {
        return value;
    };

    if points.first() == points.last() {
        json!({ "type": "Polygon", "coordinates": [points] })
    } else {
        json!({ "type": "LineString", "coordinates": points })
    }
}

fn lat_lon(value: &Value) -> Option<Value> {
    match value.as_array()?.as_slice() {
        [lat, lon] if lat.is_number() && lon.is_number() => Some(json!({ "lat": lat, "lon": lon })),
        _ => None,
    }
}

fn sanitize_segment(segment: &str) -> &str {
    let trimmed = segment.trim_matches(|c: char| c == ' ' || c == '_');
    if trimmed.is_empty() { segment } else { trimmed }
}

/// Store `value` under the nested path of a `group/question` key.
/// A later key replaces a non-object value sitting on its path.
fn insert_nested(target: &mut Map<String, Value>, key: &str, value: Value) {
    let segments: Vec<&str> = key.split('/').map(sanitize_segment).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = target;
    for parent in parents {
        let slot = node
            .entry(parent.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(child) = slot else {
            return;
        };
        node = child;
    }

    node.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(value: Value) -> Submission {
        value.as_object().cloned().unwrap()
    }

    fn reformatting() -> FormatOptions {
        FormatOptions {
            reformat: true,
            ..FormatOptions::default()
        }
    }

    #[test]
    fn without_reformat_only_masks_apply() {
        let input = submission(json!({ "grp/a": "1", "b": "x" }));
        let options = FormatOptions {
            number_mask: NumberMask::parse("a"),
            ..FormatOptions::default()
        };

        let output = reformat(&input, &options);
        assert_eq!(output, submission(json!({ "grp/a": 1, "b": "x" })));
    }

    #[test]
    fn nests_grouped_keys_and_trims_underscores() {
        let input = submission(json!({
            "_id": 3,
            "household/ head /name": "Ana",
            "household/ head /age": "40",
            "__version__": "v1"
        }));

        let output = reformat(&input, &reformatting());
        assert_eq!(
            Value::Object(output),
            json!({
                "id": 3,
                "household": { "head": { "name": "Ana", "age": "40" } },
                "version": "v1"
            })
        );
    }

    #[test]
    fn parses_geo_values() {
        let input = submission(json!({
            "point": "-1.5 30.25 0 0",
            "line": "1 2 0 0;3 4 0 0;5 6 0 0",
            "shape": "1 2 0 0;3 4 0 0;5 6 0 0;1 2 0 0",
            "text": "1 2 three 0"
        }));

        let output = reformat(&input, &reformatting());
        assert_eq!(output["point"], json!({ "type": "Point", "coordinates": [30.25, -1.5] }));
        assert_eq!(
            output["line"],
            json!({ "type": "LineString", "coordinates": [[2.0, 1.0], [4.0, 3.0], [6.0, 5.0]] })
        );
        assert_eq!(output["shape"]["type"], json!("Polygon"));
        assert_eq!(output["shape"]["coordinates"][0].as_array().unwrap().len(), 4);
        assert_eq!(output["text"], json!("1 2 three 0"));
    }

    #[test]
    fn two_points_stay_a_string() {
        let input = submission(json!({ "pair": "1 2 0 0;3 4 0 0" }));
        let output = reformat(&input, &reformatting());
        assert_eq!(output["pair"], json!("1 2 0 0;3 4 0 0"));
    }

    #[test]
    fn geolocation_becomes_lat_lon() {
        let input = submission(json!({ "_geolocation": [-1.5, 30.25] }));
        let output = reformat(&input, &reformatting());
        assert_eq!(output["geolocation"], json!({ "lat": -1.5, "lon": 30.25 }));

        let missing = submission(json!({ "_geolocation": [null, null] }));
        let output = reformat(&missing, &reformatting());
        assert_eq!(output["geolocation"], json!([null, null]));
    }

    #[test]
    fn splits_multi_select_answers() {
        let input = submission(json!({ "grp/crops": "maize beans", "note": "a b" }));
        let options = FormatOptions {
            multi_select_mask: KeyMask::parse("crops"),
            ..reformatting()
        };

        let output = reformat(&input, &options);
        assert_eq!(output["grp"]["crops"], json!(["maize", "beans"]));
        assert_eq!(output["note"], json!("a b"));
    }

    #[test]
    fn plain_decimal_rules() {
        assert!(is_plain_decimal("-1.25"));
        assert!(is_plain_decimal("30"));
        assert!(!is_plain_decimal("1."));
        assert!(!is_plain_decimal("1e3"));
        assert!(!is_plain_decimal("-"));
    }
}
