use serde_json::Value;

/// Integer view of a loosely typed value: numbers (fractions truncated) and
/// numeric strings. Booleans are not numbers here.
pub fn int_like(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => num.as_i64().or_else(|| {
            num.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

pub fn float_like(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

pub fn bool_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(_) => match int_like(value) {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" => Some(true),
            "false" | "no" | "n" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String form of a scalar; `None` for null, arrays and objects.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_like_accepts_numeric_strings_and_truncates_fractions() {
        assert_eq!(int_like(&json!(" 42 ")), Some(42));
        assert_eq!(int_like(&json!("7.9")), Some(7));
        assert_eq!(int_like(&json!(3.2)), Some(3));
        assert_eq!(int_like(&json!("abc")), None);
        assert_eq!(int_like(&json!(true)), None);
    }

    #[test]
    fn bool_like_reads_common_spellings() {
        assert_eq!(bool_like(&json!("Yes")), Some(true));
        assert_eq!(bool_like(&json!("off")), Some(false));
        assert_eq!(bool_like(&json!(1)), Some(true));
        assert_eq!(bool_like(&json!(2)), None);
        assert_eq!(bool_like(&json!("maybe")), None);
    }
}
