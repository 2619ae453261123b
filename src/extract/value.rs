//! Value-collapse rule applied to every selector result

use serde_json::Value;

/// Collapses raw selector output into a stored value
///
/// Each string is stripped of surrounding whitespace and empty strings are
/// discarded. Exactly one remaining string becomes a scalar; zero or several
/// become a list (empty for zero).
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trawl::extract::collapse;
///
/// assert_eq!(collapse(vec![" Title ".into(), "\n".into()]), json!("Title"));
/// assert_eq!(collapse(vec!["a".into(), "b".into()]), json!(["a", "b"]));
/// assert_eq!(collapse(vec!["  ".into()]), json!([]));
/// ```
pub fn collapse(raw: Vec<String>) -> Value {
    let mut stripped: Vec<String> = raw
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if stripped.len() == 1 {
        Value::String(stripped.remove(0))
    } else {
        Value::Array(stripped.into_iter().map(Value::String).collect())
    }
}

/// Like [`collapse`], but returns None when nothing is left to store
pub fn collapse_present(raw: Vec<String>) -> Option<Value> {
    match collapse(raw) {
        Value::Array(items) if items.is_empty() => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_value_is_scalar() {
        assert_eq!(collapse(vec!["  X ".to_string()]), json!("X"));
    }

    #[test]
    fn test_blanks_do_not_count() {
        let raw = vec!["\n  ".to_string(), "X".to_string(), "".to_string()];
        assert_eq!(collapse(raw), json!("X"));
    }

    #[test]
    fn test_many_values_keep_order() {
        let raw = vec![" b".to_string(), " ".to_string(), "a ".to_string()];
        assert_eq!(collapse(raw), json!(["b", "a"]));
    }

    #[test]
    fn test_nothing_is_empty_list() {
        assert_eq!(collapse(vec![]), json!([]));
        assert_eq!(collapse_present(vec![]), None);
        assert_eq!(collapse_present(vec![" ".to_string()]), None);
    }

    #[test]
    fn test_collapse_is_deterministic() {
        let raw = vec!["a".to_string(), "b".to_string()];
        assert_eq!(collapse(raw.clone()), collapse(raw));
    }
}
