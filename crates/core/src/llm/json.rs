use crate::llm::error::ResponseParseError;
use serde_json::Value;

/// Greedy first-`{`-to-last-`}` slice of a model response. Handles fenced blocks and prose
/// around the object alike.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Extracts and parses the single JSON object embedded in `text`.
///
/// Field types and ranges are checked by the caller against its own schema.
pub fn parse_json_object(text: &str) -> Result<Value, ResponseParseError> {
    let json_str = extract_json(text).ok_or(ResponseParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ResponseParseError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ResponseParseError::NotAnObject);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}"));
        assert_eq!(parse_json_object(s).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn parses_fenced_score_response() {
        let text = "Here is the result:\n```json\n{\"總分\":85,\"風險等級\":\"低風險\"}\n```";
        let value = parse_json_object(text).unwrap();
        assert_eq!(value["總分"], json!(85));
    }

    #[test]
    fn extraction_is_greedy_across_nested_objects() {
        let text = "a {\"x\": {\"y\": 1}} b";
        assert_eq!(extract_json(text), Some("{\"x\": {\"y\": 1}}"));
    }

    #[test]
    fn missing_braces_is_a_parse_error() {
        assert_eq!(
            parse_json_object("no json here"),
            Err(ResponseParseError::NoJsonObject)
        );
        assert_eq!(
            parse_json_object("} backwards {"),
            Err(ResponseParseError::NoJsonObject)
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_json_object("{\"a\": 1,}").unwrap_err();
        assert!(matches!(err, ResponseParseError::InvalidJson(_)));
    }

    #[test]
    fn two_objects_do_not_parse_as_one() {
        let err = parse_json_object("{\"a\":1} and {\"b\":2}").unwrap_err();
        assert!(matches!(err, ResponseParseError::InvalidJson(_)));
    }
}
