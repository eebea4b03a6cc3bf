use serde::de::DeserializeOwned;

/// 메시지 본문 파싱 결과
/// 호출자가 성공/실패를 명시적으로 분기하도록 한다.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T> {
    Ok(T),
    ParseFailure(String),
}

impl<T: DeserializeOwned> ParseResult<T> {
    pub fn json(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::ParseFailure(e.to_string()),
        }
    }
}

impl<T> ParseResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::ParseFailure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn garbage_is_a_parse_failure() {
        let parsed = ParseResult::<Value>::json("not-json");
        assert!(matches!(parsed, ParseResult::ParseFailure(_)));
    }

    #[test]
    fn valid_json_is_ok() {
        let parsed = ParseResult::<Value>::json(r#"{"id":"1"}"#);
        assert_eq!(parsed.ok().unwrap()["id"], "1");
    }
}
