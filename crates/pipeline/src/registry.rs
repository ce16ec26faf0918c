//! 파서 레지스트리 -- 소스 타입 이름으로 등록된 파서 관리
//!
//! 각 파서는 이름(관례상 소스 타입)으로 등록됩니다. 파이프라인 빌드 시
//! 퍼지 맵으로 변환되어 소스 타입 패밀리가 등록 하나를 공유할 수 있습니다.

use std::collections::HashMap;
use std::sync::Arc;

use normwire_core::error::NormwireError;
use normwire_core::event::DataMap;
use normwire_core::fuzzy::FuzzyMap;
use normwire_core::parser::Parser;

/// 이름 있는 파서의 레지스트리
#[derive(Default, Clone)]
pub struct Parsers {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl Parsers {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파서를 이름으로 등록합니다.
    ///
    /// 같은 이름이 이미 등록되어 있으면 경고를 남기고 교체합니다.
    pub fn register(&mut self, name: impl Into<String>, parser: Arc<dyn Parser>) {
        let name = name.into();
        if self.parsers.insert(name.clone(), parser).is_some() {
            tracing::warn!(parser = %name, "parser is already registered");
        }
    }

    /// 클로저를 파서로 등록하는 편의 메서드입니다.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, parser: F)
    where
        F: Fn(&str) -> Result<DataMap, NormwireError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(parser));
    }

    /// 이름으로 파서를 조회합니다.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Parser>> {
        self.parsers.get(name)
    }

    /// 등록된 파서 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// 레지스트리를 퍼지 맵으로 변환합니다.
    pub fn into_fuzzy(self, separator: char) -> FuzzyMap<Arc<dyn Parser>> {
        let mut map = FuzzyMap::with_separator(separator);
        for (name, parser) in self.parsers {
            map.insert(name, parser);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number_parser(text: &str) -> Result<DataMap, NormwireError> {
        let mut data = DataMap::new();
        let id = text
            .trim()
            .parse::<i64>()
            .map_err(|e| normwire_core::error::ParseError::Failed {
                reason: e.to_string(),
            })?;
        data.insert("id".to_owned(), json!(id));
        Ok(data)
    }

    #[test]
    fn register_and_get() {
        let mut parsers = Parsers::new();
        parsers.register_fn("test", number_parser);

        assert_eq!(parsers.len(), 1);
        let parser = parsers.get("test").expect("registered");
        let parsed = parser.parse("42").expect("parse");
        assert_eq!(parsed.get("id"), Some(&json!(42)));
    }

    #[test]
    fn reregistration_replaces() {
        let mut parsers = Parsers::new();
        parsers.register_fn("test", number_parser);
        parsers.register_fn("test", |_text| Ok(DataMap::new()));

        assert_eq!(parsers.len(), 1);
        let parser = parsers.get("test").expect("registered");
        assert!(parser.parse("not a number").is_ok());
    }

    #[test]
    fn into_fuzzy_preserves_registrations() {
        let mut parsers = Parsers::new();
        parsers.register_fn("syslog", number_parser);

        let fuzzy = parsers.into_fuzzy(':');
        assert!(fuzzy.get("syslog:firewall:1").is_some());
        assert!(fuzzy.get("winlog").is_none());
    }
}
