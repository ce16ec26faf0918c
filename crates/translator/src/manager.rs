//! 트랜슬레이터 모음 -- 소스 타입 하나에 대한 순서 있는 규칙 목록
//!
//! [`TranslatorsManager`]는 등록 순서대로 트랜슬레이터를 시도하여
//! 첫 번째로 매칭된 결과를 반환합니다. 초기화 이후 불변입니다.

use normwire_core::event::DataMap;

use crate::rule::Translator;

/// 소스 타입 하나에 등록된 트랜슬레이터의 순서 있는 모음
#[derive(Debug, Clone, Default)]
pub struct TranslatorsManager {
    /// 이 모음이 담당하는 소스 타입 (로그 식별용)
    source_type: String,
    /// (이름, 트랜슬레이터) -- 등록 순서 유지
    translators: Vec<(String, Translator)>,
}

impl TranslatorsManager {
    /// 소스 타입 이름으로 빈 모음을 생성합니다.
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            translators: Vec::new(),
        }
    }

    /// 담당 소스 타입을 반환합니다.
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// 트랜슬레이터를 이름과 함께 등록합니다. 등록 순서가 매칭 순서입니다.
    pub fn put(&mut self, name: impl Into<String>, translator: Translator) {
        self.translators.push((name.into(), translator));
    }

    /// 등록된 트랜슬레이터 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.translators.len()
    }

    /// 모음이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    /// 파싱된 트리를 번역합니다.
    ///
    /// 등록 순서대로 시도하여 첫 번째 `Some` 결과를 반환합니다.
    /// 매칭된 규칙이 소비한 키는 입력 트리에서 제거됩니다.
    /// 아무 규칙도 매칭되지 않으면 `None`이며 입력은 변경되지 않습니다.
    pub fn translate(&self, data: &mut DataMap) -> Option<DataMap> {
        for (name, translator) in &self.translators {
            if let Some(output) = translator.apply(data) {
                tracing::trace!(
                    source_type = %self.source_type,
                    rule = %name,
                    "rule matched"
                );
                return Some(output);
            }
        }

        tracing::debug!(source_type = %self.source_type, "no rule matched");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normwire_core::maps;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DataMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn guarded(when: &str, target: &str) -> Translator {
        Translator::from_str(&format!(
            r#"{{ "when": "{when}", "rules": [ {{ "message": {{ "@move": "{target}" }} }} ] }}"#
        ))
        .expect("compile")
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut manager = TranslatorsManager::new("test");
        manager.put("ack", guarded("message like 'ACK'", "ack_msg"));
        manager.put("nak", guarded("message like 'NAK'", "nak_msg"));
        manager.put("any", guarded("message like ''", "any_msg"));

        let mut data = tree(json!({"message": "DHCPNAK here"}));
        let output = manager.translate(&mut data).expect("should match");
        assert_eq!(maps::get_str(&output, "nak_msg"), Some("DHCPNAK here"));
    }

    #[test]
    fn no_match_returns_none_and_keeps_input() {
        let mut manager = TranslatorsManager::new("test");
        manager.put("ack", guarded("message like 'ACK'", "ack_msg"));

        let mut data = tree(json!({"message": "nothing relevant"}));
        assert!(manager.translate(&mut data).is_none());
        assert_eq!(maps::get_str(&data, "message"), Some("nothing relevant"));
    }

    #[test]
    fn empty_manager_matches_nothing() {
        let manager = TranslatorsManager::new("test");
        assert!(manager.is_empty());
        assert!(manager.translate(&mut DataMap::new()).is_none());
    }

    #[test]
    fn registration_order_is_match_order() {
        let mut manager = TranslatorsManager::new("test");
        manager.put("first", guarded("message like 'X'", "first"));
        manager.put("second", guarded("message like 'X'", "second"));

        let mut data = tree(json!({"message": "X"}));
        let output = manager.translate(&mut data).expect("should match");
        assert!(output.contains_key("first"));
        assert!(!output.contains_key("second"));
    }
}
