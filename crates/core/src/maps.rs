//! 점(dot) 경로 트리 유틸리티
//!
//! 이벤트 데이터 트리([`DataMap`])에 대한 경로 기반 읽기/쓰기를 제공합니다.
//! 경로는 `.`으로 구분된 세그먼트의 나열이며, 쓰기는 중간 객체를 게으르게
//! 생성하되 객체가 아닌 값을 객체로 덮어쓰지 않습니다.

use serde_json::{Map, Value};

use crate::event::DataMap;

/// 경로의 값을 읽습니다. 경로가 없거나 중간이 객체가 아니면 `None`입니다.
pub fn get_in<'a>(data: &'a DataMap, path: &str) -> Option<&'a Value> {
    let mut current = data;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        current = value.as_object()?;
    }

    None
}

/// 경로의 문자열 값을 읽습니다.
pub fn get_str<'a>(data: &'a DataMap, path: &str) -> Option<&'a str> {
    get_in(data, path).and_then(Value::as_str)
}

/// 경로에 값을 씁니다.
///
/// 중간 세그먼트에 해당하는 객체가 없으면 새로 만듭니다. 중간 세그먼트가
/// 이미 객체가 아닌 값으로 존재하면 덮어쓰지 않고 쓰기를 포기합니다.
/// 마지막 세그먼트의 기존 값은 덮어씁니다.
pub fn put_in(data: &mut DataMap, path: &str, value: Value) {
    let mut current = data;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_owned(), value);
            return;
        }

        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        match slot.as_object_mut() {
            Some(next) => current = next,
            // 객체가 아닌 값을 객체로 덮어쓰지 않음
            None => return,
        }
    }
}

/// 경로의 값을 제거하여 반환합니다. 경로가 없으면 `None`입니다.
///
/// 제거 후 비게 된 중간 객체는 그대로 둡니다.
pub fn remove_in(data: &mut DataMap, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => data.remove(path),
        Some((head, rest)) => {
            let next = data.get_mut(head)?.as_object_mut()?;
            remove_in(next, rest)
        }
    }
}

/// 서브트리를 경로 위치의 객체에 병합합니다.
///
/// 경로에 객체가 없으면 새로 만들고, 이미 있으면 키 단위로 덮어씁니다.
/// 경로에 객체가 아닌 값이 있으면 병합을 포기합니다.
pub fn merge_at(data: &mut DataMap, path: &str, subtree: DataMap) {
    let mut current = data;

    for segment in path.split('.') {
        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        match slot.as_object_mut() {
            Some(next) => current = next,
            None => return,
        }
    }

    for (key, value) in subtree {
        current.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DataMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn get_in_flat_key() {
        let data = tree(json!({"message": "DHCPACK on 192.168.1.120"}));
        assert_eq!(get_str(&data, "message"), Some("DHCPACK on 192.168.1.120"));
    }

    #[test]
    fn get_in_nested_path() {
        let data = tree(json!({"event_data": {"ip": "10.0.0.1"}}));
        assert_eq!(get_str(&data, "event_data.ip"), Some("10.0.0.1"));
        assert_eq!(get_in(&data, "event_data.mac"), None);
        assert_eq!(get_in(&data, "missing.ip"), None);
    }

    #[test]
    fn get_in_through_scalar_is_none() {
        let data = tree(json!({"event_data": "not a map"}));
        assert_eq!(get_in(&data, "event_data.ip"), None);
    }

    #[test]
    fn put_in_creates_intermediate_maps() {
        let mut data = DataMap::new();
        put_in(&mut data, "network_interface.ip", json!("10.0.0.1"));
        assert_eq!(get_str(&data, "network_interface.ip"), Some("10.0.0.1"));
    }

    #[test]
    fn put_in_overwrites_leaf() {
        let mut data = tree(json!({"a": {"b": 1}}));
        put_in(&mut data, "a.b", json!(2));
        assert_eq!(get_in(&data, "a.b"), Some(&json!(2)));
    }

    #[test]
    fn put_in_never_replaces_scalar_with_map() {
        let mut data = tree(json!({"a": "scalar"}));
        put_in(&mut data, "a.b", json!(1));
        // "a"는 스칼라 그대로
        assert_eq!(get_str(&data, "a"), Some("scalar"));
    }

    #[test]
    fn remove_in_flat_and_nested() {
        let mut data = tree(json!({"a": {"b": 1, "c": 2}, "d": 3}));
        assert_eq!(remove_in(&mut data, "a.b"), Some(json!(1)));
        assert_eq!(remove_in(&mut data, "a.b"), None);
        assert_eq!(remove_in(&mut data, "d"), Some(json!(3)));
        assert_eq!(get_in(&data, "a.c"), Some(&json!(2)));
    }

    #[test]
    fn merge_at_creates_and_extends() {
        let mut data = tree(json!({"event_data": {"ip": "192.168.1.120"}}));
        let parsed = tree(json!({"ip1": "192", "ip2": "168"}));
        merge_at(&mut data, "event_data", parsed);

        assert_eq!(get_str(&data, "event_data.ip"), Some("192.168.1.120"));
        assert_eq!(get_str(&data, "event_data.ip1"), Some("192"));
        assert_eq!(get_str(&data, "event_data.ip2"), Some("168"));
    }

    #[test]
    fn merge_at_missing_path_creates_map() {
        let mut data = DataMap::new();
        merge_at(&mut data, "a.b", tree(json!({"x": 1})));
        assert_eq!(get_in(&data, "a.b.x"), Some(&json!(1)));
    }

    #[test]
    fn merge_at_scalar_path_is_noop() {
        let mut data = tree(json!({"a": 1}));
        merge_at(&mut data, "a", tree(json!({"x": 1})));
        assert_eq!(get_in(&data, "a"), Some(&json!(1)));
    }
}
