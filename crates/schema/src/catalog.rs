//! 스키마 카탈로그 -- 클래스/객체/타입 정의 인덱스
//!
//! 단일 JSON 문서(`classes`, `objects`, `types`)를 시작 시 한 번 로드하여
//! 클래스는 `uid`로, 객체와 타입은 이름으로 인덱싱합니다. 로드 이후에는
//! 불변이므로 동시 읽기에 락이 필요 없습니다.
//!
//! 클래스별 observable 경로 맵은 스키마 로드 시간의 상당 부분을 차지하므로
//! 최초 접근 시 [`OnceLock`] 가드 아래에서 게으르게 구축합니다.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde_json::Value;

use normwire_core::error::SchemaError;
use normwire_core::event::DataMap;

use crate::dictionary;

// 스키마 문서의 속성명
const CLASSES: &str = "classes";
const OBJECTS: &str = "objects";
const TYPES: &str = "types";

pub(crate) const ATTRIBUTES: &str = "attributes";
pub(crate) const ENUM: &str = "enum";
pub(crate) const ENUM_SIBLING: &str = "sibling";
pub(crate) const ENUM_SUFFIX: &str = "_id";
pub(crate) const UID: &str = "uid";
pub(crate) const NAME: &str = "name";
pub(crate) const CAPTION: &str = "caption";
pub(crate) const TYPE: &str = "type";
pub(crate) const TYPE_ID: &str = "type_id";
pub(crate) const VALUE: &str = "value";
pub(crate) const IS_ARRAY: &str = "is_array";
pub(crate) const OBJECT_TYPE: &str = "object_type";
pub(crate) const OBSERVABLE: &str = "observable";

/// 불투명 페이로드 타입 -- 이 타입의 속성은 보강하지 않음
pub(crate) const JSON_TYPE: &str = "json_t";

/// 경로 세그먼트 반복 허용 횟수 -- 초과 시 순환 스키마로 판단
const LOOP_THRESHOLD: usize = 2;

/// 로드된 스키마 카탈로그
#[derive(Debug, Default)]
pub struct Catalog {
    /// class_uid -> 클래스 정의
    classes: HashMap<i64, DataMap>,
    /// 객체 이름 -> 객체 정의
    objects: HashMap<String, DataMap>,
    /// 타입 이름 -> 타입 정의
    types: HashMap<String, DataMap>,
    /// observable type_id -> 캡션
    observable_types: HashMap<i64, String>,
    /// class_uid -> observable 기술자 목록 (게으른 구축)
    class_observables: OnceLock<HashMap<i64, Vec<DataMap>>>,
    loaded: bool,
}

impl Catalog {
    /// 스키마 없이 동작하는 빈 카탈로그를 생성합니다.
    ///
    /// 빈 카탈로그로는 모든 보강이 통과(passthrough)합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 스키마 JSON 파일을 로드합니다.
    ///
    /// # Errors
    /// 파일을 읽을 수 없거나 JSON이 아니면 에러를 반환합니다.
    /// 스키마 에러는 시작 실패로 이어져야 하므로 조용히 넘어가지 않습니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SchemaError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read schema file: {e}"),
            })?;

        let doc: Value = serde_json::from_str(&content).map_err(|e| SchemaError::Load {
            path: path.display().to_string(),
            reason: format!("bad JSON: {e}"),
        })?;

        let catalog = Self::from_value(&doc).map_err(|e| match e {
            SchemaError::Load { reason, .. } => SchemaError::Load {
                path: path.display().to_string(),
                reason,
            },
        })?;

        tracing::info!(
            path = %path.display(),
            classes = catalog.classes.len(),
            objects = catalog.objects.len(),
            types = catalog.types.len(),
            "schema catalog loaded"
        );

        Ok(catalog)
    }

    /// 파싱된 스키마 문서로부터 카탈로그를 구성합니다.
    pub fn from_value(doc: &Value) -> Result<Self, SchemaError> {
        let doc = doc.as_object().ok_or_else(|| SchemaError::Load {
            path: String::new(),
            reason: "schema document is not an object".to_owned(),
        })?;

        let objects = index_by_name(doc.get(OBJECTS));
        let types = index_by_name(doc.get(TYPES));
        let classes = index_classes(doc.get(CLASSES));
        let observable_types = observable_types(objects.get(OBSERVABLE));

        Ok(Self {
            classes,
            objects,
            types,
            observable_types,
            class_observables: OnceLock::new(),
            loaded: true,
        })
    }

    /// 스키마가 로드되어 있는지 확인합니다.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// 클래스 정의를 조회합니다.
    pub fn class(&self, uid: i64) -> Option<&DataMap> {
        self.classes.get(&uid)
    }

    /// 객체 정의를 조회합니다.
    pub fn object(&self, name: &str) -> Option<&DataMap> {
        self.objects.get(name)
    }

    /// 타입 정의를 조회합니다.
    pub fn type_def(&self, name: &str) -> Option<&DataMap> {
        self.types.get(name)
    }

    /// observable 타입 캡션을 조회합니다.
    pub fn observable_type(&self, type_id: i64) -> &str {
        self.observable_types
            .get(&type_id)
            .map(String::as_str)
            .unwrap_or(dictionary::OTHER)
    }

    /// 클래스에 연관된 observable 기술자 목록을 반환합니다.
    ///
    /// 맵은 최초 호출 시 한 번만 구축됩니다.
    pub fn observables_of(&self, class_uid: i64) -> Option<&[DataMap]> {
        self.class_observables_map()
            .get(&class_uid)
            .map(Vec::as_slice)
    }

    /// 클래스에 연관된 observable 중 지정한 타입의 것만 반환합니다.
    pub fn observables_of_type(&self, class_uid: i64, type_id: i64) -> Vec<&DataMap> {
        self.observables_of(class_uid)
            .unwrap_or(&[])
            .iter()
            .filter(|descriptor| {
                descriptor.get(TYPE_ID).and_then(Value::as_i64) == Some(type_id)
            })
            .collect()
    }

    fn class_observables_map(&self) -> &HashMap<i64, Vec<DataMap>> {
        self.class_observables.get_or_init(|| {
            tracing::debug!("lazily building class to observables map");
            let mut map = HashMap::with_capacity(self.classes.len());
            for (uid, class) in &self.classes {
                let mut descriptors = Vec::new();
                self.collect_observables(None, class, &mut descriptors);
                map.insert(*uid, descriptors);
            }
            map
        })
    }

    /// 클래스/객체 정의의 속성을 재귀적으로 걸으며 observable 경로를
    /// 수집합니다. 배열 속성은 건너뜁니다.
    fn collect_observables(
        &self,
        parent: Option<&str>,
        definition: &DataMap,
        descriptors: &mut Vec<DataMap>,
    ) {
        let Some(attributes) = definition.get(ATTRIBUTES).and_then(Value::as_object) else {
            return;
        };

        for (name, attribute) in attributes {
            let Some(attribute) = attribute.as_object() else {
                continue;
            };
            let path = match parent {
                Some(parent) => format!("{parent}.{name}"),
                None => name.clone(),
            };

            if attribute.get(IS_ARRAY).and_then(Value::as_bool) == Some(true) {
                tracing::debug!(path = %path, "skipping array attribute in observables map");
                continue;
            }

            if let Some(object_type) = attribute.get(OBJECT_TYPE).and_then(Value::as_str) {
                if is_path_looped(&path) {
                    tracing::debug!(path = %path, object_type, "looped object path, stopping");
                    continue;
                }
                if let Some(object) = self.objects.get(object_type) {
                    if let Some(type_id) = object.get(OBSERVABLE).and_then(Value::as_i64) {
                        descriptors.push(self.descriptor(&path, type_id, None));
                    }
                    self.collect_observables(Some(&path), object, descriptors);
                } else {
                    tracing::debug!(path = %path, object_type, "unknown object type");
                }
            } else if let Some(attr_type) = attribute.get(TYPE).and_then(Value::as_str) {
                if let Some(type_id) = self
                    .types
                    .get(attr_type)
                    .and_then(|t| t.get(OBSERVABLE))
                    .and_then(Value::as_i64)
                {
                    descriptors.push(self.descriptor(&path, type_id, None));
                }
            }
        }
    }

    /// observable 기술자를 만듭니다. `value`가 없으면 경로만 기록합니다.
    pub(crate) fn descriptor(&self, path: &str, type_id: i64, value: Option<Value>) -> DataMap {
        let mut descriptor = DataMap::new();
        descriptor.insert(NAME.to_owned(), Value::String(path.to_owned()));
        descriptor.insert(
            TYPE.to_owned(),
            Value::String(self.observable_type(type_id).to_owned()),
        );
        descriptor.insert(TYPE_ID.to_owned(), Value::from(type_id));
        if let Some(value) = value {
            descriptor.insert(VALUE.to_owned(), value);
        }
        descriptor
    }
}

/// 경로에 같은 세그먼트가 임계값을 넘어 반복되면 순환으로 판단합니다.
fn is_path_looped(path: &str) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for segment in path.split('.') {
        let count = counts.entry(segment).or_insert(0);
        *count += 1;
        if *count > LOOP_THRESHOLD {
            return true;
        }
    }
    false
}

/// `objects`/`types` 섹션을 이름으로 인덱싱합니다.
fn index_by_name(section: Option<&Value>) -> HashMap<String, DataMap> {
    let mut map = HashMap::new();
    if let Some(entries) = section.and_then(Value::as_object) {
        for (name, definition) in entries {
            if let Some(definition) = definition.as_object() {
                map.insert(name.clone(), definition.clone());
            }
        }
    }
    map
}

/// `classes` 섹션을 `uid`로 재인덱싱합니다. `uid`가 없는 클래스는
/// 경고를 남기고 건너뜁니다.
fn index_classes(section: Option<&Value>) -> HashMap<i64, DataMap> {
    let mut map = HashMap::new();
    if let Some(entries) = section.and_then(Value::as_object) {
        for (name, definition) in entries {
            let Some(definition) = definition.as_object() else {
                continue;
            };
            match definition.get(UID).and_then(Value::as_i64) {
                Some(uid) => {
                    map.insert(uid, definition.clone());
                }
                None => {
                    tracing::warn!(class = %name, "class does not have uid, skipping");
                }
            }
        }
    }
    map
}

/// observable 객체 정의에서 type_id enum을 캡션 맵으로 변환합니다.
fn observable_types(observable: Option<&DataMap>) -> HashMap<i64, String> {
    let mut map = HashMap::new();

    let types = observable
        .and_then(|o| o.get(ATTRIBUTES))
        .and_then(Value::as_object)
        .and_then(|attrs| attrs.get(TYPE_ID))
        .and_then(Value::as_object)
        .and_then(|type_id| type_id.get(ENUM))
        .and_then(Value::as_object);

    if let Some(types) = types {
        for (id, entry) in types {
            let caption = entry.get(CAPTION).and_then(Value::as_str);
            if let (Ok(id), Some(caption)) = (id.parse::<i64>(), caption) {
                map.insert(id, caption.to_owned());
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> Value {
        json!({
            "classes": {
                "DHCP Activity": {
                    "uid": 1020,
                    "caption": "DHCP Activity",
                    "attributes": {
                        "disposition_id": {
                            "enum": { "5": { "caption": "Ack" } }
                        },
                        "network_interface": {
                            "object_type": "network_interface"
                        },
                        "lease_time": { "type": "integer_t" }
                    }
                },
                "No Uid Class": { "attributes": {} }
            },
            "objects": {
                "observable": {
                    "attributes": {
                        "type_id": {
                            "enum": {
                                "1": { "caption": "Hostname" },
                                "2": { "caption": "IP Address" }
                            }
                        }
                    }
                },
                "network_interface": {
                    "caption": "Network Interface",
                    "attributes": {
                        "ip": { "type": "ip_t" },
                        "hostname": { "type": "hostname_t" },
                        "peer": { "object_type": "network_interface" }
                    }
                }
            },
            "types": {
                "ip_t": { "observable": 2 },
                "hostname_t": { "observable": 1 },
                "integer_t": {}
            }
        })
    }

    #[test]
    fn indexes_classes_by_uid() {
        let catalog = Catalog::from_value(&sample_schema()).expect("catalog");
        assert!(catalog.is_loaded());
        assert!(catalog.class(1020).is_some());
        assert!(catalog.class(9999).is_none());
    }

    #[test]
    fn observable_type_captions() {
        let catalog = Catalog::from_value(&sample_schema()).expect("catalog");
        assert_eq!(catalog.observable_type(2), "IP Address");
        assert_eq!(catalog.observable_type(1), "Hostname");
        // 미등록 타입은 Other
        assert_eq!(catalog.observable_type(42), "Other");
    }

    #[test]
    fn class_observables_map_is_built_lazily() {
        let catalog = Catalog::from_value(&sample_schema()).expect("catalog");
        let observables = catalog.observables_of(1020).expect("class observables");

        let paths: Vec<&str> = observables
            .iter()
            .filter_map(|d| d.get(NAME).and_then(Value::as_str))
            .collect();
        assert!(paths.contains(&"network_interface.ip"));
        assert!(paths.contains(&"network_interface.hostname"));
    }

    #[test]
    fn looped_object_paths_terminate_recursion() {
        // network_interface.peer는 자기 자신을 참조하지만 맵 구축은 끝남
        let catalog = Catalog::from_value(&sample_schema()).expect("catalog");
        let observables = catalog.observables_of(1020).expect("class observables");

        // peer 아래 반복 경로는 임계값까지만 내려감
        let deep: Vec<&str> = observables
            .iter()
            .filter_map(|d| d.get(NAME).and_then(Value::as_str))
            .filter(|p| p.matches("peer").count() > LOOP_THRESHOLD)
            .collect();
        assert!(deep.is_empty());
    }

    #[test]
    fn observables_filtered_by_type() {
        let catalog = Catalog::from_value(&sample_schema()).expect("catalog");
        let ips = catalog.observables_of_type(1020, 2);
        assert!(!ips.is_empty());
        for descriptor in ips {
            assert_eq!(descriptor.get(TYPE_ID), Some(&json!(2)));
        }
    }

    #[test]
    fn empty_catalog_reports_not_loaded() {
        let catalog = Catalog::empty();
        assert!(!catalog.is_loaded());
        assert!(catalog.class(1020).is_none());
        assert!(catalog.observables_of(1020).is_none());
    }

    #[test]
    fn is_path_looped_detection() {
        assert!(!is_path_looped("a.b.c"));
        assert!(!is_path_looped("a.peer.b.peer"));
        assert!(is_path_looped("peer.peer.peer"));
    }

    #[tokio::test]
    async fn load_missing_file_is_an_error() {
        assert!(Catalog::load("/nonexistent/schema.json").await.is_err());
    }

    #[tokio::test]
    async fn load_bad_json_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("schema.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(Catalog::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn load_valid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("schema.json");
        std::fs::write(&path, sample_schema().to_string()).expect("write");

        let catalog = Catalog::load(&path).await.expect("load");
        assert!(catalog.class(1020).is_some());
    }
}
