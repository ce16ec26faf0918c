//! 스키마 기반 이벤트 보강
//!
//! [`Enricher`]는 정규화된 이벤트를 카탈로그와 대조하며 순회하여
//! 다음을 추가합니다.
//!
//! - `type_uid` -- `class_uid * 100 + activity_id`
//! - enum sibling -- `foo_id` 옆의 텍스트 캡션 `foo`
//! - `observables` -- 스키마에 표시된 관심 속성 값의 목록
//! - `metadata.uid` -- 이벤트 고유 UUID
//!
//! 알 수 없는 속성은 그대로 통과시키고, `json_t` 타입의 서브트리는
//! 불투명 페이로드로 건드리지 않습니다. 보강은 멱등입니다.

use std::sync::Arc;

use serde_json::Value;

use normwire_core::event::DataMap;
use normwire_core::maps;

use crate::catalog::{
    ATTRIBUTES, CAPTION, Catalog, ENUM, ENUM_SIBLING, ENUM_SUFFIX, IS_ARRAY, JSON_TYPE,
    OBJECT_TYPE, OBSERVABLE, TYPE,
};
use crate::dictionary;

/// 스키마 기반 이벤트 보강기
///
/// 기본 동작 플래그는 생성 시 결정되며, [`Enricher::enrich_with`]로
/// 호출 단위 재정의가 가능합니다.
#[derive(Debug, Clone)]
pub struct Enricher {
    catalog: Arc<Catalog>,
    add_enum_siblings: bool,
    add_observables: bool,
}

impl Enricher {
    /// 보강기를 생성합니다.
    pub fn new(catalog: Arc<Catalog>, add_enum_siblings: bool, add_observables: bool) -> Self {
        Self {
            catalog,
            add_enum_siblings,
            add_observables,
        }
    }

    /// 카탈로그만으로 보강기를 생성합니다. `type_uid`만 추가됩니다.
    pub fn minimal(catalog: Arc<Catalog>) -> Self {
        Self::new(catalog, false, false)
    }

    /// 카탈로그에 대한 참조를 반환합니다.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 기본 플래그로 이벤트를 보강합니다.
    pub fn enrich(&self, data: DataMap) -> DataMap {
        self.enrich_with(data, self.add_enum_siblings, self.add_observables)
    }

    /// 지정한 플래그로 이벤트를 보강합니다.
    ///
    /// 클래스를 알 수 없는 이벤트는 변경 없이 반환됩니다.
    pub fn enrich_with(
        &self,
        mut data: DataMap,
        add_enum_siblings: bool,
        add_observables: bool,
    ) -> DataMap {
        if !self.catalog.is_loaded() {
            return data;
        }

        let Some(class_uid) = data.get(dictionary::CLASS_UID).and_then(Value::as_i64) else {
            tracing::debug!("event has no class_uid, skipping enrichment");
            return data;
        };
        let Some(class) = self.catalog.class(class_uid).cloned() else {
            tracing::debug!(class_uid, "event class not found in catalog");
            return data;
        };

        tracing::debug!(class_uid, "enriching event");

        add_type_uid(&mut data, class_uid);
        add_event_uid(&mut data);

        if !add_enum_siblings && !add_observables {
            return data;
        }

        let mut observables = Vec::new();
        let mut enriched = self.enrich_tree(
            None,
            data,
            &class,
            add_enum_siblings,
            add_observables,
            &mut observables,
        );

        if add_observables && !observables.is_empty() {
            enriched.insert(
                dictionary::OBSERVABLES.to_owned(),
                Value::Array(observables.into_iter().map(Value::Object).collect()),
            );
        }

        enriched
    }

    /// 트리 하나를 클래스/객체 정의와 대조하며 순회합니다.
    fn enrich_tree(
        &self,
        parent: Option<&str>,
        data: DataMap,
        definition: &DataMap,
        add_enum_siblings: bool,
        add_observables: bool,
        observables: &mut Vec<DataMap>,
    ) -> DataMap {
        let attributes = definition.get(ATTRIBUTES).and_then(Value::as_object);
        let mut enriched = DataMap::new();

        for (name, value) in data {
            let path = match parent {
                Some(parent) => format!("{parent}.{name}"),
                None => name.clone(),
            };

            let attribute = attributes
                .and_then(|attrs| attrs.get(&name))
                .and_then(Value::as_object);

            // 알 수 없는 속성과 불투명 json_t 페이로드는 그대로 통과
            let Some(attribute) = attribute else {
                enriched.insert(name, value);
                continue;
            };
            if attribute.get(TYPE).and_then(Value::as_str) == Some(JSON_TYPE) {
                enriched.insert(name, value);
                continue;
            }

            if let Some(enumeration) = attribute.get(ENUM).and_then(Value::as_object) {
                if add_enum_siblings {
                    update_enum_sibling(&mut enriched, &name, attribute, enumeration, &value);
                }
                enriched.insert(name, value);
            } else if let Value::Object(embedded) = value {
                let value = self.enrich_embedded_object(
                    &path,
                    attribute,
                    embedded,
                    add_enum_siblings,
                    add_observables,
                    observables,
                );
                enriched.insert(name, value);
            } else if let Value::Array(elements) = value {
                let value = if attribute.get(IS_ARRAY).and_then(Value::as_bool) == Some(true) {
                    self.enrich_embedded_array(
                        &path,
                        attribute,
                        elements,
                        add_enum_siblings,
                        add_observables,
                        observables,
                    )
                } else {
                    tracing::debug!(attribute = %name, "attribute is not an array in the schema");
                    Value::Array(elements)
                };
                enriched.insert(name, value);
            } else {
                if add_observables {
                    self.collect_scalar_observable(&path, attribute, &value, observables);
                }
                enriched.insert(name, value);
            }
        }

        enriched
    }

    fn enrich_embedded_object(
        &self,
        path: &str,
        attribute: &DataMap,
        embedded: DataMap,
        add_enum_siblings: bool,
        add_observables: bool,
        observables: &mut Vec<DataMap>,
    ) -> Value {
        let Some(object_type) = attribute.get(OBJECT_TYPE).and_then(Value::as_str) else {
            tracing::debug!(path, "attribute is not an object in the schema");
            return Value::Object(embedded);
        };
        let Some(object) = self.catalog.object(object_type).cloned() else {
            tracing::debug!(path, object_type, "attribute has invalid object type");
            return Value::Object(embedded);
        };

        // 객체 정의 자체가 observable이면 경로를 기록하고 내려감
        if add_observables {
            if let Some(type_id) = object.get(OBSERVABLE).and_then(Value::as_i64) {
                observables.push(self.catalog.descriptor(path, type_id, None));
            }
        }

        Value::Object(self.enrich_tree(
            Some(path),
            embedded,
            &object,
            add_enum_siblings,
            add_observables,
            observables,
        ))
    }

    fn enrich_embedded_array(
        &self,
        path: &str,
        attribute: &DataMap,
        elements: Vec<Value>,
        add_enum_siblings: bool,
        add_observables: bool,
        observables: &mut Vec<DataMap>,
    ) -> Value {
        let Some(object_type) = attribute.get(OBJECT_TYPE).and_then(Value::as_str) else {
            tracing::debug!(path, "array type is not an object in the schema");
            return Value::Array(elements);
        };
        let Some(object) = self.catalog.object(object_type).cloned() else {
            tracing::debug!(path, object_type, "array has invalid object type");
            return Value::Array(elements);
        };

        let enriched = elements
            .into_iter()
            .map(|element| match element {
                Value::Object(embedded) => Value::Object(self.enrich_tree(
                    Some(path),
                    embedded,
                    &object,
                    add_enum_siblings,
                    add_observables,
                    observables,
                )),
                other => other,
            })
            .collect();

        Value::Array(enriched)
    }

    fn collect_scalar_observable(
        &self,
        path: &str,
        attribute: &DataMap,
        value: &Value,
        observables: &mut Vec<DataMap>,
    ) {
        let Some(attr_type) = attribute.get(TYPE).and_then(Value::as_str) else {
            tracing::debug!(path, "attribute does not have a type");
            return;
        };
        let Some(type_def) = self.catalog.type_def(attr_type) else {
            tracing::debug!(path, attr_type, "attribute has an invalid type");
            return;
        };
        if let Some(type_id) = type_def.get(OBSERVABLE).and_then(Value::as_i64) {
            observables.push(self.catalog.descriptor(path, type_id, Some(value.clone())));
        }
    }
}

/// `type_uid`를 추가합니다. `activity_id`가 없으면 추가하지 않습니다.
fn add_type_uid(data: &mut DataMap, class_uid: i64) {
    if let Some(activity_id) = data.get(dictionary::ACTIVITY_ID).and_then(Value::as_i64) {
        data.insert(
            dictionary::TYPE_UID.to_owned(),
            Value::from(dictionary::type_uid(class_uid, activity_id)),
        );
    }
}

/// `metadata.uid`에 UUID v4를 채웁니다. 이미 있으면 유지합니다.
fn add_event_uid(data: &mut DataMap) {
    if maps::get_in(data, dictionary::METADATA_UID).is_none() {
        maps::put_in(
            data,
            dictionary::METADATA_UID,
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
}

/// enum sibling 키를 계산하여 캡션을 씁니다. 키가 이미 있으면 건드리지
/// 않습니다.
fn update_enum_sibling(
    enriched: &mut DataMap,
    name: &str,
    attribute: &DataMap,
    enumeration: &DataMap,
    value: &Value,
) {
    let sibling = attribute
        .get(ENUM_SIBLING)
        .or_else(|| enumeration.get(ENUM_SIBLING))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            // 명시적 sibling이 없으면 `_id` 접미사를 떼어냄
            name.strip_suffix(ENUM_SUFFIX)
                .filter(|stem| !stem.is_empty())
                .map(str::to_owned)
        });

    let Some(sibling) = sibling else {
        return;
    };
    if enriched.contains_key(&sibling) {
        return;
    }

    let key = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let caption = enumeration
        .get(&key)
        .and_then(Value::as_object)
        .and_then(|entry| entry.get(CAPTION))
        .cloned();

    if let Some(caption) = caption {
        enriched.insert(sibling, caption);
    }
}
