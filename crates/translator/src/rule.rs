//! 규칙 문서 컴파일과 적용
//!
//! 하나의 JSON 규칙 문서는 하나의 [`Translator`]로 컴파일됩니다.
//! 컴파일은 로드 시 한 번만 수행되며, 정규식과 패턴 문법, `when` 조건식이
//! 이 단계에서 미리 준비됩니다. 적용은 불변 상태에 대한 순수 함수입니다.
//!
//! # 규칙 문서 형태
//! ```json
//! {
//!   "desc": "Translates Infoblox DHCPACK",
//!   "when": "message like 'DHCPACK'",
//!   "parsers": [
//!     { "name": "message", "pattern": "DHCPACK on #{ip} to #{mac} #{_}",
//!       "output": "event_data" }
//!   ],
//!   "rules": [
//!     { "event_data.ip":  { "@move": "network_interface.ip" } },
//!     { "class_uid":      { "desc": "DHCP Activity", "@value": 1020 } },
//!     { "event_data.leaseTime": { "@move": { "name": "lease_time", "type": "integer" } } }
//!   ]
//! }
//! ```

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;

use normwire_core::event::DataMap;
use normwire_core::maps;

use crate::error::TranslatorError;
use crate::pattern::PatternParser;
use crate::predicate::Predicate;

// 규칙 문서의 인식 필드명
const DESC: &str = "desc";
const WHEN: &str = "when";
const PARSER: &str = "parser";
const PARSERS: &str = "parsers";
const RULES: &str = "rules";

const STAGE_NAME: &str = "name";
const STAGE_PATTERN: &str = "pattern";
const STAGE_REGEX: &str = "regex";
const STAGE_OUTPUT: &str = "output";

const OP_MOVE: &str = "@move";
const OP_COPY: &str = "@copy";
const OP_VALUE: &str = "@value";
const OP_ENUM: &str = "@enum";
const OP_REMOVE: &str = "@remove";

/// 밀리초 자릿수 판별 기준 -- 이 값 이상의 epoch 값은 이미 밀리초로 간주
const EPOCH_MILLIS_FLOOR: i64 = 1_000_000_000_000;

/// staged 파싱 단계
#[derive(Debug, Clone)]
struct Stage {
    /// 재파싱할 문자열 값의 경로
    input: String,
    kind: StageKind,
    /// 결과 트리를 병합할 경로
    output: String,
}

#[derive(Debug, Clone)]
enum StageKind {
    Pattern(PatternParser),
    Regex(Regex),
}

/// `@move`/`@copy`의 타입 강제 변환
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Integer,
    Long,
    Text,
    Timestamp,
    Downcase,
    Upcase,
}

impl Coercion {
    fn from_name(name: &str) -> Result<Self, TranslatorError> {
        match name {
            "integer" => Ok(Self::Integer),
            "long" => Ok(Self::Long),
            "string" => Ok(Self::Text),
            "timestamp" => Ok(Self::Timestamp),
            "downcase" => Ok(Self::Downcase),
            "upcase" => Ok(Self::Upcase),
            other => Err(TranslatorError::UnknownCoercion(other.to_owned())),
        }
    }

    /// 값을 강제 변환합니다. 변환 불가이면 `None`으로 소스 누락과
    /// 동일하게 처리됩니다.
    fn apply(self, value: Value) -> Option<Value> {
        match self {
            Self::Integer | Self::Long => coerce_integer(&value).map(Value::from),
            Self::Text => Some(Value::String(string_form(&value))),
            Self::Timestamp => coerce_timestamp(&value).map(Value::from),
            Self::Downcase => Some(Value::String(string_form(&value).to_ascii_lowercase())),
            Self::Upcase => Some(Value::String(string_form(&value).to_ascii_uppercase())),
        }
    }
}

/// `@move`/`@copy`의 타깃 기술
#[derive(Debug, Clone)]
struct MoveTarget {
    name: String,
    coerce: Option<Coercion>,
    default: Option<Value>,
}

/// 컴파일된 재작성 연산
#[derive(Debug, Clone)]
enum Op {
    Move(MoveTarget),
    Copy(MoveTarget),
    Value(Value),
    Enum {
        name: String,
        default: Option<Value>,
        values: DataMap,
    },
    Remove,
}

/// 재작성 규칙 하나 -- `{path: {op: arg}}`
#[derive(Debug, Clone)]
struct Rewrite {
    /// `@value`는 타깃 경로, 그 외에는 소스 경로
    path: String,
    op: Op,
}

/// 하나의 규칙 문서에서 컴파일된 불변 변환 함수
#[derive(Debug, Clone)]
pub struct Translator {
    desc: Option<String>,
    when: Option<Predicate>,
    stages: Vec<Stage>,
    rewrites: Vec<Rewrite>,
}

impl Translator {
    /// JSON 텍스트로부터 규칙 문서를 컴파일합니다.
    pub fn from_str(json: &str) -> Result<Self, TranslatorError> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| TranslatorError::InvalidDocument(format!("bad JSON: {e}")))?;
        Self::from_value(&doc)
    }

    /// 파싱된 JSON 값으로부터 규칙 문서를 컴파일합니다.
    ///
    /// 인식하지 않는 최상위 키는 무시합니다. 알 수 없는 재작성 연산자는
    /// 로드 에러입니다.
    pub fn from_value(doc: &Value) -> Result<Self, TranslatorError> {
        let doc = doc
            .as_object()
            .ok_or_else(|| TranslatorError::InvalidDocument("document is not an object".into()))?;

        let desc = doc.get(DESC).and_then(Value::as_str).map(str::to_owned);

        let when = match doc.get(WHEN).and_then(Value::as_str) {
            Some(expr) => Some(Predicate::parse(expr)?),
            None => None,
        };

        let mut stages = Vec::new();
        if let Some(entry) = doc.get(PARSER) {
            stages.push(Self::compile_stage(entry)?);
        }
        if let Some(entries) = doc.get(PARSERS).and_then(Value::as_array) {
            for entry in entries {
                stages.push(Self::compile_stage(entry)?);
            }
        }

        let mut rewrites = Vec::new();
        if let Some(entries) = doc.get(RULES).and_then(Value::as_array) {
            for entry in entries {
                rewrites.push(Self::compile_rewrite(entry)?);
            }
        }

        Ok(Self {
            desc,
            when,
            stages,
            rewrites,
        })
    }

    fn compile_stage(entry: &Value) -> Result<Stage, TranslatorError> {
        let entry = entry
            .as_object()
            .ok_or_else(|| TranslatorError::InvalidDocument("parser entry is not an object".into()))?;

        let input = entry
            .get(STAGE_NAME)
            .and_then(Value::as_str)
            .ok_or_else(|| TranslatorError::InvalidDocument("parser entry without 'name'".into()))?
            .to_owned();
        let output = entry
            .get(STAGE_OUTPUT)
            .and_then(Value::as_str)
            .ok_or_else(|| TranslatorError::InvalidDocument("parser entry without 'output'".into()))?
            .to_owned();

        let kind = match (
            entry.get(STAGE_PATTERN).and_then(Value::as_str),
            entry.get(STAGE_REGEX).and_then(Value::as_str),
        ) {
            (Some(pattern), None) => StageKind::Pattern(PatternParser::compile(pattern)?),
            (None, Some(regex)) => StageKind::Regex(Regex::new(regex)?),
            _ => {
                return Err(TranslatorError::InvalidDocument(
                    "parser entry needs exactly one of 'pattern' or 'regex'".into(),
                ));
            }
        };

        Ok(Stage {
            input,
            kind,
            output,
        })
    }

    fn compile_rewrite(entry: &Value) -> Result<Rewrite, TranslatorError> {
        let entry = entry
            .as_object()
            .ok_or_else(|| TranslatorError::InvalidDocument("rewrite rule is not an object".into()))?;

        let mut entries = entry.iter();
        let (path, spec) = match (entries.next(), entries.next()) {
            (Some(first), None) => first,
            _ => {
                return Err(TranslatorError::InvalidDocument(
                    "rewrite rule must be a single-key mapping".into(),
                ));
            }
        };

        let spec = spec.as_object().ok_or_else(|| {
            TranslatorError::InvalidDocument(format!("rewrite spec for '{path}' is not an object"))
        })?;

        let mut op = None;
        for (key, arg) in spec {
            if !key.starts_with('@') {
                // desc 등의 정보성 키는 무시
                continue;
            }

            let compiled = match key.as_str() {
                OP_MOVE => Op::Move(Self::compile_move_target(path, arg)?),
                OP_COPY => Op::Copy(Self::compile_move_target(path, arg)?),
                OP_VALUE => Op::Value(arg.clone()),
                OP_ENUM => Self::compile_enum(path, arg)?,
                OP_REMOVE => Op::Remove,
                unknown => {
                    return Err(TranslatorError::UnknownOperator {
                        path: path.clone(),
                        op: unknown.to_owned(),
                    });
                }
            };

            if op.replace(compiled).is_some() {
                return Err(TranslatorError::InvalidDocument(format!(
                    "rewrite rule for '{path}' has more than one operator"
                )));
            }
        }

        let op = op.ok_or_else(|| {
            TranslatorError::InvalidDocument(format!("rewrite rule for '{path}' has no operator"))
        })?;

        Ok(Rewrite {
            path: path.clone(),
            op,
        })
    }

    fn compile_move_target(path: &str, arg: &Value) -> Result<MoveTarget, TranslatorError> {
        match arg {
            Value::String(name) => Ok(MoveTarget {
                name: name.clone(),
                coerce: None,
                default: None,
            }),
            Value::Object(spec) => {
                let name = spec
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        TranslatorError::InvalidDocument(format!(
                            "@move target for '{path}' without 'name'"
                        ))
                    })?
                    .to_owned();
                let coerce = match spec.get("type").and_then(Value::as_str) {
                    Some(name) => Some(Coercion::from_name(name)?),
                    None => None,
                };
                Ok(MoveTarget {
                    name,
                    coerce,
                    default: spec.get("default").cloned(),
                })
            }
            _ => Err(TranslatorError::InvalidDocument(format!(
                "@move argument for '{path}' must be a string or an object"
            ))),
        }
    }

    fn compile_enum(path: &str, arg: &Value) -> Result<Op, TranslatorError> {
        let spec = arg.as_object().ok_or_else(|| {
            TranslatorError::InvalidDocument(format!("@enum argument for '{path}' is not an object"))
        })?;

        let name = spec
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TranslatorError::InvalidDocument(format!("@enum for '{path}' without 'name'"))
            })?
            .to_owned();
        let values = spec
            .get("values")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| {
                TranslatorError::InvalidDocument(format!("@enum for '{path}' without 'values'"))
            })?;

        Ok(Op::Enum {
            name,
            default: spec.get("default").cloned(),
            values,
        })
    }

    /// 규칙 설명을 반환합니다.
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// 입력 트리에 규칙을 적용합니다.
    ///
    /// `when` 가드가 거짓이면 `None`을 반환하고 입력은 변경되지 않습니다.
    /// 가드가 참이면 staged 파싱이 입력 트리를 확장하고, 재작성 규칙이
    /// 소비한 키를 입력에서 제거하며 결과 트리를 만들어 반환합니다.
    /// 입력에 남은 키는 규칙이 소비하지 않은(unmapped) 속성입니다.
    pub fn apply(&self, data: &mut DataMap) -> Option<DataMap> {
        if let Some(when) = &self.when {
            if !when.eval(data) {
                return None;
            }
        }

        for stage in &self.stages {
            self.apply_stage(stage, data);
        }

        let mut output = DataMap::new();
        for rewrite in &self.rewrites {
            Self::apply_rewrite(rewrite, data, &mut output);
        }

        Some(output)
    }

    fn apply_stage(&self, stage: &Stage, data: &mut DataMap) {
        // 입력 경로가 없거나 문자열이 아니면 이 단계는 건너뜀 (실패 아님)
        let Some(text) = maps::get_str(data, &stage.input).map(str::to_owned) else {
            return;
        };

        let parsed = match &stage.kind {
            StageKind::Pattern(parser) => parser.parse_text(&text),
            StageKind::Regex(regex) => Ok(regex_captures(regex, &text)),
        };

        match parsed {
            Ok(tree) => maps::merge_at(data, &stage.output, tree),
            Err(error) => {
                tracing::debug!(
                    input = %stage.input,
                    error = %error,
                    "staged parse did not match, skipping"
                );
            }
        }
    }

    fn apply_rewrite(rewrite: &Rewrite, data: &mut DataMap, output: &mut DataMap) {
        match &rewrite.op {
            Op::Move(target) => {
                let source = maps::remove_in(data, &rewrite.path);
                Self::apply_move(target, source, output);
            }
            Op::Copy(target) => {
                let source = maps::get_in(data, &rewrite.path).cloned();
                Self::apply_move(target, source, output);
            }
            Op::Value(value) => {
                maps::put_in(output, &rewrite.path, value.clone());
            }
            Op::Enum {
                name,
                default,
                values,
            } => {
                let source = maps::remove_in(data, &rewrite.path);
                let mapped = source
                    .map(|v| string_form(&v))
                    .and_then(|key| values.get(&key).cloned())
                    .or_else(|| default.clone());
                if let Some(value) = mapped {
                    maps::put_in(output, name, value);
                }
            }
            Op::Remove => {
                maps::remove_in(data, &rewrite.path);
            }
        }
    }

    fn apply_move(target: &MoveTarget, source: Option<Value>, output: &mut DataMap) {
        let coerced = match source {
            Some(value) => match target.coerce {
                Some(coercion) => coercion.apply(value),
                None => Some(value),
            },
            None => None,
        };

        // 소스 누락(또는 변환 불가)이면 default, 그것도 없으면 건너뜀
        if let Some(value) = coerced.or_else(|| target.default.clone()) {
            maps::put_in(output, &target.name, value);
        }
    }
}

/// 정규식의 명명 그룹 캡처를 트리로 변환합니다. 매칭 실패나 매칭되지
/// 않은 그룹은 조용히 비워 둡니다.
fn regex_captures(regex: &Regex, text: &str) -> DataMap {
    let mut data = DataMap::new();

    if let Some(captures) = regex.captures(text) {
        for name in regex.capture_names().flatten() {
            if let Some(matched) = captures.name(name) {
                data.insert(name.to_owned(), Value::String(matched.as_str().to_owned()));
            }
        }
    }

    data
}

/// 값의 문자열 형태 -- 문자열은 그대로, 그 외는 JSON 표현
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 10진, `0x` 16진, 문자열 형태의 정수를 i64로 변환합니다.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(hex) = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
            {
                i64::from_str_radix(hex, 16).ok()
            } else {
                trimmed.parse::<i64>().ok()
            }
        }
        _ => None,
    }
}

/// ISO-8601 계열 또는 epoch 값을 epoch 밀리초(UTC)로 변환합니다.
///
/// `EPOCH_MILLIS_FLOOR` 이상의 숫자는 이미 밀리초로 간주합니다.
fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().map(epoch_to_millis).or_else(|| {
            n.as_f64().map(|secs| (secs * 1000.0) as i64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();

            if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(trimmed) {
                return Some(datetime.timestamp_millis());
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                    return Some(naive.and_utc().timestamp_millis());
                }
            }
            trimmed.parse::<i64>().map(epoch_to_millis).ok()
        }
        _ => None,
    }
}

fn epoch_to_millis(epoch: i64) -> i64 {
    if epoch.abs() >= EPOCH_MILLIS_FLOOR {
        epoch
    } else {
        epoch * 1000
    }
}
