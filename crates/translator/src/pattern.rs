//! 패턴 마이크로 파서 -- `#{field}` 토큰 문법
//!
//! 벤더 파서와 규칙 문서의 staged 파싱 단계가 공유하는 토크나이저입니다.
//! 패턴은 리터럴 텍스트와 `#{name}` 필드 토큰의 나열이며, 리터럴은
//! 입력과 정확히 일치해야 하고 필드는 다음 리터럴 직전까지를 캡처합니다.
//!
//! # 토큰 형태
//! - `#{name}` -- 문자열 캡처
//! - `#{name: integer}` -- 숫자로 강제 변환하여 캡처
//! - `#{name: string(tag)}` -- 문자열 캡처 (tag는 정보성)
//! - `#{_}` -- 캡처하되 버림
//!
//! 마지막 토큰이 필드이면 입력의 나머지 전체를 캡처합니다.

use serde_json::Value;

use normwire_core::error::{NormwireError, ParseError};
use normwire_core::event::DataMap;
use normwire_core::parser::Parser;

use crate::error::TranslatorError;

/// 컴파일된 패턴 세그먼트
#[derive(Debug, Clone)]
enum Segment {
    /// 입력과 정확히 일치해야 하는 리터럴
    Literal(String),
    /// 캡처 필드
    Field { name: String, kind: FieldKind },
}

/// 필드 캡처의 변환 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// 문자열 그대로
    Text,
    /// 10진 또는 `0x` 16진 정수
    Integer,
    /// 캡처 후 버림 (`#{_}`)
    Discard,
}

/// 컴파일된 패턴 파서
///
/// 컴파일은 로드 시 한 번만 수행하고, `parse`는 불변 상태로 호출됩니다.
#[derive(Debug, Clone)]
pub struct PatternParser {
    pattern: String,
    segments: Vec<Segment>,
}

impl PatternParser {
    /// 패턴 문자열을 컴파일합니다.
    pub fn compile(pattern: &str) -> Result<Self, TranslatorError> {
        let mut segments = Vec::new();
        let mut rest = pattern;

        while !rest.is_empty() {
            match rest.find("#{") {
                None => {
                    segments.push(Segment::Literal(rest.to_owned()));
                    rest = "";
                }
                Some(start) => {
                    if start > 0 {
                        segments.push(Segment::Literal(rest[..start].to_owned()));
                    }
                    let token = &rest[start + 2..];
                    let end = token.find('}').ok_or_else(|| TranslatorError::BadPattern {
                        pattern: pattern.to_owned(),
                        reason: "unterminated field token".to_owned(),
                    })?;
                    segments.push(Self::compile_field(pattern, &token[..end])?);
                    rest = &token[end + 1..];
                }
            }
        }

        // 연속된 두 필드는 경계를 알 수 없음
        for window in segments.windows(2) {
            if matches!(
                window,
                [Segment::Field { .. }, Segment::Field { .. }]
            ) {
                return Err(TranslatorError::BadPattern {
                    pattern: pattern.to_owned(),
                    reason: "two adjacent fields without a literal separator".to_owned(),
                });
            }
        }

        Ok(Self {
            pattern: pattern.to_owned(),
            segments,
        })
    }

    fn compile_field(pattern: &str, token: &str) -> Result<Segment, TranslatorError> {
        let (name, annotation) = match token.split_once(':') {
            Some((name, annotation)) => (name.trim(), Some(annotation.trim())),
            None => (token.trim(), None),
        };

        if name.is_empty() {
            return Err(TranslatorError::BadPattern {
                pattern: pattern.to_owned(),
                reason: "empty field name".to_owned(),
            });
        }

        let kind = if name == "_" {
            FieldKind::Discard
        } else {
            match annotation {
                None => FieldKind::Text,
                Some("integer") => FieldKind::Integer,
                // string(tag) 형태의 주석은 정보성이며 문자열로 캡처
                Some(other) if other.starts_with("string") => FieldKind::Text,
                Some(other) => {
                    return Err(TranslatorError::BadPattern {
                        pattern: pattern.to_owned(),
                        reason: format!("unknown field annotation '{other}'"),
                    });
                }
            }
        };

        Ok(Segment::Field {
            name: name.to_owned(),
            kind,
        })
    }

    /// 원본 패턴 문자열을 반환합니다.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 입력 텍스트를 패턴에 따라 토크나이즈합니다.
    pub fn parse_text(&self, text: &str) -> Result<DataMap, TranslatorError> {
        let mut data = DataMap::new();
        let mut cursor = 0usize;
        let mut segments = self.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(literal) => {
                    if !text[cursor..].starts_with(literal.as_str()) {
                        return Err(TranslatorError::PatternMismatch { offset: cursor });
                    }
                    cursor += literal.len();
                }
                Segment::Field { name, kind } => {
                    let captured = match segments.peek() {
                        // 다음 리터럴 직전까지 캡처
                        Some(Segment::Literal(literal)) => {
                            match text[cursor..].find(literal.as_str()) {
                                Some(pos) => {
                                    let captured = &text[cursor..cursor + pos];
                                    cursor += pos;
                                    captured
                                }
                                None => {
                                    return Err(TranslatorError::PatternMismatch {
                                        offset: cursor,
                                    });
                                }
                            }
                        }
                        // 마지막 필드는 나머지 전체를 캡처
                        _ => {
                            let captured = &text[cursor..];
                            cursor = text.len();
                            captured
                        }
                    };

                    if *kind == FieldKind::Discard {
                        continue;
                    }

                    data.insert(name.clone(), Self::capture_value(name, captured, *kind)?);
                }
            }
        }

        Ok(data)
    }

    fn capture_value(name: &str, captured: &str, kind: FieldKind) -> Result<Value, TranslatorError> {
        match kind {
            FieldKind::Text | FieldKind::Discard => Ok(Value::String(captured.to_owned())),
            FieldKind::Integer => {
                let trimmed = captured.trim();
                let number = if let Some(hex) = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    i64::from_str_radix(hex, 16).ok()
                } else {
                    trimmed.parse::<i64>().ok()
                };
                number
                    .map(Value::from)
                    .ok_or_else(|| TranslatorError::BadCapture {
                        field: name.to_owned(),
                        reason: format!("'{trimmed}' is not an integer"),
                    })
            }
        }
    }
}

impl Parser for PatternParser {
    fn parse(&self, text: &str) -> Result<DataMap, NormwireError> {
        self.parse_text(text).map_err(|e| {
            ParseError::Failed {
                reason: e.to_string(),
            }
            .into()
        })
    }
}
