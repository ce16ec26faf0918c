//! 파이프라인 설정

use crate::error::NormPipelineError;

/// 파이프라인 설정
///
/// | 옵션 | 효과 |
/// |---|---|
/// | `add_enum_siblings` | 보강 시 enum 캡션 sibling 추가 |
/// | `add_observables` | 보강 시 observable 수집 |
/// | `fuzzy_key_separator` | 퍼지 소스 타입 접미사 구분자 |
/// | `queue_capacity` | 기본 큐 용량 (0은 무제한) |
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 보강 시 enum sibling 추가 여부
    pub add_enum_siblings: bool,
    /// 보강 시 observable 수집 여부
    pub add_observables: bool,
    /// 퍼지 소스 타입 구분자
    pub fuzzy_key_separator: char,
    /// 입력 및 소스별 큐의 기본 용량
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            add_enum_siblings: false,
            add_observables: false,
            fuzzy_key_separator: ':',
            queue_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NormPipelineError> {
        const MAX_QUEUE_CAPACITY: usize = 1_000_000;

        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(NormPipelineError::Config {
                field: "queue_capacity".to_owned(),
                reason: format!("must be 0-{MAX_QUEUE_CAPACITY}"),
            });
        }

        if self.fuzzy_key_separator.is_alphanumeric() {
            return Err(NormPipelineError::Config {
                field: "fuzzy_key_separator".to_owned(),
                reason: "separator must not be alphanumeric".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// enum sibling 추가 여부를 설정합니다.
    pub fn add_enum_siblings(mut self, enabled: bool) -> Self {
        self.config.add_enum_siblings = enabled;
        self
    }

    /// observable 수집 여부를 설정합니다.
    pub fn add_observables(mut self, enabled: bool) -> Self {
        self.config.add_observables = enabled;
        self
    }

    /// 퍼지 키 구분자를 설정합니다.
    pub fn fuzzy_key_separator(mut self, separator: char) -> Self {
        self.config.fuzzy_key_separator = separator;
        self
    }

    /// 큐 용량을 설정합니다. 0은 무제한입니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 설정을 검증하고 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, NormPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().expect("valid");
    }

    #[test]
    fn zero_capacity_means_unbounded_and_is_valid() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        config.validate().expect("valid");
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let config = PipelineConfig {
            queue_capacity: 10_000_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn alphanumeric_separator_is_rejected() {
        let config = PipelineConfig {
            fuzzy_key_separator: 'a',
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .add_enum_siblings(true)
            .add_observables(true)
            .queue_capacity(16)
            .build()
            .expect("valid");
        assert!(config.add_enum_siblings);
        assert!(config.add_observables);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.fuzzy_key_separator, ':');
    }

    #[test]
    fn builder_rejects_invalid_config() {
        assert!(
            PipelineConfigBuilder::new()
                .fuzzy_key_separator('1')
                .build()
                .is_err()
        );
    }
}
