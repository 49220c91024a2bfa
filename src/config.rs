//! 설정 - 환경변수 기반 실행 설정
//!
//! 우선순위: CLI 플래그 > `DATA_SCOUT_*` 환경변수 > 기본값
//! API 키는 여기서 다루지 않습니다 (`embedding` 모듈 참고).

use std::env;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::embedding::{ProviderKind, DEFAULT_EMBED_TIMEOUT};
use crate::knowledge::{SimilarityMetric, DEFAULT_CONCURRENCY, DEFAULT_MAX_WORDS};
use crate::scraper::DEFAULT_FETCH_TIMEOUT;

/// 기본 검색 결과 수
pub const DEFAULT_TOP_N: usize = 5;

pub const ENV_MAX_WORDS: &str = "DATA_SCOUT_MAX_WORDS";
pub const ENV_TOP_N: &str = "DATA_SCOUT_TOP_N";
pub const ENV_METRIC: &str = "DATA_SCOUT_METRIC";
pub const ENV_PROVIDER: &str = "DATA_SCOUT_PROVIDER";
pub const ENV_DIMENSION: &str = "DATA_SCOUT_DIMENSION";
pub const ENV_CONCURRENCY: &str = "DATA_SCOUT_CONCURRENCY";
pub const ENV_EMBED_TIMEOUT: &str = "DATA_SCOUT_EMBED_TIMEOUT_SECS";
pub const ENV_FETCH_TIMEOUT: &str = "DATA_SCOUT_FETCH_TIMEOUT_SECS";
pub const ENV_ABORT_ON_EMBED_ERROR: &str = "DATA_SCOUT_ABORT_ON_EMBED_ERROR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name} value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoutConfig {
    /// 청크당 최대 단어 수
    pub max_words: usize,
    /// 검색 결과 수
    pub top_n: usize,
    pub metric: SimilarityMetric,
    #[serde(serialize_with = "serialize_display")]
    pub provider: ProviderKind,
    /// 임베딩 차원 (None이면 프로바이더 기본값)
    pub dimension: Option<usize>,
    /// 동시에 처리할 소스 수
    pub concurrency: usize,
    pub embed_timeout: Duration,
    pub fetch_timeout: Duration,
    /// 임베딩 실패 시 실행 전체 중단
    pub abort_on_embedding_error: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
            top_n: DEFAULT_TOP_N,
            metric: SimilarityMetric::default(),
            provider: ProviderKind::default(),
            dimension: None,
            concurrency: DEFAULT_CONCURRENCY,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            abort_on_embedding_error: false,
        }
    }
}

impl ScoutConfig {
    /// 프로세스 환경변수에서 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 임의의 조회 함수로 로드 (비어 있는 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            max_words: parse_usize(ENV_MAX_WORDS, get(ENV_MAX_WORDS), defaults.max_words)?,
            top_n: parse_usize(ENV_TOP_N, get(ENV_TOP_N), defaults.top_n)?,
            metric: parse_with(ENV_METRIC, get(ENV_METRIC), defaults.metric)?,
            provider: parse_with(ENV_PROVIDER, get(ENV_PROVIDER), defaults.provider)?,
            dimension: get(ENV_DIMENSION)
                .map(|v| parse_usize(ENV_DIMENSION, Some(v), 0))
                .transpose()?,
            concurrency: parse_usize(
                ENV_CONCURRENCY,
                get(ENV_CONCURRENCY),
                defaults.concurrency,
            )?,
            embed_timeout: parse_secs(
                ENV_EMBED_TIMEOUT,
                get(ENV_EMBED_TIMEOUT),
                defaults.embed_timeout,
            )?,
            fetch_timeout: parse_secs(
                ENV_FETCH_TIMEOUT,
                get(ENV_FETCH_TIMEOUT),
                defaults.fetch_timeout,
            )?,
            abort_on_embedding_error: parse_bool(
                ENV_ABORT_ON_EMBED_ERROR,
                get(ENV_ABORT_ON_EMBED_ERROR),
                defaults.abort_on_embedding_error,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// 0이 될 수 없는 값 검사
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("max_words", self.max_words == 0),
            ("top_n", self.top_n == 0),
            ("concurrency", self.concurrency == 0),
            ("dimension", self.dimension == Some(0)),
            ("embed_timeout", self.embed_timeout.is_zero()),
            ("fetch_timeout", self.fetch_timeout.is_zero()),
        ];

        match checks.into_iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(ConfigError::NotPositive(name)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

fn parse_usize(
    name: &'static str,
    raw: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    match raw {
        Some(value) => value.parse::<usize>().map_err(|e| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_secs(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };

    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_with<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String>,
{
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|reason| ConfigError::Invalid { name, value, reason }),
        None => Ok(default),
    }
}

fn serialize_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: std::fmt::Display,
{
    serializer.collect_str(value)
}
