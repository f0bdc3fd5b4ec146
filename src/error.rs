use thiserror::Error;

use crate::db::router::Endpoint;
use crate::id::IdError;

/// 설정 로드 오류
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("설정 파일 {path} 읽기 실패: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("설정 파싱 실패: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("잘못된 설정 값 {key}={value}")]
    InvalidValue { key: String, value: String },
}

/// 데이터베이스 계층 오류
#[derive(Debug, Error)]
pub enum DbError {
    /// 선택된 엔드포인트 연결 실패. 다른 엔드포인트로 재시도하지 않는다.
    #[error("{endpoint} 엔드포인트({address}) 연결 실패: {source}")]
    EndpointUnreachable {
        endpoint: Endpoint,
        address: String,
        #[source]
        source: deadpool_postgres::PoolError,
    },
    /// 읽기 정책이 구성에 없는 엔드포인트를 선택함
    #[error("{endpoint} 엔드포인트가 없습니다 (읽기 엔드포인트 {replicas} 개)")]
    UnknownEndpoint { endpoint: Endpoint, replicas: usize },
    #[error("{address} 연결 풀 생성 실패: {source}")]
    PoolBuild {
        address: String,
        #[source]
        source: deadpool_postgres::CreatePoolError,
    },
    #[error("쿼리 실행 실패: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("허용되지 않는 SQL 식별자: {0}")]
    InvalidIdentifier(String),
}

/// 애플리케이션 최상위 오류
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Id(#[from] IdError),
}

pub type Result<T> = std::result::Result<T, AppError>;
