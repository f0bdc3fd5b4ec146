use std::env;
use std::path::Path;

use log::info;

use crate::db::config::DbConfig;
use crate::error::ConfigError;

/// DB 설정 파일 경로 환경 변수
pub const DB_CONFIG_FILE_ENV: &str = "DB_CONFIG_FILE";
/// 기본 DB 설정 파일
pub const DEFAULT_DB_CONFIG_FILE: &str = "db.yml";

/// 설정 소스 우선순위
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// 환경 변수로 지정된 설정 파일
    Environment,
    /// 현재 디렉토리의 설정 파일
    File,
    /// 기본값
    Default,
}

impl ConfigSource {
    fn describe(&self) -> &'static str {
        match self {
            ConfigSource::Environment => "환경 변수",
            ConfigSource::File => "설정 파일",
            ConfigSource::Default => "기본값",
        }
    }
}

/// 통합 설정
///
/// 시작 시 한 번 만들어진 뒤 변경되지 않으며, 필요한 구성 요소에 값으로 전달된다.
#[derive(Clone, Debug)]
pub struct Settings {
    /// 데이터베이스 설정
    pub database: DbConfig,
    /// 데이터베이스 설정 소스
    pub db_source: ConfigSource,
}

impl Settings {
    /// 프로세스 환경에서 설정 로드
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok(), DEFAULT_DB_CONFIG_FILE)
    }

    /// 환경 변수 조회 함수와 기본 설정 파일 경로를 지정하여 로드
    ///
    /// 1. `DB_CONFIG_FILE` 이 가리키는 파일
    /// 2. `default_file`
    /// 3. 기본값
    ///
    /// 이후 `MASTER_DB_*`, `REPLICA_ONE_*`, `REPLICA_TWO_*` 변수로 항목별 덮어쓰기.
    pub fn load_with<F, P>(lookup: F, default_file: P) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
        P: AsRef<Path>,
    {
        let env_file = lookup(DB_CONFIG_FILE_ENV).filter(|path| !path.trim().is_empty());
        let (mut database, db_source) = if let Some(path) = env_file {
            info!("환경 변수에서 DB 설정 파일 경로 로드: {}", path);
            (DbConfig::load_from_file(&path)?, ConfigSource::Environment)
        } else if default_file.as_ref().exists() {
            (DbConfig::load_from_file(default_file)?, ConfigSource::File)
        } else {
            info!("DB 설정 파일을 찾을 수 없어 기본 설정 사용");
            (DbConfig::default(), ConfigSource::Default)
        };

        database.apply_env(&lookup)?;

        Ok(Self { database, db_source })
    }

    /// 설정 정보 로그 출력
    pub fn log_settings(&self) {
        info!("데이터베이스 설정 소스: {}", self.db_source.describe());
        info!("쓰기 엔드포인트: {}", self.database.primary.address());
        for (index, replica) in self.database.replicas.iter().enumerate() {
            info!("읽기 엔드포인트 {}: {}", index, replica.address());
        }
    }
}
