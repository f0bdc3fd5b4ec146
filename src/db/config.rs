use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::users;
use crate::error::ConfigError;

/// 쓰기 엔드포인트 환경 변수 접두사
pub const PRIMARY_ENV_PREFIX: &str = "MASTER_DB_";
/// 읽기 엔드포인트 환경 변수 접두사 (순서대로 replica 0, 1)
pub const REPLICA_ENV_PREFIXES: [&str; 2] = ["REPLICA_ONE_", "REPLICA_TWO_"];

const DEFAULT_PRIMARY_PORT: u16 = 5432;

/// 데이터베이스 연결 설정
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 생략하면 0 으로 읽히며, `DbConfig` 파싱 시 역할별 기본 포트로 채워진다.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_credential")]
    pub database: String,
    #[serde(default = "default_credential")]
    pub user: String,
    #[serde(default = "default_credential")]
    pub password: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_credential() -> String {
    "postgres".to_string()
}

fn default_sslmode() -> String {
    "disable".to_string()
}

impl ConnectionConfig {
    /// 지정 포트의 기본 연결 설정
    pub fn with_port(port: u16) -> Self {
        Self {
            host: default_host(),
            port,
            database: default_credential(),
            user: default_credential(),
            password: default_credential(),
            sslmode: default_sslmode(),
        }
    }

    /// n 번째 읽기 엔드포인트의 기본 설정 (5433, 5434, ...)
    pub fn replica_default(index: usize) -> Self {
        let port = DEFAULT_PRIMARY_PORT.saturating_add(1).saturating_add(index as u16);
        Self::with_port(port)
    }

    /// 연결 문자열 생성
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host, self.port, self.user, self.password, self.database, self.sslmode
        )
    }

    /// 로그용 주소 (비밀번호 제외)
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    /// 접두사 + NAME/HOST/PORT/USER/PASSWORD 환경 변수 적용
    ///
    /// 비어 있는 값은 설정되지 않은 것으로 본다. 값 검증이 끝난 뒤에만 반영한다.
    fn apply_env<F>(&mut self, prefix: &str, lookup: &F) -> Result<bool, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", prefix, name)).filter(|value| !value.trim().is_empty())
        };

        let database = var("NAME");
        let host = var("HOST");
        let user = var("USER");
        let password = var("PASSWORD");
        let port = match var("PORT") {
            Some(v) => Some(v.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: format!("{}PORT", prefix),
                value: v.clone(),
            })?),
            None => None,
        };

        let applied = database.is_some()
            || host.is_some()
            || user.is_some()
            || password.is_some()
            || port.is_some();

        if let Some(v) = database {
            self.database = v;
        }
        if let Some(v) = host {
            self.host = v;
        }
        if let Some(v) = user {
            self.user = v;
        }
        if let Some(v) = password {
            self.password = v;
        }
        if let Some(v) = port {
            self.port = v;
        }

        Ok(applied)
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} port={} user={} password=*** dbname={} sslmode={}",
            self.host, self.port, self.user, self.database, self.sslmode
        )
    }
}

/// 연결 풀 설정
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_connection_pool_size")]
    pub max_connections: usize,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

fn default_connection_pool_size() -> usize {
    20
}

fn default_connection_timeout() -> u64 {
    30
}

impl PoolSettings {
    /// 연결 제한 시간
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_connection_pool_size(),
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

/// 파티션 설정 (외부에서 생성된 파티션 이름만 참조)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    #[serde(default = "default_partition_names")]
    pub names: Vec<String>,
}

fn default_partition_names() -> Vec<String> {
    users::DEFAULT_PARTITIONS.iter().map(|s| s.to_string()).collect()
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            names: default_partition_names(),
        }
    }
}

/// 데이터베이스 설정
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_primary")]
    pub primary: ConnectionConfig,
    #[serde(default = "default_replicas")]
    pub replicas: Vec<ConnectionConfig>,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub partitions: PartitionSettings,
}

fn default_primary() -> ConnectionConfig {
    ConnectionConfig::with_port(DEFAULT_PRIMARY_PORT)
}

fn default_replicas() -> Vec<ConnectionConfig> {
    (0..REPLICA_ENV_PREFIXES.len()).map(ConnectionConfig::replica_default).collect()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            replicas: default_replicas(),
            pool: PoolSettings::default(),
            partitions: PartitionSettings::default(),
        }
    }
}

impl DbConfig {
    /// 설정 파일에서 DB 설정 로드
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("DB 설정 파일 로드: {}", path.display());

        let mut file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_yaml_str(&contents)?;
        info!("DB 설정 로드 완료: {} (읽기 {} 개)", config.primary.address(), config.replicas.len());

        Ok(config)
    }

    /// YAML 문자열 파싱
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(contents)?;
        config.fill_default_ports();
        Ok(config)
    }

    /// 포트가 생략된 엔드포인트에 역할별 기본 포트 지정 (쓰기 5432, 읽기 5433, 5434, ...)
    fn fill_default_ports(&mut self) {
        if self.primary.port == 0 {
            self.primary.port = DEFAULT_PRIMARY_PORT;
        }
        for (index, replica) in self.replicas.iter_mut().enumerate() {
            if replica.port == 0 {
                replica.port = ConnectionConfig::replica_default(index).port;
            }
        }
    }

    /// 환경 변수 덮어쓰기
    ///
    /// 각 항목은 독립적으로 덮어쓴다. 파일에 정의된 것보다 뒤쪽 replica 의 변수가
    /// 있으면 기본값으로 채운 뒤 적용한다.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.primary.apply_env(PRIMARY_ENV_PREFIX, &lookup)? {
            debug!("환경 변수로 쓰기 엔드포인트 설정 적용: {}", self.primary);
        }

        for (index, prefix) in REPLICA_ENV_PREFIXES.iter().enumerate() {
            if index < self.replicas.len() {
                if self.replicas[index].apply_env(prefix, &lookup)? {
                    debug!("환경 변수로 읽기 엔드포인트 {} 설정 적용: {}", index, self.replicas[index]);
                }
                continue;
            }

            let mut replica = ConnectionConfig::replica_default(index);
            if replica.apply_env(prefix, &lookup)? {
                while self.replicas.len() < index {
                    let filler = ConnectionConfig::replica_default(self.replicas.len());
                    self.replicas.push(filler);
                }
                debug!("환경 변수로 읽기 엔드포인트 {} 추가: {}", index, replica);
                self.replicas.push(replica);
            }
        }

        Ok(())
    }

}
