use std::ops::Deref;
use std::time::Duration;

use deadpool_postgres::{Config, Object, Pool, PoolConfig, PoolError, Runtime, Timeouts};
use log::{debug, info};
use tokio_postgres::NoTls;

use super::config::{ConnectionConfig, DbConfig, PoolSettings};
use super::router::{Endpoint, Operation, ReadPolicy, ReplicaRouter};
use crate::error::DbError;

/// 단일 엔드포인트 연결 풀
pub struct EndpointPool {
    pool: Pool,
    address: String,
}

/// 풀 상태 구조체
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub available: usize,
    pub size: usize,
}

impl EndpointPool {
    /// 연결 풀 생성
    ///
    /// 생성 시점에는 접속하지 않는다. 실제 접속은 첫 checkout 에서 일어난다.
    pub fn new(conn: &ConnectionConfig, settings: &PoolSettings) -> Result<Self, DbError> {
        let address = conn.address();

        let mut cfg = Config::new();
        cfg.url = Some(conn.connection_string());
        cfg.connect_timeout = Some(settings.connect_timeout());
        cfg.pool = Some(PoolConfig::new(settings.max_connections));

        debug!("DB 연결 풀 생성 중: {} (최대 연결: {})", conn, settings.max_connections);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|source| DbError::PoolBuild {
                address: address.clone(),
                source,
            })?;

        Ok(Self { pool, address })
    }

    /// 클라이언트 가져오기
    ///
    /// `timeout` 이 없으면 풀 자체 설정을 따른다.
    pub async fn get_client(&self, timeout: Option<Duration>) -> Result<Object, PoolError> {
        match checkout_timeouts(timeout) {
            Some(timeouts) => self.pool.timeout_get(&timeouts).await,
            None => self.pool.get().await,
        }
    }

    /// 로그용 주소
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 풀 상태 확인
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            available: status.available,
            size: status.size,
        }
    }
}

/// 호출자 제한 시간을 대기/생성/재사용 검사 모두에 그대로 적용
fn checkout_timeouts(timeout: Option<Duration>) -> Option<Timeouts> {
    timeout.map(|limit| Timeouts {
        wait: Some(limit),
        create: Some(limit),
        recycle: Some(limit),
    })
}

/// 라우팅된 클라이언트
///
/// 한 번의 논리 작업 동안만 보유하고, drop 시 원래 풀로 반환된다.
pub struct RoutedClient {
    endpoint: Endpoint,
    client: Object,
}

impl RoutedClient {
    /// 선택된 엔드포인트
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

impl Deref for RoutedClient {
    type Target = Object;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// 쓰기 1개 + 읽기 N개 엔드포인트를 하나의 논리 핸들로 묶은 풀
pub struct RoutedPool {
    router: ReplicaRouter,
    primary: EndpointPool,
    replicas: Vec<EndpointPool>,
}

impl RoutedPool {
    /// 무작위 읽기 정책으로 생성
    pub fn new(config: &DbConfig) -> Result<Self, DbError> {
        Self::build(config, ReplicaRouter::new(config.replicas.len()))
    }

    /// 읽기 선택 정책 지정 생성
    pub fn with_policy(
        config: &DbConfig,
        policy: impl ReadPolicy + 'static,
    ) -> Result<Self, DbError> {
        Self::build(config, ReplicaRouter::with_policy(config.replicas.len(), policy))
    }

    fn build(config: &DbConfig, router: ReplicaRouter) -> Result<Self, DbError> {
        let primary = EndpointPool::new(&config.primary, &config.pool)?;
        let replicas = config
            .replicas
            .iter()
            .map(|replica| EndpointPool::new(replica, &config.pool))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "라우팅 풀 구성 완료: 쓰기 {}, 읽기 {} 개",
            primary.address(),
            replicas.len()
        );

        Ok(Self {
            router,
            primary,
            replicas,
        })
    }

    /// 엔드포인트별 풀
    pub fn endpoint_pool(&self, endpoint: Endpoint) -> Result<&EndpointPool, DbError> {
        match endpoint {
            Endpoint::Write => Ok(&self.primary),
            Endpoint::Read(index) => self.replicas.get(index).ok_or(DbError::UnknownEndpoint {
                endpoint,
                replicas: self.replicas.len(),
            }),
        }
    }

    /// 작업에 맞는 엔드포인트의 클라이언트 가져오기
    pub async fn checkout(&self, op: Operation) -> Result<RoutedClient, DbError> {
        self.checkout_timeout(op, None).await
    }

    /// 호출자 제한 시간을 적용하여 클라이언트 가져오기
    ///
    /// 선택된 엔드포인트에 연결할 수 없으면 `EndpointUnreachable` 을 그대로 반환한다.
    pub async fn checkout_timeout(
        &self,
        op: Operation,
        timeout: Option<Duration>,
    ) -> Result<RoutedClient, DbError> {
        let endpoint = self.router.route(op);
        let pool = self.endpoint_pool(endpoint)?;

        let client = pool
            .get_client(timeout)
            .await
            .map_err(|source| DbError::EndpointUnreachable {
                endpoint,
                address: pool.address().to_string(),
                source,
            })?;

        debug!("{:?} 작업에 {} 엔드포인트({}) 연결 할당", op, endpoint, pool.address());
        Ok(RoutedClient { endpoint, client })
    }

    /// 전체 엔드포인트 풀 상태
    pub fn status(&self) -> Vec<(Endpoint, PoolStatus)> {
        std::iter::once((Endpoint::Write, self.primary.status()))
            .chain(
                self.replicas
                    .iter()
                    .enumerate()
                    .map(|(index, pool)| (Endpoint::Read(index), pool.status())),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::router::RandomPolicy;

    /// 항상 범위 밖 인덱스를 고르는 정책
    struct OutOfRange;

    impl ReadPolicy for OutOfRange {
        fn select(&self, replicas: usize) -> usize {
            replicas
        }
    }

    /// 접속이 거부되는 로컬 포트로 구성
    fn unreachable_config(replicas: usize) -> DbConfig {
        let closed = || ConnectionConfig {
            host: "127.0.0.1".to_string(),
            ..ConnectionConfig::with_port(1)
        };
        DbConfig {
            primary: closed(),
            replicas: (0..replicas).map(|_| closed()).collect(),
            pool: PoolSettings {
                max_connections: 2,
                connection_timeout_seconds: 2,
            },
            ..DbConfig::default()
        }
    }

    #[test]
    fn pools_are_built_without_dialing() {
        let pool = RoutedPool::new(&unreachable_config(2)).unwrap();
        let status = pool.status();

        assert_eq!(status.len(), 3);
        assert_eq!(status[0].0, Endpoint::Write);
        assert_eq!(status[2].0, Endpoint::Read(1));
        for (_, s) in status {
            assert_eq!(s.max_size, 2);
            assert_eq!(s.size, 0);
        }
    }

    #[tokio::test]
    async fn unreachable_read_endpoint_is_surfaced() {
        let pool =
            RoutedPool::with_policy(&unreachable_config(2), RandomPolicy::seeded(7)).unwrap();

        let err = pool
            .checkout_timeout(Operation::Select, Some(Duration::from_secs(2)))
            .await
            .err()
            .unwrap();

        match err {
            DbError::EndpointUnreachable { endpoint, address, .. } => {
                assert!(matches!(endpoint, Endpoint::Read(_)));
                assert_eq!(address, "127.0.0.1:1/postgres");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn writes_and_replica_less_reads_target_primary() {
        let pool = RoutedPool::new(&unreachable_config(0)).unwrap();

        for op in [Operation::Insert, Operation::Count] {
            let err = pool.checkout(op).await.err().unwrap();
            assert!(matches!(
                err,
                DbError::EndpointUnreachable {
                    endpoint: Endpoint::Write,
                    ..
                }
            ));
        }
    }

    #[test]
    fn caller_timeout_reaches_every_pool_stage() {
        let limit = Duration::from_millis(1_250);
        let timeouts = checkout_timeouts(Some(limit)).unwrap();

        assert_eq!(timeouts.wait, Some(limit));
        assert_eq!(timeouts.create, Some(limit));
        assert_eq!(timeouts.recycle, Some(limit));
    }

    #[test]
    fn no_caller_timeout_defers_to_pool() {
        assert!(checkout_timeouts(None).is_none());
    }

    #[test]
    fn unknown_replica_index_is_an_error() {
        let pool = RoutedPool::new(&unreachable_config(2)).unwrap();

        assert!(pool.endpoint_pool(Endpoint::Write).is_ok());
        assert!(pool.endpoint_pool(Endpoint::Read(1)).is_ok());
        assert!(matches!(
            pool.endpoint_pool(Endpoint::Read(2)),
            Err(DbError::UnknownEndpoint {
                endpoint: Endpoint::Read(2),
                replicas: 2
            })
        ));
    }

    #[tokio::test]
    async fn misbehaving_policy_does_not_panic() {
        let pool = RoutedPool::with_policy(&unreachable_config(2), OutOfRange).unwrap();

        let err = pool.checkout(Operation::Select).await.err().unwrap();
        assert!(matches!(err, DbError::UnknownEndpoint { .. }));
    }
}
