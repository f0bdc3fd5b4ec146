use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use uuid::Uuid;

use super::pool::RoutedPool;
use super::router::Operation;
use crate::constants::users;
use crate::error::DbError;
use crate::id::IdGenerator;

/// 삽입 전 사용자 (식별자 미할당)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
}

impl NewUser {
    pub fn new(first_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
        }
    }
}

/// 저장된 사용자
///
/// 식별자는 생성 시 한 번만 할당되며 이후 변경할 수 없다.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    id: Uuid,
    pub first_name: String,
}

impl User {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
        })
    }
}

/// SQL 식별자 검증 ([A-Za-z_][A-Za-z0-9_]*)
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn checked_partition(name: &str) -> Result<&str, DbError> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// tbl_users 저장소
pub struct UserStore {
    pool: Arc<RoutedPool>,
    generator: IdGenerator,
    timeout: Option<Duration>,
}

impl UserStore {
    /// 새 UserStore 인스턴스 생성
    pub fn new(pool: Arc<RoutedPool>) -> Self {
        Self {
            pool,
            generator: IdGenerator::new(),
            timeout: None,
        }
    }

    /// 작업당 연결 대기 제한 시간 지정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 사용자 일괄 생성
    ///
    /// 모든 식별자를 먼저 생성하고, 하나라도 실패하면 쿼리를 실행하지 않는다.
    pub async fn create(&self, new_users: &[NewUser]) -> Result<Vec<User>, DbError> {
        if new_users.is_empty() {
            return Ok(Vec::new());
        }

        let mut created = Vec::with_capacity(new_users.len());
        for new_user in new_users {
            created.push(User {
                id: self.generator.generate()?,
                first_name: new_user.first_name.clone(),
            });
        }

        let params: Vec<&(dyn ToSql + Sync)> = created
            .iter()
            .flat_map(|user| {
                [
                    &user.id as &(dyn ToSql + Sync),
                    &user.first_name as &(dyn ToSql + Sync),
                ]
            })
            .collect();
        let query = users::insert_many(created.len());

        let client = self.pool.checkout_timeout(Operation::Insert, self.timeout).await?;
        let inserted = client.execute(query.as_str(), &params).await?;
        info!("{} 명의 사용자 생성 ({} 엔드포인트)", inserted, client.endpoint());

        Ok(created)
    }

    /// 파티션 행 수 조회
    pub async fn count_partition(&self, partition_name: &str) -> Result<i64, DbError> {
        let partition = checked_partition(partition_name)?;

        let client = self.pool.checkout_timeout(Operation::Count, self.timeout).await?;
        let row = client.query_one(users::count_partition(partition).as_str(), &[]).await?;
        let count: i64 = row.try_get(0)?;
        debug!("파티션 {} 행 수: {} ({} 엔드포인트)", partition, count, client.endpoint());

        Ok(count)
    }

    /// 파티션 행 조회
    pub async fn list_partition(&self, partition_name: &str) -> Result<Vec<User>, DbError> {
        let partition = checked_partition(partition_name)?;

        let client = self.pool.checkout_timeout(Operation::Select, self.timeout).await?;
        let rows = client.query(users::select_partition(partition).as_str(), &[]).await?;

        rows.iter().map(User::from_row).collect()
    }

    /// 가장 먼저 생성된 사용자 조회
    pub async fn first(&self) -> Result<Option<User>, DbError> {
        let client = self.pool.checkout_timeout(Operation::Select, self.timeout).await?;
        let row = client.query_opt(users::SELECT_FIRST, &[]).await?;

        row.as_ref().map(User::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::config::{ConnectionConfig, DbConfig};
    use crate::db::router::Endpoint;

    fn unreachable_store() -> UserStore {
        let closed = ConnectionConfig {
            host: "127.0.0.1".to_string(),
            ..ConnectionConfig::with_port(1)
        };
        let config = DbConfig {
            primary: closed.clone(),
            replicas: vec![closed.clone(), closed],
            ..DbConfig::default()
        };
        let pool = RoutedPool::new(&config).unwrap();
        UserStore::new(Arc::new(pool)).with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn identifier_validation() {
        for ok in ["tbl_users_p0", "_p", "A1"] {
            assert!(is_valid_identifier(ok), "{}", ok);
        }
        for bad in ["", "1abc", "tbl users", "p0; DROP TABLE tbl_users", "p-1", "tbl_users_p0\""] {
            assert!(!is_valid_identifier(bad), "{}", bad);
        }
    }

    #[tokio::test]
    async fn empty_create_touches_nothing() {
        let store = unreachable_store();
        assert!(store.create(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_goes_to_write_endpoint() {
        let store = unreachable_store();
        let err = store.create(&[NewUser::new("John")]).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::EndpointUnreachable {
                endpoint: Endpoint::Write,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn partition_reads_go_to_read_endpoints() {
        let store = unreachable_store();

        let err = store.count_partition("tbl_users_p0").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::EndpointUnreachable {
                endpoint: Endpoint::Read(_),
                ..
            }
        ));

        let err = store.first().await.unwrap_err();
        assert!(matches!(
            err,
            DbError::EndpointUnreachable {
                endpoint: Endpoint::Read(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bad_partition_name_is_rejected_before_dialing() {
        let store = unreachable_store();
        let err = store.list_partition("p0; DROP TABLE tbl_users").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }
}
