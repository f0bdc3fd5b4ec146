/// tbl_users 테이블 관련 SQL 쿼리
///
/// 테이블 (id UUID PRIMARY KEY, first_name VARCHAR(255) NOT NULL) 과 id 기준 파티션은
/// 외부 마이그레이션으로 미리 생성되어 있어야 한다.

/// 테이블 이름
pub const TABLE_NAME: &str = "tbl_users";

/// 기본 파티션 목록
pub const DEFAULT_PARTITIONS: [&str; 4] = [
    "tbl_users_p0",
    "tbl_users_p1",
    "tbl_users_p2",
    "tbl_users_p3",
];

/// 가장 작은 id 의 사용자 조회 쿼리 (UUIDv7 이므로 가장 먼저 생성된 사용자)
pub const SELECT_FIRST: &str = "SELECT id, first_name FROM tbl_users ORDER BY id LIMIT 1";

/// 다중 행 삽입 쿼리
pub fn insert_many(rows: usize) -> String {
    let values: Vec<String> = (0..rows)
        .map(|i| format!("(${}, ${})", i * 2 + 1, i * 2 + 2))
        .collect();
    format!("INSERT INTO {} (id, first_name) VALUES {}", TABLE_NAME, values.join(", "))
}

/// 파티션 행 수 조회 쿼리
pub fn count_partition(partition_name: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", partition_name)
}

/// 파티션 행 조회 쿼리
pub fn select_partition(partition_name: &str) -> String {
    format!("SELECT id, first_name FROM {} ORDER BY id", partition_name)
}
