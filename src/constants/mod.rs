// SQL 쿼리 모듈 (테이블별 SQL 쿼리 관리)
pub mod users;

// 작업당 연결 대기 제한 시간
pub const CHECKOUT_TIMEOUT_SECS: u64 = 10;

// 데모 삽입 데이터
pub const SAMPLE_FIRST_NAMES: [&str; 5] = ["John", "Jane", "Bob", "Alice", "Charlie"];

// 출력 시각 형식
pub const CREATED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
