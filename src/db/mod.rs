// 데이터베이스 관리 모듈
// 엔드포인트 설정, 읽기/쓰기 라우팅, 연결 풀, tbl_users 조회를 담당합니다.

pub mod config;
pub mod pool;
pub mod router;
pub mod users;

// 외부로 노출할 항목들
pub use pool::RoutedPool;
pub use users::{NewUser, User, UserStore};
