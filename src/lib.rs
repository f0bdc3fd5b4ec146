//! UUIDv7 레코드 생성과 쓰기/읽기 엔드포인트 라우팅
//!
//! - [`id`]: 시간 순서 식별자 생성 및 타임스탬프 복원
//! - [`db::router`]: 작업 분류와 엔드포인트 선택
//! - [`db::pool`]: 엔드포인트별 연결 풀
//! - [`db::users`]: `tbl_users` 저장소

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod id;
