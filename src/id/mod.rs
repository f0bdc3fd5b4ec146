// 시간 순서 식별자 (UUID version 7) 생성 및 타임스탬프 복원
//
// 레이아웃 (128 bit, big-endian):
//   unix_ts_ms(48) | ver(4) = 0111 | rand_a(12) | var(2) = 10 | rand_b(62)

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use log::trace;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use uuid::Uuid;

/// 48비트로 표현 가능한 최대 밀리초 값
const MAX_TIMESTAMP_MS: u64 = (1 << 48) - 1;

const VERSION_TIME_ORDERED: u8 = 0x7;
const VARIANT_MASK: u8 = 0xc0;
const VARIANT_RFC4122: u8 = 0x80;

/// 식별자 생성/복원 오류
#[derive(Debug, Error)]
pub enum IdError {
    /// 시계 또는 난수 소스를 사용할 수 없음. 레코드 생성은 중단되어야 한다.
    #[error("식별자 소스를 사용할 수 없습니다: {0}")]
    SourceUnavailable(String),
    /// version/variant 비트가 맞지 않거나 형식이 잘못된 입력
    #[error("잘못된 식별자 형식: {0}")]
    InvalidFormat(String),
}

/// 밀리초 단위 Unix 시계
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Result<u64, IdError>;
}

/// 시스템 벽시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Result<u64, IdError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| IdError::SourceUnavailable(format!("시스템 시계가 Unix epoch 이전입니다: {}", e)))?;

        u64::try_from(elapsed.as_millis())
            .map_err(|_| IdError::SourceUnavailable("시스템 시계 값이 범위를 벗어났습니다".to_string()))
    }
}

/// 난수 소스
pub trait Entropy: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), IdError>;
}

/// 운영체제 난수 생성기
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), IdError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| IdError::SourceUnavailable(format!("OS 난수 생성기 오류: {}", e)))
    }
}

/// UUIDv7 생성기
///
/// 호출마다 상태를 공유하지 않으므로 여러 태스크에서 동시에 사용해도 된다.
#[derive(Debug, Clone)]
pub struct IdGenerator<C = SystemClock, E = OsEntropy> {
    clock: C,
    entropy: E,
}

impl IdGenerator {
    /// 시스템 시계와 OS 난수를 사용하는 생성기
    pub fn new() -> Self {
        Self {
            clock: SystemClock,
            entropy: OsEntropy,
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, E: Entropy> IdGenerator<C, E> {
    /// 시계와 난수 소스를 지정하여 생성
    pub fn with_sources(clock: C, entropy: E) -> Self {
        Self { clock, entropy }
    }

    /// 새 식별자 생성
    ///
    /// 실패하면 식별자를 전혀 반환하지 않는다.
    pub fn generate(&self) -> Result<Uuid, IdError> {
        let millis = self.clock.now_millis()?;
        if millis > MAX_TIMESTAMP_MS {
            return Err(IdError::SourceUnavailable(format!(
                "타임스탬프 {}ms 가 48비트 범위를 초과합니다",
                millis
            )));
        }

        let mut random = [0u8; 10];
        self.entropy.fill(&mut random)?;

        let id = encode(millis, &random);
        trace!("식별자 생성: {} ({}ms)", id, millis);
        Ok(id)
    }
}

/// 기본 생성기로 식별자 생성
pub fn generate() -> Result<Uuid, IdError> {
    IdGenerator::new().generate()
}

fn encode(millis: u64, random: &[u8; 10]) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&millis.to_be_bytes()[2..]);
    bytes[6] = (VERSION_TIME_ORDERED << 4) | (random[0] & 0x0f);
    bytes[7] = random[1];
    bytes[8] = VARIANT_RFC4122 | (random[2] & !VARIANT_MASK);
    bytes[9..].copy_from_slice(&random[3..]);
    Uuid::from_bytes(bytes)
}

/// 식별자에 포함된 생성 시각 복원
pub fn extract_timestamp(id: &Uuid) -> Result<DateTime<Utc>, IdError> {
    extract_timestamp_bytes(id.as_bytes())
}

/// 16바이트 바이너리 형식에서 생성 시각 복원
pub fn extract_timestamp_bytes(bytes: &[u8]) -> Result<DateTime<Utc>, IdError> {
    if bytes.len() != 16 {
        return Err(IdError::InvalidFormat(format!(
            "16바이트가 필요하지만 {}바이트가 주어졌습니다",
            bytes.len()
        )));
    }

    let version = bytes[6] >> 4;
    if version != VERSION_TIME_ORDERED {
        return Err(IdError::InvalidFormat(format!("version {} 은 시간 순서 식별자가 아닙니다", version)));
    }
    if bytes[8] & VARIANT_MASK != VARIANT_RFC4122 {
        return Err(IdError::InvalidFormat(format!("variant 비트 불일치: {:#04x}", bytes[8])));
    }

    let mut ts = [0u8; 8];
    ts[2..].copy_from_slice(&bytes[..6]);
    let millis = u64::from_be_bytes(ts) as i64;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| IdError::InvalidFormat(format!("표현할 수 없는 타임스탬프: {}ms", millis)))
}

/// 정규 텍스트 형식 (8-4-4-4-12) 파싱 후 version 7 여부 검증
pub fn parse(text: &str) -> Result<Uuid, IdError> {
    let id = Uuid::parse_str(text).map_err(|e| IdError::InvalidFormat(e.to_string()))?;
    extract_timestamp(&id)?;
    Ok(id)
}
