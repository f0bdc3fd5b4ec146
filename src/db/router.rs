use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 작업 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
}

/// 라우팅 대상 작업
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Schema,
    Select,
    Count,
}

impl Operation {
    /// 읽기/쓰기 분류
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert | Operation::Update | Operation::Delete | Operation::Schema => {
                OperationKind::Write
            }
            Operation::Select | Operation::Count => OperationKind::Read,
        }
    }
}

/// 엔드포인트 구분 (쓰기 1개, 읽기 N개)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Write,
    Read(usize),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Write => write!(f, "write"),
            Endpoint::Read(index) => write!(f, "read[{}]", index),
        }
    }
}

/// 읽기 엔드포인트 선택 정책
///
/// `select` 는 항상 `replicas > 0` 으로 호출되며 `0..replicas` 범위를 반환해야 한다.
pub trait ReadPolicy: Send + Sync {
    fn select(&self, replicas: usize) -> usize;
}

/// 균등 무작위 선택 (세션 고정 없음, 상태 가중치 없음)
#[derive(Debug, Default)]
pub struct RandomPolicy {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomPolicy {
    /// 스레드 로컬 난수를 사용하는 정책
    pub fn new() -> Self {
        Self { seeded: None }
    }

    /// 고정 시드 정책 (재현 가능한 선택)
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl ReadPolicy for RandomPolicy {
    fn select(&self, replicas: usize) -> usize {
        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                rng.gen_range(0..replicas)
            }
            None => rand::thread_rng().gen_range(0..replicas),
        }
    }
}

/// 순차 선택
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    next: AtomicUsize,
}

impl ReadPolicy for RoundRobinPolicy {
    fn select(&self, replicas: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % replicas
    }
}

/// 쓰기/읽기 라우터
///
/// 엔드포인트 구성은 생성 시 고정된다. 선택된 엔드포인트에 연결할 수 없어도
/// 다른 엔드포인트로 대체하지 않는다.
pub struct ReplicaRouter {
    replicas: usize,
    policy: Box<dyn ReadPolicy>,
}

impl ReplicaRouter {
    /// 무작위 정책 라우터 생성
    pub fn new(replicas: usize) -> Self {
        Self::with_policy(replicas, RandomPolicy::new())
    }

    /// 정책 지정 라우터 생성
    pub fn with_policy(replicas: usize, policy: impl ReadPolicy + 'static) -> Self {
        Self {
            replicas,
            policy: Box::new(policy),
        }
    }

    /// 읽기 엔드포인트 수
    pub fn replica_count(&self) -> usize {
        self.replicas
    }

    /// 작업을 엔드포인트로 라우팅
    pub fn route(&self, op: Operation) -> Endpoint {
        let endpoint = match op.kind() {
            OperationKind::Write => Endpoint::Write,
            // 읽기 엔드포인트가 없으면 쓰기 엔드포인트로 처리
            OperationKind::Read if self.replicas == 0 => Endpoint::Write,
            OperationKind::Read => Endpoint::Read(self.policy.select(self.replicas)),
        };
        trace!("{:?} -> {}", op, endpoint);
        endpoint
    }
}

impl fmt::Debug for ReplicaRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaRouter")
            .field("replicas", &self.replicas)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const READS: [Operation; 2] = [Operation::Select, Operation::Count];
    const WRITES: [Operation; 4] = [
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::Schema,
    ];

    #[test]
    fn classification() {
        for op in READS {
            assert_eq!(op.kind(), OperationKind::Read);
        }
        for op in WRITES {
            assert_eq!(op.kind(), OperationKind::Write);
        }
    }

    #[test]
    fn writes_always_go_to_write_endpoint() {
        let router = ReplicaRouter::new(2);
        for _ in 0..100 {
            for op in WRITES {
                assert_eq!(router.route(op), Endpoint::Write);
            }
        }
    }

    #[test]
    fn reads_split_evenly_across_two_replicas() {
        let router = ReplicaRouter::with_policy(2, RandomPolicy::seeded(0xdecafbad));
        let mut counts = [0usize; 2];

        for _ in 0..10_000 {
            match router.route(Operation::Select) {
                Endpoint::Read(index) => counts[index] += 1,
                Endpoint::Write => panic!("read routed to write endpoint"),
            }
        }

        for count in counts {
            assert!((4_500..=5_500).contains(&count), "unbalanced split: {:?}", counts);
        }
    }

    #[test]
    fn reads_fall_back_to_write_without_replicas() {
        let router = ReplicaRouter::new(0);
        for _ in 0..1_000 {
            for op in READS {
                assert_eq!(router.route(op), Endpoint::Write);
            }
        }
    }

    #[test]
    fn unseeded_policy_stays_in_range() {
        let router = ReplicaRouter::new(3);
        for _ in 0..1_000 {
            match router.route(Operation::Count) {
                Endpoint::Read(index) => assert!(index < 3),
                Endpoint::Write => panic!("read routed to write endpoint"),
            }
        }
    }

    #[test]
    fn round_robin_cycles() {
        let router = ReplicaRouter::with_policy(3, RoundRobinPolicy::default());
        let picked: Vec<Endpoint> = (0..6).map(|_| router.route(Operation::Select)).collect();
        assert_eq!(
            picked,
            vec![
                Endpoint::Read(0),
                Endpoint::Read(1),
                Endpoint::Read(2),
                Endpoint::Read(0),
                Endpoint::Read(1),
                Endpoint::Read(2),
            ]
        );
    }

    #[test]
    fn concurrent_write_never_mixes_with_reads() {
        let router = Arc::new(ReplicaRouter::with_policy(2, RandomPolicy::seeded(0xabba_cafe)));

        std::thread::scope(|scope| {
            let writer = Arc::clone(&router);
            scope.spawn(move || {
                assert_eq!(writer.route(Operation::Insert), Endpoint::Write);
            });

            for _ in 0..100 {
                let reader = Arc::clone(&router);
                scope.spawn(move || {
                    assert!(matches!(reader.route(Operation::Select), Endpoint::Read(_)));
                });
            }
        });
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::Write.to_string(), "write");
        assert_eq!(Endpoint::Read(1).to_string(), "read[1]");
    }
}
