use std::sync::Arc;
use std::time::Duration;
#[cfg(debug_assertions)]
use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use pgsplit::config::Settings;
use pgsplit::constants::*;
use pgsplit::db::{NewUser, RoutedPool, UserStore};
use pgsplit::error::Result;
use pgsplit::id;

#[tokio::main]
async fn main() {
    // 로거 초기화
    setup_logger();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("pgsplit 시작 중...");

    // 설정 로드 (이후 변경 없음)
    let settings = Settings::load()?;
    settings.log_settings();

    let pool = Arc::new(RoutedPool::new(&settings.database)?);
    let store = UserStore::new(Arc::clone(&pool))
        .with_timeout(Duration::from_secs(CHECKOUT_TIMEOUT_SECS));

    insert_data(&store).await?;
    query_partitions(&store, &settings.database.partitions.names).await?;

    for (endpoint, status) in pool.status() {
        info!(
            "{} 풀 상태: 사용 가능 {}/{} (최대 {})",
            endpoint, status.available, status.size, status.max_size
        );
    }

    Ok(())
}

/// 로거 설정
fn setup_logger() {
    #[cfg(debug_assertions)]
    {
        Builder::new()
            .filter(None, LevelFilter::Trace)
            .filter_module("tokio_postgres", LevelFilter::Info)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}:{}] {}",
                    Local::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        Builder::new()
            .filter(None, LevelFilter::Info)
            .parse_default_env()
            .init();
    }
}

/// 샘플 사용자 삽입
async fn insert_data(store: &UserStore) -> Result<()> {
    let new_users: Vec<NewUser> = SAMPLE_FIRST_NAMES
        .iter()
        .map(|name| NewUser::new(*name))
        .collect();

    let created = store.create(&new_users).await?;
    for user in &created {
        info!("사용자 생성: {} ({})", user.first_name, user.id());
    }

    Ok(())
}

/// 파티션별 분포 출력 및 첫 사용자 생성 시각 복원
async fn query_partitions(store: &UserStore, partitions: &[String]) -> Result<()> {
    println!("\n=== Partition Distribution ===");

    for partition in partitions {
        let count = store.count_partition(partition).await?;
        println!("Partition {}: {} records", partition, count);

        for user in store.list_partition(partition).await? {
            println!("  - {} (ID: {})", user.first_name, user.id());
        }
    }

    match store.first().await? {
        Some(user) => {
            let created = id::extract_timestamp(&user.id())?.with_timezone(&Local);
            println!(
                "User: {} (ID: {}, CreatedDate: {})",
                user.first_name,
                user.id(),
                created.format(CREATED_DATE_FORMAT)
            );
        }
        None => info!("조회된 사용자가 없습니다"),
    }

    Ok(())
}
