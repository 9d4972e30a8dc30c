use std::sync::Arc;

use anyhow::Context;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_core::app::{ProcessingStats, WorkerBuilder, WorkerGroup};
use tally_core::domain::{Account, AccountId};
use tally_core::impls::{InMemoryAccountStore, InMemoryQueueGateway};
use tally_core::ports::SystemClock;
use tally_core::settings::WorkerConfig;

fn operation(kind: &str, account_id: AccountId, amount: i64) -> anyhow::Result<Vec<u8>> {
    let payload = serde_json::json!({
        "id": uuid::Uuid::new_v4(),
        "messageType": kind,
        "bankAccountId": account_id,
        "amount": amount,
    });
    serde_json::to_vec(&payload).context("encode sample operation")
}

/// 保留（Held）以外にもう配送するものがない
async fn settled(gateway: &InMemoryQueueGateway, stats: &ProcessingStats) -> bool {
    let counts = gateway.counts().await;
    counts.ready == 0
        && counts.scheduled == 0
        && counts.in_flight as u64 == stats.snapshot().held
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("load TALLY_* configuration")?;

    // RUST_LOG があればそちらを優先
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // (A) gateway と store を用意して口座を登録
    let gateway = Arc::new(InMemoryQueueGateway::new(Arc::new(SystemClock)));
    let store = Arc::new(InMemoryAccountStore::new());
    let alice = AccountId::random();
    let bob = AccountId::random();
    store.insert(Account::new(alice, 50));
    store.insert(Account::new(bob, 500));

    // (B) サンプル投入: 成功 2 件、残高不足、未知の種別、壊れた JSON
    let samples = [
        operation("Credit", alice, 100)?,
        operation("Debit", bob, 120)?,
        operation("Debit", alice, 1_000)?,
        operation("Transfer", bob, 10)?,
        b"{\"amount\": ".to_vec(),
    ];
    for payload in samples {
        let id = gateway.send(payload).await;
        info!(envelope_id = %id, "sample enqueued");
    }

    // (C) ワーカー起動
    let stats = Arc::new(ProcessingStats::new());
    let worker = WorkerBuilder::new(config.clone())
        .gateway(gateway.clone())
        .store(store.clone())
        .stats(stats.clone())
        .build()
        .context("build processing loop")?;

    let cancel = CancellationToken::new();
    let group = WorkerGroup::spawn(config.workers, Arc::new(worker), &cancel);
    info!(workers = group.len(), "worker group started");

    // (D) Ctrl-C かキューが落ち着くまで待つ
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            info!("interrupted");
        }
        _ = async {
            while !settled(&gateway, &stats).await {
                sleep(Duration::from_millis(50)).await;
            }
        } => info!("queue settled"),
    }
    group.shutdown_and_join().await;

    // (E) 結果の表示
    for account in store.accounts() {
        println!(
            "account {}: balance={} version={}",
            account.id, account.balance, account.version
        );
    }
    println!(
        "stats: {}",
        serde_json::to_string(&stats.snapshot()).context("encode stats")?
    );
    println!(
        "queue: {}",
        serde_json::to_string(&gateway.counts().await).context("encode queue counts")?
    );
    for dead in gateway.dead_letters().await {
        println!(
            "dead letter {}: reason={} at={}",
            dead.envelope.id(),
            dead.reason,
            dead.dead_lettered_at
        );
    }

    Ok(())
}
