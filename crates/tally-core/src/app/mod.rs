//! App - アプリケーション層
//!
//! ports を組み合わせて処理パイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **OperationDecoder**: payload → Operation
//! - **RetryPolicy**: 試行回数 → reschedule / abandon
//! - **AccountLedger**: 残高への credit / debit
//! - **ProcessingLoop**: poll → decode → apply → disposition
//! - **WorkerGroup**: 複数ループの起動と停止
//! - **WorkerBuilder**: 設定からのワイヤリング

pub mod builder;
pub mod decoder;
pub mod ledger;
pub mod retry;
pub mod status;
pub mod worker_group;
pub mod worker_loop;

pub use self::builder::{BuildError, WorkerBuilder};
pub use self::decoder::{DecodeError, OperationDecoder};
pub use self::ledger::AccountLedger;
pub use self::retry::{RetryDecision, RetryPolicy};
pub use self::status::{ProcessingStats, StatsSnapshot};
pub use self::worker_group::WorkerGroup;
pub use self::worker_loop::ProcessingLoop;
