//! tally-core
//!
//! Applies credit/debit events from an at-least-once queue to account balances.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, operation, account, disposition, errors）
//! - **ports**: 抽象化レイヤー（QueueGateway, AccountStore, Clock, IdGenerator）
//! - **app**: 処理パイプライン（decoder, retry, ledger, worker_loop, worker_group, builder）
//! - **impls**: InMemory 実装（開発・テスト用）
//! - **settings**: `TALLY_*` 環境変数からの設定読み込み

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod settings;
