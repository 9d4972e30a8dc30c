//! Impls - ports の開発用・テスト用実装
//!
//! # 含まれる実装
//! - **InMemoryQueueGateway**: peek-lock 方式のキュー
//! - **InMemoryAccountStore**: version 付きの口座ストア
//!
//! 本番用のアダプタ（Service Bus, PostgreSQL など）は別クレートに置く想定です。

pub mod inmem_gateway;
pub mod inmem_store;

pub use self::inmem_gateway::{DeadLetter, InMemoryQueueGateway, QueueCounts};
pub use self::inmem_store::InMemoryAccountStore;
