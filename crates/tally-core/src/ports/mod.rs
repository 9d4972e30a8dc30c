//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。キューとストレージは外部コラボレータで、
//! コアはここにある trait だけを通して触ります。

pub mod account_store;
pub mod clock;
pub mod id_generator;
pub mod queue_gateway;

pub use self::account_store::{AccountStore, StoreError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_gateway::{GatewayError, QueueGateway};
