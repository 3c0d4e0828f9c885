use crate::domain::events::DomainEvent;
use async_trait::async_trait;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// イベントストアポート
///
/// 貸出・予約・除籍の監査証跡。イベントは追記専用ログに保存される不変の事実。
/// 現在の状態は各リポジトリの行が正であり、ここからは復元しない。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// イベントを追加する
    ///
    /// 集約ID・種別は各イベントから取り出す。順序は保持される。
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()>;

    /// 集約のすべてのイベントを追加された順に読み込む
    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<DomainEvent>>;
}
