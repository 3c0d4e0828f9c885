use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{BookId, CopyId, MemberId};

/// キーごとの非同期ロック表
///
/// 同じキーに対する操作を直列化する。エントリは使われなくなった時点で回収する。
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// キーのロックを取得する（他の保持者が解放するまで待つ）
    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.retain(|k, slot| *k == key || Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// 現在保持しているスロット数
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 貸出エンジンの単一書き込み者ロック
///
/// - 複本単位：貸出・延長・返却・紛失・破損・入金・延滞判定
/// - 書籍単位：予約の登録・割り当て・取消・失効、除籍
/// - 会員単位：新しい貸出を開くとき（貸出冊数の上限判定）
///
/// 複数が必要な操作は必ず複本→書籍→会員の順で取得する。
#[derive(Debug, Default)]
pub struct CirculationLocks {
    copies: KeyedLocks,
    books: KeyedLocks,
    members: KeyedLocks,
}

impl CirculationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_copy(&self, copy_id: CopyId) -> OwnedMutexGuard<()> {
        self.copies.lock(copy_id.value()).await
    }

    pub async fn lock_book(&self, book_id: BookId) -> OwnedMutexGuard<()> {
        self.books.lock(book_id.value()).await
    }

    pub async fn lock_member(&self, member_id: MemberId) -> OwnedMutexGuard<()> {
        self.members.lock(member_id.value()).await
    }
}
