use crate::domain::{Book, BookCopy, BookId, CopyId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 蔵書ストアポート
///
/// 書籍・複本の記録はカタログ管理の持ち物。貸出エンジンが書き換えるのは
/// 複本の貸出可否・状態と、除籍フラグだけ。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 書籍を取得する
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// 書籍を保存する（除籍フラグの更新に使う）
    async fn save_book(&self, book: Book) -> Result<()>;

    /// 複本を取得する
    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>>;

    /// 複本を保存する
    ///
    /// 貸出・返却時の`is_available`と、紛失・破損・除籍時の状態を反映する。
    async fn save_copy(&self, copy: BookCopy) -> Result<()>;

    /// 書籍の全複本を取得する
    async fn copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>>;
}
