use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BookRetired, CopyId, StaffId};

/// 書籍（タイトル）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub is_retired: bool,
}

/// 複本の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyCondition {
    Good,
    Fair,
    Poor,
    /// 破損報告済み（職員の判断待ち）
    Damaged,
    /// 紛失報告済み
    Lost,
    /// 除籍済み
    Withdrawn,
}

impl CopyCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyCondition::Good => "good",
            CopyCondition::Fair => "fair",
            CopyCondition::Poor => "poor",
            CopyCondition::Damaged => "damaged",
            CopyCondition::Lost => "lost",
            CopyCondition::Withdrawn => "withdrawn",
        }
    }
}

impl std::str::FromStr for CopyCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(CopyCondition::Good),
            "fair" => Ok(CopyCondition::Fair),
            "poor" => Ok(CopyCondition::Poor),
            "damaged" => Ok(CopyCondition::Damaged),
            "lost" => Ok(CopyCondition::Lost),
            "withdrawn" => Ok(CopyCondition::Withdrawn),
            _ => Err(format!("Invalid copy condition: {}", s)),
        }
    }
}

/// 複本（物理的な1冊）
///
/// 貸出中は貸出台帳だけが`is_available`を書き換える。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCopy {
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub is_available: bool,
    pub condition: CopyCondition,
}

/// 除籍のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetireBookError {
    /// 既に除籍済み
    AlreadyRetired,
    /// 貸出中の複本がある
    CopiesOnLoan(Vec<CopyId>),
}

/// 純粋関数：書籍を除籍する
///
/// 外部キーのカスケード削除の代わりに、除籍の影響範囲を明示する。
/// 貸出中の複本が1冊でもあれば何も変更しない。
/// 予約の取り消しは呼び出し側が`reservation::cancel`で行う。
pub fn retire_book(
    book: &Book,
    copies: &[BookCopy],
    copies_on_loan: &[CopyId],
    retired_by: StaffId,
    retired_at: DateTime<Utc>,
) -> Result<(Book, Vec<BookCopy>, BookRetired), RetireBookError> {
    if book.is_retired {
        return Err(RetireBookError::AlreadyRetired);
    }

    if !copies_on_loan.is_empty() {
        return Err(RetireBookError::CopiesOnLoan(copies_on_loan.to_vec()));
    }

    let withdrawn: Vec<BookCopy> = copies
        .iter()
        .map(|copy| BookCopy {
            is_available: false,
            condition: CopyCondition::Withdrawn,
            ..copy.clone()
        })
        .collect();

    let retired_book = Book {
        is_retired: true,
        ..book.clone()
    };

    let event = BookRetired {
        book_id: book.book_id,
        withdrawn_copies: withdrawn.iter().map(|c| c.copy_id).collect(),
        retired_by,
        retired_at,
    };

    Ok((retired_book, withdrawn, event))
}
