use uuid::Uuid;

/// 読み込めなかった行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub id: Uuid,
    pub reason: String,
}

/// バッチ向けの一括読み込みの結果
///
/// 1行の変換失敗で全体を失敗させず、読めた行と読めなかった行を分けて返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan<T> {
    pub rows: Vec<T>,
    pub malformed: Vec<MalformedRow>,
}

impl<T> Scan<T> {
    /// すべての行が読めた結果
    pub fn complete(rows: Vec<T>) -> Self {
        Self {
            rows,
            malformed: Vec::new(),
        }
    }
}

impl<T> Default for Scan<T> {
    fn default() -> Self {
        Self::complete(Vec::new())
    }
}
