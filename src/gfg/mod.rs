//! GeeksforGeeks スクレイパーモジュール
//!
//! プロフィール概要・難易度別統計・解答済み問題リストの3操作を提供する

mod scraper;
mod types;

pub use scraper::GfgScraper;
pub use types::{
    Difficulty, DifficultyCounts, DifficultyStats, Problem, ProblemBuckets, ProblemList,
    ScrapeKind, ScrapePayload, ScrapeRequest, UserProfile,
};
