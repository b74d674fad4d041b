//! GeeksforGeeks スクレイプの型定義
//!
//! JSONのフィールド名は既存サービスのレスポンス形式に合わせる
//! （camelCase、難易度キーは先頭大文字）。

use serde::{Deserialize, Serialize};

/// スクレイプ操作の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeKind {
    /// プロフィール概要
    Profile,
    /// 難易度別の解答数
    Stats,
    /// 難易度別の解答済み問題リスト
    Problems,
}

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub username: String,
    pub kind: ScrapeKind,
}

impl ScrapeRequest {
    pub fn new(username: impl Into<String>, kind: ScrapeKind) -> Self {
        Self {
            username: username.into(),
            kind,
        }
    }
}

/// 難易度カテゴリ。問題リスト操作はこの順で巡回する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    School,
    Basic,
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::School,
        Difficulty::Basic,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
    ];

    /// JSONキー用の表記
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::School => "School",
            Difficulty::Basic => "Basic",
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// ページ上のタブ表記（大文字）
    pub fn tab_label(&self) -> &'static str {
        match self {
            Difficulty::School => "SCHOOL",
            Difficulty::Basic => "BASIC",
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

/// プロフィール概要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_name: String,
    pub full_name: String,
    pub designation: String,
    pub coding_score: i64,
    pub problems_solved: i64,
    pub institute_rank: i64,
    pub articles_published: i64,
    pub potd_streak: i64,
    pub longest_streak: i64,
    pub potds_solved: i64,
}

/// 難易度別カウント。統計と問題リストの両方で同じ形を使う
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyCounts {
    #[serde(rename = "School")]
    pub school: i64,
    #[serde(rename = "Basic")]
    pub basic: i64,
    #[serde(rename = "Easy")]
    pub easy: i64,
    #[serde(rename = "Medium")]
    pub medium: i64,
    #[serde(rename = "Hard")]
    pub hard: i64,
}

impl DifficultyCounts {
    pub fn get(&self, difficulty: Difficulty) -> i64 {
        match difficulty {
            Difficulty::School => self.school,
            Difficulty::Basic => self.basic,
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn set(&mut self, difficulty: Difficulty, count: i64) {
        match difficulty {
            Difficulty::School => self.school = count,
            Difficulty::Basic => self.basic = count,
            Difficulty::Easy => self.easy = count,
            Difficulty::Medium => self.medium = count,
            Difficulty::Hard => self.hard = count,
        }
    }

    pub fn total(&self) -> i64 {
        self.school + self.basic + self.easy + self.medium + self.hard
    }
}

/// 難易度別の解答数（フラット形式が正準形）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub user_name: String,
    pub total_problems_solved: i64,
    #[serde(flatten)]
    pub counts: DifficultyCounts,
}

/// 解答済み問題1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub question: String,
    pub question_url: String,
}

/// 難易度別の問題リスト本体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemBuckets {
    #[serde(rename = "School")]
    pub school: Vec<Problem>,
    #[serde(rename = "Basic")]
    pub basic: Vec<Problem>,
    #[serde(rename = "Easy")]
    pub easy: Vec<Problem>,
    #[serde(rename = "Medium")]
    pub medium: Vec<Problem>,
    #[serde(rename = "Hard")]
    pub hard: Vec<Problem>,
}

impl ProblemBuckets {
    pub fn get(&self, difficulty: Difficulty) -> &[Problem] {
        match difficulty {
            Difficulty::School => &self.school,
            Difficulty::Basic => &self.basic,
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn set(&mut self, difficulty: Difficulty, problems: Vec<Problem>) {
        match difficulty {
            Difficulty::School => self.school = problems,
            Difficulty::Basic => self.basic = problems,
            Difficulty::Easy => self.easy = problems,
            Difficulty::Medium => self.medium = problems,
            Difficulty::Hard => self.hard = problems,
        }
    }
}

/// カテゴリ分けされた解答済み問題リスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemList {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "problemsByDifficulty")]
    pub problems_by_difficulty: DifficultyCounts,
    #[serde(rename = "Problems")]
    pub problems: ProblemBuckets,
}

/// 操作種別ごとのペイロード
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScrapePayload {
    Profile(UserProfile),
    Stats(DifficultyStats),
    Problems(ProblemList),
}
