//! GeeksforGeeks プロフィールページのスクレイプ操作
//!
//! 3種の操作（プロフィール概要・難易度別統計・問題リスト）はいずれも
//! ナビゲーション→存在確認→防御的抽出→組み立ての逐次パイプライン。
//! フィールド抽出は要素の欠落・数値の不正を既定値に落とし、決して
//! エラーにしない。リトライは接続喪失の場合だけ `RetryState` が行う。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::{classify_cdp, ScraperError};
use crate::retry::{self, AttemptLifecycle, RetryState};
use crate::session::Session;
use crate::supervisor::BrowserSupervisor;

use super::types::{
    Difficulty, DifficultyCounts, DifficultyStats, Problem, ProblemBuckets, ProblemList,
    ScrapeKind, ScrapePayload, ScrapeRequest, UserProfile,
};

const GFG_BASE_URL: &str = "https://www.geeksforgeeks.org/profile";

// ページレイアウト依存のセレクタ。レイアウト変更で壊れるのはここだけ
const SEL_PROFILE_NAME: &str = ".NewProfile_name__N_Nlw";
const SEL_PROFILE_DESIGNATION: &str = ".NewProfile_designation__fujtZ";
const SEL_SCORE_CARD: &str = ".ScoreContainer_score-card__zI4vG";
const SEL_SCORE_LABEL: &str = ".ScoreContainer_label__aVpLE";
const SEL_SCORE_VALUE: &str = ".ScoreContainer_value__7yy7h";
const SEL_POTD_ITEM: &str = ".PotdContainer_statItem__YU3BX";
const SEL_POTD_LABEL: &str = ".PotdContainer_statLabel__tc6R1";
const SEL_POTD_VALUE: &str = ".PotdContainer_statValue__nt1dr";
const SEL_PROBLEM_NAVBAR: &str = ".ProblemNavbar_head__6ptDV";
const SEL_PROBLEM_TAB: &str = ".ProblemNavbar_head_nav__OqbEt";
const SEL_PROBLEM_LIST: &str = "ul.SolvedProblemsContainer_problemList__8Ua09";

/// ネットワークアイドル待機の上限（超過しても続行する）
const NETWORK_IDLE_MAX_WAIT_MS: u64 = 10_000;
const NETWORK_IDLE_CHECK_INTERVAL_MS: u64 = 500;
const ELEMENT_POLL_INTERVAL_MS: u64 = 500;

/// GeeksforGeeks スクレイパー
///
/// Supervisorから共有接続を借り、リクエストごとに分離セッションを
/// 開いて操作を実行する。
pub struct GfgScraper {
    supervisor: Arc<BrowserSupervisor>,
    config: ScraperConfig,
}

impl GfgScraper {
    pub fn new(supervisor: Arc<BrowserSupervisor>, config: ScraperConfig) -> Self {
        Self { supervisor, config }
    }

    pub fn supervisor(&self) -> &Arc<BrowserSupervisor> {
        &self.supervisor
    }

    /// リクエストを有界リトライ付きで実行する
    ///
    /// 各試行: 接続取得→セッション開設→操作実行→セッション解放。
    /// 接続喪失と分類された失敗だけが、接続の無効化と固定遅延を挟んで
    /// 再試行される。それ以外は初回で表面化する
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapePayload, ScraperError> {
        let retry = RetryState::new(self.config.max_retries, self.config.retry_delay);
        let attempt = ScrapeAttempt {
            scraper: self,
            request,
        };
        retry::drive(&attempt, retry).await
    }

    /// プロフィール概要を取得
    pub async fn fetch_user_profile(
        &self,
        page: &Page,
        username: &str,
    ) -> Result<UserProfile, ScraperError> {
        let url = format!("{}/{}", GFG_BASE_URL, username);
        self.navigate(page, &url, self.config.timeout_short).await?;
        self.wait_network_idle(page).await;
        self.ensure_not_auth_redirect(page, username).await?;

        let script = format!(
            r#"
            (() => {{
                const text = (sel) => {{
                    const el = document.querySelector(sel);
                    return el && el.textContent ? el.textContent.trim() : "";
                }};
                const pair = (item, labelSel, valueSel) => {{
                    const label = item.querySelector(labelSel);
                    const value = item.querySelector(valueSel);
                    return {{
                        label: label && label.textContent ? label.textContent.trim() : "",
                        value: value && value.textContent ? value.textContent.trim() : ""
                    }};
                }};
                const cards = Array.from(document.querySelectorAll('{score_card}'))
                    .map((c) => pair(c, '{score_label}', '{score_value}'));
                const potd = Array.from(document.querySelectorAll('{potd_item}'))
                    .map((i) => pair(i, '{potd_label}', '{potd_value}'));
                return JSON.stringify({{
                    fullName: text('{name}'),
                    designation: text('{designation}'),
                    cards: cards,
                    potd: potd
                }});
            }})()
            "#,
            score_card = SEL_SCORE_CARD,
            score_label = SEL_SCORE_LABEL,
            score_value = SEL_SCORE_VALUE,
            potd_item = SEL_POTD_ITEM,
            potd_label = SEL_POTD_LABEL,
            potd_value = SEL_POTD_VALUE,
            name = SEL_PROFILE_NAME,
            designation = SEL_PROFILE_DESIGNATION,
        );

        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;
        let json_str = result.into_value::<String>().unwrap_or_default();

        #[derive(Deserialize, Default)]
        struct LabeledValue {
            #[serde(default)]
            label: String,
            #[serde(default)]
            value: String,
        }

        #[derive(Deserialize, Default)]
        struct ProfileRaw {
            #[serde(rename = "fullName", default)]
            full_name: String,
            #[serde(default)]
            designation: String,
            #[serde(default)]
            cards: Vec<LabeledValue>,
            #[serde(default)]
            potd: Vec<LabeledValue>,
        }

        let raw: ProfileRaw = serde_json::from_str(&json_str).unwrap_or_else(|e| {
            warn!("Failed to parse profile extraction result: {}", e);
            ProfileRaw::default()
        });

        let mut profile = UserProfile {
            user_name: username.to_string(),
            ..Default::default()
        };
        profile.full_name = if raw.full_name.is_empty() {
            username.to_string()
        } else {
            raw.full_name
        };
        profile.designation = raw.designation;

        for card in &raw.cards {
            apply_score_card(&mut profile, &card.label, &card.value);
        }
        for item in &raw.potd {
            apply_potd_stat(&mut profile, &item.label, &item.value);
        }

        info!(
            "Profile extracted for {} (codingScore={}, problemsSolved={})",
            username, profile.coding_score, profile.problems_solved
        );
        Ok(profile)
    }

    /// 難易度別の解答数を取得
    pub async fn fetch_difficulty_stats(
        &self,
        page: &Page,
        username: &str,
    ) -> Result<DifficultyStats, ScraperError> {
        let url = format!("{}/{}?tab=activity", GFG_BASE_URL, username);
        self.navigate(page, &url, self.config.timeout_short).await?;
        self.wait_network_idle(page).await;
        self.ensure_not_auth_redirect(page, username).await?;

        let navbar_text = match self.read_navbar_text(page).await? {
            Some(text) => text,
            None => {
                return Err(ScraperError::NotFound(format!(
                    "{} の解答統計が見つかりません",
                    username
                )))
            }
        };

        let numbers = parse_parenthesized_counts(&navbar_text);
        if numbers.len() < Difficulty::ALL.len() {
            warn!(
                "Stats navbar yielded {} of 5 counts for {}, remaining default to 0",
                numbers.len(),
                username
            );
        }

        let mut counts = DifficultyCounts::default();
        for (difficulty, count) in Difficulty::ALL.iter().zip(numbers.iter()) {
            counts.set(*difficulty, *count);
        }

        Ok(DifficultyStats {
            user_name: username.to_string(),
            total_problems_solved: counts.total(),
            counts,
        })
    }

    /// 難易度別の解答済み問題リストを取得
    ///
    /// カテゴリごとにタブの宣言数を読み、0件ならタブを開かずに空リスト、
    /// 1件以上ならタブを開いてリストの出現を待つ。出現待ちのタイムアウトは
    /// そのカテゴリだけを空リストに落とし、リクエスト全体は成功のまま進める
    pub async fn fetch_problem_list(
        &self,
        page: &Page,
        username: &str,
    ) -> Result<ProblemList, ScraperError> {
        let url = format!("{}/{}?tab=activity", GFG_BASE_URL, username);
        self.navigate(page, &url, self.config.timeout_std).await?;
        self.wait_network_idle(page).await;
        self.ensure_not_auth_redirect(page, username).await?;

        if self.read_navbar_text(page).await?.is_none() {
            return Err(ScraperError::NotFound(format!(
                "{} のアクティビティタブが見つかりません",
                username
            )));
        }

        let mut counts = DifficultyCounts::default();
        let mut buckets = ProblemBuckets::default();

        for difficulty in Difficulty::ALL {
            let tab_text = self.read_tab_text(page, difficulty).await?;
            let count = parse_parenthesized_counts(&tab_text)
                .first()
                .copied()
                .unwrap_or(0);
            counts.set(difficulty, count);

            if count == 0 {
                debug!(
                    "{}: no problems declared, skipping tab activation",
                    difficulty.tab_label()
                );
                continue;
            }

            self.activate_tab(page, difficulty).await?;

            if !self.wait_for_problem_list(page).await? {
                warn!(
                    "Problem list for {} did not materialize within {:?}, degrading to empty",
                    difficulty.tab_label(),
                    self.config.timeout_short
                );
                continue;
            }

            let problems = self.extract_problem_links(page).await?;
            debug!(
                "Extracted {} problems for {}",
                problems.len(),
                difficulty.tab_label()
            );
            buckets.set(difficulty, problems);
        }

        info!(
            "Problem list extracted for {} ({} problems declared)",
            username,
            counts.total()
        );
        Ok(ProblemList {
            user_name: username.to_string(),
            problems_by_difficulty: counts,
            problems: buckets,
        })
    }

    /// ナビゲーションを時間制限付きで実行する
    async fn navigate(
        &self,
        page: &Page,
        url: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        let nav = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, nav).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(classify_cdp(e, ScraperError::Navigation)),
            Err(_) => Err(ScraperError::Timeout(format!(
                "{} へのナビゲーションが {:?} 以内に完了しませんでした",
                url, timeout
            ))),
        }
    }

    /// ネットワークが静穏になるまで待機する。上限超過でも続行する
    async fn wait_network_idle(&self, page: &Page) {
        let start = Instant::now();
        let timeout = Duration::from_millis(NETWORK_IDLE_MAX_WAIT_MS);
        let mut idle_checks = 0u32;
        const REQUIRED_IDLE_CHECKS: u32 = 2;

        while start.elapsed() < timeout {
            let result = page
                .evaluate(
                    r#"
                    (() => {
                        const entries = performance.getEntriesByType('resource');
                        const now = performance.now();
                        const inflight = entries.filter((e) => {
                            return (now - e.startTime) < 500 && e.duration === 0;
                        });
                        return inflight.length === 0;
                    })()
                    "#,
                )
                .await;

            match result {
                Ok(val) => {
                    if val.into_value::<bool>().unwrap_or(false) {
                        idle_checks += 1;
                        if idle_checks >= REQUIRED_IDLE_CHECKS {
                            debug!("Network idle after {:?}", start.elapsed());
                            return;
                        }
                    } else {
                        idle_checks = 0;
                    }
                }
                Err(e) => {
                    debug!("Network idle check error: {}", e);
                    idle_checks = 0;
                }
            }

            sleep(Duration::from_millis(NETWORK_IDLE_CHECK_INTERVAL_MS)).await;
        }

        debug!(
            "Network idle wait timed out after {:?}, proceeding",
            start.elapsed()
        );
    }

    /// 認証ページへのリダイレクトはユーザー不在のデータ条件であり、
    /// リトライしても無駄なので即NotFoundにする
    async fn ensure_not_auth_redirect(
        &self,
        page: &Page,
        username: &str,
    ) -> Result<(), ScraperError> {
        let url = page
            .url()
            .await
            .map_err(|e| classify_cdp(e, ScraperError::Navigation))?
            .unwrap_or_default();

        if url.contains("auth") {
            return Err(ScraperError::NotFound(format!(
                "ユーザー {} のプロフィールが存在しないか非公開です",
                username
            )));
        }
        Ok(())
    }

    async fn read_navbar_text(&self, page: &Page) -> Result<Option<String>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector('{}');
                return el && el.textContent ? el.textContent : null;
            }})()
            "#,
            SEL_PROBLEM_NAVBAR
        );
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;
        Ok(result.into_value::<Option<String>>().unwrap_or(None))
    }

    async fn read_tab_text(
        &self,
        page: &Page,
        difficulty: Difficulty,
    ) -> Result<String, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const tabs = Array.from(document.querySelectorAll('{sel}'));
                const tab = tabs.find((t) => (t.innerText || '').includes('{label}'));
                return tab ? tab.innerText : "";
            }})()
            "#,
            sel = SEL_PROBLEM_TAB,
            label = difficulty.tab_label(),
        );
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    /// タブをクリックして動的ロードを起こす
    async fn activate_tab(&self, page: &Page, difficulty: Difficulty) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const tabs = Array.from(document.querySelectorAll('{sel}'));
                const tab = tabs.find((t) => (t.innerText || '').includes('{label}'));
                if (tab) {{
                    tab.click();
                    return true;
                }}
                return false;
            }})()
            "#,
            sel = SEL_PROBLEM_TAB,
            label = difficulty.tab_label(),
        );
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;

        if !result.into_value::<bool>().unwrap_or(false) {
            debug!("Tab {} not found for activation", difficulty.tab_label());
        }
        Ok(())
    }

    /// 問題リストの出現をポーリングで待つ。出現でtrue、制限超過でfalse
    async fn wait_for_problem_list(&self, page: &Page) -> Result<bool, ScraperError> {
        let start = Instant::now();
        let script = format!("document.querySelector('{}') !== null", SEL_PROBLEM_LIST);

        while start.elapsed() < self.config.timeout_short {
            let result = page
                .evaluate(script.as_str())
                .await
                .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;
            if result.into_value::<bool>().unwrap_or(false) {
                return Ok(true);
            }
            sleep(Duration::from_millis(ELEMENT_POLL_INTERVAL_MS)).await;
        }
        Ok(false)
    }

    /// リスト内の全リンクを1回のJS実行でまとめて抽出する
    async fn extract_problem_links(&self, page: &Page) -> Result<Vec<Problem>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const container = document.querySelector('{sel}');
                if (!container) return "[]";
                const links = Array.from(container.querySelectorAll('li a'));
                return JSON.stringify(links.map((a) => ({{
                    question: (a.innerText || '').trim(),
                    questionUrl: a.href
                }})));
            }})()
            "#,
            sel = SEL_PROBLEM_LIST,
        );
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::JavaScript))?;
        let json_str = result
            .into_value::<String>()
            .unwrap_or_else(|_| "[]".to_string());

        let problems: Vec<Problem> = serde_json::from_str(&json_str).unwrap_or_else(|e| {
            debug!("Failed to parse problem links: {}", e);
            Vec::new()
        });
        Ok(problems)
    }
}

/// 1リクエスト分の試行。リトライループからの各段階を
/// Supervisor・Session・操作本体へ引き渡す
struct ScrapeAttempt<'a> {
    scraper: &'a GfgScraper,
    request: &'a ScrapeRequest,
}

#[async_trait]
impl AttemptLifecycle for ScrapeAttempt<'_> {
    type Conn = Arc<Browser>;
    type Scope = Session;
    type Output = ScrapePayload;

    async fn acquire(&self) -> Result<Arc<Browser>, ScraperError> {
        self.scraper.supervisor.acquire().await
    }

    async fn open(&self, conn: &Arc<Browser>) -> Result<Session, ScraperError> {
        Session::open(conn).await
    }

    async fn run(&self, scope: &Session) -> Result<ScrapePayload, ScraperError> {
        let page = scope.page();
        let username = &self.request.username;
        match self.request.kind {
            ScrapeKind::Profile => self
                .scraper
                .fetch_user_profile(page, username)
                .await
                .map(ScrapePayload::Profile),
            ScrapeKind::Stats => self
                .scraper
                .fetch_difficulty_stats(page, username)
                .await
                .map(ScrapePayload::Stats),
            ScrapeKind::Problems => self
                .scraper
                .fetch_problem_list(page, username)
                .await
                .map(ScrapePayload::Problems),
        }
    }

    async fn close(&self, conn: &Arc<Browser>, scope: Session) {
        scope.close(conn).await;
    }

    async fn invalidate(&self) {
        self.scraper.supervisor.invalidate().await;
    }
}

/// スコアカード1枚をプロフィールに反映する。不正値はそのフィールドを
/// 既定値のまま残す
fn apply_score_card(profile: &mut UserProfile, label: &str, value: &str) {
    let num = match parse_leading_int(value) {
        Some(n) => n,
        None => return,
    };
    if label.contains("Coding Score") {
        profile.coding_score = num;
    } else if label.contains("Problems Solved") {
        profile.problems_solved = num;
    } else if label.contains("Institute Rank") {
        profile.institute_rank = num;
    } else if label.contains("Articles Published") {
        profile.articles_published = num;
    }
}

fn apply_potd_stat(profile: &mut UserProfile, label: &str, value: &str) {
    let num = match parse_leading_int(value) {
        Some(n) => n,
        None => return,
    };
    if label.contains("Longest Streak") {
        profile.longest_streak = num;
    } else if label.contains("POTDs Solved") {
        profile.potds_solved = num;
    }
}

/// 先頭の整数をベストエフォートで読む。"120 / 500" は 120。
/// 空文字・プレースホルダ "__"・非数値は None
fn parse_leading_int(text: &str) -> Option<i64> {
    let first = text.trim().split_whitespace().next()?;
    if first == "__" {
        return None;
    }
    first.parse::<i64>().ok()
}

static PAREN_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").expect("valid regex"));

/// "SCHOOL (5) BASIC (12) ..." のような文字列から括弧内の数値を順に取り出す
fn parse_parenthesized_counts(text: &str) -> Vec<i64> {
    PAREN_COUNT_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}
