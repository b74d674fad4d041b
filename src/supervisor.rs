//! 共有ブラウザ接続の監督
//!
//! プロセス全体で1本のブラウザ接続をSupervisorが独占所有し、
//! 生成・健全性確認・リサイクル・破棄をひとつのロックの下で行う。
//! 接続の利用自体（ページ生成・抽出）はロック外で並行に進む。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::CloseParams;
use chromiumoxide::handler::Handler;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BrowserEndpoint, ScraperConfig};
use crate::error::ScraperError;
use crate::traits::ConnectionStrategy;

/// CDPリクエストタイムアウト
const CDP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// 接続のメタ情報。交換判定はここだけを見る
#[derive(Debug)]
struct ConnectionMeta {
    created_at: Instant,
    requests_served: u64,
    invalidated: bool,
}

impl ConnectionMeta {
    fn new() -> Self {
        Self {
            created_at: Instant::now(),
            requests_served: 0,
            invalidated: false,
        }
    }

    fn due_for_replacement(&self, max_requests: u64) -> bool {
        self.invalidated || self.requests_served >= max_requests
    }
}

/// 生きている接続一式。ブラウザ本体とイベントハンドラタスク
struct ManagedConnection {
    browser: Arc<Browser>,
    handler_task: JoinHandle<()>,
    meta: ConnectionMeta,
}

struct SupervisorState {
    conn: Option<ManagedConnection>,
    shut_down: bool,
}

/// 共有ブラウザ接続のSupervisor
///
/// `acquire()` は必要に応じて接続を張り直してからハンドルを返す。
/// 交換判定と構築はMutexで直列化されるが、返されたハンドルの利用は
/// 直列化されない（1接続を複数セッションが並行利用する）。
pub struct BrowserSupervisor {
    strategy: Box<dyn ConnectionStrategy>,
    max_requests_per_browser: u64,
    state: Mutex<SupervisorState>,
}

impl BrowserSupervisor {
    pub fn new(strategy: Box<dyn ConnectionStrategy>, max_requests_per_browser: u64) -> Self {
        Self {
            strategy,
            max_requests_per_browser,
            state: Mutex::new(SupervisorState {
                conn: None,
                shut_down: false,
            }),
        }
    }

    /// 設定から接続戦略を選んでSupervisorを構築する
    pub fn from_config(config: &ScraperConfig) -> Self {
        let strategy: Box<dyn ConnectionStrategy> = match &config.endpoint {
            BrowserEndpoint::Launch { chrome_path } => Box::new(LaunchStrategy {
                chrome_path: chrome_path.clone(),
                headless: config.headless,
            }),
            BrowserEndpoint::Connect { ws_url } => Box::new(ConnectStrategy {
                ws_url: ws_url.clone(),
            }),
        };
        Self::new(strategy, config.max_requests_per_browser)
    }

    /// 生きた接続を返す。保持なし・無効化済み・閾値超過・
    /// 健全性確認失敗のいずれかで新規構築に置き換える。
    /// 構築失敗はハードエラーとして呼び出し元へ伝播する
    pub async fn acquire(&self) -> Result<Arc<Browser>, ScraperError> {
        let mut state = self.state.lock().await;

        if state.shut_down {
            return Err(ScraperError::BrowserInit(
                "Supervisorは既にシャットダウン済みです".to_string(),
            ));
        }

        if let Some(conn) = state.conn.as_ref() {
            let mut replace = conn.meta.due_for_replacement(self.max_requests_per_browser);
            if replace {
                info!(
                    "Recycling browser connection (requests_served={}, invalidated={}, age={:?})",
                    conn.meta.requests_served,
                    conn.meta.invalidated,
                    conn.meta.created_at.elapsed()
                );
            } else if !Self::health_check(&conn.browser).await {
                warn!("Browser connection failed health check, replacing");
                replace = true;
            }

            if replace {
                if let Some(old) = state.conn.take() {
                    Self::teardown(old).await;
                }
            }
        }

        if state.conn.is_none() {
            info!("Establishing browser connection via {}", self.strategy.name());
            let conn = self.establish().await?;
            state.conn = Some(conn);
        }

        let conn = state.conn.as_mut().ok_or_else(|| {
            ScraperError::BrowserInit("接続が確立できませんでした".to_string())
        })?;
        conn.meta.requests_served += 1;
        Ok(conn.browser.clone())
    }

    /// 軽量な健全性確認。開いているターゲットを列挙できるか。
    /// 失敗してもエラーにはせずfalseを返すだけ
    async fn health_check(browser: &Browser) -> bool {
        match browser.pages().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// 保持中の接続に次回 `acquire()` での強制交換マークを付ける。
    /// 接続喪失を分類したリトライ側から呼ばれる
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let Some(conn) = state.conn.as_mut() {
            warn!(
                "Invalidating browser connection (requests_served={})",
                conn.meta.requests_served
            );
            conn.meta.invalidated = true;
        }
    }

    /// 接続とエンジンハンドルを閉じる。`acquire()` と同じロックを取るため
    /// 競合するacquireと半閉じ状態で交錯することはない。冪等
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.shut_down = true;
        if let Some(conn) = state.conn.take() {
            info!(
                "Shutting down browser connection (requests_served={})",
                conn.meta.requests_served
            );
            Self::teardown(conn).await;
        }
    }

    async fn establish(&self) -> Result<ManagedConnection, ScraperError> {
        let (browser, mut handler) = self.strategy.establish().await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        info!("Browser connection established");
        Ok(ManagedConnection {
            browser: Arc::new(browser),
            handler_task,
            meta: ConnectionMeta::new(),
        })
    }

    /// 接続の後始末。クローズ時のエラーは握りつぶしてログに残すだけ
    async fn teardown(conn: ManagedConnection) {
        if let Err(e) = conn.browser.execute(CloseParams::default()).await {
            debug!("Browser close error (ignored): {}", e);
        }
        conn.handler_task.abort();
    }
}

/// ローカルでChromiumを起動する戦略
pub struct LaunchStrategy {
    pub chrome_path: Option<String>,
    pub headless: bool,
}

#[async_trait::async_trait]
impl ConnectionStrategy for LaunchStrategy {
    fn name(&self) -> &'static str {
        "local-launch"
    }

    async fn establish(&self) -> Result<(Browser, Handler), ScraperError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(CDP_REQUEST_TIMEOUT_SECS))
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(ScraperError::BrowserInit)?;

        Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))
    }
}

/// 既存のDevToolsエンドポイントへ接続する戦略
pub struct ConnectStrategy {
    pub ws_url: String,
}

#[async_trait::async_trait]
impl ConnectionStrategy for ConnectStrategy {
    fn name(&self) -> &'static str {
        "remote-connect"
    }

    async fn establish(&self) -> Result<(Browser, Handler), ScraperError> {
        Browser::connect(self.ws_url.clone())
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_connection_not_due() {
        let meta = ConnectionMeta::new();
        assert_eq!(meta.requests_served, 0);
        assert!(!meta.due_for_replacement(100));
    }

    #[test]
    fn test_due_after_threshold() {
        let mut meta = ConnectionMeta::new();
        meta.requests_served = 99;
        assert!(!meta.due_for_replacement(100));
        meta.requests_served = 100;
        assert!(meta.due_for_replacement(100));
        meta.requests_served = 150;
        assert!(meta.due_for_replacement(100));
    }

    #[test]
    fn test_due_after_invalidation() {
        let mut meta = ConnectionMeta::new();
        meta.invalidated = true;
        assert!(meta.due_for_replacement(100));
    }

    #[test]
    fn test_replacement_resets_counter() {
        let mut meta = ConnectionMeta::new();
        meta.requests_served = 100;
        assert!(meta.due_for_replacement(100));

        // 交換で新しいメタに差し替わり、カウンタは0に戻る
        let replacement = ConnectionMeta::new();
        assert_eq!(replacement.requests_served, 0);
        assert!(!replacement.due_for_replacement(100));
    }

    #[test]
    fn test_strategy_names() {
        let launch = LaunchStrategy {
            chrome_path: None,
            headless: true,
        };
        let connect = ConnectStrategy {
            ws_url: "ws://localhost:9222".to_string(),
        };
        assert_eq!(launch.name(), "local-launch");
        assert_eq!(connect.name(), "remote-connect");
    }
}
