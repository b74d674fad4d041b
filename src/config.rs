use std::time::Duration;

use crate::error::ScraperError;

/// 1ブラウザあたりの最大リクエスト数（超過で再生成）
const DEFAULT_MAX_REQUESTS_PER_BROWSER: u64 = 100;
/// 標準タイムアウト（タブ操作を伴う重いページ用）
const DEFAULT_TIMEOUT_STD_SECS: u64 = 45;
/// 短縮タイムアウト（軽いページ用）
const DEFAULT_TIMEOUT_SHORT_SECS: u64 = 30;
/// 接続喪失リトライの上限
const DEFAULT_MAX_RETRIES: u32 = 2;

/// ブラウザへの接続方法
#[derive(Debug, Clone)]
pub enum BrowserEndpoint {
    /// ローカルでChromiumを起動する
    Launch { chrome_path: Option<String> },
    /// 既存のDevToolsエンドポイントに接続する
    Connect { ws_url: String },
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub endpoint: BrowserEndpoint,
    pub headless: bool,
    pub max_requests_per_browser: u64,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout_std: Duration,
    pub timeout_short: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint: BrowserEndpoint::Launch { chrome_path: None },
            headless: true,
            max_requests_per_browser: DEFAULT_MAX_REQUESTS_PER_BROWSER,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(1),
            timeout_std: Duration::from_secs(DEFAULT_TIMEOUT_STD_SECS),
            timeout_short: Duration::from_secs(DEFAULT_TIMEOUT_SHORT_SECS),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// プロセス環境変数から設定を構築する。検証は起動時の一度だけ
    ///
    /// - `GFG_BROWSER_WS_URL`: 指定時はリモート接続
    /// - `CHROME_PATH` / `CHROMIUM_PATH`: ローカル起動時の実行バイナリ
    /// - `GFG_HEADLESS`: "false" でヘッドフルモード
    /// - `GFG_MAX_REQUESTS_PER_BROWSER` / `GFG_TIMEOUT_STD_SECS` /
    ///   `GFG_TIMEOUT_SHORT_SECS`: 数値指定
    pub fn from_env() -> Result<Self, ScraperError> {
        let mut config = Self::default();

        if let Ok(ws_url) = std::env::var("GFG_BROWSER_WS_URL") {
            if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
                return Err(ScraperError::Config(format!(
                    "GFG_BROWSER_WS_URL はws(s)スキームが必要です: {}",
                    ws_url
                )));
            }
            config.endpoint = BrowserEndpoint::Connect { ws_url };
        } else {
            let chrome_path = std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok();
            config.endpoint = BrowserEndpoint::Launch { chrome_path };
        }

        if let Ok(v) = std::env::var("GFG_HEADLESS") {
            config.headless = v != "false" && v != "0";
        }
        if let Some(n) = parse_env_positive("GFG_MAX_REQUESTS_PER_BROWSER")? {
            config.max_requests_per_browser = n;
        }
        if let Some(n) = parse_env_positive("GFG_TIMEOUT_STD_SECS")? {
            config.timeout_std = Duration::from_secs(n);
        }
        if let Some(n) = parse_env_positive("GFG_TIMEOUT_SHORT_SECS")? {
            config.timeout_short = Duration::from_secs(n);
        }

        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: BrowserEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_max_requests_per_browser(mut self, max: u64) -> Self {
        self.max_requests_per_browser = max;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeouts(mut self, std: Duration, short: Duration) -> Self {
        self.timeout_std = std;
        self.timeout_short = short;
        self
    }
}

fn parse_env_u64(key: &str) -> Result<Option<u64>, ScraperError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ScraperError::Config(format!("{} が数値ではありません: {}", key, v))),
        Err(_) => Ok(None),
    }
}

/// 0はリクエスト数上限・タイムアウトのどちらでも意味をなさないため拒否する
fn parse_env_positive(key: &str) -> Result<Option<u64>, ScraperError> {
    match parse_env_u64(key)? {
        Some(0) => Err(ScraperError::Config(format!("{} は1以上が必要です", key))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.max_requests_per_browser, 100);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout_std, Duration::from_secs(45));
        assert_eq!(config.timeout_short, Duration::from_secs(30));
        assert!(matches!(
            config.endpoint,
            BrowserEndpoint::Launch { chrome_path: None }
        ));
    }

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new()
            .with_headless(false)
            .with_max_requests_per_browser(50)
            .with_max_retries(1)
            .with_timeouts(Duration::from_secs(60), Duration::from_secs(20))
            .with_endpoint(BrowserEndpoint::Connect {
                ws_url: "ws://localhost:9222".to_string(),
            });

        assert!(!config.headless);
        assert_eq!(config.max_requests_per_browser, 50);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.timeout_std, Duration::from_secs(60));
        assert_eq!(config.timeout_short, Duration::from_secs(20));
        assert!(matches!(config.endpoint, BrowserEndpoint::Connect { .. }));
    }

    // 環境変数を触るテストは並走を避けるため1本にまとめる
    #[test]
    fn test_from_env_rejects_zero_values() {
        for key in [
            "GFG_MAX_REQUESTS_PER_BROWSER",
            "GFG_TIMEOUT_STD_SECS",
            "GFG_TIMEOUT_SHORT_SECS",
        ] {
            std::env::set_var(key, "0");
            assert!(ScraperConfig::from_env().is_err(), "{} = 0 must be rejected", key);
            std::env::remove_var(key);
        }
    }
}
