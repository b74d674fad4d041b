use chromiumoxide::error::CdpError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ブラウザ接続が失われました: {0}")]
    ConnectionLost(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ユーザーが見つかりません: {0}")]
    NotFound(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("データ抽出エラー: {0}")]
    Extraction(String),

    #[error("設定エラー: {0}")]
    Config(String),
}

/// 失敗の分類。リトライ判断とAPI層のステータスマッピングに使う
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    ConnectionLost,
    NotFound,
    Timeout,
    Other,
}

impl ScraperError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScraperError::ConnectionLost(_) => FailureKind::ConnectionLost,
            ScraperError::NotFound(_) => FailureKind::NotFound,
            ScraperError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }

    /// 共有ブラウザの再構築で回復し得る失敗か
    pub fn is_connection_lost(&self) -> bool {
        self.kind() == FailureKind::ConnectionLost
    }
}

/// CDPエラーを分類する。WebSocket断・チャネル断・無応答は接続喪失として
/// 扱い、それ以外は呼び出し箇所のバリアントに落とす
pub(crate) fn classify_cdp(err: CdpError, fallback: fn(String) -> ScraperError) -> ScraperError {
    match err {
        CdpError::Ws(e) => ScraperError::ConnectionLost(e.to_string()),
        CdpError::ChannelSendError(e) => ScraperError::ConnectionLost(e.to_string()),
        CdpError::NoResponse => {
            ScraperError::ConnectionLost("no response from browser".to_string())
        }
        CdpError::Timeout => ScraperError::Timeout("CDP command timed out".to_string()),
        other => fallback(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            ScraperError::ConnectionLost("ws closed".into()).kind(),
            FailureKind::ConnectionLost
        );
        assert_eq!(
            ScraperError::NotFound("user".into()).kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            ScraperError::Timeout("nav".into()).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            ScraperError::Extraction("missing".into()).kind(),
            FailureKind::Other
        );
        assert_eq!(
            ScraperError::BrowserInit("launch".into()).kind(),
            FailureKind::Other
        );
    }

    #[test]
    fn test_only_connection_lost_is_retryable() {
        assert!(ScraperError::ConnectionLost("x".into()).is_connection_lost());
        assert!(!ScraperError::NotFound("x".into()).is_connection_lost());
        assert!(!ScraperError::Timeout("x".into()).is_connection_lost());
        assert!(!ScraperError::Navigation("x".into()).is_connection_lost());
    }

    #[test]
    fn test_classify_cdp_no_response() {
        let err = classify_cdp(CdpError::NoResponse, ScraperError::Navigation);
        assert_eq!(err.kind(), FailureKind::ConnectionLost);
    }

    #[test]
    fn test_classify_cdp_timeout() {
        let err = classify_cdp(CdpError::Timeout, ScraperError::Navigation);
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_classify_cdp_fallback() {
        let json_err = serde_json::from_str::<i64>("not json").unwrap_err();
        let err = classify_cdp(CdpError::Serde(json_err), ScraperError::JavaScript);
        assert_eq!(err.kind(), FailureKind::Other);
        assert!(matches!(err, ScraperError::JavaScript(_)));
    }
}
