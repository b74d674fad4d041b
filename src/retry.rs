//! 接続喪失の有界リトライ
//!
//! リトライ可否の判断を値として持ち回る。共有フラグは使わない。
//! 回復対象は接続喪失だけで、バックオフはしない（上限が小さいため
//! 固定遅延で十分）。試行ループ本体もこのモジュールが持ち、
//! 接続・セッションの段階は `AttemptLifecycle` 越しに呼び出す。

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::error::ScraperError;

/// 失敗後にオーケストレータが取るべき行動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 接続を無効化し、遅延後に再試行する
    Retry { delay: Duration },
    /// この失敗をそのまま表面化する
    GiveUp,
}

/// リクエストごとのリトライ状態。リクエスト間で共有しない
#[derive(Debug)]
pub struct RetryState {
    retries_used: u32,
    max_retries: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            retries_used: 0,
            max_retries,
            delay,
        }
    }

    /// 現在の試行番号（1始まり）
    pub fn attempt(&self) -> u32 {
        self.retries_used + 1
    }

    /// 失敗を分類して次の行動を決める。接続喪失かつ残回数があるときだけ
    /// リトライし、それ以外は即座に打ち切る
    pub fn on_failure(&mut self, err: &ScraperError) -> RetryDecision {
        if err.is_connection_lost() && self.retries_used < self.max_retries {
            self.retries_used += 1;
            RetryDecision::Retry { delay: self.delay }
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// 1試行の各段階。`drive` はこの順でフックを呼ぶ:
/// acquire → open → run → close（openが成功した場合は結果を問わず）
#[async_trait]
pub(crate) trait AttemptLifecycle: Sync {
    type Conn: Send + Sync;
    type Scope: Send;
    type Output: Send;

    /// 共有接続を借りる。失敗はリトライ対象外のハードエラー
    async fn acquire(&self) -> Result<Self::Conn, ScraperError>;
    /// 接続上に分離スコープを開く
    async fn open(&self, conn: &Self::Conn) -> Result<Self::Scope, ScraperError>;
    /// スコープ内で操作本体を実行する
    async fn run(&self, scope: &Self::Scope) -> Result<Self::Output, ScraperError>;
    /// スコープを解放する。runの成否に関わらず必ず呼ばれる
    async fn close(&self, conn: &Self::Conn, scope: Self::Scope);
    /// 接続喪失後、再試行の前に接続へ交換マークを付ける
    async fn invalidate(&self);
}

/// 有界リトライ付きの試行ループ
///
/// 接続喪失と分類された失敗だけが、`invalidate` と固定遅延を挟んで
/// 再試行される。それ以外の失敗とacquire失敗は即座に表面化する
pub(crate) async fn drive<L: AttemptLifecycle>(
    lifecycle: &L,
    mut retry: RetryState,
) -> Result<L::Output, ScraperError> {
    loop {
        let attempt = retry.attempt();
        let conn = lifecycle.acquire().await?;

        let result = match lifecycle.open(&conn).await {
            Ok(scope) => {
                let result = lifecycle.run(&scope).await;
                lifecycle.close(&conn, scope).await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => return Ok(output),
            Err(err) => match retry.on_failure(&err) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        "Attempt {} lost the browser connection, recycling and retrying: {}",
                        attempt, err
                    );
                    lifecycle.invalidate().await;
                    sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn state() -> RetryState {
        RetryState::new(2, Duration::from_secs(1))
    }

    #[test]
    fn test_connection_lost_retried_up_to_cap() {
        let mut state = state();
        let err = ScraperError::ConnectionLost("ws closed".into());

        assert_eq!(state.attempt(), 1);
        assert!(matches!(state.on_failure(&err), RetryDecision::Retry { .. }));
        assert_eq!(state.attempt(), 2);
        assert!(matches!(state.on_failure(&err), RetryDecision::Retry { .. }));
        assert_eq!(state.attempt(), 3);
        // 2回の再試行を使い切ったら打ち切り
        assert_eq!(state.on_failure(&err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_not_found_never_retried() {
        let mut state = state();
        let err = ScraperError::NotFound("no such user".into());
        assert_eq!(state.on_failure(&err), RetryDecision::GiveUp);
        assert_eq!(state.attempt(), 1);
    }

    #[test]
    fn test_timeout_never_retried() {
        let mut state = state();
        let err = ScraperError::Timeout("navigation".into());
        assert_eq!(state.on_failure(&err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_mixed_sequence_terminates_on_non_transient() {
        let mut state = state();
        let lost = ScraperError::ConnectionLost("x".into());
        let other = ScraperError::Extraction("y".into());

        assert!(matches!(state.on_failure(&lost), RetryDecision::Retry { .. }));
        // 接続喪失以外が出た時点で残回数に関係なく終了
        assert_eq!(state.on_failure(&other), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retry_delay_is_fixed() {
        let mut state = RetryState::new(2, Duration::from_millis(500));
        let err = ScraperError::ConnectionLost("x".into());
        match state.on_failure(&err) {
            RetryDecision::Retry { delay } => assert_eq!(delay, Duration::from_millis(500)),
            RetryDecision::GiveUp => panic!("expected retry"),
        }
        match state.on_failure(&err) {
            RetryDecision::Retry { delay } => assert_eq!(delay, Duration::from_millis(500)),
            RetryDecision::GiveUp => panic!("expected retry"),
        }
    }

    /// ループ検証用の偽ライフサイクル。段階ごとの呼び出し回数を数え、
    /// runの結果は試行順に台本から取り出す
    #[derive(Default)]
    struct FakeLifecycle {
        run_script: Mutex<Vec<Result<u32, ScraperError>>>,
        open_failures_remaining: AtomicUsize,
        acquires: AtomicUsize,
        opens: AtomicUsize,
        closes: AtomicUsize,
        invalidations: AtomicUsize,
    }

    impl FakeLifecycle {
        fn scripted(outcomes: Vec<Result<u32, ScraperError>>) -> Self {
            Self {
                run_script: Mutex::new(outcomes),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl AttemptLifecycle for FakeLifecycle {
        type Conn = ();
        type Scope = ();
        type Output = u32;

        async fn acquire(&self) -> Result<(), ScraperError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn open(&self, _conn: &()) -> Result<(), ScraperError> {
            if self.open_failures_remaining.load(Ordering::SeqCst) > 0 {
                self.open_failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(ScraperError::ConnectionLost("open failed".into()));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, _scope: &()) -> Result<u32, ScraperError> {
            self.run_script.lock().unwrap().remove(0)
        }

        async fn close(&self, _conn: &(), _scope: ()) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        async fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_retry() -> RetryState {
        RetryState::new(2, Duration::from_millis(1))
    }

    fn lost() -> ScraperError {
        ScraperError::ConnectionLost("ws closed".into())
    }

    #[tokio::test]
    async fn test_drive_invalidates_once_per_connection_loss_then_succeeds() {
        let fake = FakeLifecycle::scripted(vec![Err(lost()), Err(lost()), Ok(7)]);

        let result = drive(&fake, fast_retry()).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(fake.acquires.load(Ordering::SeqCst), 3);
        assert_eq!(fake.invalidations.load(Ordering::SeqCst), 2);
        // 開いたスコープは失敗した試行の分も含めて全て閉じられる
        assert_eq!(fake.opens.load(Ordering::SeqCst), 3);
        assert_eq!(fake.closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_drive_not_found_stops_without_invalidation() {
        let fake =
            FakeLifecycle::scripted(vec![Err(ScraperError::NotFound("no such user".into()))]);

        let result = drive(&fake, fast_retry()).await;

        assert!(matches!(result, Err(ScraperError::NotFound(_))));
        assert_eq!(fake.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(fake.invalidations.load(Ordering::SeqCst), 0);
        assert_eq!(fake.opens.load(Ordering::SeqCst), 1);
        assert_eq!(fake.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drive_closes_scope_when_operation_fails() {
        let fake =
            FakeLifecycle::scripted(vec![Err(ScraperError::Extraction("bad payload".into()))]);

        let result = drive(&fake, fast_retry()).await;

        assert!(matches!(result, Err(ScraperError::Extraction(_))));
        assert_eq!(fake.opens.load(Ordering::SeqCst), 1);
        assert_eq!(fake.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drive_open_failure_retried_without_dangling_scope() {
        let fake = FakeLifecycle::scripted(vec![Ok(1)]);
        fake.open_failures_remaining.store(1, Ordering::SeqCst);

        let result = drive(&fake, fast_retry()).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(fake.acquires.load(Ordering::SeqCst), 2);
        assert_eq!(fake.invalidations.load(Ordering::SeqCst), 1);
        // 開けなかったスコープにcloseは走らない
        assert_eq!(fake.opens.load(Ordering::SeqCst), 1);
        assert_eq!(fake.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drive_cap_exhaustion_surfaces_connection_lost() {
        let fake = FakeLifecycle::scripted(vec![Err(lost()), Err(lost()), Err(lost())]);

        let result = drive(&fake, fast_retry()).await;

        assert!(matches!(result, Err(ScraperError::ConnectionLost(_))));
        // 3回目の失敗は打ち切りなので無効化は2回まで
        assert_eq!(fake.acquires.load(Ordering::SeqCst), 3);
        assert_eq!(fake.invalidations.load(Ordering::SeqCst), 2);
    }
}
