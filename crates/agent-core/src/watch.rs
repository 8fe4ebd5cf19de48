use std::sync::Arc;
use std::time::Duration;

use self_protect::{DetectorError, Platform, ThreadWatchEngine, WatchReport};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum CycleOutcome {
    Report(WatchReport),
    /// The scan missed its deadline; its result will be discarded.
    TimedOut,
    /// A previously abandoned scan is still running, so none was started.
    Skipped,
    WorkerFailed(String),
    Failed(DetectorError),
}

type ScanTask = JoinHandle<Result<WatchReport, DetectorError>>;

/// Runs scans on the blocking pool, at most one at a time.
///
/// A scan that overruns keeps its worker thread. The task is retained and
/// later cycles are skipped until it finishes, so a hung handle table query
/// pins a single blocking thread.
pub struct ScanWorker<P: Platform + Send + Sync + 'static> {
    engine: Arc<ThreadWatchEngine<P>>,
    timeout: Duration,
    abandoned: Option<ScanTask>,
}

impl<P> ScanWorker<P>
where
    P: Platform + Send + Sync + 'static,
{
    pub fn new(engine: Arc<ThreadWatchEngine<P>>, timeout: Duration) -> Self {
        Self {
            engine,
            timeout,
            abandoned: None,
        }
    }

    /// True while an abandoned scan is still occupying its worker.
    pub fn is_busy(&self) -> bool {
        self.abandoned
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if self.is_busy() {
            return CycleOutcome::Skipped;
        }
        // A finished abandoned scan is stale; drop its result.
        self.abandoned = None;

        let engine = Arc::clone(&self.engine);
        let mut task: ScanTask = tokio::task::spawn_blocking(move || engine.evaluate());
        match tokio::time::timeout(self.timeout, &mut task).await {
            Err(_) => {
                self.abandoned = Some(task);
                CycleOutcome::TimedOut
            }
            Ok(Err(join_err)) => CycleOutcome::WorkerFailed(join_err.to_string()),
            Ok(Ok(Err(err))) => CycleOutcome::Failed(err),
            Ok(Ok(Ok(report))) => CycleOutcome::Report(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use self_protect::{
        HandleTableSource, ProcessInspector, QueryOutcome, RawHandleValue, ScanConfig,
        ThreadHandleSource,
    };
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REAL_HANDLE: RawHandleValue = 0x1c8;

    #[derive(Default)]
    struct StubPlatform {
        delay: Duration,
        status: Option<i32>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        queries: AtomicUsize,
    }

    impl ThreadHandleSource for StubPlatform {
        fn current_process_id(&self) -> u32 {
            77
        }

        fn current_thread_pseudo_handle(&self) -> RawHandleValue {
            u64::MAX - 1
        }

        fn duplicate_same_access(&self, _source: RawHandleValue) -> io::Result<RawHandleValue> {
            Ok(REAL_HANDLE)
        }

        fn close_handle(&self, _handle: RawHandleValue) -> io::Result<()> {
            Ok(())
        }
    }

    impl HandleTableSource for StubPlatform {
        fn query_handle_table(&self, buffer: &mut [u8]) -> QueryOutcome {
            let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(live, Ordering::SeqCst);
            self.queries.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(status) = self.status {
                return QueryOutcome::Failed { status };
            }
            // Empty table: zero count header.
            for byte in buffer.iter_mut().take(16) {
                *byte = 0;
            }
            QueryOutcome::Complete { written: 16 }
        }
    }

    impl ProcessInspector for StubPlatform {
        fn parent_of(&self, _pid: u32) -> Option<u32> {
            None
        }
    }

    fn worker(
        platform: StubPlatform,
        timeout: Duration,
    ) -> (Arc<StubPlatform>, ScanWorker<StubPlatform>) {
        let platform = Arc::new(platform);
        let engine = ThreadWatchEngine::new(Arc::clone(&platform), ScanConfig::default())
            .expect("engine");
        (platform, ScanWorker::new(Arc::new(engine), timeout))
    }

    #[tokio::test]
    async fn prompt_scan_yields_report() {
        let (_, mut worker) = worker(StubPlatform::default(), Duration::from_secs(5));
        match worker.run_cycle().await {
            CycleOutcome::Report(report) => assert!(report.is_clean()),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn slow_scan_is_discarded_after_timeout() {
        let slow = StubPlatform {
            delay: Duration::from_millis(500),
            ..StubPlatform::default()
        };
        let (_, mut worker) = worker(slow, Duration::from_millis(20));
        assert!(matches!(worker.run_cycle().await, CycleOutcome::TimedOut));
        assert!(worker.is_busy());
    }

    #[tokio::test]
    async fn hung_scan_blocks_further_workers_until_it_finishes() {
        let hung = StubPlatform {
            delay: Duration::from_millis(300),
            ..StubPlatform::default()
        };
        let (platform, mut worker) = worker(hung, Duration::from_millis(20));

        assert!(matches!(worker.run_cycle().await, CycleOutcome::TimedOut));
        for _ in 0..4 {
            assert!(matches!(worker.run_cycle().await, CycleOutcome::Skipped));
        }
        assert_eq!(platform.queries.load(Ordering::SeqCst), 1);

        while worker.is_busy() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(matches!(worker.run_cycle().await, CycleOutcome::TimedOut));
        assert_eq!(platform.queries.load(Ordering::SeqCst), 2);
        assert_eq!(platform.peak_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_failure_still_produces_a_report() {
        let failing = StubPlatform {
            status: Some(-5),
            ..StubPlatform::default()
        };
        let (_, mut worker) = worker(failing, Duration::from_secs(5));
        match worker.run_cycle().await {
            CycleOutcome::Report(report) => {
                assert!(!report.detected());
                assert_eq!(report.query_failure.map(|f| f.status), Some(-5));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
