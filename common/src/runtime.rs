use std::io;
use tokio::runtime::Runtime;
use tracing::info;

/// Builds the tokio runtime for a tool.
///
/// `Some(1)` (or `Some(0)`) gives a current-thread runtime, which is what the
/// player expects: commands, sink callbacks and timers are all handled
/// cooperatively on one thread.
pub fn build(threads: Option<usize>) -> io::Result<Runtime> {
    match threads {
        Some(0) | Some(1) => {
            info!("runtime: current thread");
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        }
        Some(threads) => {
            info!("runtime: {} worker threads", threads);
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .worker_threads(threads)
                .build()
        }
        None => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_runtime_runs_futures() {
        let runtime = build(Some(1)).unwrap();
        let value = runtime.block_on(async { 21 * 2 });
        assert_eq!(value, 42);
    }

    #[test]
    fn multi_thread_runtime_runs_futures() {
        let runtime = build(Some(2)).unwrap();
        let value = runtime.block_on(async { tokio::spawn(async { 7 }).await.unwrap() });
        assert_eq!(value, 7);
    }
}
