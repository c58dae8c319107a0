//! Concurrency primitives (spec §4.7, C7): a bounded worker pool with
//! poison-pill shutdown, used by both the push and fetch sides of the
//! transfer engine (spec §4.4).
//!
//! The reference implementation pickles bound methods through a custom
//! `Binder` wrapper to ship work to worker processes (spec §9 design
//! note); in Rust, ordinary closures sent down a channel do the same job,
//! so no such wrapper exists here.

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

/// Sentinel wrapping a unit of work or a shutdown request (spec GLOSSARY:
/// "Poison pill").
enum Message<T> {
    Item(T),
    Stop,
}

/// A fixed-size pool of worker threads pulling jobs off a bounded input
/// queue and pushing results onto a bounded output queue.
///
/// Each worker gets its own `Conn` value, created lazily on worker start
/// (spec §4.7(c), §9: "one blob-store connection per worker... do not
/// share a single connection across workers").
pub struct WorkerPool<J, R> {
    input_tx: Sender<Message<J>>,
    output_rx: Receiver<R>,
    handles: Vec<JoinHandle<()>>,
}

impl<J, R> WorkerPool<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Spawn `workers` threads, each built from `make_conn` and running
    /// `handle` for every job it receives until the pool is stopped.
    pub fn new<C, MakeConn, Handle>(workers: usize, make_conn: MakeConn, handle: Handle) -> Self
    where
        C: Send + 'static,
        MakeConn: Fn() -> C + Send + Sync + 'static,
        Handle: Fn(&C, J) -> R + Send + Sync + 'static,
    {
        let (input_tx, input_rx) = bounded::<Message<J>>(workers * 2);
        let (output_tx, output_rx) = bounded::<R>(workers * 2);

        let make_conn = std::sync::Arc::new(make_conn);
        let handle = std::sync::Arc::new(handle);

        let handles = (0..workers)
            .map(|_| {
                let input_rx = input_rx.clone();
                let output_tx = output_tx.clone();
                let make_conn = make_conn.clone();
                let handle = handle.clone();
                std::thread::spawn(move || {
                    let conn = make_conn();
                    loop {
                        match input_rx.recv() {
                            Ok(Message::Item(job)) => {
                                let result = handle(&conn, job);
                                if output_tx.send(result).is_err() {
                                    return;
                                }
                            }
                            Ok(Message::Stop) | Err(_) => return,
                        }
                    }
                })
            })
            .collect();

        Self {
            input_tx,
            output_rx,
            handles,
        }
    }

    /// Enqueue one job. Blocks if the input queue is full.
    pub fn submit(&self, job: J) {
        let _ = self.input_tx.send(Message::Item(job));
    }

    /// Receive one completed result. Blocks until one is available.
    pub fn recv(&self) -> R {
        self.output_rx
            .recv()
            .expect("worker pool output channel closed unexpectedly")
    }

    /// A clone of the output channel, for callers that want to select on
    /// it directly alongside other event sources.
    pub fn output(&self) -> Receiver<R> {
        self.output_rx.clone()
    }

    /// Send one poison pill per worker and join every thread.
    pub fn shutdown(self) {
        for _ in &self.handles {
            let _ = self.input_tx.send(Message::Stop);
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn processes_every_job_exactly_once() {
        let pool = WorkerPool::new(4, || (), |_conn: &(), job: u32| job * 2);
        for i in 0..20u32 {
            pool.submit(i);
        }
        let mut results: Vec<u32> = (0..20).map(|_| pool.recv()).collect();
        results.sort();
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
        pool.shutdown();
    }

    #[test]
    fn each_worker_builds_its_own_connection() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_conn = counter.clone();
        let pool = WorkerPool::new(3, move || counter_for_conn.fetch_add(1, Ordering::SeqCst), |conn: &usize, job: u32| (*conn, job));
        for i in 0..6u32 {
            pool.submit(i);
        }
        for _ in 0..6 {
            pool.recv();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
