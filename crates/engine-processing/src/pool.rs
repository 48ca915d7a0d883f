use crate::{
    context::SyncContext,
    error::{ScriptError, SyncError},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, mpsc as std_mpsc},
    thread,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

type Job<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;
type ResultHandler<R> = Arc<dyn Fn(R) + Send + Sync + 'static>;

/// Fixed set of worker threads, each owning one context of type `C`.
///
/// Contexts are built on their own thread and never leave it, so `C` does not
/// need to be `Send`. A slot runs one task at a time; the result handler runs
/// on the same slot before it is handed out again.
pub struct WorkerPool<C, R> {
    jobs: Vec<std_mpsc::Sender<Job<C>>>,
    idle_tx: mpsc::Sender<usize>,
    idle_rx: mpsc::Receiver<usize>,
    handler: ResultHandler<R>,
    ctx: SyncContext,
}

impl<C: 'static, R: 'static> WorkerPool<C, R> {
    /// Starts `size` workers and waits until every context is built. Any
    /// factory error fails the whole pool.
    pub async fn new<F, H>(
        size: usize,
        factory: F,
        handler: H,
        ctx: SyncContext,
    ) -> Result<Self, SyncError>
    where
        F: Fn(usize) -> Result<C, SyncError> + Send + Sync + 'static,
        H: Fn(R) + Send + Sync + 'static,
    {
        let size = size.max(1);
        let factory = Arc::new(factory);
        let (idle_tx, idle_rx) = mpsc::channel(size);
        let mut jobs = Vec::with_capacity(size);
        let mut ready = Vec::with_capacity(size);

        for id in 0..size {
            let (job_tx, job_rx) = std_mpsc::channel::<Job<C>>();
            let (ready_tx, ready_rx) = oneshot::channel();
            let factory = factory.clone();
            let idle = idle_tx.clone();
            let worker_ctx = ctx.clone();

            thread::Builder::new()
                .name(format!("script-worker-{id}"))
                .spawn(move || {
                    worker_loop(id, factory.as_ref(), job_rx, idle, ready_tx, worker_ctx)
                })
                .map_err(|e| SyncError::Script(ScriptError::Load(e.to_string())))?;

            jobs.push(job_tx);
            ready.push(ready_rx);
        }

        let mut pool = WorkerPool {
            jobs,
            idle_tx,
            idle_rx,
            handler: Arc::new(handler),
            ctx,
        };

        for (id, ready_rx) in ready.into_iter().enumerate() {
            let outcome = ready_rx
                .await
                .unwrap_or(Err(SyncError::Script(ScriptError::WorkerGone(id))));
            if let Err(err) = outcome {
                pool.close();
                return Err(err);
            }
        }

        info!(workers = size, "Script worker pool ready");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.jobs.len()
    }

    /// Hands `task` to the next idle worker, waiting while all are busy.
    /// A task returning `Some` passes its result to the pool's handler.
    pub async fn run<F>(&mut self, task: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut C) -> Option<R> + Send + 'static,
    {
        let id = tokio::select! {
            biased;
            _ = self.ctx.cancelled() => return Err(self.cancel_cause()),
            id = self.idle_rx.recv() => id,
        };
        let Some(id) = id else {
            return Err(self.cancel_cause());
        };

        let handler = self.handler.clone();
        let job: Job<C> = Box::new(move |context| {
            if let Some(result) = task(context) {
                handler(result);
            }
        });

        // Empty once the pool is closed, while idle ids may still be queued.
        let Some(jobs) = self.jobs.get(id) else {
            return Err(SyncError::Script(ScriptError::WorkerGone(id)));
        };
        jobs.send(job).map_err(|_| SyncError::Script(ScriptError::WorkerGone(id)))
    }

    /// Waits until every submitted task and its handler have finished, then
    /// reports the session's cause if it was cancelled meanwhile.
    pub async fn wait(&mut self) -> Result<(), SyncError> {
        let size = self.size();
        let mut idle = Vec::with_capacity(size);

        while idle.len() < size {
            tokio::select! {
                biased;
                _ = self.ctx.cancelled() => break,
                id = self.idle_rx.recv() => match id {
                    Some(id) => idle.push(id),
                    None => break,
                },
            }
        }

        for id in idle {
            let _ = self.idle_tx.try_send(id);
        }
        self.ctx.check()
    }

    /// Stops accepting work. Workers exit after their current task, dropping
    /// their contexts.
    pub fn close(&mut self) {
        if !self.jobs.is_empty() {
            debug!(workers = self.jobs.len(), "Closing script worker pool");
        }
        self.jobs.clear();
    }

    fn cancel_cause(&self) -> SyncError {
        self.ctx.cause().unwrap_or(SyncError::Cancelled)
    }
}

impl<C, R> Drop for WorkerPool<C, R> {
    fn drop(&mut self) {
        self.jobs.clear();
    }
}

fn worker_loop<C, F>(
    id: usize,
    factory: &F,
    jobs: std_mpsc::Receiver<Job<C>>,
    idle: mpsc::Sender<usize>,
    ready: oneshot::Sender<Result<(), SyncError>>,
    ctx: SyncContext,
) where
    F: Fn(usize) -> Result<C, SyncError>,
{
    let mut context = match factory(id) {
        Ok(context) => context,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() || idle.blocking_send(id).is_err() {
        return;
    }

    while let Ok(job) = jobs.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(&mut context))) {
            ctx.cancel_with(SyncError::Script(ScriptError::Panic {
                worker: id,
                message: panic_message(payload.as_ref()),
            }));
        }
        if idle.blocking_send(id).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tokio_util::sync::CancellationToken;

    /// Deliberately `!Send` to prove contexts stay on their thread.
    struct Counter {
        runs: Cell<usize>,
    }

    fn counter_factory(_id: usize) -> Result<Counter, SyncError> {
        Ok(Counter { runs: Cell::new(0) })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_every_task_and_handler() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut pool = WorkerPool::new(
            3,
            counter_factory,
            move |n: usize| sink.lock().unwrap().push(n),
            ctx,
        )
        .await
        .unwrap();

        for i in 0..20 {
            pool.run(move |c: &mut Counter| {
                c.runs.set(c.runs.get() + 1);
                Some(i)
            })
            .await
            .unwrap();
        }
        pool.wait().await.unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_after_close_is_an_error() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let mut pool = WorkerPool::new(2, counter_factory, |_: ()| {}, ctx)
            .await
            .unwrap();
        pool.close();

        let err = pool.run(|_: &mut Counter| None).await.unwrap_err();
        assert!(
            matches!(err, SyncError::Script(ScriptError::WorkerGone(_))),
            "{err:?}"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slots_never_run_two_tasks_at_once() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut pool = WorkerPool::new(2, counter_factory, |_: ()| {}, ctx)
            .await
            .unwrap();

        for _ in 0..10 {
            let active = active.clone();
            let peak = peak.clone();
            pool.run(move |_c: &mut Counter| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
                None
            })
            .await
            .unwrap();
        }
        pool.wait().await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn factory_failure_fails_construction() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let result = WorkerPool::<Counter, ()>::new(
            2,
            |id| {
                if id == 1 {
                    Err(SyncError::Script(ScriptError::MissingEntrypoint("nil".into())))
                } else {
                    counter_factory(id)
                }
            },
            |_| {},
            ctx,
        )
        .await;

        assert_eq!(
            result.err(),
            Some(SyncError::Script(ScriptError::MissingEntrypoint("nil".into())))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_returns_cause_reported_by_task() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let mut pool = WorkerPool::new(1, counter_factory, |_: ()| {}, ctx.clone())
            .await
            .unwrap();

        let sink = ctx.clone();
        pool.run(move |_c: &mut Counter| {
            sink.cancel_with(SyncError::Script(ScriptError::Runtime("bad".into())));
            None
        })
        .await
        .unwrap();

        assert_eq!(
            pool.wait().await,
            Err(SyncError::Script(ScriptError::Runtime("bad".into())))
        );
        assert!(pool.run(|_c: &mut Counter| None).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_task_cancels_session_and_keeps_slot() {
        let ctx = SyncContext::new(&CancellationToken::new());
        let mut pool = WorkerPool::new(1, counter_factory, |_: ()| {}, ctx.clone())
            .await
            .unwrap();

        pool.run(|_c: &mut Counter| panic!("script host crashed"))
            .await
            .unwrap();

        assert!(matches!(
            pool.wait().await,
            Err(SyncError::Script(ScriptError::Panic { worker: 0, .. }))
        ));
    }
}
