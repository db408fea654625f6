//! Job dispatcher: FIFO routing of jobs onto a fixed set of workers

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{PoolConfig, WorkerInit};
use crate::error::{Error, Result};
use crate::handle::WorkerHandle;
use crate::job::{Job, Outcome, Request};

/// A submitted job waiting for an idle worker, paired with the channel that
/// resolves its submitter.
struct QueuedJob {
   job: Job,
   reply: oneshot::Sender<Result<Outcome>>,
}

struct Shared {
   handles: Vec<Arc<WorkerHandle>>,
   queue: Mutex<VecDeque<QueuedJob>>,
   next_job_id: AtomicU64,
   closed: AtomicBool,
   config: PoolConfig,

   /// Wakes the router when the queue or worker availability changed.
   route_wake: Notify,

   /// Wakes lease waiters when a worker may have become idle.
   worker_freed: Notify,
}

impl Shared {
   fn next_id(&self) -> u64 {
      self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1
   }

   fn is_closed(&self) -> bool {
      self.closed.load(Ordering::SeqCst)
   }
}

/// Fixed-size worker pool with a FIFO waiting queue.
///
/// Jobs are matched to idle workers in submission order. Each worker owns
/// one SQLite connection and runs one job at a time; between workers no
/// ordering is guaranteed. Contention (`database is locked`) is retried
/// with exponential backoff on the worker the job already claimed, so a
/// retrying job is never overtaken by jobs submitted after it.
pub struct Dispatcher {
   shared: Arc<Shared>,
   router: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
   /// Start `config.workers` workers eagerly against `init`.
   ///
   /// Fails if any worker cannot open its connection.
   pub async fn new(init: WorkerInit, config: PoolConfig) -> Result<Self> {
      if config.workers == 0 {
         return Err(Error::InvalidConfig(
            "worker count must be at least 1".to_string(),
         ));
      }
      if config.max_queue == Some(0) {
         return Err(Error::InvalidConfig(
            "queue bound must be at least 1".to_string(),
         ));
      }

      let mut handles = Vec::with_capacity(config.workers);
      for worker_id in 0..config.workers {
         handles.push(Arc::new(
            WorkerHandle::spawn(worker_id, init.clone(), &config).await?,
         ));
      }

      debug!(
         workers = config.workers,
         filename = %init.filename.display(),
         "worker pool started"
      );

      let shared = Arc::new(Shared {
         handles,
         queue: Mutex::new(VecDeque::new()),
         next_job_id: AtomicU64::new(0),
         closed: AtomicBool::new(false),
         config,
         route_wake: Notify::new(),
         worker_freed: Notify::new(),
      });

      let router = tokio::spawn(route_loop(Arc::clone(&shared)));

      Ok(Self {
         shared,
         router: Mutex::new(Some(router)),
      })
   }

   /// Submit one request and await its outcome.
   ///
   /// Fails immediately with [`Error::Closed`] after [`shutdown`](Self::shutdown)
   /// or [`Error::QueueFull`] when the waiting queue is at its bound.
   pub async fn submit(&self, request: Request) -> Result<Outcome> {
      let job = Job {
         id: self.shared.next_id(),
         request,
      };
      let (reply_tx, reply_rx) = oneshot::channel();

      {
         if self.shared.is_closed() {
            return Err(Error::Closed);
         }
         let mut queue = self.shared.queue.lock();
         // Re-check under the queue lock: shutdown drains the queue while
         // holding it, and nothing may slip in afterwards.
         if self.shared.is_closed() {
            return Err(Error::Closed);
         }
         if let Some(limit) = self.shared.config.max_queue
            && queue.len() >= limit
         {
            return Err(Error::QueueFull(limit));
         }
         queue.push_back(QueuedJob {
            job,
            reply: reply_tx,
         });
      }

      self.shared.route_wake.notify_one();
      reply_rx.await.unwrap_or(Err(Error::WorkerCrashed))
   }

   /// Reserve one worker for exclusive use, waiting for an idle one.
   ///
   /// A reserved worker receives no routed jobs until the lease is dropped;
   /// every job submitted through the lease runs on that worker, in order.
   /// This is what pins a multi-statement transaction to a single
   /// connection.
   pub async fn lease(&self) -> Result<WorkerLease> {
      loop {
         if self.shared.is_closed() {
            return Err(Error::Closed);
         }

         let waiter = self.shared.worker_freed.notified();
         tokio::pin!(waiter);
         waiter.as_mut().enable();

         if self.shared.handles.iter().all(|handle| handle.is_closed()) {
            return Err(Error::WorkerCrashed);
         }

         if let Some(handle) = self
            .shared
            .handles
            .iter()
            .find(|handle| handle.try_reserve())
         {
            debug!(worker_id = handle.worker_id(), "worker leased");
            return Ok(WorkerLease {
               shared: Arc::clone(&self.shared),
               handle: Arc::clone(handle),
               transaction_open: AtomicBool::new(false),
               submit_gate: tokio::sync::Mutex::new(()),
            });
         }

         waiter.await;
      }
   }

   /// Whether [`shutdown`](Self::shutdown) has been called.
   pub fn is_closed(&self) -> bool {
      self.shared.is_closed()
   }

   /// Gracefully shut the pool down.
   ///
   /// New submissions fail immediately. Jobs still waiting in the queue are
   /// rejected with [`Error::ShuttingDown`] — queued but not-yet-started
   /// work is deliberately dropped. Jobs already running on a worker finish
   /// and resolve their submitters before that worker's connection is
   /// closed, so no started write is ever cut off mid-way.
   pub async fn shutdown(&self) -> Result<()> {
      self.shared.closed.store(true, Ordering::SeqCst);

      let drained: Vec<QueuedJob> = {
         let mut queue = self.shared.queue.lock();
         queue.drain(..).collect()
      };
      if !drained.is_empty() {
         debug!(count = drained.len(), "rejecting queued jobs on shutdown");
      }
      for entry in drained {
         let _ = entry.reply.send(Err(Error::ShuttingDown));
      }

      // Wake the router so it can observe the flag and exit, and any lease
      // waiters so they fail fast.
      self.shared.route_wake.notify_one();
      self.shared.worker_freed.notify_waiters();

      for handle in &self.shared.handles {
         handle.terminate().await;
      }

      let router = self.router.lock().take();
      if let Some(router) = router {
         let _ = router.await;
      }

      Ok(())
   }
}

impl Drop for Dispatcher {
   fn drop(&mut self) {
      // Without a shutdown the router would outlive the pool, parked on its
      // Notify forever.
      if let Some(router) = self.router.lock().take() {
         router.abort();
      }
   }
}

async fn route_loop(shared: Arc<Shared>) {
   loop {
      let wake = shared.route_wake.notified();
      tokio::pin!(wake);
      wake.as_mut().enable();

      dispatch_ready(&shared);

      if shared.is_closed() && shared.queue.lock().is_empty() {
         break;
      }

      wake.await;
   }
}

/// Hand queued jobs to idle workers, head of the queue first, until either
/// runs out.
fn dispatch_ready(shared: &Arc<Shared>) {
   loop {
      let claimed = {
         let mut queue = shared.queue.lock();
         if queue.is_empty() {
            return;
         }

         if shared.handles.iter().all(|handle| handle.is_closed()) {
            // Nothing will ever drain the queue again.
            for entry in queue.drain(..) {
               let _ = entry.reply.send(Err(Error::WorkerCrashed));
            }
            return;
         }

         let Some(handle) = shared.handles.iter().find(|handle| handle.try_claim()) else {
            return;
         };
         let handle = Arc::clone(handle);

         match queue.pop_front() {
            Some(entry) => (handle, entry),
            None => {
               handle.release_claim();
               return;
            }
         }
      };

      let (handle, entry) = claimed;
      tokio::spawn(run_entry(Arc::clone(shared), handle, entry));
   }
}

async fn run_entry(shared: Arc<Shared>, handle: Arc<WorkerHandle>, entry: QueuedJob) {
   let QueuedJob { job, reply } = entry;
   let result = run_with_retry(&shared, &handle, job).await;

   handle.release_claim();
   shared.route_wake.notify_one();
   shared.worker_freed.notify_waiters();

   // The submitter may have dropped its future; that is not our problem.
   let _ = reply.send(result);
}

/// Run one job, retrying contention failures on the same worker.
///
/// Holding the worker across retries preserves submission order: a job that
/// keeps losing the lock still runs before anything submitted after it.
async fn run_with_retry(
   shared: &Shared,
   handle: &WorkerHandle,
   job: Job,
) -> Result<Outcome> {
   let retry = &shared.config.retry;
   let mut attempts: u32 = 0;

   loop {
      let result = handle.run(job.clone()).await;
      attempts += 1;

      match result {
         Err(err) if err.is_contention() && retry.allows_retry(attempts) => {
            debug!(
               job_id = job.id,
               attempts, "database is locked; backing off before retry"
            );
            tokio::time::sleep(retry.delay_for(attempts - 1)).await;
            if shared.is_closed() {
               return Err(Error::ShuttingDown);
            }
         }
         Err(err) if err.is_contention() => {
            warn!(job_id = job.id, attempts, "contention retries exhausted");
            return Err(err);
         }
         Err(Error::WorkerCrashed) if shared.is_closed() => {
            // The worker was terminated by shutdown between attempts.
            return Err(Error::ShuttingDown);
         }
         other => return other,
      }
   }
}

/// Exclusive reservation of one worker, handed out by
/// [`Dispatcher::lease`].
///
/// Dropping the lease returns the worker to the pool. If a transaction the
/// lease began is still open at that point, a rollback is issued first so
/// the next job starts on a clean connection.
pub struct WorkerLease {
   shared: Arc<Shared>,
   handle: Arc<WorkerHandle>,
   transaction_open: AtomicBool,

   /// Serializes submissions from concurrent holders of the same lease
   /// (e.g. a transaction handle cloned into sub-tasks).
   submit_gate: tokio::sync::Mutex<()>,
}

impl WorkerLease {
   /// Run one request on the leased worker, with the same contention-retry
   /// behavior as routed jobs. Concurrent submissions on the same lease are
   /// serialized in arrival order.
   pub async fn submit(&self, request: Request) -> Result<Outcome> {
      let _gate = self.submit_gate.lock().await;

      if self.shared.is_closed() {
         return Err(Error::Closed);
      }

      let begins = matches!(request, Request::Begin);
      let finalizes = matches!(request, Request::Commit | Request::Rollback);

      let job = Job {
         id: self.shared.next_id(),
         request,
      };
      let result = run_with_retry(&self.shared, &self.handle, job).await;

      if result.is_ok() {
         if begins {
            self.transaction_open.store(true, Ordering::SeqCst);
         } else if finalizes {
            self.transaction_open.store(false, Ordering::SeqCst);
         }
      }

      result
   }

   /// Id of the reserved worker.
   pub fn worker_id(&self) -> usize {
      self.handle.worker_id()
   }
}

impl Drop for WorkerLease {
   fn drop(&mut self) {
      if self.transaction_open.load(Ordering::SeqCst)
         && !self.shared.is_closed()
         && let Ok(runtime) = tokio::runtime::Handle::try_current()
      {
         // The lease is going away with its transaction still open —
         // typically an abandoned handle. Roll back before releasing the
         // worker so the next job does not inherit the transaction.
         warn!(
            worker_id = self.handle.worker_id(),
            "lease dropped with open transaction; rolling back"
         );
         let shared = Arc::clone(&self.shared);
         let handle = Arc::clone(&self.handle);
         runtime.spawn(async move {
            let job = Job {
               id: shared.next_id(),
               request: Request::Rollback,
            };
            if let Err(err) = handle.run(job).await {
               warn!(error = %err, "rollback of abandoned transaction failed");
            }
            handle.release_reservation();
            shared.worker_freed.notify_waiters();
            shared.route_wake.notify_one();
         });
         return;
      }

      self.handle.release_reservation();
      self.shared.worker_freed.notify_waiters();
      self.shared.route_wake.notify_one();
   }
}
