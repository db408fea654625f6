//! Worker handle: the pool-side proxy for one worker task

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::config::{PoolConfig, WorkerInit};
use crate::error::{Error, Result};
use crate::job::{Job, Outcome, Reply};
use crate::runtime;

// Routing states, packed into one atomic so claim/reserve/close transitions
// are single compare-and-swap operations.
const IDLE: u8 = 0;
// Claimed by the router for one queued entry (including its retries).
const CLAIMED: u8 = 1;
// Reserved by a lease for a transaction's whole duration.
const RESERVED: u8 = 2;
// Terminated or crashed; never reused.
const CLOSED: u8 = 3;

/// Proxy for one worker task.
///
/// The handle owns the job sender and reply receiver for its worker and
/// tracks two things: the routing state (who may hand it jobs) and the
/// at-most-one job currently in flight.
pub(crate) struct WorkerHandle {
   worker_id: usize,
   state: AtomicU8,

   /// True while a job is awaiting its reply. Guards against double
   /// dispatch independently of the routing state.
   inflight: AtomicBool,

   /// Taken (and dropped) on terminate, which lets the worker loop drain
   /// and exit.
   jobs: parking_lot::Mutex<Option<mpsc::Sender<Job>>>,
   replies: Mutex<mpsc::UnboundedReceiver<Reply>>,
   worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
   /// Spawn the worker task and wait for its connection to open.
   ///
   /// Startup failures surface here, at pool construction, rather than on
   /// the first submitted job.
   pub(crate) async fn spawn(
      worker_id: usize,
      init: WorkerInit,
      config: &PoolConfig,
   ) -> Result<Self> {
      let (job_tx, job_rx) = mpsc::channel(1);
      let (reply_tx, reply_rx) = mpsc::unbounded_channel();
      let (ready_tx, ready_rx) = oneshot::channel();

      let worker = tokio::spawn(runtime::run_worker(
         worker_id,
         init,
         config.statement_cache_capacity,
         config.busy_timeout,
         job_rx,
         reply_tx,
         ready_tx,
      ));

      match ready_rx.await {
         Ok(Ok(())) => {}
         Ok(Err(err)) => return Err(Error::Connect(err)),
         Err(_) => return Err(Error::WorkerCrashed),
      }

      Ok(Self {
         worker_id,
         state: AtomicU8::new(IDLE),
         inflight: AtomicBool::new(false),
         jobs: parking_lot::Mutex::new(Some(job_tx)),
         replies: Mutex::new(reply_rx),
         worker: Mutex::new(Some(worker)),
      })
   }

   pub(crate) fn worker_id(&self) -> usize {
      self.worker_id
   }

   pub(crate) fn is_closed(&self) -> bool {
      self.state.load(Ordering::SeqCst) == CLOSED
   }

   /// Claim an idle handle for one queued entry. The router holds the claim
   /// across retries so a backing-off job keeps its worker.
   pub(crate) fn try_claim(&self) -> bool {
      self
         .state
         .compare_exchange(IDLE, CLAIMED, Ordering::SeqCst, Ordering::SeqCst)
         .is_ok()
   }

   pub(crate) fn release_claim(&self) {
      let _ = self
         .state
         .compare_exchange(CLAIMED, IDLE, Ordering::SeqCst, Ordering::SeqCst);
   }

   /// Reserve an idle handle for a lease.
   pub(crate) fn try_reserve(&self) -> bool {
      self
         .state
         .compare_exchange(IDLE, RESERVED, Ordering::SeqCst, Ordering::SeqCst)
         .is_ok()
   }

   pub(crate) fn release_reservation(&self) {
      let _ = self
         .state
         .compare_exchange(RESERVED, IDLE, Ordering::SeqCst, Ordering::SeqCst);
   }

   fn mark_closed(&self) {
      self.state.store(CLOSED, Ordering::SeqCst);
   }

   /// Send one job to the worker and await its reply.
   ///
   /// At most one job may be in flight; a second concurrent call fails with
   /// `WorkerBusy`. Replies are matched by id — a reply that matches no
   /// in-flight job is logged and discarded (it indicates a double reply or
   /// one that landed after a crash rejection).
   pub(crate) async fn run(&self, job: Job) -> Result<Outcome> {
      if self.is_closed() {
         return Err(Error::WorkerCrashed);
      }
      if self
         .inflight
         .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
         .is_err()
      {
         return Err(Error::WorkerBusy);
      }

      let result = self.exchange(job).await;
      self.inflight.store(false, Ordering::SeqCst);
      result
   }

   async fn exchange(&self, job: Job) -> Result<Outcome> {
      let job_id = job.id;

      let sender = self.jobs.lock().clone();
      let Some(sender) = sender else {
         return Err(Error::WorkerCrashed);
      };
      if sender.send(job).await.is_err() {
         self.mark_closed();
         return Err(Error::WorkerCrashed);
      }

      let mut replies = self.replies.lock().await;
      loop {
         match replies.recv().await {
            Some(reply) if reply.id == job_id => {
               return reply.outcome.map_err(Error::Sqlite);
            }
            Some(reply) => {
               warn!(
                  worker_id = self.worker_id,
                  stray_id = reply.id,
                  expected_id = job_id,
                  "discarding stray worker reply"
               );
            }
            None => {
               self.mark_closed();
               error!(worker_id = self.worker_id, "worker exited with a job in flight");
               return Err(Error::WorkerCrashed);
            }
         }
      }
   }

   /// Shut the worker down and wait for it to exit.
   ///
   /// The job sender is dropped first, so a worker that is mid-job finishes
   /// and replies before its loop observes the closed channel and exits.
   pub(crate) async fn terminate(&self) {
      self.jobs.lock().take();

      let worker = self.worker.lock().await.take();
      if let Some(worker) = worker {
         match worker.await {
            Ok(()) => {}
            Err(err) if err.is_panic() => {
               error!(worker_id = self.worker_id, "worker task panicked during shutdown");
            }
            Err(_) => {}
         }
      }

      self.mark_closed();
   }
}
