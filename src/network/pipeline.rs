//! Pipelined Connection
//!
//! Callers queue requests without waiting; a background reader decodes the
//! replies and resolves each caller's handle.
//!
//! ## Correlation
//! ```text
//!  queue_request ──► [writer lock: encode, write, push] ──► socket
//!                                   │
//!                          FIFO of PendingCall
//!                                   │
//!  PendingResponse ◄── resolve ◄── reader thread ◄── ByteChannel ◄── socket
//! ```
//!
//! The wire carries no request identifiers, so queue order is the only
//! link between a request and its reply. The writer lock covers both the
//! write and the push, which keeps queue order equal to write order.
//!
//! In [`PipelineMode::Chunked`] the write is deferred: requests pile up in
//! a local buffer until [`PipelineConnection::flush`]. A handle whose
//! request was never flushed never resolves.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};

use crate::config::{Config, ConnectionSpec, EncodingMode, PipelineMode};
use crate::error::{Fault, FaultKind, KvError, Result};
use crate::protocol::{encode_request, ByteChannel, Command, Response};
use super::connection::ConnectionState;
use super::transport;

type CallResult = Result<Response>;

// =============================================================================
// Pending calls and result handles
// =============================================================================

/// One written (or buffered) request awaiting its reply
struct PendingCall {
    command: Command,
    result_tx: Sender<CallResult>,
}

impl PendingCall {
    fn resolve(self, result: CallResult) {
        // The caller may have dropped its handle; the reply is consumed anyway
        let _ = self.result_tx.send(result);
    }
}

/// Handle to the eventual reply of a queued request.
///
/// Dropping the handle does not cancel the request: it is already on the
/// wire (or in the chunk buffer) and its reply will still be drained.
pub struct PendingResponse {
    command: Command,
    result_rx: Receiver<CallResult>,
    taken: bool,
}

impl PendingResponse {
    /// The command this handle waits on
    pub fn command(&self) -> Command {
        self.command
    }

    /// Whether the result has arrived and not been taken
    pub fn is_ready(&self) -> bool {
        !self.result_rx.is_empty()
    }

    /// Block until the reply (or the connection's fault) arrives
    pub fn wait(mut self) -> CallResult {
        if self.taken {
            return Err(self.already_taken());
        }
        match self.result_rx.recv() {
            Ok(result) => {
                self.taken = true;
                result
            }
            Err(_) => Err(self.abandoned()),
        }
    }

    /// Block for at most `timeout`.
    ///
    /// Expiry returns [`KvError::Timeout`] and leaves both the queued call and
    /// this handle intact, so the caller may wait again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> CallResult {
        if self.taken {
            return Err(self.already_taken());
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => {
                self.taken = true;
                result
            }
            Err(RecvTimeoutError::Timeout) => Err(KvError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(self.abandoned()),
        }
    }

    /// Take the result if it has already arrived
    pub fn try_take(&mut self) -> Option<CallResult> {
        if self.taken {
            return Some(Err(self.already_taken()));
        }
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.taken = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.abandoned())),
        }
    }

    fn already_taken(&self) -> KvError {
        KvError::ResponseState(format!("{} result already taken", self.command))
    }

    fn abandoned(&self) -> KvError {
        KvError::Faulted(Fault::new(
            FaultKind::Io,
            format!("reader stopped before resolving {}", self.command),
        ))
    }
}

// =============================================================================
// Shared queue
// =============================================================================

/// Everything both paths touch, behind one lock
struct QueueState {
    calls: VecDeque<PendingCall>,

    /// Calls at the tail whose bytes are still in the chunk buffer
    unwritten: usize,

    state: ConnectionState,
    closing: bool,
}

impl QueueState {
    /// Fault the connection and fail every queued call
    fn fail_all(&mut self, fault: Fault) {
        if !self.state.is_faulted() {
            self.state = ConnectionState::Faulted(fault.clone());
        }
        for call in self.calls.drain(..) {
            call.resolve(Err(KvError::Faulted(fault.clone())));
        }
        self.unwritten = 0;
    }

    /// Command at the head of the queue, once its request is on the wire
    fn written_head(&self) -> Option<Command> {
        if self.calls.len() > self.unwritten {
            self.calls.front().map(|call| call.command)
        } else {
            None
        }
    }

    fn check_accepting(&self) -> Result<()> {
        self.state.check()?;
        if self.closing {
            return Err(KvError::Faulted(Fault::new(
                FaultKind::Closed,
                "pipeline closed by caller",
            )));
        }
        Ok(())
    }
}

struct Shared {
    queue: Mutex<QueueState>,
    ready: Condvar,
}

impl Shared {
    fn check_accepting(&self) -> Result<()> {
        self.queue.lock().check_accepting()
    }

    fn push(&self, call: PendingCall, written: bool) -> Result<()> {
        let mut queue = self.queue.lock();
        queue.check_accepting()?;
        queue.calls.push_back(call);
        if !written {
            queue.unwritten += 1;
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Every buffered request has reached the stream
    fn mark_written(&self) {
        let mut queue = self.queue.lock();
        if queue.unwritten > 0 {
            queue.unwritten = 0;
            self.ready.notify_one();
        }
    }

    /// Record a stream error seen by either path
    fn fault(&self, err: &KvError) {
        let fault = Fault::from(err);
        let mut queue = self.queue.lock();
        if !queue.state.is_faulted() {
            tracing::warn!("Pipeline faulted: {}", fault);
        }
        queue.fail_all(fault);
        self.ready.notify_all();
    }
}

/// Request side, guarded by the writer lock
struct WriteHalf<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W: Write> WriteHalf<W> {
    fn write_buffered(&mut self) -> std::io::Result<()> {
        let result = self.writer.write_all(&self.buffer).and_then(|_| self.writer.flush());
        self.buffer.clear();
        result
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection with many requests in flight and replies correlated by order.
///
/// All methods take `&self`; share it between threads with an `Arc`.
pub struct PipelineConnection<W: Write> {
    shared: Arc<Shared>,
    writer: Mutex<WriteHalf<W>>,
    encoding: EncodingMode,
    mode: PipelineMode,
    chunk_flush_threshold: Option<usize>,
    reader: Mutex<Option<JoinHandle<()>>>,
    on_fault: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<W: Write + Send> PipelineConnection<W> {
    /// Start a pipeline over an already-established stream.
    ///
    /// Spawns the background reader thread, which owns `reader` from now on.
    pub fn new<R>(reader: R, writer: W, config: &Config) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                calls: VecDeque::new(),
                unwritten: 0,
                state: ConnectionState::Ready,
                closing: false,
            }),
            ready: Condvar::new(),
        });

        let channel = ByteChannel::new(reader, config);
        let reader_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("kvwire-reader".to_string())
            .spawn(move || reader_loop(reader_shared, channel))?;

        Ok(Self {
            shared,
            writer: Mutex::new(WriteHalf {
                writer,
                buffer: BytesMut::with_capacity(4096),
            }),
            encoding: config.encoding,
            mode: config.pipeline_mode,
            chunk_flush_threshold: config.chunk_flush_threshold,
            reader: Mutex::new(Some(handle)),
            on_fault: None,
        })
    }

    /// Run `hook` when the writer faults, e.g. to shut the socket down so
    /// a reader blocked on it wakes up
    pub fn with_fault_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_fault = Some(Box::new(hook));
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Current state (a snapshot)
    pub fn state(&self) -> ConnectionState {
        self.shared.queue.lock().state.clone()
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.queue.lock().state.is_faulted()
    }

    /// Number of calls waiting for a reply
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().calls.len()
    }

    /// Bytes encoded but not yet written (chunked mode)
    pub fn buffered_bytes(&self) -> usize {
        self.writer.lock().buffer.len()
    }

    /// Queue a request and return a handle to its reply.
    ///
    /// Never waits for the network reply. In immediate mode the request is
    /// written before this returns; in chunked mode it is buffered until
    /// [`flush`](Self::flush) (or the auto-flush threshold).
    pub fn queue_request(&self, command: Command, args: &[&[u8]]) -> Result<PendingResponse> {
        let mut half = self.writer.lock();
        self.shared.check_accepting()?;

        match self.mode {
            PipelineMode::Immediate => {
                encode_request(command, args, self.encoding, &mut half.buffer)?;
                if let Err(e) = half.write_buffered() {
                    return Err(self.writer_fault(KvError::Io(e)));
                }
                self.register(command, true)
            }
            PipelineMode::Chunked => {
                encode_request(command, args, self.encoding, &mut half.buffer)?;
                let handle = self.register(command, false)?;

                if let Some(threshold) = self.chunk_flush_threshold {
                    if half.buffer.len() >= threshold {
                        tracing::trace!("Chunk threshold reached ({} bytes)", half.buffer.len());
                        self.flush_locked(&mut half)?;
                    }
                }
                Ok(handle)
            }
        }
    }

    /// Write every buffered request in one operation.
    ///
    /// A no-op in immediate mode or when nothing is buffered.
    pub fn flush(&self) -> Result<()> {
        let mut half = self.writer.lock();
        self.flush_locked(&mut half)
    }

    /// Queue, flush, and wait: a blocking call over the pipeline
    pub fn service_request(&self, command: Command, args: &[&[u8]]) -> Result<Response> {
        let handle = self.queue_request(command, args)?;
        self.flush()?;
        handle.wait()
    }

    /// Stop accepting requests, let the reader drain outstanding replies,
    /// and wait for it to exit
    pub fn close(&self) -> Result<()> {
        let flushed = self.flush();
        {
            let mut queue = self.shared.queue.lock();
            queue.closing = true;
            self.shared.ready.notify_all();
        }
        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Pipeline reader thread panicked");
            }
        }
        flushed
    }

    fn flush_locked(&self, half: &mut WriteHalf<W>) -> Result<()> {
        if half.buffer.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.shared.check_accepting() {
            half.buffer.clear();
            return Err(e);
        }

        tracing::trace!("Flushing {} buffered bytes", half.buffer.len());
        if let Err(e) = half.write_buffered() {
            return Err(self.writer_fault(KvError::Io(e)));
        }
        self.shared.mark_written();
        Ok(())
    }

    fn register(&self, command: Command, written: bool) -> Result<PendingResponse> {
        let (result_tx, result_rx) = channel::bounded(1);
        self.shared.push(PendingCall { command, result_tx }, written)?;
        Ok(PendingResponse {
            command,
            result_rx,
            taken: false,
        })
    }

    fn writer_fault(&self, err: KvError) -> KvError {
        self.shared.fault(&err);
        if let Some(hook) = &self.on_fault {
            hook();
        }
        err
    }
}

impl PipelineConnection<TcpStream> {
    /// Connect over TCP, start the reader, and run AUTH / SELECT
    pub fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let halves = transport::connect(spec)?;
        let shutdown_handle = halves.writer.try_clone()?;
        let conn = PipelineConnection::new(halves.reader, halves.writer, &spec.config)?
            .with_fault_hook(move || {
                let _ = shutdown_handle.shutdown(Shutdown::Both);
            });

        for (command, args) in transport::session_commands(spec) {
            let args: Vec<&[u8]> = args.iter().map(|a| a.as_slice()).collect();
            let response = conn.service_request(command, &args)?;
            transport::check_session_reply(&response)?;
        }

        tracing::debug!("Pipeline connected to {}", halves.peer_addr);
        Ok(conn)
    }
}

impl<W: Write> Drop for PipelineConnection<W> {
    fn drop(&mut self) {
        // Unflushed requests would leave the reader waiting on replies that
        // never come
        let half = self.writer.get_mut();
        if !half.buffer.is_empty() && !self.shared.queue.lock().state.is_faulted() {
            match half.write_buffered() {
                Ok(()) => self.shared.mark_written(),
                Err(e) => self.shared.fault(&KvError::Io(e)),
            }
        }

        let mut queue = self.shared.queue.lock();
        queue.closing = true;
        self.shared.ready.notify_all();
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Decode replies in queue order until the connection faults or closes
fn reader_loop<R: Read>(shared: Arc<Shared>, mut channel: ByteChannel<R>) {
    tracing::debug!("Pipeline reader started");

    loop {
        // Wait for a written call at the head of the queue; reading ahead of
        // an unflushed chunk would block on a reply that cannot arrive
        let command = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.state.is_faulted() {
                    tracing::debug!("Pipeline reader stopping: connection faulted");
                    return;
                }
                if let Some(command) = queue.written_head() {
                    break command;
                }
                if queue.closing {
                    tracing::debug!("Pipeline reader stopping: closed");
                    return;
                }
                shared.ready.wait(&mut queue);
            }
        };

        // Decode outside the lock so callers can keep queueing
        let mut response = Response::new(command);
        let outcome = response.read(&mut channel);

        let mut queue = shared.queue.lock();
        if queue.state.is_faulted() {
            // The writer faulted meanwhile and already failed this call
            return;
        }
        let call = match queue.calls.pop_front() {
            Some(call) => call,
            None => return,
        };

        match outcome {
            Ok(()) => {
                let terminal = response.status().map(|s| s.is_terminal()).unwrap_or(false);
                call.resolve(Ok(response));
                if terminal {
                    tracing::debug!("Pipeline closed by {}", command);
                    queue.fail_all(Fault::closed(command.name()));
                    shared.ready.notify_all();
                    return;
                }
            }
            Err(err) => {
                let fault = Fault::from(&err);
                tracing::warn!("Pipeline reader faulted on {}: {}", command, fault);
                queue.state = ConnectionState::Faulted(fault.clone());
                call.resolve(Err(err));
                queue.fail_all(fault);
                shared.ready.notify_all();
                return;
            }
        }
    }
}
