use super::config::BridgeConfig;
use super::handlers::MessageHandler;
use super::{BusConnection, BusTransport, InboundStream};
use crate::error::BusError;
use bytes::Bytes;
use k8s_openapi::serde_json;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::{StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type HandlerMap = HashMap<String, Arc<dyn MessageHandler>>;

/// One outbound send, marshalled onto the bridge loop.
struct PublishRequest {
    subject: String,
    payload: Bytes,
    done: SyncSender<Result<(), BusError>>,
}

impl PublishRequest {
    fn complete(self, result: Result<(), BusError>) {
        // The caller may have timed out and gone away already.
        let _ = self.done.send(result);
    }
}

/// Flags of one loop thread.
///
/// Every `start()` gets fresh flags, so a loop that is still winding down
/// can never clear the state of the loop that replaced it.
#[derive(Debug, Default)]
struct LoopFlags {
    running: AtomicBool,
    connected: AtomicBool,
}

impl LoopFlags {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Handle to a running loop thread
struct LoopHandle {
    outbound: mpsc::UnboundedSender<PublishRequest>,
    shutdown: CancellationToken,
    flags: Arc<LoopFlags>,
    thread: JoinHandle<()>,
}

/// Everything the loop thread owns
struct LoopContext {
    url: String,
    transport: Arc<dyn BusTransport>,
    handlers: Arc<HandlerMap>,
    config: BridgeConfig,
    flags: Arc<LoopFlags>,
    outbound: mpsc::UnboundedReceiver<PublishRequest>,
    shutdown: CancellationToken,
}

/// Bridge between synchronous callers and the bus event loop.
///
/// The connection lives on a dedicated thread running a current-thread tokio
/// runtime. `publish` hands the send to that loop and blocks the caller until
/// the loop reports back or `publish_timeout` passes. The same loop receives
/// inbound messages and runs the registered handler for each one, so handlers
/// must not block for long.
pub struct MessageBridge {
    url: String,
    transport: Arc<dyn BusTransport>,
    handlers: Arc<HandlerMap>,
    config: BridgeConfig,
    state: Mutex<Option<LoopHandle>>,
}

impl MessageBridge {
    #[must_use]
    pub fn new(url: impl Into<String>, transport: Arc<dyn BusTransport>) -> Self {
        Self::with_config(url, transport, BridgeConfig::default())
    }

    #[must_use]
    pub fn with_config(
        url: impl Into<String>,
        transport: Arc<dyn BusTransport>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            handlers: Arc::new(HashMap::new()),
            config,
            state: Mutex::new(None),
        }
    }

    /// Register `handler` for `subject`. Subscriptions are made on `start()`.
    #[must_use]
    pub fn with_handler(mut self, subject: &str, handler: Arc<dyn MessageHandler>) -> Self {
        Arc::make_mut(&mut self.handlers).insert(subject.to_string(), handler);
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.handlers.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current_flags().is_some_and(|flags| flags.is_connected())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current_flags().is_some_and(|flags| flags.is_running())
    }

    fn current_flags(&self) -> Option<Arc<LoopFlags>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|handle| handle.flags.clone())
    }

    /// Spawn the loop thread and wait up to `connect_grace` for it to connect.
    ///
    /// Returns whether the bridge is connected at that point. A connection
    /// that completes after the grace period is still picked up by later
    /// publishes. After a failed connect the next call starts over.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = state.as_ref() {
            if handle.flags.is_running() && !handle.thread.is_finished() {
                info!("NATS bridge already running");
                return handle.flags.is_connected();
            }
        }
        // The previous loop gave up on its connection; it only has its
        // runtime left to drop.
        if let Some(old) = state.take() {
            let _ = old.thread.join();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = sync_channel(1);
        let shutdown = CancellationToken::new();
        let flags = Arc::new(LoopFlags {
            running: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        });
        let context = LoopContext {
            url: self.url.clone(),
            transport: self.transport.clone(),
            handlers: self.handlers.clone(),
            config: self.config.clone(),
            flags: flags.clone(),
            outbound: outbound_rx,
            shutdown: shutdown.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("nats-bridge".to_string())
            .spawn(move || run_thread(context, &ready_tx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                error!("❌ Failed to spawn NATS bridge thread: {}", e);
                return false;
            }
        };

        *state = Some(LoopHandle {
            outbound: outbound_tx,
            shutdown,
            flags: flags.clone(),
            thread,
        });
        drop(state);

        match ready_rx.recv_timeout(self.config.connect_grace) {
            Ok(connected) => connected,
            Err(_) => {
                warn!(
                    "⚠️  NATS not connected within {}ms, continuing without it",
                    self.config.connect_grace.as_millis()
                );
                flags.is_connected()
            }
        }
    }

    /// Publish `payload` as JSON on `subject`, blocking until the loop has
    /// sent it or the publish timeout passes.
    ///
    /// Never call this from a message handler: handlers run on the loop this
    /// waits for.
    pub fn publish<T: Serialize + ?Sized>(&self, subject: &str, payload: &T) -> bool {
        let result = encode(subject, payload).and_then(|bytes| self.send(subject, bytes));
        report(subject, result)
    }

    /// `publish` for async callers: the blocking wait runs on tokio's
    /// blocking pool instead of a runtime worker.
    pub async fn publish_async<T: Serialize + ?Sized>(
        self: &Arc<Self>,
        subject: &str,
        payload: &T,
    ) -> bool {
        if !self.is_connected() {
            return report(subject, Err(BusError::NotConnected));
        }
        let bytes = match encode(subject, payload) {
            Ok(bytes) => bytes,
            Err(e) => return report(subject, Err(e)),
        };

        let bridge = Arc::clone(self);
        let subject = subject.to_string();
        tokio::task::spawn_blocking(move || {
            let result = bridge.send(&subject, bytes);
            report(&subject, result)
        })
        .await
        .unwrap_or_else(|e| {
            error!("❌ Publish task failed: {}", e);
            false
        })
    }

    /// Hand raw bytes to the loop and wait for the outcome.
    ///
    /// # Errors
    ///
    /// `NotConnected` before a successful connect, `Closed` if the loop is
    /// gone, `Timeout` when the loop does not answer in time, or the
    /// transport's own publish error.
    pub fn send(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        let outbound = match self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(handle) if handle.flags.is_connected() => handle.outbound.clone(),
            _ => return Err(BusError::NotConnected),
        };

        let (done_tx, done_rx) = sync_channel(1);
        outbound
            .send(PublishRequest {
                subject: subject.to_string(),
                payload,
                done: done_tx,
            })
            .map_err(|_| BusError::Closed)?;

        match done_rx.recv_timeout(self.config.publish_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BusError::Timeout {
                subject: subject.to_string(),
                timeout_ms: self.config.publish_timeout.as_millis(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }

    /// Stop the loop and wait for its thread. In-flight sends get up to
    /// `drain_timeout` to finish. Calling this again is a no-op.
    pub fn stop(&self) {
        let handle = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        info!("🛑 Stopping NATS bridge...");
        handle.flags.running.store(false, Ordering::SeqCst);
        handle.shutdown.cancel();
        drop(handle.outbound);
        if handle.thread.join().is_err() {
            error!("❌ NATS bridge thread panicked");
        }
        handle.flags.connected.store(false, Ordering::SeqCst);
        info!("NATS bridge stopped");
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MessageBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBridge")
            .field("url", &self.url)
            .field("subjects", &self.subjects())
            .field("running", &self.is_running())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

fn encode<T: Serialize + ?Sized>(subject: &str, payload: &T) -> Result<Bytes, BusError> {
    serde_json::to_vec(payload)
        .map(Bytes::from)
        .map_err(|e| BusError::Serialize {
            subject: subject.to_string(),
            reason: e.to_string(),
        })
}

fn report(subject: &str, result: Result<(), BusError>) -> bool {
    match result {
        Ok(()) => {
            debug!("📤 Published to {}", subject);
            true
        }
        Err(BusError::NotConnected) => {
            debug!("NATS not connected, dropping message for {}", subject);
            false
        }
        Err(e) => {
            warn!("⚠️  Error publishing to NATS: {}", e);
            false
        }
    }
}

fn run_thread(context: LoopContext, ready: &SyncSender<bool>) {
    let flags = context.flags.clone();
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run_loop(context, ready)),
        Err(e) => {
            error!("❌ Failed to build NATS bridge runtime: {}", e);
            give_up(&flags, ready);
        }
    }
    flags.running.store(false, Ordering::SeqCst);
}

/// Mark the loop as finished before telling `start()`, so a retry that
/// wakes on the answer spawns a new loop.
fn give_up(flags: &LoopFlags, ready: &SyncSender<bool>) {
    flags.running.store(false, Ordering::SeqCst);
    let _ = ready.send(false);
}

async fn run_loop(mut context: LoopContext, ready: &SyncSender<bool>) {
    let connecting = context.transport.connect(&context.url);
    let connection = tokio::select! {
        () = context.shutdown.cancelled() => {
            info!("NATS bridge stopped while connecting");
            give_up(&context.flags, ready);
            return;
        }
        result = connecting => match result {
            Ok(connection) => connection,
            Err(e) => {
                error!("❌ NATS connection error: {}", e);
                give_up(&context.flags, ready);
                return;
            }
        },
    };
    info!("Connected to NATS at {}", context.url);

    let inbound = subscribe_all(connection.as_ref(), &context.handlers).await;
    context.flags.connected.store(true, Ordering::SeqCst);
    let _ = ready.send(true);

    dispatch(&mut context, &connection, inbound).await;

    context.flags.connected.store(false, Ordering::SeqCst);
    if let Err(e) = connection.flush().await {
        warn!("⚠️  NATS flush on shutdown failed: {}", e);
    }
    info!("NATS bridge loop exited");
}

async fn subscribe_all(
    connection: &dyn BusConnection,
    handlers: &HandlerMap,
) -> StreamMap<String, InboundStream> {
    let mut inbound = StreamMap::new();
    for subject in handlers.keys() {
        match connection.subscribe(subject).await {
            Ok(stream) => {
                inbound.insert(subject.clone(), stream);
            }
            Err(e) => error!("❌ Error setting up NATS subscription: {}", e),
        }
    }
    info!("NATS subscriptions established ({} subjects)", inbound.len());
    inbound
}

async fn dispatch(
    context: &mut LoopContext,
    connection: &Arc<dyn BusConnection>,
    mut inbound: StreamMap<String, InboundStream>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            () = context.shutdown.cancelled() => break,
            request = context.outbound.recv() => {
                let Some(request) = request else { break };
                let connection = connection.clone();
                in_flight.spawn(async move {
                    let result = connection
                        .publish(&request.subject, request.payload.clone())
                        .await;
                    request.complete(result);
                });
            }
            Some((subject, message)) = inbound.next(), if !inbound.is_empty() => {
                if let Some(handler) = context.handlers.get(&subject) {
                    handler.handle(&message, connection.as_ref()).await;
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    // Requests that never reached a send fail now instead of timing out.
    context.outbound.close();
    while let Ok(request) = context.outbound.try_recv() {
        request.complete(Err(BusError::Closed));
    }

    let drain = async { while in_flight.join_next().await.is_some() {} };
    if tokio::time::timeout(context.config.drain_timeout, drain).await.is_err() {
        warn!(
            "⚠️  {} NATS sends still pending after {}ms, abandoning them",
            in_flight.len(),
            context.config.drain_timeout.as_millis()
        );
        in_flight.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryTransport;
    use std::time::{Duration, Instant};

    fn quick_config() -> BridgeConfig {
        BridgeConfig {
            connect_grace: Duration::from_secs(2),
            publish_timeout: Duration::from_millis(300),
            drain_timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_publish_before_start_fails_fast() {
        let bridge = MessageBridge::new("memory://", Arc::new(MemoryTransport::new()));
        let start = Instant::now();
        assert!(!bridge.publish("k8s.metrics", &"hello"));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(matches!(
            bridge.send("k8s.metrics", Bytes::from_static(b"x")),
            Err(BusError::NotConnected)
        ));
    }

    #[test]
    fn test_start_publish_stop() {
        let transport = MemoryTransport::new();
        let bridge = MessageBridge::with_config(
            "memory://",
            Arc::new(transport.clone()),
            quick_config(),
        );

        assert!(bridge.start());
        assert!(bridge.is_running());
        assert!(bridge.publish("k8s.metrics", &serde_json::json!({"podCount": 1})));
        assert_eq!(transport.published_on("k8s.metrics").len(), 1);

        bridge.stop();
        bridge.stop();
        assert!(!bridge.is_running());
        assert!(!bridge.is_connected());
        assert!(!bridge.publish("k8s.metrics", &1));
    }

    #[test]
    fn test_second_start_reuses_loop() {
        let transport = MemoryTransport::new();
        let bridge = MessageBridge::with_config(
            "memory://",
            Arc::new(transport.clone()),
            quick_config(),
        );
        assert!(bridge.start());
        assert!(bridge.start());
        assert_eq!(transport.connection_count(), 1);
    }

    #[test]
    fn test_failed_connect_leaves_bridge_disconnected() {
        let transport = MemoryTransport::new();
        transport.refuse_connections(true);
        let bridge = MessageBridge::with_config(
            "memory://",
            Arc::new(transport.clone()),
            quick_config(),
        );

        assert!(!bridge.start());
        assert!(!bridge.is_connected());
        assert!(!bridge.is_running());
        let start = Instant::now();
        assert!(!bridge.publish("k8s.metrics", &1));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_start_right_after_refused_connect_reconnects() {
        let transport = MemoryTransport::new();
        transport.refuse_connections(true);
        let bridge = MessageBridge::with_config(
            "memory://",
            Arc::new(transport.clone()),
            quick_config(),
        );

        for _ in 0..20 {
            assert!(!bridge.start());
        }
        transport.refuse_connections(false);
        assert!(bridge.start());
        assert!(bridge.is_running());
        assert!(bridge.publish("k8s.metrics", &1));
        assert_eq!(transport.connection_count(), 1);
    }

    #[test]
    fn test_stop_cancels_a_pending_connect() {
        let transport = MemoryTransport::new();
        transport.set_connect_delay(Duration::from_secs(30));
        let bridge = MessageBridge::with_config(
            "memory://",
            Arc::new(transport.clone()),
            BridgeConfig {
                connect_grace: Duration::from_millis(100),
                ..quick_config()
            },
        );

        assert!(!bridge.start());
        assert!(bridge.is_running());

        let start = Instant::now();
        bridge.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!bridge.is_running());
        assert_eq!(transport.connection_count(), 0);
    }
}
