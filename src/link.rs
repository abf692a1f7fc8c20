//! Link orchestrator
//!
//! Owns the reader thread that drains inbound frames into the [`Dispatcher`],
//! the shared odometry estimator fed by Odom messages, and the startup
//! handshake.
//!
//! # Startup
//!
//! 1. Reader thread starts and polls the frame source
//! 2. The first frame that decodes into a message signals readiness
//! 3. [`Link::wait_ready`] returns; [`Link::handshake`] blinks the LED with
//!    three Test messages (on, off, on) without waiting for replies
//!
//! Without a handshake timeout, step 2 blocks for as long as the controller
//! stays silent.

use crate::config::Config;
use crate::dispatch::{DispatchStats, Dispatcher, LinkSender, RegistrationPolicy};
use crate::error::{Error, Result};
use crate::odometry::{OdometryEstimator, Pose};
use crate::protocol::{Catalog, Message, Odom, Test, WireMessage};
use crate::transport::{FrameSink, FrameSource, SerialTransport, SlipReader, SlipWriter};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep between polls when the source has nothing buffered
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Back-off after a transport read error
const ERROR_SLEEP: Duration = Duration::from_millis(10);

/// Running connection to the controller
pub struct Link {
    sender: LinkSender,
    odometry: Arc<Mutex<OdometryEstimator>>,
    stats: Arc<Mutex<DispatchStats>>,
    ready_rx: Receiver<()>,
    ready: AtomicBool,
    handshake_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
}

impl Link {
    /// Empty dispatcher for the configured layout and registration policy
    ///
    /// Register application handlers on it before passing it to
    /// [`start`](Self::start).
    pub fn dispatcher(config: &Config) -> Result<Dispatcher> {
        let catalog = Catalog::for_layout(config.link.layout)?;
        Ok(Dispatcher::new(catalog, config.link.registration))
    }

    /// Spawn the reader thread
    ///
    /// Registers the Odom handler that feeds the estimator. If the dispatcher
    /// already has an Odom handler, the reject policy fails with
    /// [`Error::AlreadyRegistered`] and the replace policy drops the
    /// application's handler with a warning.
    pub fn start<S, K>(config: &Config, mut dispatcher: Dispatcher, source: S, sink: K) -> Result<Self>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        let odometry = Arc::new(Mutex::new(OdometryEstimator::from_motor_configs(
            &config.motors,
            config.odometry,
        )));

        let odom_tag = dispatcher.catalog().tag_of(Odom::KIND);
        if odom_tag.is_some_and(|tag| dispatcher.has_handler(tag))
            && dispatcher.policy() == RegistrationPolicy::Replace
        {
            log::warn!("Replacing application Odom handler with the odometry estimator");
        }

        let estimator = Arc::clone(&odometry);
        dispatcher.on::<Odom, _>(move |odom| {
            if !estimator.lock().handle(&odom) {
                log::warn!("Odom for unknown wheel {} ignored", odom.num);
            }
            Ok(())
        })?;

        let sender = dispatcher.sender(sink);
        let stats = Arc::new(Mutex::new(DispatchStats::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);

        let reader_handle = {
            let stats = Arc::clone(&stats);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("setu-link-reader".to_string())
                .spawn(move || reader_loop(dispatcher, source, shutdown, stats, ready_tx))?
        };

        log::info!("Link started ({:?} layout)", config.link.layout);

        Ok(Self {
            sender,
            odometry,
            stats,
            ready_rx,
            ready: AtomicBool::new(false),
            handshake_timeout: config.link.handshake_timeout(),
            shutdown,
            reader_handle: Some(reader_handle),
        })
    }

    /// Start, wait for the controller and run the handshake
    pub fn connect<S, K>(config: &Config, dispatcher: Dispatcher, source: S, sink: K) -> Result<Self>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        let link = Self::start(config, dispatcher, source, sink)?;
        link.wait_ready(link.handshake_timeout)?;
        link.handshake()?;
        Ok(link)
    }

    /// Open the serial device named in the config and connect over SLIP
    pub fn open(config: &Config, dispatcher: Dispatcher) -> Result<Self> {
        let port = SerialTransport::open_uri(&config.link.device_uri()?)?;
        let writer = SlipWriter::new(port.try_clone()?);
        let reader = SlipReader::new(port);
        Self::connect(config, dispatcher, reader, writer)
    }

    /// Block until the first inbound message has been decoded
    ///
    /// `None` waits indefinitely. Returns immediately once the link has been
    /// ready before.
    pub fn wait_ready(&self, timeout: Option<Duration>) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        match timeout {
            None => self.ready_rx.recv().map_err(|_| Error::Disconnected)?,
            Some(limit) => self.ready_rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => Error::HandshakeTimeout(limit),
                RecvTimeoutError::Disconnected => Error::Disconnected,
            })?,
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Blink the controller LED: Test(on), Test(off), Test(on)
    pub fn handshake(&self) -> Result<()> {
        for led in [true, false, true] {
            self.sender.send(&Test { led }.into())?;
        }
        log::info!("Handshake sent");
        Ok(())
    }

    pub fn send(&self, msg: &Message) -> Result<u32> {
        self.sender.send(msg)
    }

    /// Cloneable outbound handle
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    /// Integrate accumulated wheel deltas and return the pose
    pub fn pose(&self) -> Pose {
        self.odometry.lock().update()
    }

    /// Shared estimator
    pub fn odometry(&self) -> Arc<Mutex<OdometryEstimator>> {
        Arc::clone(&self.odometry)
    }

    /// Dispatch counters as of the last processed frame
    pub fn stats(&self) -> DispatchStats {
        *self.stats.lock()
    }

    pub fn is_running(&self) -> bool {
        self.reader_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop and join the reader thread
    pub fn shutdown(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(handle) = self.reader_handle.take() {
            log::info!("Shutting down link...");
            handle.join().map_err(|_| Error::ThreadPanic)?;
            log::info!("Link shutdown complete");
        }
        Ok(())
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error during link shutdown: {}", e);
        }
    }
}

/// Reader loop: the only place frames are dispatched
fn reader_loop<S: FrameSource>(
    mut dispatcher: Dispatcher,
    mut source: S,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<DispatchStats>>,
    ready_tx: Sender<()>,
) {
    let mut ready_sent = false;

    while !shutdown.load(Ordering::Relaxed) {
        match source.recv() {
            Ok(Some(frame)) => {
                let outcome = dispatcher.feed_frame(&frame);
                *stats.lock() = dispatcher.stats();

                if !ready_sent && outcome.is_decoded() {
                    log::info!("First message received (tag {}), controller is up", frame.tag);
                    let _ = ready_tx.try_send(());
                    ready_sent = true;
                }
            }
            Ok(None) => thread::sleep(IDLE_SLEEP),
            Err(e) => {
                log::error!("Frame read error: {}", e);
                thread::sleep(ERROR_SLEEP);
            }
        }
    }

    dispatcher.fail_pending();
    log::debug!("Reader thread exiting");
}
