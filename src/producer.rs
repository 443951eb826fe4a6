//! Secondary event producers
//!
//! Everything the dispatcher touches is owned by the thread running the
//! event loop. Work that has to happen elsewhere (polling a device, waiting
//! for an external process) runs on a [`Poller`] thread that posts
//! [`SyntheticEvent`]s back through a [`calloop::channel`]. The receiving
//! end is inserted into the event loop with [`insert_producer_source`], so
//! synthetic events are dispatched exactly like events from the display
//! server, one at a time.
//!
//! For state that genuinely has to be shared, [`Poller::spawn_locked`] runs
//! the classic "lock, mutate, unlock, sleep" loop over an `Arc<Mutex<_>>`.
//!
//! ```no_run
//! use std::time::Duration;
//! use calloop::channel;
//! use mpxwm::producer::{PollStatus, Poller, SyntheticEvent};
//! use mpxwm::rules::{Context, EventKind};
//!
//! let (sender, receiver) = channel::channel();
//! let poller = Poller::spawn("periodic", Duration::from_secs(1), sender, |events| {
//!     events.push(SyntheticEvent::Rules { kind: EventKind::Periodic, context: Context::none() });
//!     PollStatus::Continue
//! })
//! .expect("failed to spawn poller");
//! // insert `receiver` into the event loop with `insert_producer_source`
//! # drop(receiver);
//! poller.stop();
//! ```

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use calloop::{
    channel::{self, Channel, Sender},
    LoopHandle, RegistrationToken,
};
use tracing::{debug, info, warn};

use crate::{
    context::Context,
    input::{process_device_event, InputHandler, UserEvent},
    rules::{apply_event_rules, EventKind},
};

/// An event posted by a producer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    /// Dispatch the immediate rules of `kind`
    Rules {
        /// Kind to dispatch
        kind: EventKind,
        /// Context of the dispatch
        context: Context,
    },
    /// Process an input event as if a device produced it
    Input(UserEvent),
}

/// What a poll function wants its thread to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Sleep, then poll again
    Continue,
    /// Exit the thread
    Stop,
}

/// Handle to a producer thread
///
/// Dropping the handle asks the thread to stop after its current sleep
/// without waiting for it.
#[derive(Debug)]
pub struct Poller {
    name: String,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

fn spawn_named<F>(name: &str, task: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(format!("mpxwm-{name}")).spawn(task)
}

impl Poller {
    /// Spawn a thread calling `poll` every `interval` and sending what it produced
    ///
    /// `poll` pushes events into the buffer it is given; they are sent in
    /// order after it returns. The thread exits when [`Poller::stop`] is
    /// called, when the handle is dropped, when the receiving side of the
    /// channel is gone, or when `poll` returns [`PollStatus::Stop`].
    pub fn spawn<F>(name: &str, interval: Duration, sender: Sender<SyntheticEvent>, mut poll: F) -> io::Result<Self>
    where
        F: FnMut(&mut Vec<SyntheticEvent>) -> PollStatus + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let thread_name = name.to_owned();
        let thread = spawn_named(name, move || {
            let mut events = Vec::new();
            while !flag.load(Ordering::Acquire) {
                let status = poll(&mut events);
                for event in events.drain(..) {
                    if sender.send(event).is_err() {
                        debug!(poller = %thread_name, "event loop is gone, stopping");
                        return;
                    }
                }
                if status == PollStatus::Stop {
                    break;
                }
                thread::sleep(interval);
            }
            debug!(poller = %thread_name, "poller stopped");
        })?;
        info!(poller = name, ?interval, "spawned poller");
        Ok(Poller {
            name: name.to_owned(),
            shutdown,
            thread: Some(thread),
        })
    }

    /// Spawn a thread that locks `state`, calls `poll` on it, unlocks and sleeps
    ///
    /// The thread also exits if the lock is poisoned.
    pub fn spawn_locked<D, F>(name: &str, interval: Duration, state: Arc<Mutex<D>>, mut poll: F) -> io::Result<Self>
    where
        D: Send + 'static,
        F: FnMut(&mut D) -> PollStatus + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let thread_name = name.to_owned();
        let thread = spawn_named(name, move || {
            while !flag.load(Ordering::Acquire) {
                let status = match state.lock() {
                    Ok(mut guard) => poll(&mut guard),
                    Err(_) => {
                        warn!(poller = %thread_name, "state lock poisoned, stopping");
                        return;
                    }
                };
                if status == PollStatus::Stop {
                    break;
                }
                thread::sleep(interval);
            }
            debug!(poller = %thread_name, "poller stopped");
        })?;
        info!(poller = name, ?interval, "spawned locked poller");
        Ok(Poller {
            name: name.to_owned(),
            shutdown,
            thread: Some(thread),
        })
    }

    /// Name of the poller, without the thread name prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    /// Ask the thread to stop and wait for it
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(poller = %self.name, "poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Dispatch one synthetic event
///
/// Returns the result of the dispatch.
pub fn dispatch_synthetic<D: InputHandler>(data: &mut D, event: SyntheticEvent) -> bool {
    match event {
        SyntheticEvent::Rules { kind, context } => apply_event_rules(data, kind, context),
        SyntheticEvent::Input(event) => process_device_event(data, event),
    }
}

/// Insert the receiving side of a producer channel into the event loop
///
/// Every event received is passed to [`dispatch_synthetic`].
pub fn insert_producer_source<'l, D: InputHandler + 'l>(
    handle: &LoopHandle<'l, D>,
    receiver: Channel<SyntheticEvent>,
) -> Result<RegistrationToken, calloop::Error> {
    handle
        .insert_source(receiver, |event, _, data: &mut D| {
            if let channel::Event::Msg(event) = event {
                dispatch_synthetic(data, event);
            }
        })
        .map_err(|err| err.error)
}
