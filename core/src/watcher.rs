//! Live countdown for the user's active pending reservation.
//!
//! `ReservationWatcher` owns at most one countdown task. Starting a new one
//! cancels the previous one, and `stop` (or dropping the watcher) guarantees
//! that nothing is emitted afterwards: the task sends through an `Emitter`
//! whose sender is taken out under a lock when the watcher stops, so a tick
//! already in flight cannot slip through after `stop` returns.
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut watcher = ReservationWatcher::new(tx);
//! watcher.start(&ticket)?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         CountdownEvent::Tick { display, .. } => label.set(display),
//!         CountdownEvent::Expired { ticket_id } => tracker.on_local_expiry(ticket_id),
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::countdown::{format_remaining, Clock, Countdown, SystemClock, WatchError};
use crate::types::{Ticket, TicketId};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// What the watcher reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick {
        ticket_id: TicketId,
        seconds_remaining: i64,
        display: String,
    },
    /// Terminal. Sent exactly once per started countdown.
    Expired { ticket_id: TicketId },
}

/// Sender slot shared between the watcher and its task.
#[derive(Clone)]
struct Emitter {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<CountdownEvent>>>>,
}

impl Emitter {
    fn new(tx: mpsc::UnboundedSender<CountdownEvent>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Returns false once closed or when the receiver is gone.
    fn emit(&self, event: CountdownEvent) -> bool {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn close(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

struct Running {
    ticket_id: TicketId,
    emitter: Emitter,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ReservationWatcher {
    events: mpsc::UnboundedSender<CountdownEvent>,
    clock: Arc<dyn Clock>,
    period: Duration,
    running: Option<Running>,
}

impl ReservationWatcher {
    pub fn new(events: mpsc::UnboundedSender<CountdownEvent>) -> Self {
        Self::with_clock(events, SystemClock)
    }

    pub fn with_clock(events: mpsc::UnboundedSender<CountdownEvent>, clock: impl Clock) -> Self {
        Self {
            events,
            clock: Arc::new(clock),
            period: DEFAULT_TICK,
            running: None,
        }
    }

    /// Wall-clock watcher ticking at the configured cadence.
    pub fn from_config(events: mpsc::UnboundedSender<CountdownEvent>, config: &ClientConfig) -> Self {
        Self::new(events).with_period(config.tick)
    }

    /// Override the tick cadence. A zero period is ignored.
    pub fn with_period(mut self, period: Duration) -> Self {
        if period.is_zero() {
            tracing::warn!("zero countdown period ignored");
        } else {
            self.period = period;
        }
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Begin counting down `ticket`'s hold.
    ///
    /// Fails without side effects unless the ticket is reserved, unpaid and
    /// carries a deadline. An unreadable deadline is treated as already
    /// expired. Must be called from within a tokio runtime.
    pub fn start(&mut self, ticket: &Ticket) -> Result<(), WatchError> {
        match Countdown::for_ticket(ticket) {
            Ok(countdown) => {
                self.start_countdown(countdown);
                Ok(())
            }
            Err(WatchError::InvalidExpiry { ticket_id, raw }) => {
                tracing::warn!(%ticket_id, %raw, "unreadable reservation expiry, treating as expired");
                self.stop();
                let _ = self.events.send(CountdownEvent::Expired { ticket_id });
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn start_countdown(&mut self, countdown: Countdown) {
        self.stop();
        let ticket_id = countdown.ticket_id();

        if countdown.is_expired_at(self.clock.now()) {
            tracing::debug!(%ticket_id, "reservation already past its deadline");
            let _ = self.events.send(CountdownEvent::Expired { ticket_id });
            return;
        }

        let emitter = Emitter::new(self.events.clone());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_countdown(
            countdown,
            Arc::clone(&self.clock),
            self.period,
            emitter.clone(),
            cancel.clone(),
        ));
        tracing::debug!(%ticket_id, expires_at = %countdown.expires_at(), "countdown started");

        self.running = Some(Running {
            ticket_id,
            emitter,
            cancel,
            handle,
        });
    }

    /// Cancel the current countdown. Idempotent.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.emitter.close();
            running.cancel.cancel();
            running.handle.abort();
            tracing::debug!(ticket_id = %running.ticket_id, "countdown stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Ticket of the countdown started last, until `stop`.
    pub fn ticket_id(&self) -> Option<TicketId> {
        self.running.as_ref().map(|running| running.ticket_id)
    }
}

impl Drop for ReservationWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_countdown(
    countdown: Countdown,
    clock: Arc<dyn Clock>,
    period: Duration,
    emitter: Emitter,
    cancel: CancellationToken,
) {
    let ticket_id = countdown.ticket_id();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }

        let seconds_remaining = countdown.remaining_at(clock.now());
        if seconds_remaining <= 0 {
            if emitter.emit(CountdownEvent::Expired { ticket_id }) {
                tracing::info!(%ticket_id, "reservation hold expired locally");
            }
            return;
        }

        let tick = CountdownEvent::Tick {
            ticket_id,
            seconds_remaining,
            display: format_remaining(seconds_remaining),
        };
        if !emitter.emit(tick) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::AnchoredClock;
    use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn reserved(id: i64, expires_at: NaiveDateTime) -> Ticket {
        Ticket {
            id: TicketId(id),
            seat_number: 3,
            price: 250.0,
            is_paid: false,
            is_reserved: true,
            reservation_expires_at: Some(expires_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
            created_date: None,
            trip: None,
            passenger: None,
        }
    }

    fn watcher() -> (ReservationWatcher, mpsc::UnboundedReceiver<CountdownEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReservationWatcher::with_clock(tx, AnchoredClock::at(t0())), rx)
    }

    async fn quiet(rx: &mut mpsc::UnboundedReceiver<CountdownEvent>) -> bool {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .is_err()
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_then_expires_once() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(1, t0() + ChronoDuration::seconds(3)))
            .unwrap();

        let mut remaining = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                CountdownEvent::Tick {
                    seconds_remaining, ..
                } => remaining.push(seconds_remaining),
                CountdownEvent::Expired { ticket_id } => {
                    assert_eq!(ticket_id, TicketId(1));
                    break;
                }
            }
        }

        assert_eq!(remaining.first(), Some(&3));
        assert!(remaining.windows(2).all(|w| w[0] > w[1]));
        assert!(remaining.iter().all(|s| *s > 0));
        assert!(quiet(&mut rx).await, "nothing after expiry");
        assert!(!watcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_formatted() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(1, t0() + ChronoDuration::seconds(125)))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CountdownEvent::Tick {
                ticket_id: TicketId(1),
                seconds_remaining: 125,
                display: "02:05".into(),
            }
        );
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_expires_immediately() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(2, t0() - ChronoDuration::seconds(10)))
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            CountdownEvent::Expired {
                ticket_id: TicketId(2)
            }
        );
        assert!(!watcher.is_running());
        assert!(quiet(&mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_deadline_expires_immediately() {
        let (mut watcher, mut rx) = watcher();
        let mut ticket = reserved(3, t0());
        ticket.reservation_expires_at = Some("soon".into());

        watcher.start(&ticket).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            CountdownEvent::Expired {
                ticket_id: TicketId(3)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn paid_ticket_is_rejected_without_emission() {
        let (mut watcher, mut rx) = watcher();
        let mut ticket = reserved(4, t0() + ChronoDuration::seconds(60));
        ticket.is_paid = true;

        assert_eq!(
            watcher.start(&ticket),
            Err(WatchError::NotPending(TicketId(4)))
        );
        assert!(rx.try_recv().is_err());
        assert!(!watcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_the_countdown() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(5, t0() + ChronoDuration::seconds(100)))
            .unwrap();
        assert!(matches!(rx.recv().await, Some(CountdownEvent::Tick { .. })));

        watcher.stop();
        watcher.stop();
        assert!(watcher.ticket_id().is_none());
        assert!(quiet(&mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_countdown() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(6, t0() + ChronoDuration::seconds(100)))
            .unwrap();
        watcher
            .start(&reserved(7, t0() + ChronoDuration::seconds(2)))
            .unwrap();
        assert_eq!(watcher.ticket_id(), Some(TicketId(7)));

        let mut seen = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
            seen.push(event);
        }
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|e| match e {
            CountdownEvent::Tick { ticket_id, .. } | CountdownEvent::Expired { ticket_id } =>
                *ticket_id == TicketId(7),
        }));
        assert_eq!(
            seen.last(),
            Some(&CountdownEvent::Expired {
                ticket_id: TicketId(7)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_watcher_closes_the_channel() {
        let (mut watcher, mut rx) = watcher();
        watcher
            .start(&reserved(8, t0() + ChronoDuration::seconds(100)))
            .unwrap();
        assert!(rx.recv().await.is_some());

        drop(watcher);
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("channel should close");
        assert!(next.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_tick_sets_the_cadence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = ClientConfig {
            tick: Duration::from_millis(250),
            ..ClientConfig::default()
        };
        let mut watcher = ReservationWatcher::from_config(tx, &config);
        assert_eq!(watcher.period(), Duration::from_millis(250));

        let deadline = chrono::Local::now().naive_local() + ChronoDuration::seconds(100);
        watcher.start(&reserved(9, deadline)).unwrap();
        assert!(matches!(rx.recv().await, Some(CountdownEvent::Tick { .. })));

        let before = tokio::time::Instant::now();
        assert!(matches!(rx.recv().await, Some(CountdownEvent::Tick { .. })));
        assert_eq!(before.elapsed(), Duration::from_millis(250));
        watcher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_keeps_the_default() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher =
            ReservationWatcher::with_clock(tx, AnchoredClock::at(t0())).with_period(Duration::ZERO);
        assert_eq!(watcher.period(), DEFAULT_TICK);

        watcher
            .start(&reserved(10, t0() + ChronoDuration::seconds(2)))
            .unwrap();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            let done = matches!(event, CountdownEvent::Expired { .. });
            last = Some(event);
            if done {
                break;
            }
        }
        assert_eq!(
            last,
            Some(CountdownEvent::Expired {
                ticket_id: TicketId(10)
            })
        );
    }
}
