/*
 * Repeating timer used to re-persist the in-memory session every few
 * seconds. The timer thread never touches the store: it only sends a tick
 * over a channel. The owner drains pending ticks on its own thread and runs
 * the save there, so all store access stays on a single logical thread.
 *
 * Stopping (or dropping) the timer signals the thread and joins it.
 */
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

pub struct RepeatingTimer {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    tick_rx: Receiver<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl RepeatingTimer {
    pub fn start(interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (tick_tx, tick_rx) = mpsc::channel::<()>();

        let join_handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if tick_tx.send(()).is_err() {
                            // Owner is gone.
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::trace!("RepeatingTimer: Timer thread exiting.");
        });

        log::debug!("RepeatingTimer: Started with interval {interval:?}.");
        RepeatingTimer {
            interval,
            stop_tx: Some(stop_tx),
            tick_rx,
            join_handle: Some(join_handle),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /* Number of ticks fired since the last call, without blocking. */
    pub fn drain_ticks(&self) -> usize {
        self.tick_rx.try_iter().count()
    }

    /* Blocks up to `timeout` for the next tick. */
    pub fn wait_tick(&self, timeout: Duration) -> bool {
        self.tick_rx.recv_timeout(timeout).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                log::error!("RepeatingTimer: Timer thread panicked.");
            } else {
                log::debug!("RepeatingTimer: Stopped.");
            }
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_timer_emits_ticks() {
        let timer = RepeatingTimer::start(Duration::from_millis(10));
        assert!(timer.wait_tick(Duration::from_secs(2)));
        assert!(timer.wait_tick(Duration::from_secs(2)));
    }

    #[test]
    fn test_stop_joins_and_no_more_ticks() {
        let mut timer = RepeatingTimer::start(Duration::from_millis(5));
        assert!(timer.wait_tick(Duration::from_secs(2)));
        timer.stop();
        assert!(!timer.is_running());
        // Anything queued before stop may still be drained; nothing new arrives.
        timer.drain_ticks();
        assert!(!timer.wait_tick(Duration::from_millis(50)));
    }

    #[test]
    fn test_drop_stops_promptly() {
        let timer = RepeatingTimer::start(Duration::from_secs(3600));
        let started = Instant::now();
        drop(timer);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_drain_ticks_does_not_block() {
        let timer = RepeatingTimer::start(Duration::from_secs(3600));
        assert_eq!(timer.drain_ticks(), 0);
        assert_eq!(timer.interval(), Duration::from_secs(3600));
    }
}
