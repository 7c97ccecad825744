use crossterm::event::{Event as TermEvent, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub enum Event {
    Tick,
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// SIGINT arrived outside raw mode, or the terminal stream ended.
    Shutdown,
}

/// Pumps terminal input, ticks and SIGINT into one channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    pump: Option<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(tx, tick_rate));
        Self {
            rx,
            pump: Some(pump),
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn shutdown(mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_events(tx: mpsc::UnboundedSender<Event>, tick_rate: Duration) {
    let mut reader = EventStream::new();
    let mut tick = tokio::time::interval(tick_rate);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => Event::Shutdown,
            _ = tick.tick() => Event::Tick,
            next = reader.next() => match next {
                // Only presses; Windows-style release events would double keys
                Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => Event::Key(key),
                Some(Ok(TermEvent::Mouse(mouse))) => Event::Mouse(mouse),
                Some(Ok(TermEvent::Resize(w, h))) => Event::Resize(w, h),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!("Terminal input error: {}", e);
                    Event::Shutdown
                }
                None => Event::Shutdown,
            },
        };

        let stop = matches!(event, Event::Shutdown);
        if tx.send(event).is_err() || stop {
            break;
        }
    }
}
