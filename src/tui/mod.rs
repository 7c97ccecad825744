//! Interactive dashboard.

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod app;
pub mod events;
pub mod ui;

use crate::protocol::WidgetDocument;
use crate::refresh::{
    ActionEvent, ActionReport, ActionRunner, Scheduler, WidgetRunner, WidgetUpdate, EXTENDED_FLAG,
};
use app::{App, Request};
use events::{Event, EventHandler};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Run the dashboard until the user quits.
pub async fn run(runner: Arc<WidgetRunner>, actions: ActionRunner) -> anyhow::Result<()> {
    // Restore the terminal before the default hook prints the panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = execute!(io::stdout(), crossterm::cursor::Show);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(runner.widget_ids());
    let size = terminal.size()?;
    app.on_resize(size.width, size.height);

    let result = run_app(&mut terminal, &mut app, runner, actions).await;
    let cleanup = restore_terminal(&mut terminal);

    match (result, cleanup) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(e.into()),
    }
}

fn restore_terminal<B: ratatui::backend::Backend + io::Write>(
    terminal: &mut Terminal<B>,
) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        crossterm::cursor::Show
    )?;
    Ok(())
}

/// Background work owned by the event loop.
struct Driver {
    runner: Arc<WidgetRunner>,
    actions: ActionRunner,
    scheduler: Scheduler,
    action_events: mpsc::UnboundedSender<ActionEvent>,
    reports: mpsc::UnboundedSender<ActionReport>,
    details: mpsc::UnboundedSender<(String, WidgetDocument)>,
    action_cancel: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl Driver {
    /// Carry out a request. Returns `false` to leave the loop.
    fn dispatch(&mut self, request: Request) -> bool {
        match request {
            Request::Quit => return false,
            Request::Refresh(id) => {
                if !self.scheduler.refresh_now(&id) {
                    tracing::warn!("Refresh requested for unknown widget '{}'", id);
                }
            }
            Request::OpenDetail(id) => {
                let runner = Arc::clone(&self.runner);
                let tx = self.details.clone();
                let cancel = self.shutdown.child_token();
                tokio::spawn(async move {
                    let args = [EXTENDED_FLAG.to_string()];
                    let document = runner.refresh_with_args(&id, &args, &cancel).await;
                    let _ = tx.send((id, document));
                });
            }
            Request::RunAction {
                widget_id,
                action,
                credential,
            } => {
                let cancel = self.shutdown.child_token();
                self.action_cancel = Some(cancel.clone());
                let actions = self.actions.clone();
                let events = self.action_events.clone();
                let reports = self.reports.clone();
                tokio::spawn(async move {
                    let report = actions
                        .run(&widget_id, &action, credential.as_ref(), &cancel, events)
                        .await;
                    let _ = reports.send(report);
                });
            }
            Request::CancelAction => {
                if let Some(cancel) = self.action_cancel.take() {
                    cancel.cancel();
                }
            }
        }
        true
    }
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: Arc<WidgetRunner>,
    actions: ActionRunner,
) -> anyhow::Result<()> {
    let (update_tx, mut updates) = mpsc::channel::<WidgetUpdate>(64);
    let (event_tx, mut action_events) = mpsc::unbounded_channel();
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let (detail_tx, mut details) = mpsc::unbounded_channel();

    let mut driver = Driver {
        scheduler: Scheduler::start(Arc::clone(&runner), update_tx),
        runner,
        actions,
        action_events: event_tx,
        reports: report_tx,
        details: detail_tx,
        action_cancel: None,
        shutdown: CancellationToken::new(),
    };
    let mut events = EventHandler::new(TICK_RATE);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let request = tokio::select! {
            event = events.next() => match event {
                Some(Event::Tick) => {
                    app.on_tick();
                    None
                }
                Some(Event::Key(key)) => app.handle_key(key),
                Some(Event::Mouse(mouse)) => {
                    app.handle_mouse(mouse);
                    None
                }
                Some(Event::Resize(w, h)) => {
                    app.on_resize(w, h);
                    None
                }
                Some(Event::Shutdown) | None => Some(Request::Quit),
            },
            Some(update) = updates.recv() => {
                app.on_update(update);
                None
            }
            Some(event) = action_events.recv() => {
                app.on_action_event(event);
                None
            }
            Some(report) = reports.recv() => {
                driver.action_cancel = None;
                app.on_action_finished(report)
            }
            Some((id, document)) = details.recv() => {
                app.on_detail(id, document);
                None
            }
        };

        if let Some(request) = request {
            if !driver.dispatch(request) {
                break;
            }
        }
    }

    events.shutdown();
    driver.shutdown.cancel();
    driver.scheduler.shutdown().await;
    Ok(())
}
