use crate::exec::{Credential, TerminationCause};
use crate::protocol::{ActionSpec, WidgetDocument};
use crate::refresh::{ActionEvent, ActionReport, WidgetUpdate};
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const LOG_BUFFER_SIZE: usize = 500;

/// Panel columns for a terminal width.
pub fn columns_for_width(width: u16) -> usize {
    match width {
        0..=99 => 1,
        100..=159 => 2,
        _ => 3,
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: MessageLevel,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Work the event loop has to carry out on behalf of the app.
#[derive(Debug, Clone)]
pub enum Request {
    Quit,
    Refresh(String),
    /// Run the widget with `--extended` for the detail view.
    OpenDetail(String),
    RunAction {
        widget_id: String,
        action: ActionSpec,
        credential: Option<Credential>,
    },
    CancelAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Dashboard,
    /// Extended document of one widget; `None` while it loads.
    Detail {
        id: String,
        document: Option<WidgetDocument>,
    },
}

#[derive(Debug, Clone)]
pub enum Overlay {
    None,
    Help,
    ActionMenu { selected: usize },
    Confirm { action: ActionSpec },
    Password { action: ActionSpec, input: String },
}

#[derive(Debug, Clone)]
pub struct WidgetPanel {
    pub id: String,
    pub document: Option<WidgetDocument>,
    pub refreshed_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Stdout,
    Stderr,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub kind: LogKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RunningAction {
    pub widget_id: String,
    pub label: String,
    pub started: Instant,
}

pub struct App {
    pub widgets: Vec<WidgetPanel>,
    pub selected: usize,
    pub view: View,
    pub overlay: Overlay,
    pub action_log: VecDeque<LogLine>,
    pub running_action: Option<RunningAction>,
    pub status_message: Option<StatusMessage>,
    pub terminal_width: u16,
    pub terminal_height: u16,
}

impl App {
    pub fn new(widget_ids: Vec<String>) -> Self {
        Self {
            widgets: widget_ids
                .into_iter()
                .map(|id| WidgetPanel {
                    id,
                    document: None,
                    refreshed_at: None,
                })
                .collect(),
            selected: 0,
            view: View::Dashboard,
            overlay: Overlay::None,
            action_log: VecDeque::new(),
            running_action: None,
            status_message: None,
            terminal_width: 80,
            terminal_height: 24,
        }
    }

    pub fn columns(&self) -> usize {
        columns_for_width(self.terminal_width)
    }

    pub fn selected_panel(&self) -> Option<&WidgetPanel> {
        self.widgets.get(self.selected)
    }

    fn selected_actions(&self) -> &[ActionSpec] {
        self.selected_panel()
            .and_then(|p| p.document.as_ref())
            .map(|d| d.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Handle a key press; returns work for the event loop, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Request> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Request::Quit);
        }

        match std::mem::replace(&mut self.overlay, Overlay::None) {
            Overlay::None => {}
            Overlay::Help => {
                if !matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                    self.overlay = Overlay::Help;
                }
                return None;
            }
            Overlay::ActionMenu { selected } => return self.handle_menu_key(key, selected),
            Overlay::Confirm { action } => return self.handle_confirm_key(key, action),
            Overlay::Password { action, input } => {
                return self.handle_password_key(key, action, input)
            }
        }

        match key.code {
            KeyCode::Char('q') => return Some(Request::Quit),
            KeyCode::Char('?') => {
                self.overlay = Overlay::Help;
                return None;
            }
            _ => {}
        }

        match &self.view {
            View::Dashboard => self.handle_dashboard_key(key),
            View::Detail { id, .. } => {
                let id = id.clone();
                self.handle_detail_key(key, id)
            }
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.view != View::Dashboard || !matches!(self.overlay, Overlay::None) {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollUp => self.select_previous(),
            MouseEventKind::ScrollDown => self.select_next(),
            _ => {}
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) -> Option<Request> {
        match key.code {
            KeyCode::Tab | KeyCode::Right | KeyCode::Down | KeyCode::Char('j') => {
                self.select_next()
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous()
            }
            KeyCode::Char('r') => {
                let id = self.selected_panel()?.id.clone();
                self.set_status(&format!("Refreshing '{}'", id), MessageLevel::Info, 2);
                return Some(Request::Refresh(id));
            }
            KeyCode::Char('a') => {
                if self.selected_actions().is_empty() {
                    self.set_status("This widget has no actions", MessageLevel::Warning, 3);
                } else {
                    self.overlay = Overlay::ActionMenu { selected: 0 };
                }
            }
            KeyCode::Enter => {
                let id = self.selected_panel()?.id.clone();
                self.view = View::Detail {
                    id: id.clone(),
                    document: None,
                };
                return Some(Request::OpenDetail(id));
            }
            KeyCode::Esc => {
                if self.running_action.is_some() {
                    return Some(Request::CancelAction);
                }
            }
            _ => {}
        }
        None
    }

    fn handle_detail_key(&mut self, key: KeyEvent, id: String) -> Option<Request> {
        match key.code {
            KeyCode::Esc => {
                if self.running_action.is_some() {
                    return Some(Request::CancelAction);
                }
                self.view = View::Dashboard;
            }
            KeyCode::Char('r') => return Some(Request::OpenDetail(id)),
            KeyCode::Char('a') => {
                if !self.selected_actions().is_empty() {
                    self.overlay = Overlay::ActionMenu { selected: 0 };
                }
            }
            _ => {}
        }
        None
    }

    fn handle_menu_key(&mut self, key: KeyEvent, selected: usize) -> Option<Request> {
        let count = self.selected_actions().len();
        if count == 0 {
            return None;
        }
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => {
                self.overlay = Overlay::ActionMenu {
                    selected: selected.checked_sub(1).unwrap_or(count - 1),
                };
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.overlay = Overlay::ActionMenu {
                    selected: (selected + 1) % count,
                };
            }
            KeyCode::Enter => {
                let action = self.selected_actions().get(selected.min(count - 1))?.clone();
                if action.flags.danger {
                    self.overlay = Overlay::Confirm { action };
                    return None;
                }
                return self.start_action(action, None);
            }
            _ => {
                self.overlay = Overlay::ActionMenu { selected };
            }
        }
        None
    }

    fn handle_confirm_key(&mut self, key: KeyEvent, action: ActionSpec) -> Option<Request> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.start_action(action, None),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Action cancelled", MessageLevel::Info, 2);
                None
            }
            _ => {
                self.overlay = Overlay::Confirm { action };
                None
            }
        }
    }

    fn handle_password_key(
        &mut self,
        key: KeyEvent,
        action: ActionSpec,
        mut input: String,
    ) -> Option<Request> {
        match key.code {
            KeyCode::Esc => {
                self.set_status("Action cancelled", MessageLevel::Info, 2);
                return None;
            }
            KeyCode::Enter => {
                if input.is_empty() {
                    self.overlay = Overlay::Password { action, input };
                    return None;
                }
                return self.start_action(action, Some(Credential::new(input)));
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
        self.overlay = Overlay::Password { action, input };
        None
    }

    fn start_action(
        &mut self,
        action: ActionSpec,
        credential: Option<Credential>,
    ) -> Option<Request> {
        if let Some(running) = &self.running_action {
            let text = format!("'{}' is still running", running.label);
            self.set_status(&text, MessageLevel::Warning, 3);
            return None;
        }
        let widget_id = self.selected_panel()?.id.clone();
        self.running_action = Some(RunningAction {
            widget_id: widget_id.clone(),
            label: action.label.clone(),
            started: Instant::now(),
        });
        self.log(
            LogKind::Info,
            format!("{} > {}: {}", widget_id, action.label, action.command),
        );
        Some(Request::RunAction {
            widget_id,
            action,
            credential,
        })
    }

    pub fn on_update(&mut self, update: WidgetUpdate) {
        if let Some(panel) = self.widgets.iter_mut().find(|p| p.id == update.id) {
            panel.document = Some(update.document);
            panel.refreshed_at = Some(update.refreshed_at);
        }
    }

    pub fn on_detail(&mut self, id: String, document: WidgetDocument) {
        if let View::Detail { id: current, .. } = &self.view {
            if *current == id {
                self.view = View::Detail {
                    id,
                    document: Some(document),
                };
            }
        }
    }

    pub fn on_action_event(&mut self, event: ActionEvent) {
        match event {
            ActionEvent::Stdout(line) => self.log(LogKind::Stdout, line),
            ActionEvent::Stderr(line) => self.log(LogKind::Stderr, line),
            ActionEvent::Stopping => self.log(LogKind::Info, "Sent SIGTERM".to_string()),
            ActionEvent::Killed => {
                self.log(LogKind::Error, "Grace period elapsed, killed".to_string())
            }
        }
    }

    /// Record a finished action. Returns a refresh request when the action
    /// asks for one.
    pub fn on_action_finished(&mut self, report: ActionReport) -> Option<Request> {
        self.running_action = None;

        if report.needs_credential() {
            self.log(LogKind::Info, "sudo password required".to_string());
            self.overlay = Overlay::Password {
                action: report.action,
                input: String::new(),
            };
            return None;
        }

        let summary = format!("{}: {}", report.action.label, report.outcome.summary());
        let (kind, level) = match report.outcome.cause {
            _ if report.outcome.success() => (LogKind::Info, MessageLevel::Success),
            TerminationCause::UserCancelled => (LogKind::Info, MessageLevel::Warning),
            _ => (LogKind::Error, MessageLevel::Error),
        };
        if report.outcome.cause == TerminationCause::LaunchFailure {
            self.log(LogKind::Error, report.outcome.stderr.clone());
        }
        self.log(kind, summary.clone());
        self.set_status(&summary, level, 5);

        report
            .wants_refresh()
            .then(|| Request::Refresh(report.widget_id))
    }

    pub fn on_tick(&mut self) {
        if let Some(ref msg) = self.status_message {
            if Instant::now() > msg.expires_at {
                self.status_message = None;
            }
        }
    }

    pub fn on_resize(&mut self, width: u16, height: u16) {
        self.terminal_width = width;
        self.terminal_height = height;
    }

    fn select_next(&mut self) {
        if !self.widgets.is_empty() {
            self.selected = (self.selected + 1) % self.widgets.len();
        }
    }

    fn select_previous(&mut self) {
        if !self.widgets.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.widgets.len() - 1);
        }
    }

    fn log(&mut self, kind: LogKind, message: String) {
        if self.action_log.len() >= LOG_BUFFER_SIZE {
            self.action_log.pop_front();
        }
        self.action_log.push_back(LogLine {
            timestamp: Local::now(),
            kind,
            message,
        });
    }

    /// Set a status message that will expire after the given duration
    pub fn set_status(&mut self, text: &str, level: MessageLevel, duration_secs: u64) {
        self.status_message = Some(StatusMessage {
            text: text.to_string(),
            level,
            expires_at: Instant::now() + Duration::from_secs(duration_secs),
        });
    }
}
