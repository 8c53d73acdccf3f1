use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossbeam_channel::Receiver as RenderReceiver;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use replay_core::{
    parse_command_line, CommandOutcome, KeyRepeat, OperatorCommand, RenderRequest, ScrubDirection,
    Session,
};
use tracing::{debug, info, warn};

use crate::ui::{draw_ui, UiState, View};

const PAGE_STEP: usize = 10;
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

pub struct InspectorApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    session: Session,
    renders: Option<RenderReceiver<RenderRequest>>,
    log_receiver: Receiver<String>,
    key_repeat: KeyRepeat,
    keyboard_enhanced: bool,
}

impl InspectorApp {
    pub fn new(
        session: Session,
        renders: Option<RenderReceiver<RenderRequest>>,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        // Release events only arrive with the enhancement flags; without them
        // a held key is considered released after the grace period.
        let keyboard_enhanced =
            crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);
        if keyboard_enhanced {
            crossterm::execute!(
                std::io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        terminal.clear()?;
        terminal.hide_cursor()?;

        let replay = &session.config().replay;
        let key_repeat = KeyRepeat::new(replay.key_repeat_interval(), replay.key_release_grace());
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            session,
            renders,
            log_receiver,
            key_repeat,
            keyboard_enhanced,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();
        let mut dirty = true;

        loop {
            if let Some(renders) = &self.renders {
                while let Ok(request) = renders.try_recv() {
                    let state = self.session.state().lock();
                    self.ui_state.push_turn(request.turn_index, &state);
                    dirty = true;
                }
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            if let Some(direction) = self.key_repeat.poll(Instant::now()) {
                dirty |= self.scrub(direction);
            }

            if dirty || last_draw.elapsed() >= REDRAW_INTERVAL {
                let snapshot = self.session.snapshot();
                let cell = self.session.selected_cell_report();
                let synchronous_ack =
                    self.session.is_live() && self.session.config().gateway.synchronous_ack;
                let state = self.session.state().lock();
                let view = View {
                    snapshot: &snapshot,
                    state: &state,
                    cell: cell.as_ref(),
                    synchronous_ack,
                };
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.ui_state, &view))?;
                last_draw = Instant::now();
                dirty = false;
            }

            if event::poll(Duration::from_millis(20))? {
                if let Event::Key(key) = event::read()? {
                    match self.handle_key(key) {
                        KeyFlow::Quit => break,
                        KeyFlow::Redraw => dirty = true,
                        KeyFlow::Idle => {}
                    }
                }
            }
        }

        if self.keyboard_enhanced {
            crossterm::execute!(std::io::stdout(), PopKeyboardEnhancementFlags)?;
        }
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyFlow {
        let prompt_open = self.ui_state.command_input.is_some();
        if let Some(direction) = scrub_direction(key.code, prompt_open) {
            let now = Instant::now();
            return match key.kind {
                KeyEventKind::Release => {
                    self.key_repeat.release(direction);
                    KeyFlow::Idle
                }
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    match self.key_repeat.press(direction, now) {
                        Some(direction) if self.scrub(direction) => KeyFlow::Redraw,
                        _ => KeyFlow::Idle,
                    }
                }
            };
        }

        if key.kind != KeyEventKind::Press {
            return KeyFlow::Idle;
        }

        if prompt_open {
            return self.handle_prompt_key(key.code);
        }

        let command = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyFlow::Quit,
            KeyCode::Char(':') => {
                self.key_repeat.release(ScrubDirection::Forward);
                self.key_repeat.release(ScrubDirection::Backward);
                self.ui_state.command_input = Some(String::new());
                return KeyFlow::Redraw;
            }
            KeyCode::Home => OperatorCommand::JumpToStart,
            KeyCode::End => OperatorCommand::JumpToEnd,
            KeyCode::PageUp => OperatorCommand::StepBackward(PAGE_STEP),
            KeyCode::PageDown => OperatorCommand::StepForward(PAGE_STEP),
            KeyCode::Char(' ') | KeyCode::Enter => OperatorCommand::Acknowledge,
            KeyCode::Char('t') => OperatorCommand::ToggleAll,
            KeyCode::Char('s') => {
                let side = self
                    .session
                    .controller()
                    .map(|replay| replay.tracker_side().other())
                    .unwrap_or_default();
                OperatorCommand::TrackerSide(side)
            }
            KeyCode::Char('h') => return self.move_cursor(-1, 0),
            KeyCode::Char('l') => return self.move_cursor(1, 0),
            KeyCode::Char('k') => return self.move_cursor(0, -1),
            KeyCode::Char('j') => return self.move_cursor(0, 1),
            KeyCode::Char(ch) => match entity_for_key(ch) {
                Some(entity) => OperatorCommand::ToggleEntity(entity),
                None => return KeyFlow::Idle,
            },
            _ => return KeyFlow::Idle,
        };
        self.dispatch(command)
    }

    fn handle_prompt_key(&mut self, code: KeyCode) -> KeyFlow {
        let Some(input) = self.ui_state.command_input.as_mut() else {
            return KeyFlow::Idle;
        };
        match code {
            KeyCode::Esc => self.ui_state.command_input = None,
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) => input.push(ch),
            KeyCode::Enter => {
                let line = std::mem::take(input);
                self.ui_state.command_input = None;
                match parse_command_line(&line) {
                    Ok(command) => return self.dispatch(command),
                    Err(err) => {
                        warn!(input = %line, error = %err, "command.parse_failed");
                        self.ui_state.set_status(format!("{err}"));
                    }
                }
            }
            _ => return KeyFlow::Idle,
        }
        KeyFlow::Redraw
    }

    fn scrub(&mut self, direction: ScrubDirection) -> bool {
        let command = match direction {
            ScrubDirection::Forward => OperatorCommand::StepForward(1),
            ScrubDirection::Backward => OperatorCommand::StepBackward(1),
        };
        matches!(self.dispatch(command), KeyFlow::Redraw)
    }

    fn move_cursor(&mut self, dx: isize, dy: isize) -> KeyFlow {
        let (x, y) = self.ui_state.cursor;
        let x = x.saturating_add_signed(dx);
        let y = y.saturating_add_signed(dy);
        self.dispatch(OperatorCommand::SelectCell { x, y })
    }

    fn dispatch(&mut self, command: OperatorCommand) -> KeyFlow {
        match self.session.handle(command) {
            CommandOutcome::Rendered => KeyFlow::Redraw,
            CommandOutcome::Unchanged => KeyFlow::Idle,
            CommandOutcome::Acknowledged => {
                info!("frame.acknowledged");
                self.ui_state.set_status("frame released");
                KeyFlow::Redraw
            }
            CommandOutcome::CellSelected(report) => {
                self.ui_state.cursor = (report.position.x as usize, report.position.y as usize);
                KeyFlow::Redraw
            }
            CommandOutcome::Ignored(reason) => {
                debug!(?command, reason, "command.ignored");
                self.ui_state.set_status(reason);
                KeyFlow::Redraw
            }
        }
    }
}

enum KeyFlow {
    Quit,
    Redraw,
    Idle,
}

/// Scrub keys are plain text while the command prompt is open.
fn scrub_direction(code: KeyCode, prompt_open: bool) -> Option<ScrubDirection> {
    if prompt_open {
        return None;
    }
    match code {
        KeyCode::Right | KeyCode::Char('.') => Some(ScrubDirection::Forward),
        KeyCode::Left | KeyCode::Char(',') => Some(ScrubDirection::Backward),
        _ => None,
    }
}

/// `1`..`9`,`0` select entities 0-9; the shifted row `!`..`^` selects 10-15.
fn entity_for_key(ch: char) -> Option<usize> {
    const SHIFTED: [char; 6] = ['!', '@', '#', '$', '%', '^'];
    match ch {
        '1'..='9' => Some(ch as usize - '1' as usize),
        '0' => Some(9),
        _ => SHIFTED
            .iter()
            .position(|shifted| *shifted == ch)
            .map(|offset| 10 + offset),
    }
}
