use std::collections::VecDeque;

use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use replay_core::{CellReport, MatchState, SessionSnapshot, ACTIVE_EPSILON};
use telemetry_proto::{Position, Side};

pub struct TurnSummary {
    pub turn_index: Option<u32>,
    pub scores: [i32; 2],
    pub units: [usize; 2],
}

pub struct UiState {
    pub recent_turns: VecDeque<TurnSummary>,
    pub max_history: usize,
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub cursor: (usize, usize),
    pub command_input: Option<String>,
    pub status: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            recent_turns: VecDeque::new(),
            max_history: 32,
            logs: VecDeque::new(),
            max_logs: 5,
            cursor: (0, 0),
            command_input: None,
            status: None,
        }
    }
}

impl UiState {
    pub fn push_turn(&mut self, turn_index: Option<u32>, state: &MatchState) {
        let frame = state.frame();
        self.recent_turns.push_front(TurnSummary {
            turn_index,
            scores: [frame.score(Side::Blue), frame.score(Side::Red)],
            units: [frame.units(Side::Blue).len(), frame.units(Side::Red).len()],
        });
        while self.recent_turns.len() > self.max_history {
            self.recent_turns.pop_back();
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn set_status<S: Into<String>>(&mut self, status: S) {
        self.status = Some(status.into());
    }
}

/// Per-draw borrowed view of the session.
pub struct View<'a> {
    pub snapshot: &'a SessionSnapshot,
    pub state: &'a MatchState,
    pub cell: Option<&'a CellReport>,
    pub synchronous_ack: bool,
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, view: &View) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(7),
        ])
        .split(frame.size());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(44)])
        .split(chunks[1]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9),
            Constraint::Length(11),
            Constraint::Min(3),
        ])
        .split(body[1]);

    draw_header(frame, chunks[0], view);
    draw_board(frame, body[0], state, view);
    draw_cell(frame, side[0], view);
    draw_commands(frame, side[1], view);
    draw_recent_turns(frame, side[2], state);
    draw_prompt(frame, chunks[2], state);
    draw_logs(frame, chunks[3], state);
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn draw_header(frame: &mut Frame, area: Rect, view: &View) {
    let snapshot = view.snapshot;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Match Inspector [{}]", snapshot.mode));

    let position = match (snapshot.index, snapshot.frames) {
        (Some(index), Some(frames)) => format!("frame {index}/{}", frames.saturating_sub(2)),
        _ => "streaming".to_string(),
    };
    let turn = snapshot
        .turn_index
        .map(|turn| turn.to_string())
        .unwrap_or_else(|| "-".to_string());
    let fingerprint = snapshot
        .fingerprint
        .map(|hash| format!("{hash:016x}"))
        .unwrap_or_default();

    let first = Line::from(vec![
        Span::styled(position, Style::default().fg(Color::Yellow)),
        Span::raw(format!(" | turn {turn} (step {})", snapshot.match_step)),
        Span::raw(" | "),
        Span::styled(
            format!("blue {}", snapshot.scores[0]),
            Style::default().fg(Color::Blue),
        ),
        Span::raw(" : "),
        Span::styled(
            format!("red {}", snapshot.scores[1]),
            Style::default().fg(Color::Red),
        ),
        Span::raw(format!(" | {fingerprint}")),
    ]);

    let metrics = snapshot.metrics;
    let tracker = snapshot
        .tracker_side
        .map(|side| format!("tracker {side}"))
        .unwrap_or_else(|| "no tracker".to_string());
    let second = Line::from(vec![
        Span::styled(tracker, Style::default().fg(Color::Cyan)),
        Span::raw(format!(
            " | active {:.0} | selected {} | applied {} rejected {} busy {} implicit acks {}",
            snapshot.active_tracker_count,
            snapshot.selection.len(),
            metrics.frames_applied,
            metrics.frames_rejected,
            metrics.busy_rejections,
            metrics.implicit_acks,
        )),
    ]);

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(vec![first, second]), inner(area));
}

fn cell_glyph(state: &MatchState, position: Position) -> (&'static str, Option<Color>) {
    let frame = state.frame();
    if frame.units(Side::Blue).contains(&position) {
        return ("B ", Some(Color::LightBlue));
    }
    if frame.units(Side::Red).contains(&position) {
        return ("R ", Some(Color::LightRed));
    }
    let layers: [(&Vec<Position>, &'static str, Color); 6] = [
        (&frame.relics, "* ", Color::Yellow),
        (&frame.vantage_points, "^ ", Color::Green),
        (&frame.hazards, "# ", Color::Gray),
        (&frame.nebula, "~ ", Color::Magenta),
        (&frame.halo_tiles, "o ", Color::LightYellow),
        (&frame.frontier, "? ", Color::DarkGray),
    ];
    layers
        .into_iter()
        .find(|(tiles, _, _)| tiles.contains(&position))
        .map(|(_, glyph, color)| (glyph, Some(color)))
        .unwrap_or((". ", None))
}

fn draw_board(frame: &mut Frame, area: Rect, ui: &UiState, view: &View) {
    let state = view.state;
    let board = state.board();
    let heatmap = state.heatmap();
    let peak = heatmap.max_value();
    let vision = &state.frame().vision;

    let lines: Vec<Line> = (0..board.height)
        .map(|y| {
            let spans: Vec<Span> = (0..board.width)
                .map(|x| {
                    let position = Position::new(x as i32, y as i32);
                    let (glyph, color) = cell_glyph(state, position);
                    let mut style = Style::default();
                    if let Some(color) = color {
                        style = style.fg(color);
                    }
                    let value = heatmap.get(x, y);
                    if peak > ACTIVE_EPSILON && value > ACTIVE_EPSILON {
                        let shade = (value / peak).clamp(0.0, 1.0);
                        style = style.bg(Color::Rgb((40.0 + 200.0 * shade) as u8, 20, 20));
                    }
                    if vision.get(y * board.width + x) == Some(&false) {
                        style = style.add_modifier(Modifier::DIM);
                    }
                    if ui.cursor == (x, y) {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    Span::styled(glyph, style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Board {}x{}", board.width, board.height));
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner(area));
}

fn draw_cell(frame: &mut Frame, area: Rect, view: &View) {
    let block = Block::default().borders(Borders::ALL).title("Cell");
    let lines = match view.cell {
        Some(report) => {
            let features: Vec<&str> = report.features.iter().map(|f| f.label()).collect();
            vec![
                Line::from(format!(
                    "({}, {})",
                    report.position.x, report.position.y
                )),
                Line::from(format!("belief   {:.4}", report.belief)),
                Line::from(format!(
                    "energy   {}",
                    report
                        .energy
                        .map(|energy| format!("{energy:.1}"))
                        .unwrap_or_else(|| "-".to_string())
                )),
                Line::from(format!(
                    "visible  {}",
                    report
                        .visible
                        .map(|visible| visible.to_string())
                        .unwrap_or_else(|| "-".to_string())
                )),
                Line::from(format!("features {}", features.join(", "))),
                Line::from(format!(
                    "units    blue {:?} red {:?}",
                    report.blue_units, report.red_units
                )),
            ]
        }
        None => vec![Line::from("move the cursor with h/j/k/l")],
    };
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        inner(area),
    );
}

fn key_line(key: &'static str, text: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{key:<10}"), Style::default().fg(Color::Yellow)),
        Span::raw(text),
    ])
}

fn draw_commands(frame: &mut Frame, area: Rect, view: &View) {
    let mut lines = if view.snapshot.index.is_some() {
        vec![
            key_line("←/→ ,/.", "step (hold to scrub)"),
            key_line("PgUp/PgDn", "step 10"),
            key_line("Home/End", "first / last frame"),
            key_line("1-0 !-^", "toggle entity 0-15"),
            key_line("t", "toggle all entities"),
            key_line("s", "switch tracker side"),
        ]
    } else {
        vec![key_line("1-0 !-^", "toggle entity 0-15")]
    };
    if view.synchronous_ack {
        lines.push(key_line("space", "release current frame"));
    }
    lines.push(key_line("h/j/k/l", "move cell cursor"));
    lines.push(key_line(":", "type a command"));
    lines.push(key_line("q", "exit inspector"));

    let block = Block::default().borders(Borders::ALL).title("Commands");
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        inner(area),
    );
}

fn draw_recent_turns(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Recent Turns");
    let lines: Vec<Line> = state
        .recent_turns
        .iter()
        .map(|summary| {
            let turn = summary
                .turn_index
                .map(|turn| format!("turn {turn:>4}"))
                .unwrap_or_else(|| "reset    ".to_string());
            Line::from(vec![
                Span::styled(turn, Style::default().fg(Color::Yellow)),
                Span::raw(" | "),
                Span::styled(
                    format!("{:>3}", summary.scores[0]),
                    Style::default().fg(Color::Blue),
                ),
                Span::raw(":"),
                Span::styled(
                    format!("{:<3}", summary.scores[1]),
                    Style::default().fg(Color::Red),
                ),
                Span::raw(format!(" | units {}/{}", summary.units[0], summary.units[1])),
            ])
        })
        .collect();
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner(area));
}

fn draw_prompt(frame: &mut Frame, area: Rect, state: &UiState) {
    let line = match (&state.command_input, &state.status) {
        (Some(input), _) => Line::from(vec![
            Span::styled(":", Style::default().fg(Color::Yellow)),
            Span::raw(input.as_str()),
        ]),
        (None, Some(status)) => Line::from(Span::raw(status.as_str())),
        (None, None) => Line::from(""),
    };
    let block = Block::default().borders(Borders::ALL).title("Command");
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(line), inner(area));
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}
