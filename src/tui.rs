use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use tracing::error;

use crate::api::CandidateSource;
use crate::db::Database;
use crate::editor::NoteEditor;
use crate::list::CandidateList;
use crate::models::{Candidate, Filter, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    EditNote,
}

struct AppState {
    list: CandidateList,
    editor: NoteEditor,
    cursor: usize, // position within the visible candidates
    mode: Mode,
    message: Option<String>,
}

impl AppState {
    fn new(list: CandidateList) -> Self {
        let mut editor = NoteEditor::new();
        editor.sync(&list);
        Self {
            list,
            editor,
            cursor: 0,
            mode: Mode::Browse,
            message: None,
        }
    }

    fn visible_len(&self) -> usize {
        self.list.visible_count()
    }

    fn cursor_index(&self) -> Option<usize> {
        self.list.visible().get(self.cursor).map(|(i, _)| *i)
    }

    fn next(&mut self) {
        if self.cursor + 1 < self.visible_len() {
            self.cursor += 1;
        }
    }

    fn prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn can_find_new(&self) -> bool {
        matches!(self.list.filter(), Filter::All | Filter::Pending) && !self.list.fetching_more()
    }

    /// Keep the cursor on the selection after the list moved it, and inside the visible range.
    fn follow_selection(&mut self, previous: Option<usize>) {
        let selected = self.list.selected_index();
        if selected != previous {
            if let Some(pos) = self
                .list
                .visible()
                .iter()
                .position(|(i, _)| Some(*i) == selected)
            {
                self.cursor = pos;
            }
        }
        let len = self.visible_len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
        if self.list.selected().is_none() {
            self.mode = Mode::Browse;
        }
    }

    fn report<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            error!(error = %e, "operation failed");
            self.message = Some(format!("Error: {}", e));
        }
    }
}

pub fn run_browse(db: &Database, source: &impl CandidateSource) -> Result<()> {
    let mut state = AppState::new(CandidateList::new());

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = load(&mut terminal, &mut state, db)
        .and_then(|_| run_loop(&mut terminal, &mut state, db, source));

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn load(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
) -> Result<()> {
    terminal.draw(|frame| draw(frame, state, &mut ListState::default()))?;
    state.list.load(db)?;
    state.editor.sync(&state.list);
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
    source: &impl CandidateSource,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        list_state.select(if state.visible_len() == 0 { None } else { Some(state.cursor) });
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let previous = state.list.selected_index();
        let keep_going = match state.mode {
            Mode::Browse => handle_browse_key(key, terminal, state, &mut list_state, db, source)?,
            Mode::EditNote => {
                handle_edit_key(key, state, db);
                true
            }
        };
        if !keep_going {
            break;
        }
        state.editor.sync(&state.list);
        state.follow_selection(previous);
    }
    Ok(())
}

fn handle_browse_key(
    key: KeyEvent,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    list_state: &mut ListState,
    db: &Database,
    source: &impl CandidateSource,
) -> Result<bool> {
    state.message = None;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
        KeyCode::Char(c @ '1'..='4') => {
            let filter = Filter::ALL[c as usize - '1' as usize];
            state.list.select_filter(filter);
            state.cursor = 0;
        }
        KeyCode::Down | KeyCode::Char('j') => state.next(),
        KeyCode::Up | KeyCode::Char('k') => state.prev(),
        KeyCode::Enter | KeyCode::Char(' ') => {
            if let Some(index) = state.cursor_index() {
                state.list.select_candidate(index);
            }
        }
        KeyCode::Char('a') => {
            let result = state.editor.toggle_status(Status::Approved, &mut state.list, db);
            state.report(result);
        }
        KeyCode::Char('x') => {
            let result = state.editor.toggle_status(Status::Rejected, &mut state.list, db);
            state.report(result);
        }
        KeyCode::Char('e') => {
            if state.list.selected().is_some() {
                state.mode = Mode::EditNote;
            }
        }
        KeyCode::Char('f') => {
            if state.can_find_new() {
                state.list.begin_fetch();
                terminal.draw(|frame| draw(frame, state, list_state))?;
                let result = state.list.find_new_candidates(source, db);
                state.report(result);
            }
        }
        _ => {}
    }
    Ok(true)
}

fn handle_edit_key(key: KeyEvent, state: &mut AppState, db: &Database) {
    state.message = None;
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            let result = state.editor.commit(&mut state.list, db);
            state.report(result);
            state.mode = Mode::Browse;
        }
        KeyCode::Char('a') if ctrl => {
            let result = state.editor.toggle_status(Status::Approved, &mut state.list, db);
            state.report(result);
        }
        KeyCode::Char('x') if ctrl => {
            let result = state.editor.toggle_status(Status::Rejected, &mut state.list, db);
            state.report(result);
        }
        KeyCode::Char('u') if ctrl => state.editor.set_text(""),
        KeyCode::Enter => state.editor.push('\n'),
        KeyCode::Backspace => state.editor.backspace(),
        KeyCode::Char(c) if !ctrl => state.editor.push(c),
        _ => {}
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    if !state.list.is_loaded() {
        frame.render_widget(Paragraph::new("Loading candidates..."), frame.area());
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(Paragraph::new(filter_bar(state)), rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    // Left panel: candidate list
    let now = Utc::now();
    let selected = state.list.selected_index();
    let visible = state.list.visible();
    let items: Vec<ListItem> = if visible.is_empty() {
        vec![ListItem::new(Span::styled(
            "No visible candidates. Please select another filter or press 'f' to find new candidates.",
            Style::default().add_modifier(Modifier::ITALIC),
        ))]
    } else {
        visible
            .iter()
            .map(|(index, candidate)| {
                let marker = if Some(*index) == selected { "*" } else { " " };
                let line = Line::from(vec![
                    Span::raw(format!("{} ", marker)),
                    Span::styled(status_glyph(candidate.status), status_style(candidate.status)),
                    Span::raw(format!(" {:<24} ", candidate.name)),
                    Span::styled(
                        applied_ago(&candidate.application_date, now),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]);
                let style = if Some(*index) == selected {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(line).style(style)
            })
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Candidates ({}) ",
            state.visible_len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: candidate detail
    let title = match state.mode {
        Mode::Browse => " Detail ",
        Mode::EditNote => " Detail (editing note) ",
    };
    let detail = Paragraph::new(build_detail(state, now))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, chunks[1]);

    let help = Paragraph::new(help_line(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

fn filter_bar(state: &AppState) -> Line<'static> {
    let current = state.list.filter();
    let mut spans: Vec<Span> = Vec::new();
    for (n, filter) in Filter::ALL.iter().enumerate() {
        let label = format!(" {}:{} ", n + 1, filter.label());
        let style = if *filter == current {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        spans.push(Span::styled(label, style));
    }
    if let Some(message) = &state.message {
        spans.push(Span::styled(format!("  {}", message), Style::default().fg(Color::Red)));
    } else if !state.list.announcement().is_empty() {
        spans.push(Span::raw(format!("  {}", state.list.announcement())));
    }
    Line::from(spans)
}

fn help_line(state: &AppState) -> String {
    match state.mode {
        Mode::EditNote => " typing edits the note  Esc:save  Ctrl-u:clear  Ctrl-a:approve  Ctrl-x:reject".to_string(),
        Mode::Browse => {
            let mut help = String::from(" 1-4:filter  j/k:move  Enter:select  a:approve x:reject  e:note");
            if state.list.fetching_more() {
                help.push_str("  (finding new candidates...)");
            } else if state.can_find_new() {
                help.push_str("  f:find new candidates");
            }
            help.push_str("  q:quit");
            help
        }
    }
}

fn status_glyph(status: Status) -> &'static str {
    match status {
        Status::Pending => " ",
        Status::Approved => "✓",
        Status::Rejected => "✗",
    }
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Pending => Style::default().fg(Color::Yellow),
        Status::Approved => Style::default().fg(Color::Green),
        Status::Rejected => Style::default().fg(Color::Red),
    }
}

fn build_detail<'a>(state: &'a AppState, now: DateTime<Utc>) -> Text<'a> {
    let Some((_, candidate)) = state.list.selected() else {
        return Text::from(Span::styled(
            "No candidate selected.",
            Style::default().add_modifier(Modifier::ITALIC),
        ));
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &candidate.name,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", candidate.status),
        status_style(candidate.status),
    )));
    lines.push(Line::from(format!("Gender: {}", candidate.gender)));
    lines.push(Line::from(format!("Age: {}", candidate.age)));
    lines.push(Line::from(format!("Location: {}", candidate.location)));
    lines.push(Line::from(applied_ago(&candidate.application_date, now)));
    if !candidate.picture.large.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Photo: {}", candidate.picture.large),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled(
        "Note:",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    note_lines(state, candidate, &mut lines);

    Text::from(lines)
}

fn note_lines(state: &AppState, candidate: &Candidate, lines: &mut Vec<Line>) {
    let editing = state.mode == Mode::EditNote;
    let text = state.editor.text();
    if text.is_empty() && !editing {
        lines.push(Line::from(Span::styled(
            "  (no note, press e to write one)",
            Style::default().fg(Color::DarkGray),
        )));
        return;
    }
    for paragraph in text.split('\n') {
        for line in textwrap::fill(paragraph, 60).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
        if paragraph.is_empty() {
            lines.push(Line::from("  "));
        }
    }
    if editing {
        lines.push(Line::from(Span::styled("  _", Style::default().add_modifier(Modifier::SLOW_BLINK))));
    } else if text != candidate.note {
        lines.push(Line::from(Span::styled(
            "  (unsaved)",
            Style::default().fg(Color::Yellow),
        )));
    }
}

/// "Applied about 3 years ago" style rendering of an RFC 3339 application date.
fn applied_ago(date: &str, now: DateTime<Utc>) -> String {
    let Ok(applied) = DateTime::parse_from_rfc3339(date) else {
        return format!("Applied {}", date);
    };
    let applied = applied.with_timezone(&Utc);
    if applied <= now {
        format!("Applied {} ago", distance(applied, now))
    } else {
        format!("Applied in {}", distance(now, applied))
    }
}

/// Rounded, worded distance between two instants, using the same buckets as
/// date-fns `formatDistance`.
fn distance(earlier: DateTime<Utc>, later: DateTime<Utc>) -> String {
    const MINUTES_IN_DAY: i64 = 1440;
    const MINUTES_IN_MONTH: i64 = 43200;
    const MINUTES_IN_TWO_MONTHS: i64 = 86400;

    let round_div = |n: i64, d: i64| (n as f64 / d as f64).round() as i64;
    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" });

    let minutes = round_div((later - earlier).num_seconds(), 60);
    if minutes < 1 {
        return "less than a minute".to_string();
    }
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        return format!("about {}", plural(round_div(minutes, 60), "hour"));
    }
    if minutes < 2520 {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        return plural(round_div(minutes, MINUTES_IN_DAY), "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        return format!("about {}", plural(round_div(minutes, MINUTES_IN_MONTH), "month"));
    }

    let months = calendar_months(earlier, later);
    if months < 12 {
        return plural(round_div(minutes, MINUTES_IN_MONTH), "month");
    }
    let (years, rest) = (months / 12, months % 12);
    match rest {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}

/// Whole calendar months from `earlier` to `later`.
fn calendar_months(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let mut months = i64::from(later.year() - earlier.year()) * 12 + i64::from(later.month())
        - i64::from(earlier.month());
    if months > 0 && (later.day(), later.time()) < (earlier.day(), earlier.time()) {
        months -= 1;
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, candidate, with_status};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_applied_ago() {
        assert_eq!(applied_ago("2022-03-02T11:00:00Z", now()), "Applied about 2 years ago");
        assert_eq!(applied_ago("2024-03-02T11:59:40Z", now()), "Applied less than a minute ago");
        assert_eq!(applied_ago("2024-03-02T11:50:00Z", now()), "Applied 10 minutes ago");
        assert_eq!(applied_ago("2024-03-01T12:00:00Z", now()), "Applied 1 day ago");
        assert_eq!(applied_ago("2024-03-02T09:00:00.000Z", now()), "Applied about 3 hours ago");
        assert_eq!(applied_ago("2024-01-27T12:00:00Z", now()), "Applied about 1 month ago");
        assert_eq!(applied_ago("2024-05-02T12:00:00Z", now()), "Applied in 2 months");
        assert_eq!(applied_ago("yesterday", now()), "Applied yesterday");
    }

    #[test]
    fn test_applied_ago_rounds_years() {
        // 23 months back is nearly two years, not one
        assert_eq!(applied_ago("2022-04-02T12:00:00Z", now()), "Applied almost 2 years ago");
        assert_eq!(applied_ago("2020-10-02T12:00:00Z", now()), "Applied over 3 years ago");
        assert_eq!(applied_ago("2023-02-02T12:00:00Z", now()), "Applied about 1 year ago");
    }

    #[test]
    fn test_edit_key_clears_previous_error() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let mut list = CandidateList::new();
        list.load(&db).unwrap();
        let mut state = AppState::new(list);
        state.mode = Mode::EditNote;
        state.message = Some("Error: store unavailable".to_string());

        handle_edit_key(KeyEvent::new(KeyCode::Char('h'), KeyModifiers::NONE), &mut state, &db);

        assert_eq!(state.message, None);
        assert_eq!(state.mode, Mode::EditNote);
    }

    #[test]
    fn test_cursor_follows_auto_advance() {
        let store = MemoryStore::with(vec![
            with_status("A", Status::Approved),
            candidate("B"),
            candidate("C"),
        ]);
        let mut list = CandidateList::new();
        list.load(&store).unwrap();
        let mut state = AppState::new(list);

        state.list.select_filter(Filter::Pending);
        state.list.select_candidate(1);
        state.follow_selection(None);
        assert_eq!(state.cursor, 0);

        let previous = state.list.selected_index();
        state
            .editor
            .toggle_status(Status::Approved, &mut state.list, &store)
            .unwrap();
        state.follow_selection(previous);
        assert_eq!(state.list.selected_index(), Some(2));
        assert_eq!(state.cursor, 0);
        assert_eq!(state.cursor_index(), Some(2));
    }

    #[test]
    fn test_find_new_only_offered_for_all_and_pending() {
        let store = MemoryStore::default();
        let mut list = CandidateList::new();
        list.load(&store).unwrap();
        let mut state = AppState::new(list);
        assert!(state.can_find_new());

        state.list.select_filter(Filter::Approved);
        assert!(!state.can_find_new());

        state.list.select_filter(Filter::Pending);
        state.list.begin_fetch();
        assert!(!state.can_find_new());
        assert!(help_line(&state).contains("finding new candidates"));
    }
}
