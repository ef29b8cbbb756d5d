use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::{io, path::Path, time::Duration};

use crate::scoring::{AVERAGE_COLUMN, SCORE_PREFIX};
use crate::storage;

const SHOWN: [(&str, &str); 4] = [
    ("title", "Title"),
    ("company", "Company"),
    ("location", "Location"),
    ("deadline", "Deadline"),
];

/// A CSV of listings, ranked or not, prepared for display.
pub struct ResultsView {
    pub titles: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub urls: Vec<String>,
    pub descriptions: Vec<String>,
}

impl ResultsView {
    pub fn new(header: &[String], rows: &[Vec<String>]) -> Self {
        let col = |name: &str| header.iter().position(|h| h == name);

        let mut picked: Vec<(usize, String)> = SHOWN
            .iter()
            .filter_map(|(name, label)| col(name).map(|i| (i, label.to_string())))
            .collect();

        // Average wins over the single-query column.
        let score = col(AVERAGE_COLUMN)
            .or_else(|| header.iter().position(|h| h.starts_with(SCORE_PREFIX)));
        if let Some(i) = score {
            picked.push((i, "Score".to_string()));
        }

        let cell = |row: &Vec<String>, i: Option<usize>| {
            i.and_then(|i| row.get(i)).cloned().unwrap_or_default()
        };

        ResultsView {
            titles: picked.iter().map(|(_, t)| t.clone()).collect(),
            rows: rows
                .iter()
                .map(|r| picked.iter().map(|(i, _)| cell(r, Some(*i))).collect())
                .collect(),
            urls: rows.iter().map(|r| cell(r, col("url"))).collect(),
            descriptions: rows.iter().map(|r| cell(r, col("description"))).collect(),
        }
    }
}

fn next_index(selected: Option<usize>, len: usize, down: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match (selected, down) {
        (None, _) => 0,
        (Some(i), true) => {
            if i >= len - 1 {
                0
            } else {
                i + 1
            }
        }
        (Some(i), false) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
    };
    Some(next)
}

pub fn run_dashboard(path: &Path) -> anyhow::Result<()> {
    let (header, rows) = storage::read_table(path)?;
    let view = ResultsView::new(&header, &rows);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &view, &path.display().to_string());

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    view: &ResultsView,
    title: &str,
) -> anyhow::Result<()> {
    let mut table_state = TableState::default();
    table_state.select(next_index(None, view.rows.len(), true));

    loop {
        terminal.draw(|f| ui(f, view, title, &mut table_state))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Down | KeyCode::Char('j') => {
                        let next = next_index(table_state.selected(), view.rows.len(), true);
                        table_state.select(next);
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        let next = next_index(table_state.selected(), view.rows.len(), false);
                        table_state.select(next);
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, view: &ResultsView, title: &str, table_state: &mut TableState) {
    let rects = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(6)])
        .margin(1)
        .split(f.size());

    let selected_style = Style::default().add_modifier(Modifier::REVERSED).fg(Color::Yellow);
    let normal_style = Style::default().fg(Color::White);
    let header_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let header_cells = view
        .titles
        .iter()
        .map(|h| Cell::from(h.as_str()).style(header_style));
    let header = Row::new(header_cells)
        .style(normal_style)
        .height(1)
        .bottom_margin(1);

    let rows = view.rows.iter().map(|item| {
        let cells = item.iter().map(|c| Cell::from(c.as_str()));
        Row::new(cells).style(normal_style)
    });

    let col_widths: Vec<Constraint> = view
        .titles
        .iter()
        .map(|t| match t.as_str() {
            "Title" => Constraint::Percentage(35),
            "Company" => Constraint::Percentage(25),
            "Score" => Constraint::Length(10),
            _ => Constraint::Min(12),
        })
        .collect();

    let table = Table::new(rows, col_widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!("{} (q to quit)", title)))
        .highlight_style(selected_style)
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, rects[0], table_state);

    let detail = table_state
        .selected()
        .map(|i| {
            format!(
                "{}\n{}",
                view.urls.get(i).map(String::as_str).unwrap_or(""),
                view.descriptions.get(i).map(String::as_str).unwrap_or("")
            )
        })
        .unwrap_or_default();
    let paragraph = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, rects[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn view_picks_known_columns_and_average_score() {
        let header = strings(&[
            "title",
            "company",
            "location",
            "url",
            "match_probability_rust",
            "average_match_probability",
        ]);
        let rows = vec![strings(&["Dev", "Acme", "Rome", "https://x/1", "0.9", "0.7"])];

        let view = ResultsView::new(&header, &rows);

        assert_eq!(view.titles, strings(&["Title", "Company", "Location", "Score"]));
        assert_eq!(view.rows[0], strings(&["Dev", "Acme", "Rome", "0.7"]));
        assert_eq!(view.urls[0], "https://x/1");
        assert_eq!(view.descriptions[0], "");
    }

    #[test]
    fn view_of_raw_scrape_has_no_score() {
        let header = strings(&["title", "deadline"]);
        let view = ResultsView::new(&header, &[strings(&["Dev", "01/01"])]);
        assert_eq!(view.titles, strings(&["Title", "Deadline"]));
    }

    #[test]
    fn selection_wraps_around() {
        assert_eq!(next_index(None, 3, true), Some(0));
        assert_eq!(next_index(Some(2), 3, true), Some(0));
        assert_eq!(next_index(Some(0), 3, false), Some(2));
        assert_eq!(next_index(Some(0), 0, true), None);
    }
}
