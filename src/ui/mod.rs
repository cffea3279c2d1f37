use ratatui::layout::{Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::actions;
use crate::app::state::{AppState, FilterState, Mode, NameDraft, NoteList, OpenNote, StatusKind};
use crate::config::themes::Theme;
use crate::highlight::filter_regex;

const HEADER: &str = "Welcome to TermNote! >_";
const LIST_TITLE: &str = "TermNote - Your Notes";
const NAME_PLACEHOLDER: &str = "Enter the name of your new note...";
const BODY_PLACEHOLDER: &str = "Start writing your note...";
const NAME_PROMPT: &str = "> ";
const TAB_WIDTH: usize = 4;

pub fn draw_app(frame: &mut Frame, state: &AppState, theme: &Theme, list_state: &mut ListState) {
    let area = frame.size().inner(Margin {
        vertical: 1,
        horizontal: 2,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(Line::from(Span::styled(
        format!(" {HEADER} "),
        Style::default()
            .fg(theme.title_fg)
            .bg(theme.accent)
            .add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(header, rows[0]);

    match state.mode() {
        Mode::Idle => draw_idle(frame, rows[2], theme),
        Mode::Naming(draft) => draw_name_prompt(frame, rows[2], draft, theme),
        Mode::Editing(open) => draw_editor(frame, rows[2], open, theme),
        Mode::Listing(list) => draw_list(frame, rows[2], list, theme, list_state),
    }

    let help = Paragraph::new(actions::help_line()).style(Style::default().fg(theme.muted));
    frame.render_widget(help, rows[3]);
    frame.render_widget(Paragraph::new(build_status_line(state, theme)), rows[4]);
}

fn draw_idle(frame: &mut Frame, area: Rect, theme: &Theme) {
    let hint = Paragraph::new(Text::from(vec![
        Line::from("Press Ctrl+n to write a new note."),
        Line::from("Press Ctrl+l to browse your notes."),
    ]))
    .style(Style::default().fg(theme.muted));
    frame.render_widget(hint, area);
}

fn draw_name_prompt(frame: &mut Frame, area: Rect, draft: &NameDraft, theme: &Theme) {
    let value = if draft.value().is_empty() {
        Span::styled(NAME_PLACEHOLDER, Style::default().fg(theme.muted))
    } else {
        Span::styled(draft.value().to_string(), Style::default().fg(theme.text))
    };
    let line = Line::from(vec![
        Span::styled(NAME_PROMPT, Style::default().fg(theme.accent)),
        value,
    ]);
    frame.render_widget(Paragraph::new(line), area);

    let offset = UnicodeWidthStr::width(NAME_PROMPT) + UnicodeWidthStr::width(draft.value());
    let x = area
        .x
        .saturating_add(offset as u16)
        .min(area.right().saturating_sub(1));
    frame.set_cursor(x, area.y);
}

fn draw_editor(frame: &mut Frame, area: Rect, open: &OpenNote, theme: &Theme) {
    let editor = &open.editor;
    let mut title = format!(" {} ", open.handle.name());
    if editor.is_dirty() {
        title.push_str("* ");
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let buffer = editor.buffer();
    if buffer.is_empty() {
        let placeholder =
            Paragraph::new(BODY_PLACEHOLDER).style(Style::default().fg(theme.muted));
        frame.render_widget(placeholder, inner);
        frame.set_cursor(inner.x, inner.y);
        return;
    }

    let (row, col) = cursor_row_col(buffer, editor.cursor());
    let row_offset = row.saturating_sub(inner.height as usize - 1);
    let col_offset = col.saturating_sub(inner.width as usize - 1);

    let lines: Vec<Line> = buffer
        .split('\n')
        .map(|line| Line::from(expand_tabs(line)))
        .collect();
    let body = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text))
        .scroll((row_offset as u16, col_offset as u16));
    frame.render_widget(body, inner);

    frame.set_cursor(
        inner.x + (col - col_offset) as u16,
        inner.y + (row - row_offset) as u16,
    );
}

fn draw_list(
    frame: &mut Frame,
    area: Rect,
    list: &NoteList,
    theme: &Theme,
    list_state: &mut ListState,
) {
    let block = Block::default()
        .title(Span::styled(
            format!(" {LIST_TITLE} "),
            Style::default()
                .fg(theme.title_fg)
                .bg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let list_area = if list.filter_state() == FilterState::Unfiltered {
        inner
    } else {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(inner);
        draw_filter_line(frame, parts[0], list, theme);
        parts[1]
    };

    let visible = list.visible();
    if visible.is_empty() {
        let message = if list.items().is_empty() {
            "No notes yet. Press Ctrl+n to create one."
        } else {
            "No notes match the filter."
        };
        let empty = Paragraph::new(message).style(Style::default().fg(theme.muted));
        frame.render_widget(empty, list_area);
        list_state.select(None);
        return;
    }

    let regex = filter_regex(list.filter_query());
    let highlight_style = Style::default()
        .fg(theme.highlight)
        .add_modifier(Modifier::BOLD);
    let items: Vec<ListItem> = visible
        .iter()
        .map(|note| {
            let name = Line::from(highlight_line(
                &note.name,
                regex.as_ref(),
                highlight_style,
                Style::default().fg(theme.text),
            ));
            let modified = Line::from(Span::styled(
                format!("Last Modified: {}", note.modified_label),
                Style::default().fg(theme.muted),
            ));
            ListItem::new(Text::from(vec![name, modified]))
        })
        .collect();

    let widget = List::new(items)
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("│ ");
    list_state.select(list.selected_index());
    frame.render_stateful_widget(widget, list_area, list_state);
}

fn draw_filter_line(frame: &mut Frame, area: Rect, list: &NoteList, theme: &Theme) {
    let label = "Filter: ";
    let line = Line::from(vec![
        Span::styled(label, Style::default().fg(theme.accent)),
        Span::styled(list.filter_query().to_string(), Style::default().fg(theme.text)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    if list.is_filtering() {
        let offset = UnicodeWidthStr::width(label) + UnicodeWidthStr::width(list.filter_query());
        let x = area
            .x
            .saturating_add(offset as u16)
            .min(area.right().saturating_sub(1));
        frame.set_cursor(x, area.y);
    }
}

fn build_status_line(state: &AppState, theme: &Theme) -> Line<'static> {
    match state.status() {
        Some(status) => {
            let color = match status.kind {
                StatusKind::Info => theme.text,
                StatusKind::Error => theme.error,
            };
            Line::from(Span::styled(status.text.clone(), Style::default().fg(color)))
        }
        None => Line::from(Span::styled(
            format!("Mode: {}", state.mode().label()),
            Style::default().fg(theme.muted),
        )),
    }
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for mat in re.find_iter(text) {
        if mat.start() > last {
            spans.push(Span::styled(text[last..mat.start()].to_string(), base_style));
        }
        spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
        last = mat.end();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

fn expand_tabs(line: &str) -> String {
    line.replace('\t', &" ".repeat(TAB_WIDTH))
}

/// Screen row and column of `cursor`, counting a tab as `TAB_WIDTH` cells.
fn cursor_row_col(buffer: &str, cursor: usize) -> (usize, usize) {
    let before = &buffer[..cursor.min(buffer.len())];
    let row = before.matches('\n').count();
    let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let col = before[line_start..]
        .graphemes(true)
        .map(|grapheme| {
            if grapheme == "\t" {
                TAB_WIDTH
            } else {
                UnicodeWidthStr::width(grapheme)
            }
        })
        .sum();
    (row, col)
}
