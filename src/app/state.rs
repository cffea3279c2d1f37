use std::time::{Duration, Instant};

use time::{macros::format_description, OffsetDateTime, UtcOffset};
use unicode_segmentation::UnicodeSegmentation;

use crate::storage::{NoteEntry, NoteHandle};

/// Display item for one note in the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub name: String,
    pub modified_label: String,
}

impl From<NoteEntry> for NoteSummary {
    fn from(entry: NoteEntry) -> Self {
        Self {
            modified_label: format_modified(entry.modified),
            name: entry.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameDraft {
    value: String,
    char_limit: usize,
}

impl NameDraft {
    pub fn new(char_limit: usize) -> Self {
        Self {
            value: String::new(),
            char_limit,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn push(&mut self, ch: char) -> bool {
        if ch.is_control() || self.value.chars().count() >= self.char_limit {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub fn pop(&mut self) -> bool {
        let cursor = self.value.len();
        if cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.value, cursor);
        self.value.truncate(prev);
        true
    }
}

#[derive(Debug, Clone)]
pub struct EditorState {
    buffer: String,
    cursor: usize,
    dirty: bool,
    preferred_column: Option<usize>,
    history: Vec<String>,
    history_index: usize,
    history_limit: usize,
}

impl EditorState {
    pub fn new(buffer: String, history_limit: usize) -> Self {
        let cursor = buffer.len();
        let mut history = Vec::with_capacity(history_limit.min(128));
        history.push(buffer.clone());
        Self {
            buffer,
            cursor,
            dirty: false,
            preferred_column: None,
            history,
            history_index: 0,
            history_limit: history_limit.max(1),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.buffer.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        self.buffer.insert(self.cursor, '\n');
        self.cursor += 1;
        self.preferred_column = Some(0);
        self.after_edit();
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        self.preferred_column = None;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let line_start = line_start(&self.buffer, self.cursor);
        if self.cursor == line_start {
            return false;
        }
        self.cursor = line_start;
        self.preferred_column = Some(0);
        true
    }

    pub fn move_end(&mut self) -> bool {
        let line_end = line_end(&self.buffer, self.cursor);
        if self.cursor == line_end {
            return false;
        }
        self.cursor = line_end;
        self.preferred_column = Some(column_at(
            &self.buffer,
            line_start(&self.buffer, self.cursor),
            self.cursor,
        ));
        true
    }

    pub fn move_up(&mut self) -> bool {
        let current_line_start = line_start(&self.buffer, self.cursor);
        let current_column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_line_start, self.cursor));
        if current_line_start == 0 {
            if self.cursor == 0 {
                return false;
            }
            self.cursor = 0;
            self.preferred_column = Some(current_column);
            return true;
        }
        let prev_line_start = line_start(&self.buffer, current_line_start - 1);
        let target = position_for_column(&self.buffer, prev_line_start, current_column);
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(current_column);
        true
    }

    pub fn move_down(&mut self) -> bool {
        let current_line_start = line_start(&self.buffer, self.cursor);
        let current_column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_line_start, self.cursor));
        let current_line_end = line_end(&self.buffer, self.cursor);
        if current_line_end == self.buffer.len() {
            if self.cursor == self.buffer.len() {
                return false;
            }
            self.cursor = self.buffer.len();
            self.preferred_column = Some(current_column);
            return true;
        }
        let target = position_for_column(&self.buffer, current_line_end + 1, current_column);
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(current_column);
        true
    }

    pub fn move_word_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let mut idx = self.cursor;
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                idx = prev;
            } else {
                break;
            }
        }
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                break;
            }
            idx = prev;
        }
        self.cursor = idx;
        self.preferred_column = None;
        true
    }

    pub fn move_word_right(&mut self) -> bool {
        let len = self.buffer.len();
        if self.cursor >= len {
            return false;
        }
        let skip_while = |mut idx: usize, blank: bool| {
            while idx < len {
                let next = next_grapheme_boundary(&self.buffer, idx);
                if self.buffer[idx..next].trim().is_empty() != blank {
                    break;
                }
                idx = next;
            }
            idx
        };
        let idx = skip_while(skip_while(skip_while(self.cursor, true), false), true);
        if idx == self.cursor {
            return false;
        }
        self.cursor = idx.min(len);
        self.preferred_column = None;
        true
    }

    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.restore_history_snapshot();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.restore_history_snapshot();
        true
    }

    fn after_edit(&mut self) {
        self.dirty = true;
        self.record_history();
    }

    fn record_history(&mut self) {
        if let Some(current) = self.history.get(self.history_index) {
            if current.as_str() == self.buffer {
                return;
            }
        }
        self.history.truncate(self.history_index + 1);
        self.history.push(self.buffer.clone());
        if self.history.len() > self.history_limit {
            let overflow = self.history.len() - self.history_limit;
            self.history.drain(0..overflow);
        }
        self.history_index = self.history.len() - 1;
    }

    fn restore_history_snapshot(&mut self) {
        if let Some(snapshot) = self.history.get(self.history_index).cloned() {
            self.buffer = snapshot;
            self.cursor = floor_grapheme_boundary(&self.buffer, self.cursor);
            self.dirty = true;
            self.preferred_column = None;
        }
    }
}

/// Filter sub-state of the note list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Unfiltered,
    Filtering,
    Applied,
}

#[derive(Debug, Clone)]
pub struct NoteList {
    items: Vec<NoteSummary>,
    selected: usize,
    filter: String,
    filter_state: FilterState,
}

impl NoteList {
    pub fn new(items: Vec<NoteSummary>) -> Self {
        Self {
            items,
            selected: 0,
            filter: String::new(),
            filter_state: FilterState::Unfiltered,
        }
    }

    pub fn items(&self) -> &[NoteSummary] {
        &self.items
    }

    /// Replaces the items, keeping the filter and the selected note when it
    /// is still present.
    pub fn set_items(&mut self, items: Vec<NoteSummary>) {
        let previous = self.selected().map(|note| note.name.clone());
        self.items = items;
        self.selected = previous
            .and_then(|name| self.visible().iter().position(|note| note.name == name))
            .unwrap_or(0);
        self.normalize_selection();
    }

    pub fn visible(&self) -> Vec<&NoteSummary> {
        if self.filter.is_empty() {
            return self.items.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.items
            .iter()
            .filter(|note| note.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        if self.visible().is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    pub fn selected(&self) -> Option<&NoteSummary> {
        self.visible().get(self.selected).copied()
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.visible().len().saturating_sub(1);
    }

    pub fn filter_state(&self) -> FilterState {
        self.filter_state
    }

    pub fn filter_query(&self) -> &str {
        &self.filter
    }

    pub fn is_filtering(&self) -> bool {
        self.filter_state == FilterState::Filtering
    }

    pub fn begin_filter(&mut self) {
        self.filter_state = FilterState::Filtering;
    }

    pub fn push_filter_char(&mut self, ch: char) {
        self.filter.push(ch);
        self.selected = 0;
    }

    pub fn pop_filter_char(&mut self) {
        self.filter.pop();
        self.selected = 0;
    }

    /// Stops typing but keeps the query; an empty query clears the filter.
    pub fn accept_filter(&mut self) {
        self.filter_state = if self.filter.is_empty() {
            FilterState::Unfiltered
        } else {
            FilterState::Applied
        };
        self.normalize_selection();
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
        self.filter_state = FilterState::Unfiltered;
        self.normalize_selection();
    }

    fn normalize_selection(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

/// The note currently open for editing, together with its buffer.
#[derive(Debug, Clone)]
pub struct OpenNote {
    pub handle: NoteHandle,
    pub editor: EditorState,
}

/// The active view. Only one variant is live at a time, so at most one note
/// handle exists per session.
#[derive(Debug, Clone, Default)]
pub enum Mode {
    #[default]
    Idle,
    Naming(NameDraft),
    Editing(OpenNote),
    Listing(NoteList),
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Naming(_) => "naming",
            Mode::Editing(_) => "editing",
            Mode::Listing(_) => "listing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    shown_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub mode: Mode,
    status: Option<StatusMessage>,
}

impl AppState {
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Switches to `mode` and hands back the previous one.
    pub fn replace_mode(&mut self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.mode, mode)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Editing(_))
    }

    pub fn open_note(&self) -> Option<&OpenNote> {
        match &self.mode {
            Mode::Editing(open) => Some(open),
            _ => None,
        }
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorState> {
        match &mut self.mode {
            Mode::Editing(open) => Some(&mut open.editor),
            _ => None,
        }
    }

    pub fn name_draft_mut(&mut self) -> Option<&mut NameDraft> {
        match &mut self.mode {
            Mode::Naming(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn note_list(&self) -> Option<&NoteList> {
        match &self.mode {
            Mode::Listing(list) => Some(list),
            _ => None,
        }
    }

    pub fn note_list_mut(&mut self) -> Option<&mut NoteList> {
        match &mut self.mode {
            Mode::Listing(list) => Some(list),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: S) {
        self.status = Some(StatusMessage {
            text: message.into(),
            kind: StatusKind::Info,
            shown_at: Instant::now(),
        });
    }

    pub fn set_error_message<S: Into<String>>(&mut self, message: S) {
        self.status = Some(StatusMessage {
            text: message.into(),
            kind: StatusKind::Error,
            shown_at: Instant::now(),
        });
    }

    pub fn clear_status_message(&mut self) {
        self.status = None;
    }

    pub fn expire_status(&mut self, ttl: Duration) {
        if self
            .status
            .as_ref()
            .is_some_and(|status| status.shown_at.elapsed() >= ttl)
        {
            self.status = None;
        }
    }
}

fn format_modified(modified: OffsetDateTime) -> String {
    let local = UtcOffset::current_local_offset()
        .map(|offset| modified.to_offset(offset))
        .unwrap_or(modified);
    local
        .format(&format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| modified.unix_timestamp().to_string())
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn floor_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text.grapheme_indices(true)
        .map(|(idx, _)| idx)
        .take_while(|idx| *idx <= cursor)
        .last()
        .unwrap_or(0)
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    for grapheme in text[line_start..line_end].graphemes(true).take(column) {
        position += grapheme.len();
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries(names: &[&str]) -> Vec<NoteSummary> {
        names
            .iter()
            .map(|name| NoteSummary {
                name: name.to_string(),
                modified_label: "2024-01-01 00:00:00".into(),
            })
            .collect()
    }

    #[test]
    fn editor_undo_redo_cycles() {
        let mut editor = EditorState::new("hello".to_string(), 200);
        assert!(editor.insert_char('!'));
        assert_eq!(editor.buffer(), "hello!");
        assert!(editor.undo());
        assert_eq!(editor.buffer(), "hello");
        assert!(!editor.undo());
        assert!(editor.redo());
        assert_eq!(editor.buffer(), "hello!");
    }

    #[test]
    fn editor_word_navigation_skips_whitespace() {
        let mut editor = EditorState::new("alpha  beta".to_string(), 200);
        editor.move_home();
        editor.move_end();
        assert!(editor.move_word_left());
        assert_eq!(editor.cursor(), 7); // start of "beta"
        assert!(editor.move_word_left());
        assert_eq!(editor.cursor(), 0);
        assert!(editor.move_word_right());
        assert_eq!(editor.cursor(), 7);
    }

    #[test]
    fn editor_vertical_moves_keep_preferred_column() {
        let mut editor = EditorState::new("abcdef\nxy\nuvwxyz".to_string(), 200);
        editor.move_up();
        editor.move_up();
        assert_eq!(editor.cursor(), 6); // end of "abcdef"
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 9); // clamped to end of "xy"
        assert!(editor.move_down());
        assert_eq!(editor.cursor(), 16); // back to column 6
    }

    #[test]
    fn editor_backspace_removes_whole_graphemes() {
        let mut editor = EditorState::new("e\u{301}".to_string(), 200);
        assert!(editor.backspace());
        assert_eq!(editor.buffer(), "");
        assert!(editor.is_dirty());
        assert!(!editor.backspace());
    }

    #[test]
    fn editor_history_is_bounded() {
        let mut editor = EditorState::new(String::new(), 3);
        for ch in ['a', 'b', 'c', 'd'] {
            editor.insert_char(ch);
        }
        assert!(editor.undo());
        assert!(editor.undo());
        assert!(!editor.undo());
        assert_eq!(editor.buffer(), "ab");
    }

    #[test]
    fn name_draft_respects_char_limit() {
        let mut draft = NameDraft::new(3);
        assert!(draft.push('a'));
        assert!(draft.push('é'));
        assert!(draft.push('c'));
        assert!(!draft.push('d'));
        assert_eq!(draft.value(), "aéc");
        assert!(draft.pop());
        assert!(draft.pop());
        assert_eq!(draft.value(), "a");
    }

    #[test]
    fn name_draft_blank_when_only_whitespace() {
        let mut draft = NameDraft::new(10);
        draft.push(' ');
        assert!(draft.is_blank());
        assert!(!draft.push('\t'));
    }

    #[test]
    fn note_list_filter_is_case_insensitive() {
        let mut list = NoteList::new(summaries(&["Groceries.md", "ideas.md", "todo.md"]));
        list.begin_filter();
        for ch in "GRO".chars() {
            list.push_filter_char(ch);
        }
        let visible: Vec<_> = list.visible().iter().map(|n| n.name.clone()).collect();
        assert_eq!(visible, vec!["Groceries.md".to_string()]);
        assert_eq!(list.selected().map(|n| n.name.as_str()), Some("Groceries.md"));

        list.accept_filter();
        assert_eq!(list.filter_state(), FilterState::Applied);
        list.clear_filter();
        assert_eq!(list.visible().len(), 3);
    }

    #[test]
    fn note_list_selection_clamps_to_visible_items() {
        let mut list = NoteList::new(summaries(&["a.md", "b.md", "c.md"]));
        list.move_selection(10);
        assert_eq!(list.selected_index(), Some(2));
        list.move_selection(-10);
        assert_eq!(list.selected_index(), Some(0));
        list.select_last();
        list.set_items(summaries(&["a.md"]));
        assert_eq!(list.selected_index(), Some(0));
        list.set_items(Vec::new());
        assert_eq!(list.selected_index(), None);
        assert!(list.selected().is_none());
    }

    #[test]
    fn note_list_refresh_keeps_selected_note() {
        let mut list = NoteList::new(summaries(&["a.md", "b.md", "c.md"]));
        list.move_selection(1);
        list.set_items(summaries(&["0.md", "a.md", "b.md", "c.md"]));
        assert_eq!(list.selected().map(|n| n.name.as_str()), Some("b.md"));
    }

    #[test]
    fn modified_label_has_fixed_width() {
        let label = format_modified(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(label.len(), "1970-01-01 00:00:00".len(), "got {label}");
    }

    #[test]
    fn expired_status_is_cleared() {
        let mut state = AppState::default();
        state.set_status_message("saved");
        state.expire_status(Duration::from_secs(60));
        assert!(state.status().is_some());
        state.expire_status(Duration::ZERO);
        assert!(state.status().is_none());
    }
}
