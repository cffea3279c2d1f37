use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::themes::Theme;
use crate::config::AppConfig;
use crate::storage::{Vault, VaultError};
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::Command;
pub use state::{
    AppState, EditorState, FilterState, Mode, NameDraft, NoteList, NoteSummary, OpenNote,
    StatusKind,
};

const LIST_PAGE: isize = 5;

pub struct App {
    pub config: Arc<AppConfig>,
    pub vault: Vault,
    theme: Theme,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, vault: Vault) -> Self {
        let theme = config.theme();
        let tick_rate = config.ui.tick_rate();
        Self {
            config,
            vault,
            theme,
            state: AppState::default(),
            list_state: ListState::default(),
            should_quit: false,
            tick_rate,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        tracing::info!(vault = %self.vault.root().display(), "starting tui");
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state, &self.theme, &mut self.list_state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    // the next draw picks up the new size
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        self.state.expire_status(self.config.ui.status_ttl());
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if let Some(command) = actions::resolve(&key) {
            if self.handle_command(command) {
                return;
            }
        }

        self.forward_to_widget(key);
    }

    /// Returns `false` when the key should fall through to the active widget.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => {
                if self.state.open_note().is_some_and(|open| open.editor.is_dirty()) {
                    tracing::info!("quitting with unsaved edits discarded");
                }
                self.should_quit = true;
                true
            }
            Command::NewNote => {
                self.start_new_note();
                true
            }
            Command::List => {
                self.show_list();
                true
            }
            Command::Cancel => self.cancel(),
            Command::Save => {
                self.save_open_note();
                true
            }
            Command::Confirm => self.confirm(),
        }
    }

    fn start_new_note(&mut self) {
        if let Mode::Editing(open) = self.state.mode() {
            let name = open.handle.name().to_string();
            self.state.set_status_message(format!(
                "'{name}' is open. Ctrl+s to save or Esc to discard first"
            ));
            return;
        }
        self.state
            .replace_mode(Mode::Naming(NameDraft::new(self.config.editor.name_char_limit)));
        self.state.clear_status_message();
    }

    fn show_list(&mut self) {
        if let Mode::Editing(open) = self.state.mode() {
            let name = open.handle.name().to_string();
            self.state.set_status_message(format!(
                "'{name}' is open. Ctrl+s to save or Esc to discard first"
            ));
            return;
        }
        let items = self.load_listing();
        match self.state.note_list_mut() {
            Some(list) => list.set_items(items),
            None => {
                self.state.replace_mode(Mode::Listing(NoteList::new(items)));
            }
        }
    }

    /// Current vault listing. Failures are reported and an empty list is
    /// substituted.
    fn load_listing(&mut self) -> Vec<NoteSummary> {
        match self.vault.list_notes() {
            Ok(entries) => entries.into_iter().map(NoteSummary::from).collect(),
            Err(err) => {
                tracing::error!(?err, "failed to list notes");
                self.state
                    .set_error_message(format!("Cannot read notes list: {err}"));
                Vec::new()
            }
        }
    }

    fn cancel(&mut self) -> bool {
        match self.state.mode() {
            Mode::Idle => true,
            Mode::Naming(_) => {
                self.state.replace_mode(Mode::Idle);
                self.state.set_status_message("Canceled new note");
                true
            }
            Mode::Editing(_) => {
                if let Mode::Editing(open) = self.state.replace_mode(Mode::Idle) {
                    let name = open.handle.name();
                    if open.editor.is_dirty() {
                        tracing::debug!(note = %name, "discarded unsaved edits");
                        self.state
                            .set_status_message(format!("Discarded changes to '{name}'"));
                    } else {
                        self.state.set_status_message(format!("Closed '{name}'"));
                    }
                }
                true
            }
            Mode::Listing(list) if list.is_filtering() => false,
            Mode::Listing(_) => {
                self.state.replace_mode(Mode::Idle);
                self.state.clear_status_message();
                true
            }
        }
    }

    fn save_open_note(&mut self) {
        let Some(open) = self.state.open_note() else {
            self.state.set_status_message("No note is open");
            return;
        };
        match self.vault.save_note(&open.handle, open.editor.buffer()) {
            Ok(()) => {
                let name = open.handle.name().to_string();
                tracing::info!(note = %name, "note saved");
                self.state.replace_mode(Mode::Idle);
                self.state.set_status_message(format!("Saved '{name}'"));
            }
            Err(err) => {
                tracing::error!(?err, note = %open.handle.name(), "failed to save note");
                self.state
                    .set_error_message(format!("Cannot save the note: {}", error_chain(&err)));
            }
        }
    }

    fn confirm(&mut self) -> bool {
        match self.state.mode() {
            Mode::Editing(_) => false,
            Mode::Listing(_) => {
                self.open_selected_note();
                true
            }
            Mode::Naming(draft) if !draft.is_blank() => {
                let name = draft.value().to_string();
                self.submit_new_note(&name);
                true
            }
            Mode::Naming(_) | Mode::Idle => true,
        }
    }

    fn submit_new_note(&mut self, name: &str) {
        match self.vault.create_note(name) {
            Ok(handle) => {
                tracing::info!(note = %handle.name(), "note created");
                let message = format!("Editing '{}'", handle.name());
                let editor = EditorState::new(String::new(), self.config.editor.history_limit);
                self.state
                    .replace_mode(Mode::Editing(OpenNote { handle, editor }));
                self.state.set_status_message(message);
            }
            Err(VaultError::AlreadyExists { name }) => {
                tracing::debug!(note = %name, "ignored create for existing note");
                self.state
                    .set_status_message(format!("A note named '{name}' already exists"));
            }
            Err(err @ VaultError::InvalidName { .. }) => {
                self.state.set_error_message(err.to_string());
            }
            Err(err) => {
                tracing::error!(?err, "failed to create note");
                self.state
                    .set_error_message(format!("Cannot create the note: {}", error_chain(&err)));
            }
        }
    }

    fn open_selected_note(&mut self) {
        let Some(name) = self
            .state
            .note_list()
            .and_then(|list| list.selected())
            .map(|note| note.name.clone())
        else {
            return;
        };

        match self.vault.open_note(&name) {
            Ok((content, handle)) => {
                tracing::debug!(note = %name, "opening note for editing");
                let editor = EditorState::new(content, self.config.editor.history_limit);
                self.state
                    .replace_mode(Mode::Editing(OpenNote { handle, editor }));
                self.state.set_status_message(format!("Editing '{name}'"));
            }
            Err(err @ VaultError::NotFound { .. }) => {
                tracing::warn!(?err, "selected note vanished");
                let items = self.load_listing();
                if let Some(list) = self.state.note_list_mut() {
                    list.set_items(items);
                }
                self.state.set_error_message(err.to_string());
            }
            Err(err) => {
                tracing::error!(?err, note = %name, "failed to open note");
                self.state
                    .set_error_message(format!("Cannot open the note: {}", error_chain(&err)));
            }
        }
    }

    fn forward_to_widget(&mut self, key: KeyEvent) {
        match self.state.mode() {
            Mode::Idle => {}
            Mode::Naming(_) => self.handle_name_key(key),
            Mode::Editing(_) => self.handle_editor_key(key),
            Mode::Listing(_) => self.handle_list_key(key),
        }
    }

    fn handle_name_key(&mut self, key: KeyEvent) {
        let Some(draft) = self.state.name_draft_mut() else {
            return;
        };
        match key.code {
            KeyCode::Backspace => {
                draft.pop();
            }
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                draft.push(ch);
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let Some(editor) = self.state.editor_mut() else {
            return;
        };

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('z') => {
                    if !editor.undo() {
                        self.state.set_status_message("Nothing to undo");
                    }
                }
                KeyCode::Char('y') => {
                    if !editor.redo() {
                        self.state.set_status_message("Nothing to redo");
                    }
                }
                KeyCode::Left => {
                    editor.move_word_left();
                }
                KeyCode::Right => {
                    editor.move_word_right();
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Enter => {
                editor.insert_newline();
            }
            KeyCode::Backspace => {
                editor.backspace();
            }
            KeyCode::Delete => {
                editor.delete();
            }
            KeyCode::Tab => {
                editor.insert_char('\t');
            }
            KeyCode::Char(ch)
                if !key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) =>
            {
                editor.insert_char(ch);
            }
            KeyCode::Left => {
                editor.move_left();
            }
            KeyCode::Right => {
                editor.move_right();
            }
            KeyCode::Up => {
                editor.move_up();
            }
            KeyCode::Down => {
                editor.move_down();
            }
            KeyCode::Home => {
                editor.move_home();
            }
            KeyCode::End => {
                editor.move_end();
            }
            _ => {}
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        let Some(list) = self.state.note_list_mut() else {
            return;
        };
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);

        if list.is_filtering() {
            match key.code {
                KeyCode::Esc => list.clear_filter(),
                KeyCode::Tab => list.accept_filter(),
                KeyCode::Backspace => list.pop_filter_char(),
                KeyCode::Up => list.move_selection(-1),
                KeyCode::Down => list.move_selection(1),
                KeyCode::Char(ch) if plain => list.push_filter_char(ch),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('/') if plain => list.begin_filter(),
            KeyCode::Char('j') | KeyCode::Down => list.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => list.move_selection(-1),
            KeyCode::PageDown => list.move_selection(LIST_PAGE),
            KeyCode::PageUp => list.move_selection(-LIST_PAGE),
            KeyCode::Home | KeyCode::Char('g') => list.select_first(),
            KeyCode::End | KeyCode::Char('G') => list.select_last(),
            _ => {}
        }
    }
}

fn error_chain(err: &VaultError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultOptions;
    use crate::storage;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn test_app() -> anyhow::Result<(TempDir, App)> {
        let temp = TempDir::new()?;
        let mut config = AppConfig::default();
        config.vault = VaultOptions {
            dir: None,
            path: temp.path().join("vault"),
        };
        let vault = storage::init(&config.vault)?;
        Ok((temp, App::new(Arc::new(config), vault)))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, ch: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                press(app, KeyCode::Enter);
            } else {
                press(app, KeyCode::Char(ch));
            }
        }
    }

    fn listed_names(app: &App) -> Vec<String> {
        app.state()
            .note_list()
            .map(|list| list.items().iter().map(|n| n.name.clone()).collect())
            .unwrap_or_default()
    }

    fn create_note(app: &mut App, name: &str) {
        ctrl(app, 'n');
        type_text(app, name);
        press(app, KeyCode::Enter);
    }

    #[test]
    fn groceries_scenario_round_trips() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;

        create_note(&mut app, "groceries");
        assert_matches!(app.state().mode(), Mode::Editing(open) if open.handle.name() == "groceries.md");

        type_text(&mut app, "milk, eggs");
        ctrl(&mut app, 's');
        assert_matches!(app.state().mode(), Mode::Idle);

        ctrl(&mut app, 'l');
        assert_eq!(listed_names(&app), vec!["groceries.md".to_string()]);

        press(&mut app, KeyCode::Enter);
        let open = app.state().open_note().expect("note open");
        assert_eq!(open.editor.buffer(), "milk, eggs");
        assert!(!open.editor.is_dirty());
        Ok(())
    }

    #[test]
    fn duplicate_name_is_rejected_and_reported() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "todo");
        type_text(&mut app, "first");
        ctrl(&mut app, 's');

        create_note(&mut app, "todo");
        assert_matches!(app.state().mode(), Mode::Naming(draft) if draft.value() == "todo");
        let status = app.state().status().expect("status");
        assert!(status.text.contains("already exists"), "{}", status.text);

        press(&mut app, KeyCode::Esc);
        ctrl(&mut app, 'l');
        assert_eq!(listed_names(&app), vec!["todo.md".to_string()]);
        let (content, _) = app.vault.open_note("todo.md")?;
        assert_eq!(content, "first");
        Ok(())
    }

    #[test]
    fn cancel_naming_never_creates_a_file() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        ctrl(&mut app, 'n');
        type_text(&mut app, "draft");
        press(&mut app, KeyCode::Esc);
        assert_matches!(app.state().mode(), Mode::Idle);
        assert!(app.vault.list_notes()?.is_empty());

        ctrl(&mut app, 'n');
        assert_matches!(app.state().mode(), Mode::Naming(draft) if draft.value().is_empty());
        Ok(())
    }

    #[test]
    fn cancel_while_editing_leaves_file_untouched() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "diary");
        type_text(&mut app, "dear diary");
        ctrl(&mut app, 's');

        ctrl(&mut app, 'l');
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "\nsecret addition");
        press(&mut app, KeyCode::Esc);

        assert_matches!(app.state().mode(), Mode::Idle);
        let (content, _) = app.vault.open_note("diary.md")?;
        assert_eq!(content, "dear diary");
        Ok(())
    }

    #[test]
    fn empty_name_confirm_is_a_no_op() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        ctrl(&mut app, 'n');
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert_matches!(app.state().mode(), Mode::Naming(_));
        assert!(app.vault.list_notes()?.is_empty());
        Ok(())
    }

    #[test]
    fn invalid_name_is_reported() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "../escape");
        assert_matches!(app.state().mode(), Mode::Naming(_));
        assert_matches!(app.state().status().map(|s| s.kind), Some(StatusKind::Error));
        assert!(app.vault.list_notes()?.is_empty());
        Ok(())
    }

    #[test]
    fn dotted_name_is_refused_instead_of_hidden() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, ".secret");
        assert_matches!(app.state().mode(), Mode::Naming(_));
        assert_matches!(app.state().status().map(|s| s.kind), Some(StatusKind::Error));
        assert!(!app.vault.root().join(".secret.md").exists());
        Ok(())
    }

    #[test]
    fn enter_inserts_newline_while_editing() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "lines");
        type_text(&mut app, "one\ntwo");
        let open = app.state().open_note().expect("note open");
        assert_eq!(open.editor.buffer(), "one\ntwo");
        Ok(())
    }

    #[test]
    fn new_note_and_list_are_refused_while_editing() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "busy");
        type_text(&mut app, "work");

        ctrl(&mut app, 'n');
        assert!(app.state().is_editing());
        ctrl(&mut app, 'l');
        assert!(app.state().is_editing());
        assert_eq!(
            app.state().open_note().map(|open| open.editor.buffer()),
            Some("work")
        );
        Ok(())
    }

    #[test]
    fn save_outside_editing_only_reports() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        ctrl(&mut app, 's');
        assert_matches!(app.state().mode(), Mode::Idle);
        assert!(app.state().status().is_some());
        Ok(())
    }

    #[test]
    fn failed_save_keeps_the_buffer() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "fragile");
        type_text(&mut app, "precious words");
        fs::remove_dir_all(app.vault.root())?;

        ctrl(&mut app, 's');
        let open = app.state().open_note().expect("still editing");
        assert_eq!(open.editor.buffer(), "precious words");
        assert_matches!(app.state().status().map(|s| s.kind), Some(StatusKind::Error));
        Ok(())
    }

    #[test]
    fn vanished_note_keeps_user_in_refreshed_list() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "ephemeral");
        ctrl(&mut app, 's');
        ctrl(&mut app, 'l');
        fs::remove_file(app.vault.root().join("ephemeral.md"))?;

        press(&mut app, KeyCode::Enter);
        assert_matches!(app.state().mode(), Mode::Listing(_));
        assert!(listed_names(&app).is_empty());
        assert_matches!(app.state().status().map(|s| s.kind), Some(StatusKind::Error));
        Ok(())
    }

    #[test]
    fn unreadable_vault_shows_empty_list() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        fs::remove_dir_all(app.vault.root())?;
        ctrl(&mut app, 'l');
        assert_matches!(app.state().mode(), Mode::Listing(list) if list.items().is_empty());
        assert_matches!(app.state().status().map(|s| s.kind), Some(StatusKind::Error));
        Ok(())
    }

    #[test]
    fn esc_in_list_clears_filter_before_leaving() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        for name in ["alpha", "beta"] {
            create_note(&mut app, name);
            ctrl(&mut app, 's');
        }
        ctrl(&mut app, 'l');
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "bet");
        let list = app.state().note_list().expect("listing");
        assert_eq!(list.visible().len(), 1);

        press(&mut app, KeyCode::Esc);
        let list = app.state().note_list().expect("still listing");
        assert_eq!(list.filter_state(), FilterState::Unfiltered);
        assert_eq!(list.visible().len(), 2);

        press(&mut app, KeyCode::Esc);
        assert_matches!(app.state().mode(), Mode::Idle);
        Ok(())
    }

    #[test]
    fn enter_opens_filtered_selection() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        for (name, body) in [("alpha", "first"), ("beta", "second")] {
            create_note(&mut app, name);
            type_text(&mut app, body);
            ctrl(&mut app, 's');
        }
        ctrl(&mut app, 'l');
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "BETA");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Enter);

        let open = app.state().open_note().expect("note open");
        assert_eq!(open.handle.name(), "beta.md");
        assert_eq!(open.editor.buffer(), "second");
        Ok(())
    }

    #[test]
    fn list_navigation_moves_selection() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        for name in ["a", "b", "c"] {
            create_note(&mut app, name);
            ctrl(&mut app, 's');
        }
        ctrl(&mut app, 'l');
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('k'));
        let list = app.state().note_list().expect("listing");
        assert_eq!(list.selected().map(|n| n.name.as_str()), Some("b.md"));
        Ok(())
    }

    #[test]
    fn quit_discards_without_saving() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        create_note(&mut app, "unsaved");
        type_text(&mut app, "lost words");
        ctrl(&mut app, 'q');
        assert!(app.should_quit());
        let (content, _) = app.vault.open_note("unsaved.md")?;
        assert!(content.is_empty());
        Ok(())
    }

    #[test]
    fn key_releases_are_ignored() -> anyhow::Result<()> {
        let (_temp, mut app) = test_app()?;
        let mut release = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL);
        release.kind = KeyEventKind::Release;
        app.handle_key(release);
        assert_matches!(app.state().mode(), Mode::Idle);
        Ok(())
    }
}
