use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use unicode_width::UnicodeWidthStr;

use crate::app::state::NoteSummary;
use crate::app::App;
use crate::config::AppConfig;
use crate::storage::{NoteHandle, Vault, NOTE_EXTENSION};

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Name for the note, without extension (prompted if omitted)
    #[arg()]
    pub name: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note to print; `.md` is appended when missing
    #[arg()]
    pub name: String,
}

pub fn run_tui(config: Arc<AppConfig>, vault: Vault) -> Result<()> {
    let mut app = App::new(config, vault);
    app.run()
}

pub fn list_notes(vault: &Vault) -> Result<()> {
    let entries = vault.list_notes().context("listing notes")?;
    let summaries: Vec<NoteSummary> = entries.into_iter().map(NoteSummary::from).collect();
    print!("{}", render_listing(vault.root(), &summaries));
    Ok(())
}

fn render_listing(root: &Path, notes: &[NoteSummary]) -> String {
    if notes.is_empty() {
        return format!("No notes in {}\n", root.display());
    }
    let width = notes
        .iter()
        .map(|note| UnicodeWidthStr::width(note.name.as_str()))
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for note in notes {
        let padding = width - UnicodeWidthStr::width(note.name.as_str());
        let _ = writeln!(
            out,
            "{}{:padding$}  Last Modified: {}",
            note.name, "", note.modified_label
        );
    }
    out
}

pub fn new_note(vault: &Vault, args: NewArgs) -> Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => prompt("Name")?,
    };
    if name.trim().is_empty() {
        bail!("note name cannot be empty");
    }
    let body = match args.body {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };

    let handle = create_with_body(vault, &name, &body)?;
    println!("Created {}", handle.path().display());
    Ok(())
}

fn create_with_body(vault: &Vault, name: &str, body: &str) -> Result<NoteHandle> {
    let handle = vault
        .create_note(name)
        .with_context(|| format!("creating note '{}'", name.trim()))?;
    if !body.is_empty() {
        vault
            .save_note(&handle, body)
            .with_context(|| format!("writing body of {}", handle.name()))?;
    }
    tracing::info!(note = %handle.name(), bytes = body.len(), "note created from cli");
    Ok(handle)
}

pub fn show_note(vault: &Vault, args: ShowArgs) -> Result<()> {
    let content = read_note(vault, &args.name)?;
    print!("{content}");
    if !content.is_empty() && !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn read_note(vault: &Vault, name: &str) -> Result<String> {
    let name = name.trim();
    let file_name = if Path::new(name)
        .extension()
        .is_some_and(|ext| ext == NOTE_EXTENSION)
    {
        name.to_string()
    } else {
        format!("{name}.{NOTE_EXTENSION}")
    };
    let (content, _) = vault
        .open_note(&file_name)
        .with_context(|| format!("reading note {file_name}"))?;
    Ok(content)
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{label}: ")?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading note body from stdin")?;
    Ok(Some(buf))
}
