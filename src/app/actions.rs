use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Global commands, resolved before a key reaches the active widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NewNote,
    List,
    Cancel,
    Save,
    Confirm,
    Quit,
}

struct KeyBinding {
    command: Command,
    code: KeyCode,
    control: bool,
    help: Option<(&'static str, &'static str)>,
}

const BINDINGS: [KeyBinding; 7] = [
    KeyBinding {
        command: Command::NewNote,
        code: KeyCode::Char('n'),
        control: true,
        help: Some(("Ctrl+n", "new file")),
    },
    KeyBinding {
        command: Command::List,
        code: KeyCode::Char('l'),
        control: true,
        help: Some(("Ctrl+l", "list")),
    },
    KeyBinding {
        command: Command::Confirm,
        code: KeyCode::Enter,
        control: false,
        help: Some(("Enter", "open/create")),
    },
    KeyBinding {
        command: Command::Cancel,
        code: KeyCode::Esc,
        control: false,
        help: Some(("Esc", "back")),
    },
    KeyBinding {
        command: Command::Save,
        code: KeyCode::Char('s'),
        control: true,
        help: Some(("Ctrl+s", "save")),
    },
    KeyBinding {
        command: Command::Quit,
        code: KeyCode::Char('q'),
        control: true,
        help: Some(("Ctrl+q", "quit")),
    },
    KeyBinding {
        command: Command::Quit,
        code: KeyCode::Char('c'),
        control: true,
        help: None,
    },
];

impl KeyBinding {
    fn matches(&self, key: &KeyEvent) -> bool {
        if key
            .modifiers
            .intersects(KeyModifiers::ALT | KeyModifiers::SUPER)
        {
            return false;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) != self.control {
            return false;
        }
        match (self.code, key.code) {
            (KeyCode::Char(expected), KeyCode::Char(actual)) => {
                expected == actual.to_ascii_lowercase()
            }
            (expected, actual) => expected == actual,
        }
    }
}

pub fn resolve(key: &KeyEvent) -> Option<Command> {
    BINDINGS
        .iter()
        .find(|binding| binding.matches(key))
        .map(|binding| binding.command)
}

/// One-line summary of the global bindings, e.g. `Ctrl+n: new file . Esc: back`.
pub fn help_line() -> String {
    BINDINGS
        .iter()
        .filter_map(|binding| binding.help)
        .map(|(keys, label)| format!("{keys}: {label}"))
        .collect::<Vec<_>>()
        .join(" . ")
}
