use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A raw keydown as the capture engine sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKey {
    Char(char),
    Modifier(ModifierKey),
    Tab,
    Escape,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifierKey {
    Shift,
    Control,
    Alt,
    Meta,
}

impl InputKey {
    /// Space would scroll a browser page; terminal drivers swallow it too.
    pub fn suppresses_default(self) -> bool {
        matches!(self, InputKey::Char(' '))
    }

    pub fn is_abort(self) -> bool {
        matches!(self, InputKey::Tab | InputKey::Escape)
    }

    /// Translate a crossterm event. Returns `None` for release/repeat events,
    /// which never count as a keydown.
    pub fn from_key_event(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        let mapped = match key.code {
            KeyCode::Char(ch) => {
                // Ctrl/Alt chords are shortcuts, not text.
                if key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
                {
                    InputKey::Other
                } else {
                    InputKey::Char(ch)
                }
            }
            KeyCode::Tab | KeyCode::BackTab => InputKey::Tab,
            KeyCode::Esc => InputKey::Escape,
            KeyCode::Modifier(m) => {
                use crossterm::event::ModifierKeyCode::*;
                match m {
                    LeftShift | RightShift => InputKey::Modifier(ModifierKey::Shift),
                    LeftControl | RightControl => InputKey::Modifier(ModifierKey::Control),
                    LeftAlt | RightAlt | IsoLevel3Shift | IsoLevel5Shift => {
                        InputKey::Modifier(ModifierKey::Alt)
                    }
                    LeftSuper | RightSuper | LeftMeta | RightMeta | LeftHyper | RightHyper => {
                        InputKey::Modifier(ModifierKey::Meta)
                    }
                }
            }
            _ => InputKey::Other,
        };
        Some(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, ModifierKeyCode};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn shifted_char_is_plain_text() {
        let key = press(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(InputKey::from_key_event(key), Some(InputKey::Char('A')));
    }

    #[test]
    fn control_chord_is_not_text() {
        let key = press(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(InputKey::from_key_event(key), Some(InputKey::Other));
    }

    #[test]
    fn bare_modifiers_map_to_modifier_keys() {
        let key = press(
            KeyCode::Modifier(ModifierKeyCode::LeftShift),
            KeyModifiers::SHIFT,
        );
        assert_eq!(
            InputKey::from_key_event(key),
            Some(InputKey::Modifier(ModifierKey::Shift))
        );
    }

    #[test]
    fn release_is_dropped() {
        let mut key = press(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(InputKey::from_key_event(key), None);
    }

    #[test]
    fn tab_and_escape_abort() {
        assert!(InputKey::Tab.is_abort());
        assert!(InputKey::Escape.is_abort());
        assert!(!InputKey::Char('a').is_abort());
    }

    #[test]
    fn only_space_suppresses_default() {
        assert!(InputKey::Char(' ').suppresses_default());
        assert!(!InputKey::Char('a').suppresses_default());
    }
}
