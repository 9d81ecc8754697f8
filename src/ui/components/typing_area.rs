use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::session::trial::TrialController;
use crate::ui::palette::Palette;

pub struct TypingArea<'a> {
    trial: &'a TrialController,
    practice: bool,
}

impl<'a> TypingArea<'a> {
    pub fn new(trial: &'a TrialController) -> Self {
        Self {
            trial,
            practice: false,
        }
    }

    /// Mark the pass as unrecorded; changes the title and pending color.
    pub fn practice(mut self, practice: bool) -> Self {
        self.practice = practice;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CharRole {
    Typed,
    Cursor,
    Pending,
}

fn role_at(idx: usize, cursor: usize) -> CharRole {
    match idx.cmp(&cursor) {
        std::cmp::Ordering::Less => CharRole::Typed,
        std::cmp::Ordering::Equal => CharRole::Cursor,
        std::cmp::Ordering::Greater => CharRole::Pending,
    }
}

/// Spaces under the cursor are invisible without a marker.
fn display_char(ch: char, role: CharRole) -> String {
    if ch == ' ' && role == CharRole::Cursor {
        "\u{00b7}".to_string()
    } else {
        ch.to_string()
    }
}

impl Widget for TypingArea<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let pending = if self.practice {
            Palette::PRACTICE
        } else {
            Palette::TEXT_PENDING
        };

        let spans: Vec<Span> = self
            .trial
            .target()
            .iter()
            .enumerate()
            .map(|(idx, &ch)| {
                let role = role_at(idx, self.trial.cursor());
                let style = match role {
                    CharRole::Typed => Style::default().fg(Palette::TEXT_TYPED),
                    CharRole::Cursor => Style::default()
                        .fg(Palette::CURSOR_FG)
                        .bg(Palette::CURSOR_BG)
                        .add_modifier(Modifier::BOLD),
                    CharRole::Pending => Style::default().fg(pending),
                };
                Span::styled(display_char(ch, role), style)
            })
            .collect();

        let title = format!(
            " {} {:.0}% ",
            if self.practice { "practice" } else { "recording" },
            self.trial.progress() * 100.0
        );
        let block = Block::bordered()
            .title(title)
            .border_style(Style::default().fg(Palette::BORDER))
            .style(Style::default().bg(Palette::BG));

        Paragraph::new(Line::from(spans))
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
