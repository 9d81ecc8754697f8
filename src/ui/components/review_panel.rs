use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::session::metrics::SessionMetrics;
use crate::session::record::{RecordedKeystroke, Session};
use crate::ui::palette::Palette;

/// Summary of the last finished session plus its per-keystroke timings.
pub struct ReviewPanel<'a> {
    session: &'a Session,
    metrics: &'a SessionMetrics,
    pending: bool,
    discarded: bool,
}

impl<'a> ReviewPanel<'a> {
    pub fn new(session: &'a Session, metrics: &'a SessionMetrics, pending: bool) -> Self {
        Self {
            session,
            metrics,
            pending,
            discarded: false,
        }
    }

    pub fn discarded(mut self, discarded: bool) -> Self {
        self.discarded = discarded;
        self
    }

    fn summary_lines(&self) -> Vec<Line<'static>> {
        let m = self.metrics;
        let label = Style::default().fg(Palette::FG);
        let value = Style::default()
            .fg(Palette::ACCENT)
            .add_modifier(Modifier::BOLD);

        let saved = match (self.pending, self.session.session_id) {
            _ if self.discarded => "discarded".to_string(),
            (true, _) => "saving...".to_string(),
            (false, Some(id)) => format!(
                "#{id} ({}/{} annotated)",
                self.session.reconciled_count(),
                m.keystrokes
            ),
            (false, None) => "not saved".to_string(),
        };

        let rows = [
            ("WPM", format!("{:.0}", m.wpm)),
            ("Keystrokes", m.keystrokes.to_string()),
            ("Avg latency", format!("{:.1} ms", m.avg_latency_ms)),
            (
                "Min / max",
                format!("{:.0} / {:.0} ms", m.min_latency_ms, m.max_latency_ms),
            ),
            (
                "Outliers",
                format!("{} over {:.0} ms", m.outliers, m.outlier_threshold_ms),
            ),
            ("Session", saved),
        ];

        rows.into_iter()
            .map(|(k, v)| {
                Line::from(vec![
                    Span::styled(format!("  {k:<12}"), label),
                    Span::styled(v, value),
                ])
            })
            .collect()
    }
}

fn keystroke_line(ks: &RecordedKeystroke, threshold: f64) -> Line<'static> {
    let key = match ks.keystroke.key {
        ' ' => "\u{2423}".to_string(),
        ch => ch.to_string(),
    };
    let finger = ks
        .annotation
        .as_ref()
        .and_then(|a| a.finger)
        .map(|f| f.as_str())
        .unwrap_or("-");
    let style = if threshold > 0.0 && ks.duration > threshold {
        Style::default().fg(Palette::WARNING)
    } else {
        Style::default().fg(Palette::FG)
    };
    Line::from(Span::styled(
        format!("  {key}  {:>7.1} ms  {finger}", ks.duration),
        style,
    ))
}

impl Widget for ReviewPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(format!(" {} ", self.session.mode))
            .border_style(Style::default().fg(Palette::BORDER));
        let inner = block.inner(area);
        block.render(area, buf);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(inner);

        Paragraph::new(self.summary_lines())
            .wrap(Wrap { trim: false })
            .render(columns[0], buf);

        let lines: Vec<Line> = self
            .session
            .keystrokes
            .iter()
            .map(|ks| keystroke_line(ks, self.metrics.outlier_threshold_ms))
            .collect();
        Paragraph::new(lines).render(columns[1], buf);
    }
}
