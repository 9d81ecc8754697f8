use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::{Block, Widget};

use crate::ui::palette::Palette;

pub struct ProgressBar {
    pub label: String,
    pub ratio: f64,
}

impl ProgressBar {
    pub fn new(label: &str, ratio: f64) -> Self {
        Self {
            label: label.to_string(),
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    /// Position within a probe sequence, e.g. "probe 3/10".
    pub fn for_sequence(done: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        };
        Self::new(&format!("probe {}/{}", (done + 1).min(total), total), ratio)
    }
}

impl Widget for ProgressBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(format!(" {} ", self.label))
            .border_style(Style::default().fg(Palette::BORDER));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let filled_width = (self.ratio * inner.width as f64) as u16;
        let label = format!("{:.0}%", self.ratio * 100.0);

        for x in inner.x..inner.x + inner.width {
            let style = if x < inner.x + filled_width {
                Style::default().fg(Palette::BG).bg(Palette::BAR_FILLED)
            } else {
                Style::default().fg(Palette::FG).bg(Palette::BAR_EMPTY)
            };
            buf[(x, inner.y)].set_style(style);
        }

        let label_x = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        buf.set_string(label_x, inner.y, &label, Style::default().fg(Palette::FG));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_clamped() {
        assert_eq!(ProgressBar::new("x", 1.7).ratio, 1.0);
        assert_eq!(ProgressBar::new("x", -0.2).ratio, 0.0);
    }

    #[test]
    fn sequence_label_is_one_based() {
        let bar = ProgressBar::for_sequence(0, 10);
        assert_eq!(bar.label, "probe 1/10");
        assert_eq!(bar.ratio, 0.0);

        let done = ProgressBar::for_sequence(10, 10);
        assert_eq!(done.label, "probe 10/10");
        assert_eq!(done.ratio, 1.0);
    }

    #[test]
    fn renders_label_into_buffer() {
        let area = Rect::new(0, 0, 20, 3);
        let mut buf = Buffer::empty(area);
        ProgressBar::new("run", 0.5).render(area, &mut buf);
        let row: String = (0..20).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("50%"));
    }
}
