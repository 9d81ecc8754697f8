use ratatui::style::Color;

/// Fixed terminal colors. Text is the only thing on screen, so there is no
/// theme file to load.
pub struct Palette;

impl Palette {
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::Gray;
    pub const BORDER: Color = Color::DarkGray;
    pub const ACCENT: Color = Color::Cyan;
    pub const HEADER_BG: Color = Color::Blue;
    pub const HEADER_FG: Color = Color::White;
    pub const TEXT_TYPED: Color = Color::Green;
    pub const TEXT_PENDING: Color = Color::DarkGray;
    pub const CURSOR_FG: Color = Color::Black;
    pub const CURSOR_BG: Color = Color::White;
    pub const PRACTICE: Color = Color::Yellow;
    pub const WARNING: Color = Color::Red;
    pub const BAR_FILLED: Color = Color::Cyan;
    pub const BAR_EMPTY: Color = Color::Black;
}
