pub mod progress_bar;
pub mod review_panel;
pub mod typing_area;
