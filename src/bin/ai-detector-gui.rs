//! `ai-detector-gui`: desktop front end

fn main() -> eframe::Result {
    ai_text_detector::gui::run()
}
