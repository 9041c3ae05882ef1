/*
 * This file is part of ThinkFan UI.
 *
 * Copyright (C) 2025 ThinkFan UI contributors
 *
 * ThinkFan UI is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ThinkFan UI is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ThinkFan UI. If not, see <https://www.gnu.org/licenses/>.
 */

mod ui_components;
mod ui_curve_editor;
mod ui_main;

use ratatui::Frame;

use crate::app::{App, Page};

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.area();

    match app.page {
        Page::Status => ui_main::render_main_view(f, app, size),
        Page::Editor => ui_curve_editor::render_curve_editor(f, app, size),
    }

    // Popups, lowest priority first so the error dialog ends up on top
    if app.show_range_popup {
        ui_components::render_range_popup(f, app, size);
    }
    if app.show_wizard_popup {
        ui_components::render_wizard_popup(f, app, size);
    }
    if app.show_preview_popup {
        ui_components::render_preview_popup(f, app, size);
    }
    if app.show_discard_popup {
        ui_components::render_discard_popup(f, size);
    }
    if app.show_error_popup {
        ui_components::render_error_popup(f, app, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::create_test_app;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_status_view_lists_sensors() {
        let mut app = create_test_app();
        app.refresh();
        let screen = render(&app);
        assert!(screen.contains("Package id 0"));
        assert!(screen.contains("Composite"));
        assert!(screen.contains("2650"));
    }

    #[test]
    fn test_editor_view_records_canvas_area() {
        let mut app = create_test_app();
        app.page = Page::Editor;
        render(&app);
        assert!(app.editor_area.get().width > 0);
    }

    #[test]
    fn test_error_popup_drawn_on_top() {
        let mut app = create_test_app();
        app.show_preview_popup = true;
        app.preview_text = "levels:\n".to_string();
        app.show_error_popup = true;
        app.error_message = "Save helper exited with code 1".to_string();
        let screen = render(&app);
        assert!(screen.contains("Save helper exited with code 1"));
    }
}
