use adw::Application;
use wadash::settings::Settings;

pub fn build_ui(app: &Application) {
    if Settings::exists() {
        crate::ui::main_window::show_main_window(app, Settings::load());
    } else {
        crate::ui::settings_window::show_settings_window(app);
    }
}
