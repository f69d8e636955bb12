pub mod bridge;
pub mod chat_view;
pub mod dashboard_window;
pub mod main_window;
pub mod settings_window;
pub mod sidebar;
