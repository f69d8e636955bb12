use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;
use log::{info, warn};

use wadash::api::{ApiClient, ConversationStore};
use wadash::settings::Settings;

use crate::ui::bridge::run_async_to_main;

pub fn show_settings_window(app: &Application) {
    let current = Settings::load();
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Dashboard Settings")
        .default_width(420)
        .default_height(260)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Connect to the chat server"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. https://myserver:3000)"));
    server_entry.set_text(&current.base_url);
    server_entry.set_hexpand(true);

    let user_entry = gtk::Entry::new();
    user_entry.set_placeholder_text(Some("Your username"));
    user_entry.set_text(&current.username);
    user_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&user_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let connect_btn = gtk::Button::with_label("Connect");
    connect_btn.add_css_class("suggested-action");
    connect_btn.set_halign(gtk::Align::End);
    root.append(&connect_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("WhatsApp Dashboard"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let user_entry = user_entry.clone();
        let assistant = current.assistant.clone();
        move || {
            let settings = match Settings::from_input(&server_entry.text(), &user_entry.text()) {
                Ok(settings) => Settings {
                    assistant: assistant.clone(),
                    ..settings
                },
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };
            status.set_label("Connecting…");

            // Reachability is informative only; the settings are kept either way.
            let base_url = settings.base_url.clone();
            let rx = run_async_to_main(async move {
                match ApiClient::new(&base_url) {
                    Ok(client) => client
                        .list_conversations()
                        .await
                        .map(|all| format!("Connected ({} conversations)", all.len()))
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            let mut settings = Some(settings);
            rx.attach(None, move |res| {
                let Some(settings) = settings.take() else {
                    return glib::ControlFlow::Break;
                };
                match res {
                    Ok(message) => {
                        info!("server check: {} - {message}", settings.base_url);
                        status_label.set_label(&message);
                    }
                    Err(err) => {
                        warn!("server check failed: {err}");
                        status_label.set_label("Saved (server unreachable)");
                    }
                }
                if let Err(e) = settings.save() {
                    overlay2.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                    return glib::ControlFlow::Break;
                }
                crate::ui::main_window::show_main_window(&app2, settings);
                window2.close();
                glib::ControlFlow::Break
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        connect_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        server_entry.connect_activate(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        user_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
