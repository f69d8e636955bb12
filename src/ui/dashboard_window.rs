use adw::prelude::*;
use gtk4 as gtk;
use log::{info, warn};
use std::rc::Rc;

use wadash::api::models::{Conversation, WhatsAppSession};
use wadash::dashboard::DashboardStats;
use wadash::sessions::SessionProvider;
use wadash::settings::{AssistantSettings, Settings};
use wadash::storage::SqliteSessionProvider;

/// Session registry, counters and assistant configuration in one window.
struct DashboardWindow {
    overlay: adw::ToastOverlay,
    stats: gtk::Label,
    sessions: gtk::ListBox,
    provider: SqliteSessionProvider,
    conversations: Vec<Conversation>,
}

impl DashboardWindow {
    fn toast(&self, text: &str) {
        self.overlay.add_toast(adw::Toast::new(text));
    }

    fn refresh(self: &Rc<Self>) {
        while let Some(child) = self.sessions.first_child() {
            self.sessions.remove(&child);
        }
        let sessions = match self.provider.list() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("could not read sessions: {e}");
                self.toast(&e.to_string());
                Vec::new()
            }
        };

        let stats = DashboardStats::collect(&sessions, &self.conversations, &[]);
        self.stats.set_label(&format!(
            "{} connected sessions · {} conversations",
            stats.active_sessions, stats.active_conversations
        ));

        if sessions.is_empty() {
            let lbl = gtk::Label::new(Some("No sessions yet."));
            lbl.add_css_class("dim-label");
            self.sessions.append(&lbl);
        }
        for session in &sessions {
            self.sessions.append(&self.session_row(session));
        }
    }

    fn session_row(self: &Rc<Self>, session: &WhatsAppSession) -> gtk::Box {
        let row = gtk::Box::new(gtk::Orientation::Horizontal, 8);
        row.set_margin_top(4);
        row.set_margin_bottom(4);

        let text = gtk::Box::new(gtk::Orientation::Vertical, 2);
        text.set_hexpand(true);
        let name = gtk::Label::new(Some(&session.name));
        name.add_css_class("heading");
        name.set_halign(gtk::Align::Start);
        text.append(&name);
        let detail = match &session.phone_number {
            Some(phone) => format!("{} · {phone}", session.status.as_str()),
            None => session.status.as_str().to_string(),
        };
        let detail = gtk::Label::new(Some(&detail));
        detail.add_css_class("dim-label");
        detail.set_halign(gtk::Align::Start);
        text.append(&detail);
        row.append(&text);

        let delete = gtk::Button::from_icon_name("user-trash-symbolic");
        delete.add_css_class("destructive-action");
        let weak = Rc::downgrade(self);
        let id = session.id.clone();
        delete.connect_clicked(move |_| {
            let Some(this) = weak.upgrade() else { return };
            match this.provider.delete(&id) {
                Ok(removed) => {
                    info!("deleted session {}", removed.id);
                    this.toast(&format!("Session \"{}\" deleted", removed.name));
                }
                Err(e) => this.toast(&e.to_string()),
            }
            this.refresh();
        });
        row.append(&delete);
        row
    }

    fn create(self: &Rc<Self>, name: &str) {
        match self.provider.create(name) {
            Ok(session) => {
                info!("created session {}", session.id);
                self.toast(&format!("Session \"{}\" created", session.name));
            }
            Err(e) => self.toast(&e.to_string()),
        }
        self.refresh();
    }
}

fn assistant_form(overlay: &adw::ToastOverlay) -> gtk::Box {
    let current = Settings::load().assistant.unwrap_or_default();
    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);

    let heading = gtk::Label::new(Some("Assistant"));
    heading.add_css_class("title-4");
    heading.set_halign(gtk::Align::Start);
    form.append(&heading);

    let toggle_row = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    let toggle_label = gtk::Label::new(Some("Enable the reply assistant"));
    toggle_label.set_hexpand(true);
    toggle_label.set_halign(gtk::Align::Start);
    let enabled = gtk::Switch::new();
    enabled.set_active(current.enabled);
    toggle_row.append(&toggle_label);
    toggle_row.append(&enabled);
    form.append(&toggle_row);

    let api_key = gtk::PasswordEntry::new();
    api_key.set_show_peek_icon(true);
    api_key.set_text(&current.api_key);
    api_key.set_property("placeholder-text", "API key");
    form.append(&api_key);

    let forwarding = gtk::Entry::new();
    forwarding.set_placeholder_text(Some("Forward notices to, e.g. +1234567890"));
    forwarding.set_text(&current.forwarding_number);
    form.append(&forwarding);

    let template = gtk::TextView::new();
    template.set_wrap_mode(gtk::WrapMode::WordChar);
    template.set_height_request(80);
    template.buffer().set_text(&current.notice_template);
    let frame = gtk::Frame::new(Some("Notice template"));
    frame.set_child(Some(&template));
    form.append(&frame);

    let save = gtk::Button::with_label("Save Assistant Settings");
    save.set_halign(gtk::Align::End);
    let overlay = overlay.clone();
    save.connect_clicked(move |_| {
        let buffer = template.buffer();
        let text = buffer.text(&buffer.start_iter(), &buffer.end_iter(), false);
        let assistant = match AssistantSettings::from_input(
            enabled.is_active(),
            &api_key.text(),
            &forwarding.text(),
            &text,
        ) {
            Ok(assistant) => assistant,
            Err(e) => return overlay.add_toast(adw::Toast::new(&e.to_string())),
        };
        let settings = Settings {
            assistant: Some(assistant),
            ..Settings::load()
        };
        match settings.save() {
            Ok(()) => overlay.add_toast(adw::Toast::new("Assistant settings saved")),
            Err(e) => overlay.add_toast(adw::Toast::new(&format!("Failed to save settings: {e}"))),
        }
    });
    form.append(&save);
    form
}

pub fn show_dashboard_window(parent: &adw::ApplicationWindow, conversations: Vec<Conversation>) {
    let provider = match SqliteSessionProvider::open_default() {
        Ok(provider) => provider,
        Err(e) => {
            warn!("session registry unavailable: {e}");
            return;
        }
    };

    let window = adw::Window::builder()
        .title("Dashboard")
        .transient_for(parent)
        .default_width(520)
        .default_height(600)
        .build();
    let overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(16);
    root.set_margin_bottom(16);
    root.set_margin_start(16);
    root.set_margin_end(16);

    let stats = gtk::Label::new(None);
    stats.add_css_class("title-3");
    stats.set_halign(gtk::Align::Start);
    root.append(&stats);

    let heading = gtk::Label::new(Some("Sessions"));
    heading.add_css_class("title-4");
    heading.set_halign(gtk::Align::Start);
    root.append(&heading);

    let create_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    let name_entry = gtk::Entry::new();
    name_entry.set_placeholder_text(Some("New session name"));
    name_entry.set_hexpand(true);
    let create_btn = gtk::Button::with_label("Create");
    create_btn.add_css_class("suggested-action");
    create_row.append(&name_entry);
    create_row.append(&create_btn);
    root.append(&create_row);

    let sessions = gtk::ListBox::new();
    sessions.set_selection_mode(gtk::SelectionMode::None);
    let scroller = gtk::ScrolledWindow::builder()
        .vexpand(true)
        .min_content_height(160)
        .child(&sessions)
        .build();
    root.append(&scroller);
    root.append(&assistant_form(&overlay));

    overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&adw::HeaderBar::new());
    container.append(&overlay);
    window.set_content(Some(&container));

    let dashboard = Rc::new(DashboardWindow {
        overlay,
        stats,
        sessions,
        provider,
        conversations,
    });

    let on_create: Rc<dyn Fn()> = {
        let weak = Rc::downgrade(&dashboard);
        let name_entry = name_entry.clone();
        Rc::new(move || {
            if let Some(dashboard) = weak.upgrade() {
                dashboard.create(&name_entry.text());
                name_entry.set_text("");
            }
        })
    };
    {
        let on_create = on_create.clone();
        create_btn.connect_clicked(move |_| (on_create)());
    }
    name_entry.connect_activate(move |_| (on_create)());

    {
        let dashboard = std::cell::RefCell::new(Some(dashboard.clone()));
        window.connect_destroy(move |_| {
            dashboard.borrow_mut().take();
        });
    }

    dashboard.refresh();
    window.present();
}
