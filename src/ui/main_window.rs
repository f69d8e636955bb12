use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;
use log::info;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use wadash::api::{ApiClient, ConversationStore};
use wadash::conversations::{ConversationViewModel, Notice, StartPlan};
use wadash::settings::Settings;
use wadash::utils::with_weak;

use crate::ui::bridge::run_async_to_main;
use crate::ui::chat_view::ChatView;
use crate::ui::dashboard_window::show_dashboard_window;
use crate::ui::sidebar::Sidebar;

/// Owns the conversation view model for as long as the window is open.
struct MainWindow {
    window: adw::ApplicationWindow,
    overlay: adw::ToastOverlay,
    sidebar: Sidebar,
    chat: ChatView,
    new_btn: gtk::Button,
    vm: RefCell<ConversationViewModel>,
    client: Arc<ApiClient>,
}

impl MainWindow {
    fn render(&self) {
        let vm = self.vm.borrow();
        self.sidebar.set_items(&vm.summaries());
        match vm.selected_title() {
            Some(title) => self
                .chat
                .set_conversation(&title, vm.visible_messages(), vm.username()),
            None if vm.is_loading() && vm.conversations().is_empty() => {
                self.chat.show_placeholder("Loading conversations…")
            }
            None => self
                .chat
                .show_placeholder("Select a conversation or start a new one."),
        }
        self.chat.set_busy(vm.is_loading());
        self.new_btn.set_sensitive(!vm.is_loading());
        drop(vm);

        for notice in self.vm.borrow_mut().take_notices() {
            let toast = match notice {
                Notice::Info(text) => adw::Toast::new(&text),
                Notice::Error(text) => {
                    let toast = adw::Toast::new(&text);
                    toast.set_timeout(10);
                    toast
                }
            };
            self.overlay.add_toast(toast);
        }
    }

    fn toast(&self, text: &str) {
        self.overlay.add_toast(adw::Toast::new(text));
    }

    fn load(self: &Rc<Self>) {
        self.vm.borrow_mut().begin_load();
        self.render();
        let client = self.client.clone();
        let rx = run_async_to_main(async move { client.list_conversations().await });
        let this = self.clone();
        rx.attach(None, move |res| {
            this.vm.borrow_mut().finish_load(res);
            this.render();
            glib::ControlFlow::Break
        });
    }

    fn select(&self, id: String) {
        self.vm.borrow_mut().select_conversation(id);
        self.render();
    }

    fn send(self: &Rc<Self>, text: String) {
        let pending = match self.vm.borrow_mut().begin_send(&text) {
            Ok(pending) => pending,
            Err(e) => return self.toast(&e.to_string()),
        };
        self.render();

        let client = self.client.clone();
        let id = pending.conversation_id().to_string();
        let payload = pending.payload().clone();
        let rx = run_async_to_main(async move { client.replace_conversation(&id, &payload).await });
        let this = self.clone();
        let mut pending = Some(pending);
        rx.attach(None, move |res| {
            if let Some(pending) = pending.take() {
                this.vm.borrow_mut().settle_send(pending, res);
                this.render();
            }
            glib::ControlFlow::Break
        });
    }

    fn start(self: &Rc<Self>, recipient: &str, text: &str) {
        let plan = self.vm.borrow_mut().begin_start(recipient, text);
        let draft = match plan {
            Ok(StartPlan::Create(draft)) => draft,
            Ok(StartPlan::Existing(_)) => return self.render(),
            Err(e) => return self.toast(&e.to_string()),
        };
        self.render();

        let client = self.client.clone();
        let rx = run_async_to_main(async move { client.create_conversation(draft).await });
        let this = self.clone();
        rx.attach(None, move |res| {
            this.vm.borrow_mut().finish_start(res);
            this.render();
            glib::ControlFlow::Break
        });
    }

    fn open_new_conversation_dialog(self: &Rc<Self>) {
        let dialog = gtk::Dialog::builder()
            .title("Start New Conversation")
            .transient_for(&self.window)
            .modal(true)
            .build();
        let content = gtk::Box::new(gtk::Orientation::Vertical, 12);
        content.set_margin_top(12);
        content.set_margin_bottom(12);
        content.set_margin_start(12);
        content.set_margin_end(12);

        let info = gtk::Label::new(Some("Enter the recipient's name and your first message."));
        info.set_halign(gtk::Align::Start);
        content.append(&info);

        let recipient = gtk::Entry::new();
        recipient.set_placeholder_text(Some("Recipient, e.g. Ana"));
        recipient.set_hexpand(true);
        content.append(&recipient);

        let message = gtk::Entry::new();
        message.set_placeholder_text(Some("Your first message…"));
        message.set_hexpand(true);
        content.append(&message);

        dialog.set_child(Some(&content));
        let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
        let ok_btn = dialog.add_button("Start Conversation", gtk::ResponseType::Ok);
        ok_btn.add_css_class("suggested-action");
        dialog.set_default_response(gtk::ResponseType::Ok);

        let weak = Rc::downgrade(self);
        dialog.connect_response(move |dlg, resp| {
            if resp == gtk::ResponseType::Ok {
                if let Some(this) = weak.upgrade() {
                    this.start(&recipient.text(), &message.text());
                }
            }
            dlg.close();
        });
        dialog.present();
    }
}

pub fn show_main_window(app: &Application, settings: Settings) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("WhatsApp Dashboard")
        .default_width(960)
        .default_height(640)
        .build();

    let client = match ApiClient::new(&settings.base_url) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("unusable server url {}: {e}", settings.base_url);
            crate::ui::settings_window::show_settings_window(app);
            return;
        }
    };
    info!("using {} as {}", client.base_url(), settings.username);

    let overlay = adw::ToastOverlay::new();
    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Sidebar::new(&settings.username);
    split.set_flap(Some(&sidebar.widget()));
    let chat = ChatView::new();
    split.set_content(Some(&chat.widget()));
    overlay.set_child(Some(&split));

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk::Label::new(Some("Conversations"));
    header.set_title_widget(Some(&title));

    let new_btn = gtk::Button::with_label("New Conversation");
    new_btn.add_css_class("suggested-action");
    header.pack_end(&new_btn);
    let reload_btn = gtk::Button::from_icon_name("view-refresh-symbolic");
    header.pack_start(&reload_btn);
    let dashboard_btn = gtk::Button::from_icon_name("view-grid-symbolic");
    dashboard_btn.set_tooltip_text(Some("Sessions and dashboard"));
    header.pack_start(&dashboard_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    let main = Rc::new(MainWindow {
        window: window.clone(),
        overlay,
        sidebar,
        chat,
        new_btn: new_btn.clone(),
        vm: RefCell::new(ConversationViewModel::new(settings.username)),
        client,
    });

    main.sidebar
        .connect_selected(with_weak(&main, |main, id| main.select(id)));
    main.chat
        .connect_send(with_weak(&main, |main, text| main.send(text)));
    let open_dialog = with_weak(&main, |main, ()| main.open_new_conversation_dialog());
    new_btn.connect_clicked(move |_| open_dialog(()));
    let reload = with_weak(&main, |main, ()| main.load());
    reload_btn.connect_clicked(move |_| reload(()));
    let open_dashboard = with_weak(&main, |main, ()| {
        let conversations = main.vm.borrow().conversations().to_vec();
        show_dashboard_window(&main.window, conversations);
    });
    dashboard_btn.connect_clicked(move |_| open_dashboard(()));

    // Handlers above are weak; the window holds the only strong handle until it is destroyed.
    {
        let main = RefCell::new(Some(main.clone()));
        window.connect_destroy(move |_| {
            main.borrow_mut().take();
        });
    }

    window.present();
    main.load();
}
