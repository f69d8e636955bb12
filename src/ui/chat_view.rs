use chrono::Local;
use gtk4 as gtk;
use gtk4::prelude::*;

use wadash::api::models::Message;

pub struct ChatView {
    root: gtk::Box,
    title: gtk::Label,
    scroller: gtk::ScrolledWindow,
    messages_box: gtk::Box,
    input_row: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
}

impl ChatView {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let title = gtk::Label::new(None);
        title.add_css_class("title-4");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        let view = Self {
            root,
            title,
            scroller,
            messages_box,
            input_row,
            entry,
            send_btn,
        };
        view.show_placeholder("Select a conversation or start a new one.");
        view
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Call `f` with the trimmed entry text when the user sends; the entry is cleared.
    pub fn connect_send<F: Fn(String) + 'static>(&self, f: F) {
        use std::rc::Rc;
        let entry = self.entry.clone();
        let send: Rc<dyn Fn()> = Rc::new(move || {
            let text = entry.text().trim().to_string();
            if text.is_empty() {
                return;
            }
            entry.set_text("");
            f(text);
        });
        {
            let send = send.clone();
            self.send_btn.connect_clicked(move |_| (send)());
        }
        self.entry.connect_activate(move |_| (send)());
    }

    pub fn set_busy(&self, busy: bool) {
        self.entry.set_sensitive(!busy);
        self.send_btn.set_sensitive(!busy);
    }

    fn clear(&self) {
        while let Some(child) = self.messages_box.first_child() {
            self.messages_box.remove(&child);
        }
    }

    pub fn show_placeholder(&self, text: &str) {
        self.clear();
        self.title.set_label("");
        self.input_row.set_visible(false);
        let lbl = gtk::Label::new(Some(text));
        lbl.add_css_class("dim-label");
        lbl.set_vexpand(true);
        self.messages_box.append(&lbl);
    }

    pub fn set_conversation(&self, title: &str, messages: &[Message], me: &str) {
        self.clear();
        self.title.set_label(title);
        self.input_row.set_visible(true);
        if messages.is_empty() {
            let lbl = gtk::Label::new(Some("No messages yet."));
            lbl.add_css_class("dim-label");
            self.messages_box.append(&lbl);
        }
        for message in messages {
            self.messages_box.append(&bubble(message, message.sender == me));
        }
        let adj = self.scroller.vadjustment();
        adj.set_value(adj.upper());
    }
}

fn bubble(message: &Message, own: bool) -> gtk::Box {
    let bubble = gtk::Box::new(gtk::Orientation::Vertical, 2);
    bubble.add_css_class("card");
    bubble.set_halign(if own { gtk::Align::End } else { gtk::Align::Start });

    if !own {
        let sender = gtk::Label::new(Some(&message.sender));
        sender.add_css_class("caption-heading");
        sender.set_halign(gtk::Align::Start);
        bubble.append(&sender);
    }
    let text = gtk::Label::new(Some(&message.text));
    text.set_wrap(true);
    text.set_selectable(true);
    text.set_halign(gtk::Align::Start);
    bubble.append(&text);

    if let Some(at) = message.sent_at() {
        let time = gtk::Label::new(Some(&at.with_timezone(&Local).format("%H:%M").to_string()));
        time.add_css_class("caption");
        time.add_css_class("dim-label");
        time.set_halign(gtk::Align::End);
        bubble.append(&time);
    }
    bubble
}
