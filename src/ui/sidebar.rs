use gtk4 as gtk;
use gtk4::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use wadash::conversations::ConversationSummary;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    ids: Rc<RefCell<Vec<String>>>,
}

impl Sidebar {
    pub fn new(username: &str) -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(260);

        let title = gtk::Label::new(Some("Conversations"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let user = gtk::Label::new(Some(&format!("User: {username}")));
        user.add_css_class("dim-label");
        user.set_halign(gtk::Align::Start);
        root.append(&user);

        let list = gtk::ListBox::new();
        list.set_selection_mode(gtk::SelectionMode::Single);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&list)
            .build();
        root.append(&scroller);

        Self {
            root,
            list,
            ids: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Call `f` with the conversation id of the row the user activates.
    pub fn connect_selected<F: Fn(String) + 'static>(&self, f: F) {
        let ids = self.ids.clone();
        self.list.connect_row_activated(move |_, row| {
            let id = usize::try_from(row.index())
                .ok()
                .and_then(|i| ids.borrow().get(i).cloned());
            if let Some(id) = id {
                f(id);
            }
        });
    }

    pub fn set_items(&self, items: &[ConversationSummary]) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        let mut ids = self.ids.borrow_mut();
        ids.clear();
        for summary in items {
            let row = gtk::ListBoxRow::new();
            let content = gtk::Box::new(gtk::Orientation::Vertical, 2);
            content.set_margin_top(8);
            content.set_margin_bottom(8);
            content.set_margin_start(8);
            content.set_margin_end(8);

            let title = gtk::Label::new(Some(&summary.title));
            title.set_halign(gtk::Align::Start);
            content.append(&title);
            if let Some(preview) = &summary.preview {
                let label = gtk::Label::new(Some(preview));
                label.add_css_class("dim-label");
                label.set_halign(gtk::Align::Start);
                label.set_ellipsize(gtk::pango::EllipsizeMode::End);
                content.append(&label);
            }
            row.set_child(Some(&content));
            self.list.append(&row);
            if summary.selected {
                self.list.select_row(Some(&row));
            }
            ids.push(summary.id.clone());
        }
    }
}
