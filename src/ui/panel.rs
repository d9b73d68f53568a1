use std::cell::RefCell;
use std::rc::Rc;

use gtk4::glib::translate::IntoGlib;
use gtk4::pango;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, Label, Orientation,
    PolicyType, ScrolledWindow, TextBuffer, TextTag, TextView, WrapMode,
};

use super::markdown::{self, SpanStyle};
use super::style::{PanelColors, StyleTokens};
use crate::clipboard;
use crate::orchestrator::DismissHandle;

pub const PANEL_TITLE: &str = "Clue";
pub const ERROR_TITLE: &str = "Clue - Error";
const COPIED_LABEL: &str = "Copied";
const COPY_LABEL: &str = "Copy";
const COPY_FEEDBACK_MS: u64 = 1_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelMode {
    Result,
    Error,
}

/// The floating window for results and errors. Main-thread only.
#[derive(Clone)]
pub struct ResultPanel {
    window: ApplicationWindow,
    title: Label,
    buffer: TextBuffer,
    text_view: TextView,
    copy_button: Button,
    raw_text: Rc<RefCell<String>>,
    dismiss: Rc<RefCell<Option<DismissHandle>>>,
}

impl ResultPanel {
    pub fn new(app: &Application, tokens: StyleTokens, colors: &PanelColors) -> Self {
        let window = ApplicationWindow::new(app);
        window.set_title(Some(PANEL_TITLE));
        window.set_decorated(false);
        window.set_resizable(true);
        window.set_default_size(tokens.panel_width, tokens.panel_height);
        window.set_size_request(tokens.panel_min_width, tokens.panel_min_height);
        window.add_css_class("clue-panel");

        let content = GtkBox::new(Orientation::Vertical, tokens.spacing_8);
        content.add_css_class("clue-panel-content");

        let title = Label::new(Some(PANEL_TITLE));
        title.add_css_class("clue-panel-title");
        title.set_halign(Align::Start);
        title.set_margin_top(tokens.spacing_12);
        title.set_margin_start(tokens.spacing_16);
        title.set_margin_end(tokens.spacing_16);
        content.append(&title);

        let buffer = TextBuffer::new(None);
        install_text_tags(&buffer, tokens, colors);
        let text_view = TextView::with_buffer(&buffer);
        text_view.set_editable(false);
        text_view.set_cursor_visible(false);
        text_view.set_wrap_mode(WrapMode::WordChar);
        text_view.set_left_margin(tokens.spacing_16);
        text_view.set_right_margin(tokens.spacing_16);
        text_view.set_top_margin(tokens.spacing_12);
        text_view.set_bottom_margin(tokens.spacing_12);

        let scroller = ScrolledWindow::new();
        scroller.set_policy(PolicyType::Never, PolicyType::Automatic);
        scroller.set_hexpand(true);
        scroller.set_vexpand(true);
        scroller.set_child(Some(&text_view));
        content.append(&scroller);

        let actions = GtkBox::new(Orientation::Horizontal, tokens.spacing_8);
        actions.set_halign(Align::Center);
        actions.set_margin_bottom(tokens.spacing_12);
        let copy_button = Button::with_label(COPY_LABEL);
        copy_button.set_focus_on_click(false);
        let close_button = Button::with_label("Close");
        close_button.set_focus_on_click(false);
        actions.append(&copy_button);
        actions.append(&close_button);
        content.append(&actions);

        window.set_child(Some(&content));

        let panel = Self {
            window,
            title,
            buffer,
            text_view,
            copy_button,
            raw_text: Rc::new(RefCell::new(String::new())),
            dismiss: Rc::new(RefCell::new(None)),
        };
        panel.connect_signals(&close_button);
        panel
    }

    fn connect_signals(&self, close_button: &Button) {
        {
            let panel = self.clone();
            close_button.connect_clicked(move |_| panel.request_dismiss());
        }
        {
            let panel = self.clone();
            self.copy_button.connect_clicked(move |_| panel.copy_to_clipboard());
        }
        {
            let panel = self.clone();
            let key_controller = gtk4::EventControllerKey::new();
            key_controller.connect_key_pressed(move |_, key, _, _| {
                if key == gtk4::gdk::Key::Escape {
                    panel.request_dismiss();
                    gtk4::glib::Propagation::Stop
                } else {
                    gtk4::glib::Propagation::Proceed
                }
            });
            self.window.add_controller(key_controller);
        }
        {
            let panel = self.clone();
            self.window.connect_close_request(move |_| {
                panel.request_dismiss();
                gtk4::glib::Propagation::Stop
            });
        }
    }

    pub fn show_result(&self, text: &str, on_close: DismissHandle) {
        self.present(PanelMode::Result, text, on_close);
        self.buffer.set_text("");
        let mut end = self.buffer.end_iter();
        for span in markdown::render(text) {
            match span.style.tag_name() {
                Some(tag) => self
                    .buffer
                    .insert_with_tags_by_name(&mut end, &span.text, &[tag]),
                None => self.buffer.insert(&mut end, &span.text),
            }
        }
        self.scroll_to_top();
    }

    pub fn show_error(&self, message: &str, on_dismiss: DismissHandle) {
        self.present(PanelMode::Error, message, on_dismiss);
        self.buffer.set_text(message);
        self.scroll_to_top();
    }

    pub fn hide(&self) {
        self.dismiss.borrow_mut().take();
        if self.window.is_visible() {
            self.window.set_visible(false);
        }
    }

    fn present(&self, mode: PanelMode, raw: &str, handle: DismissHandle) {
        match mode {
            PanelMode::Result => {
                self.title.set_text(PANEL_TITLE);
                self.window.remove_css_class("clue-error");
            }
            PanelMode::Error => {
                self.title.set_text(ERROR_TITLE);
                self.window.add_css_class("clue-error");
            }
        }
        self.copy_button.set_label(COPY_LABEL);
        *self.raw_text.borrow_mut() = raw.to_string();
        *self.dismiss.borrow_mut() = Some(handle);
        self.window.present();
        let _ = self.text_view.grab_focus();
    }

    fn scroll_to_top(&self) {
        let mut start = self.buffer.start_iter();
        let _ = self
            .text_view
            .scroll_to_iter(&mut start, 0.0, false, 0.0, 0.0);
    }

    fn request_dismiss(&self) {
        let handle = self.dismiss.borrow_mut().take();
        self.window.set_visible(false);
        match handle {
            Some(handle) => handle.dismiss(),
            None => tracing::debug!("panel closed with no active cycle"),
        }
    }

    fn copy_to_clipboard(&self) {
        let text = self.raw_text.borrow().clone();
        match clipboard::copy_text(&text) {
            Ok(()) => {
                tracing::debug!(chars = text.chars().count(), "copied panel text");
                self.copy_button.set_label(COPIED_LABEL);
                let button = self.copy_button.clone();
                gtk4::glib::timeout_add_local_once(
                    std::time::Duration::from_millis(COPY_FEEDBACK_MS),
                    move || button.set_label(COPY_LABEL),
                );
            }
            Err(err) => tracing::warn!(%err, "failed to copy panel text"),
        }
    }
}

fn install_text_tags(buffer: &TextBuffer, tokens: StyleTokens, colors: &PanelColors) {
    let body = f64::from(tokens.body_font_pt);
    let table = buffer.tag_table();
    let heading = |name: &str, scale: f64| {
        TextTag::builder()
            .name(name)
            .weight(pango::Weight::Bold.into_glib())
            .size_points(body * scale)
            .foreground(colors.heading)
            .build()
    };
    let tags = [
        (SpanStyle::Heading1, heading("h1", 1.4)),
        (SpanStyle::Heading2, heading("h2", 1.2)),
        (SpanStyle::Heading3, heading("h3", 1.1)),
        (
            SpanStyle::Bold,
            TextTag::builder()
                .name("bold")
                .weight(pango::Weight::Bold.into_glib())
                .build(),
        ),
        (
            SpanStyle::Italic,
            TextTag::builder()
                .name("italic")
                .style(pango::Style::Italic)
                .build(),
        ),
        (SpanStyle::InlineCode, code_tag("inline-code", tokens, colors)),
        (SpanStyle::CodeBlock, code_tag("code", tokens, colors)),
    ];
    for (style, tag) in tags {
        debug_assert_eq!(tag.name().as_deref(), style.tag_name());
        if !table.add(&tag) {
            tracing::warn!(tag = ?style.tag_name(), "duplicate text tag");
        }
    }
}

fn code_tag(name: &str, tokens: StyleTokens, colors: &PanelColors) -> TextTag {
    TextTag::builder()
        .name(name)
        .family("monospace")
        .size_points(f64::from(tokens.code_font_pt))
        .foreground(colors.code_text)
        .background(colors.code_background)
        .build()
}
