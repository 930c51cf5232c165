use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::gdk;
use gtk::gio;
use gtk::glib;

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use glimpse_core::{CameraService, FaceLoginSession, GlimpseConfig, PanelState, SessionEvent};
use log::{debug, info};

use crate::app::GlimpseApplication;
use crate::welcome;

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct GlimpseWindow {
        // State, touched only on the main thread
        pub session: RefCell<Option<FaceLoginSession>>,
        pub panel: RefCell<PanelState>,
        pub render_source: RefCell<Option<glib::SourceId>>,

        // UI widgets
        pub toast_overlay: RefCell<Option<adw::ToastOverlay>>,
        pub camera_picture: RefCell<Option<gtk::Picture>>,
        pub entry_username: RefCell<Option<gtk::Entry>>,
        pub btn_capture: RefCell<Option<gtk::Button>>,
        pub btn_login: RefCell<Option<gtk::Button>>,
        pub btn_stop: RefCell<Option<gtk::Button>>,
        pub lbl_status: RefCell<Option<gtk::Label>>,
        pub capture_progress: RefCell<Option<gtk::ProgressBar>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for GlimpseWindow {
        const NAME: &'static str = "GlimpseWindow";
        type Type = super::GlimpseWindow;
        type ParentType = adw::ApplicationWindow;
    }

    impl ObjectImpl for GlimpseWindow {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();

            obj.build_ui();

            glib::idle_add_local_once(glib::clone!(
                #[weak] obj,
                move || { obj.initialize(); }
            ));
        }
    }

    impl WidgetImpl for GlimpseWindow {}

    impl WindowImpl for GlimpseWindow {
        fn close_request(&self) -> glib::Propagation {
            self.obj().stop_render_timer();
            if let Some(session) = self.session.borrow().as_ref() {
                session.shutdown();
            }
            self.parent_close_request()
        }
    }

    impl ApplicationWindowImpl for GlimpseWindow {}
    impl AdwApplicationWindowImpl for GlimpseWindow {}
}

glib::wrapper! {
    pub struct GlimpseWindow(ObjectSubclass<imp::GlimpseWindow>)
        @extends gtk::Widget, gtk::Window, gtk::ApplicationWindow, adw::ApplicationWindow,
        @implements gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget,
                    gtk::Native, gtk::Root, gtk::ShortcutManager;
}

impl GlimpseWindow {
    pub fn new(app: &GlimpseApplication) -> Self {
        glib::Object::builder()
            .property("application", app)
            .build()
    }

    fn build_ui(&self) {
        let imp = self.imp();

        let toast_overlay = adw::ToastOverlay::new();
        let toolbar = adw::ToolbarView::new();
        let header = adw::HeaderBar::new();

        let menu_btn = gtk::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .build();
        let menu = gio::Menu::new();
        menu.append(Some("_About Glimpse"), Some("app.about"));
        menu.append(Some("_Quit"), Some("app.quit"));
        menu_btn.set_menu_model(Some(&menu));
        header.pack_end(&menu_btn);
        toolbar.add_top_bar(&header);

        let content = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(18)
            .margin_top(24)
            .margin_bottom(24)
            .margin_start(24)
            .margin_end(24)
            .build();

        let camera_picture = gtk::Picture::builder()
            .content_fit(gtk::ContentFit::Contain)
            .vexpand(true)
            .css_classes(["camera-preview"])
            .build();

        let username = users::get_current_username()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry_username = gtk::Entry::builder()
            .placeholder_text("Username")
            .text(username.as_str())
            .build();

        let btn_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(12)
            .halign(gtk::Align::Center)
            .build();

        let btn_capture = gtk::Button::builder()
            .label("Capture Faces")
            .css_classes(["suggested-action", "pill"])
            .build();
        btn_capture.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.on_capture_faces(); }
        ));

        let btn_login = gtk::Button::builder()
            .label("Login by Face")
            .css_classes(["pill"])
            .build();
        btn_login.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.on_login_by_face(); }
        ));

        let btn_stop = gtk::Button::builder()
            .label("Stop Camera")
            .css_classes(["destructive-action", "pill"])
            .sensitive(false)
            .build();
        btn_stop.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.on_stop_camera(); }
        ));

        btn_box.append(&btn_capture);
        btn_box.append(&btn_login);
        btn_box.append(&btn_stop);

        let lbl_status = gtk::Label::builder()
            .wrap(true)
            .justify(gtk::Justification::Center)
            .css_classes(["dim-label"])
            .build();

        let capture_progress = gtk::ProgressBar::builder()
            .show_text(false)
            .build();
        capture_progress.add_css_class("capture-progress");

        content.append(&camera_picture);
        content.append(&entry_username);
        content.append(&btn_box);
        content.append(&lbl_status);
        content.append(&capture_progress);

        toolbar.set_content(Some(&content));
        toast_overlay.set_child(Some(&toolbar));
        self.set_content(Some(&toast_overlay));

        *imp.toast_overlay.borrow_mut() = Some(toast_overlay);
        *imp.camera_picture.borrow_mut() = Some(camera_picture);
        *imp.entry_username.borrow_mut() = Some(entry_username);
        *imp.btn_capture.borrow_mut() = Some(btn_capture);
        *imp.btn_login.borrow_mut() = Some(btn_login);
        *imp.btn_stop.borrow_mut() = Some(btn_stop);
        *imp.lbl_status.borrow_mut() = Some(lbl_status);
        *imp.capture_progress.borrow_mut() = Some(capture_progress);

        self.set_title(Some("Glimpse"));
        self.set_default_size(720, 640);
        self.refresh();
    }

    fn initialize(&self) {
        let config = GlimpseConfig::load_default();
        info!(
            "Using camera {} and recognizer {} {}",
            config.camera.device_index, config.recognizer.program, config.recognizer.script
        );

        let camera = Arc::new(CameraService::opencv());
        let (session, events) = FaceLoginSession::new(camera, config);
        *self.imp().session.borrow_mut() = Some(session);

        // Background threads only send events; all widget updates happen here.
        glib::spawn_future_local(glib::clone!(
            #[weak(rename_to = window)] self,
            async move {
                while let Ok(event) = events.recv().await {
                    window.on_session_event(event);
                }
            }
        ));
    }

    fn on_capture_faces(&self) {
        let imp = self.imp();
        let username = imp.entry_username.borrow()
            .as_ref()
            .map(|e| e.text().to_string())
            .unwrap_or_default();

        let session = imp.session.borrow();
        let Some(session) = session.as_ref() else {
            return;
        };

        imp.panel.borrow_mut().begin_enroll();
        self.refresh();

        let result = session.enroll(&username);

        if let Err(e) = result {
            imp.panel.borrow_mut().fail(&e);
            self.refresh();
            self.show_toast(&e.to_string());
        }
    }

    fn on_login_by_face(&self) {
        let imp = self.imp();
        let session = imp.session.borrow();
        let Some(session) = session.as_ref() else {
            return;
        };

        imp.panel.borrow_mut().begin_login();
        self.refresh();
        session.login();
    }

    fn on_stop_camera(&self) {
        if let Some(session) = self.imp().session.borrow().as_ref() {
            session.stop_camera();
        }
    }

    fn on_session_event(&self, event: SessionEvent) {
        debug!("Session event: {:?}", event);
        let welcome = self.imp().panel.borrow_mut().apply(&event);
        self.refresh();

        if let Some(welcome) = welcome {
            welcome::present(self, &welcome.username);
        }
    }

    /// Push the panel state into the widgets.
    fn refresh(&self) {
        let imp = self.imp();
        let panel = imp.panel.borrow().clone();

        if let Some(ref lbl) = *imp.lbl_status.borrow() {
            lbl.set_label(&panel.status);
        }
        if let Some(ref bar) = *imp.capture_progress.borrow() {
            bar.set_fraction(panel.progress);
        }
        let enabled = panel.controls_enabled();
        if let Some(ref btn) = *imp.btn_capture.borrow() {
            btn.set_sensitive(enabled);
        }
        if let Some(ref btn) = *imp.btn_login.borrow() {
            btn.set_sensitive(enabled);
        }
        if let Some(ref entry) = *imp.entry_username.borrow() {
            entry.set_sensitive(enabled);
        }
        if let Some(ref btn) = *imp.btn_stop.borrow() {
            btn.set_sensitive(panel.preview_active);
        }

        if panel.preview_active {
            self.start_render_timer();
        } else {
            self.stop_render_timer();
        }
    }

    fn start_render_timer(&self) {
        let imp = self.imp();
        if imp.render_source.borrow().is_some() {
            return;
        }

        let interval = imp.session.borrow()
            .as_ref()
            .map(|s| s.config().ui.render_interval_ms)
            .unwrap_or(33);

        let source = glib::timeout_add_local(
            Duration::from_millis(interval),
            glib::clone!(
                #[weak(rename_to = window)] self,
                #[upgrade_or] glib::ControlFlow::Break,
                move || {
                    window.render_frame();
                    glib::ControlFlow::Continue
                }
            ),
        );
        *imp.render_source.borrow_mut() = Some(source);
    }

    fn stop_render_timer(&self) {
        let imp = self.imp();
        if let Some(source) = imp.render_source.borrow_mut().take() {
            source.remove();
        }
        if let Some(ref picture) = *imp.camera_picture.borrow() {
            picture.set_paintable(None::<&gdk::Paintable>);
        }
    }

    fn render_frame(&self) {
        let imp = self.imp();
        let frame = match imp.session.borrow().as_ref() {
            Some(session) => session.camera().latest_frame(),
            None => None,
        };
        let Some(frame) = frame else {
            return;
        };

        let bytes = glib::Bytes::from_owned(frame.to_rgb());
        let texture = gdk::MemoryTexture::new(
            frame.width as i32,
            frame.height as i32,
            gdk::MemoryFormat::R8g8b8,
            &bytes,
            frame.width as usize * 3,
        );

        if let Some(ref picture) = *imp.camera_picture.borrow() {
            picture.set_paintable(Some(&texture));
        }
    }

    fn show_toast(&self, message: &str) {
        if let Some(ref overlay) = *self.imp().toast_overlay.borrow() {
            overlay.add_toast(adw::Toast::new(message));
        }
    }
}
