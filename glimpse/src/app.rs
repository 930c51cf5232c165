use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::gio;
use gtk::glib;

use crate::window::GlimpseWindow;

mod imp {
    use super::*;

    #[derive(Debug, Default)]
    pub struct GlimpseApplication;

    #[glib::object_subclass]
    impl ObjectSubclass for GlimpseApplication {
        const NAME: &'static str = "GlimpseApplication";
        type Type = super::GlimpseApplication;
        type ParentType = adw::Application;
    }

    impl ObjectImpl for GlimpseApplication {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_actions();
        }
    }

    impl ApplicationImpl for GlimpseApplication {
        fn startup(&self) {
            self.parent_startup();
            self.obj().load_css();
        }

        fn activate(&self) {
            // Reuse the window on repeated activation; it owns the camera.
            if let Some(window) = self.obj().active_window() {
                window.present();
                return;
            }
            let window = GlimpseWindow::new(&self.obj());
            window.present();
        }
    }

    impl GtkApplicationImpl for GlimpseApplication {}
    impl AdwApplicationImpl for GlimpseApplication {}
}

glib::wrapper! {
    pub struct GlimpseApplication(ObjectSubclass<imp::GlimpseApplication>)
        @extends gio::Application, gtk::Application, adw::Application,
        @implements gio::ActionGroup, gio::ActionMap;
}

impl GlimpseApplication {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("application-id", "io.github.glimpse.Glimpse")
            .property("flags", gio::ApplicationFlags::FLAGS_NONE)
            .build()
    }

    fn setup_actions(&self) {
        let about_action = gio::ActionEntry::builder("about")
            .activate(|app: &Self, _, _| app.show_about())
            .build();

        let quit_action = gio::ActionEntry::builder("quit")
            .activate(|app: &Self, _, _| {
                if let Some(window) = app.active_window() {
                    window.close();
                }
                app.quit();
            })
            .build();

        self.add_action_entries([about_action, quit_action]);
        self.set_accels_for_action("app.quit", &["<Ctrl>q"]);
    }

    fn load_css(&self) {
        let css = r#"
            .camera-preview {
                background-color: @card_bg_color;
                border-radius: 12px;
                min-height: 300px;
            }
            .capture-progress { border-radius: 6px; }
            .capture-progress progress { background-color: @accent_color; border-radius: 6px; }
        "#;

        let provider = gtk::CssProvider::new();
        provider.load_from_string(css);

        if let Some(display) = gtk::gdk::Display::default() {
            gtk::style_context_add_provider_for_display(
                &display, &provider, gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
            );
        }
    }

    fn show_about(&self) {
        let window = self.active_window();

        let dialog = adw::AboutWindow::builder()
            .application_name("Glimpse")
            .application_icon("camera-web-symbolic")
            .version(env!("CARGO_PKG_VERSION"))
            .comments("Webcam face enrollment and login")
            .modal(true)
            .build();

        if let Some(win) = window {
            dialog.set_transient_for(Some(&win));
        }
        dialog.present();
    }
}
