use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;

/// Modal greeting shown after a successful face login.
pub fn present(parent: &impl IsA<gtk::Window>, username: &str) {
    let dialog = adw::MessageDialog::builder()
        .heading("Signed In")
        .body(format!("Welcome, {}!", username))
        .modal(true)
        .transient_for(parent)
        .build();

    dialog.add_response("close", "_Close");
    dialog.set_default_response(Some("close"));
    dialog.set_close_response("close");
    dialog.present();
}
