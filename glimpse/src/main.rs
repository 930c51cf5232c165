mod app;
mod welcome;
mod window;

use app::GlimpseApplication;
use gtk4::prelude::*;
use libadwaita as adw;

fn main() -> gtk4::glib::ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    if let Err(e) = adw::init() {
        log::error!("Failed to initialize Libadwaita: {}", e);
        return gtk4::glib::ExitCode::FAILURE;
    }
    let app = GlimpseApplication::new();
    app.run()
}
