//! Model listing functionality

use std::error::Error;

use crate::core::catalog::ModelKind;
use crate::core::config::Config;
use crate::core::session::ChatSession;

pub async fn list_models(config: &Config, offline: bool) -> Result<(), Box<dyn Error>> {
    let (mut session, _rx) = ChatSession::new(config);
    if !offline {
        session.refresh_models().await;
    }

    println!("🤖 Available models ({})", config.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("🎯 Default selection: {}", config.default_model());
    println!();

    for model in session.catalog().models() {
        println!("  • {}", model.id);
        let display_name = session.catalog().display_name(&model.id);
        if display_name != model.id {
            println!("    Name: {display_name}");
        }
        if model.kind == ModelKind::Image {
            println!("    Kind: image");
        }
        println!();
    }

    Ok(())
}
