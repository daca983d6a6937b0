//! `clonechat gateway` — Start the HTTP API server.

use super::runtime;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = runtime::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let gateway = config.gateway.clone();
    let rt = runtime::build(config).await?;

    println!("🦀 Clonechat Gateway");
    println!("   Listening:  {}:{}", gateway.host, gateway.port);
    println!("   Log:        {}", rt.controller.log().name());
    println!("   Session:    {}", rt.session_id());

    clonechat_gateway::start(&gateway, rt.controller.clone()).await?;

    Ok(())
}
