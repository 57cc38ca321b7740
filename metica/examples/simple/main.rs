use std::collections::HashMap;

pub fn main() -> metica::Result<()> {
    // Configure env_logger to see Metica SDK logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("metica")).init();

    let api_key = std::env::var("METICA_API_KEY")
        .expect("METICA_API_KEY env variable should contain API key");
    let app_id =
        std::env::var("METICA_APP_ID").expect("METICA_APP_ID env variable should contain app id");

    let client = metica::ClientConfig::from_api_key(api_key)
        .app_id(app_id)
        .user_id("example-user")
        .to_client()?;

    // Fetch offers for a couple of placements. Fresh cache entries are served locally.
    let offers = client.get_offers(&["shop", "main_menu"])?;
    for (placement, offers) in &offers {
        println!("{placement}: {} offers", offers.len());
        for offer in offers {
            println!(
                "  - {} ({:?} {:?})",
                offer.offer_id, offer.price, offer.currency_code
            );
            client.log_offer_display(&offer.offer_id, placement);
        }
    }

    // Fetch a single remote-config value.
    let configs = client.get_configs(Some(&["welcome_pack"]))?;
    println!("Configs: {configs:?}");

    client.log_custom_event("sessionStart", HashMap::new());

    // Flush remaining events and persist the display history before exiting.
    client.shutdown()?;

    Ok(())
}
