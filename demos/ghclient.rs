use geniushub_client::{GeniusClient, MessageLogMode, ZoneMode};
use serde_json::json;
use std::env;

const USAGE: &str = "usage: ghclient <hub-token | hub-ip> [--user <u> --pass <p>] [--log] [--watch] \
                     [zones | devices | issues | info] [--zone <id|name> [--mode <m> | --temp <c> [--secs <s>]]]";

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_view(client: &GeniusClient, view: &str) {
    let hub = client.hub();
    let value = match view {
        "devices" => {
            let mut devices: Vec<_> = hub.devices().collect();
            devices.sort_by(|a, b| a.id.cmp(&b.id));
            json!(devices)
        }
        "issues" => json!(hub.issues()),
        "info" => json!({
            "id": hub.id(),
            "api": hub.api_version(),
            "version": hub.version(),
            "zones": hub.zones().count(),
            "devices": hub.devices().count(),
            "issues": hub.issues().len(),
        }),
        _ => {
            let mut zones: Vec<_> = hub.zones().collect();
            zones.sort_by(|a, b| a.id.cmp(&b.id));
            json!(zones)
        }
    };
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("cannot render {view}: {e}"),
    }
}

#[tokio::main]
async fn main() -> geniushub_client::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let hub_id = args.get(1).expect(USAGE);
    let watch = args.iter().any(|a| a == "--watch");
    let view = args
        .iter()
        .skip(2)
        .find(|a| matches!(a.as_str(), "zones" | "devices" | "issues" | "info"))
        .map(String::as_str)
        .unwrap_or("zones");

    let mut builder = GeniusClient::builder(hub_id);
    if let (Some(user), Some(pass)) = (flag_value(&args, "--user"), flag_value(&args, "--pass")) {
        builder = builder.credentials(user, pass);
    }
    if args.iter().any(|a| a == "--log") {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("logs/ghclient_{ts}.ndjson");
        std::fs::create_dir_all("logs").ok();
        println!("Logging all requests/responses to {path}");
        builder = builder.message_log(MessageLogMode::Diffed, &path);
    }
    let mut client = builder.build()?;

    if view == "info" {
        client.version().await?;
    }
    client.update().await?;

    if let Some(zone) = flag_value(&args, "--zone") {
        if let Some(mode) = flag_value(&args, "--mode") {
            let mode: ZoneMode = mode.parse()?;
            let done = format!("Zone {zone} set to {mode}.");
            client.set_mode(zone, mode).await?;
            println!("{done}");
        } else if let Some(temp) = flag_value(&args, "--temp") {
            let temp: f64 = temp.parse().expect("--temp must be a number");
            let secs: i64 = flag_value(&args, "--secs")
                .map(|s| s.parse().expect("--secs must be an integer"))
                .unwrap_or(3600);
            client.set_override(zone, secs, temp).await?;
            println!("Zone {zone} overridden to {temp:.1}\u{00b0}C for {secs}s.");
        } else {
            let found = client.hub().find_zone(zone);
            match found {
                Some(z) => println!("{}", json!(z)),
                None => eprintln!("Zone {zone} not found"),
            }
        }
        return Ok(());
    }

    print_view(&client, view);
    if !watch {
        return Ok(());
    }

    let interval = client.api_version().default_poll_interval();
    loop {
        tokio::time::sleep(interval).await;
        match client.update().await {
            Ok(summary) => {
                print_view(&client, view);
                println!(
                    "-- {} new zones, {} new devices, {} issues --",
                    summary.zones_created, summary.devices_created, summary.issues
                );
            }
            Err(e) if e.is_transport() => eprintln!("Update error: {e}"),
            Err(e) => return Err(e),
        }
    }
}
