//! Hotplug walkthrough against the in-memory directory
//!
//! Run with: cargo run --example hotplug [DATABASE_PATH]
//!
//! Plugs in a pair of sinks, ranks headphones first for music, then
//! unplugs and replugs them to show rescue and hotplug rerouting. The
//! preferences survive in the database file between runs.

use std::time::Duration;

use device_manager::host::{NewDeviceData, NewStreamData, StreamInfo};
use device_manager::protocol::{ClientContext, Request, TagStructReader};
use device_manager::store::{DeviceKey, DeviceKind, Role, Shift};
use device_manager::{DeviceManager, ManagerConfig, ManagerService, MemoryDirectory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("device_manager=debug".parse()?)
                .add_directive("hotplug=debug".parse()?),
        )
        .init();

    let mut config = ManagerConfig::default()
        .role_device_priority_routing(true)
        .save_interval(Duration::from_secs(1));
    if let Some(path) = std::env::args().nth(1) {
        config = config.database_path(path);
    }
    println!("Database: {}", config.database_path.display());

    let directory = MemoryDirectory::new();
    let speakers =
        directory.add_device(DeviceKind::Sink, "alsa_output.speakers", Some("Speakers"));

    let manager = DeviceManager::open(config)?;
    let (handle, task) = ManagerService::spawn(manager, directory.clone());

    let headphones =
        directory.add_device(DeviceKind::Sink, "bluez_sink.headphones", Some("Headphones"));
    handle.device_changed(DeviceKind::Sink, headphones).await?;

    let (client, _events) = ClientContext::new(1);
    let prefer = Request::Reorder {
        shift: Shift::Prefer,
        role: Role::Music,
        device: DeviceKey::sink("bluez_sink.headphones"),
    };
    handle.request(&client, 1, prefer.encode()).await?;

    let data = handle
        .stream_new(DeviceKind::Sink, NewStreamData::with_role("music"))
        .await?;
    let device = data.device.unwrap_or(speakers);
    let stream =
        directory.add_stream(DeviceKind::Sink, StreamInfo::new(0, device, Some("music")));
    println!("Music stream {} starts on device {}", stream, device);

    let moved = handle.device_unlink(DeviceKind::Sink, headphones).await?;
    directory.remove_device(DeviceKind::Sink, headphones);
    println!("Headphones unplugged, {} stream(s) rescued", moved);

    let headphones = directory.add_device(DeviceKind::Sink, "bluez_sink.headphones", Some("BT"));
    let restored = handle
        .device_new(
            DeviceKind::Sink,
            NewDeviceData::new("bluez_sink.headphones", Some("BT")),
        )
        .await?;
    println!("Headphones back as {:?}", restored.description);
    let moved = handle.device_put(DeviceKind::Sink).await?;
    println!("Headphones replugged ({}), {} stream(s) moved back", headphones, moved);

    let reply = handle.request(&client, 2, Request::Read.encode()).await?;
    let mut reader = TagStructReader::new(reply);
    reader.get_u32()?;
    reader.get_u32()?;
    println!();
    println!("=== Stored devices ===");
    while !reader.eof() {
        let key = reader.get_string()?.unwrap_or_default();
        let description = reader.get_string()?.unwrap_or_default();
        println!("{:<32} {}", key, description);
    }

    handle.shutdown().await?;
    task.await?;
    Ok(())
}
