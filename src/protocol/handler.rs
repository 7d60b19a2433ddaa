//! Extension request dispatch
//!
//! Turns a decoded [`Request`] into store operations and a reply payload.
//! The reply starts with `u32 COMMAND_REPLY, u32 tag`; failures produce no
//! reply body and are mapped to an error by the transport.

use bytes::Bytes;

use super::command::{
    Request, Subcommand, COMMAND_EXTENSION, COMMAND_REPLY, EXT_VERSION, TAG_UNSOLICITED,
};
use super::context::ClientContext;
use super::error::ProtocolError;
use super::tagstruct::TagStructWriter;
use crate::config::ManagerConfig;
use crate::host::DeviceDirectory;
use crate::manager::DeviceManager;
use crate::store::{Database, StoreError, WritePolicy};

/// Unsolicited change notification sent to subscribers
pub fn event_notification(config: &ManagerConfig) -> Bytes {
    let mut w = TagStructWriter::new();
    w.put_u32(COMMAND_EXTENSION)
        .put_u32(TAG_UNSOLICITED)
        .put_u32(config.module_index)
        .put_string(Some(config.module_name.as_str()))
        .put_u32(Subcommand::Event as u32);
    w.finish()
}

/// Handle one extension request from `client`
///
/// Returns the full reply payload for `tag`.
pub fn handle_request<D, H>(
    manager: &mut DeviceManager<D>,
    directory: &mut H,
    client: &ClientContext,
    tag: u32,
    payload: Bytes,
) -> Result<Bytes, ProtocolError>
where
    D: Database,
    H: DeviceDirectory + ?Sized,
{
    let request = Request::parse(payload).map_err(|e| {
        tracing::warn!(connection = client.connection_id, error = %e, "Protocol error");
        e
    })?;

    tracing::debug!(
        connection = client.connection_id,
        command = ?request.subcommand(),
        "Extension request"
    );

    let mut reply = TagStructWriter::new();
    reply.put_u32(COMMAND_REPLY).put_u32(tag);

    match request {
        Request::Test => {
            reply.put_u32(EXT_VERSION);
        }

        Request::Read => {
            for (key, entry) in manager.store().all_entries() {
                reply
                    .put_string(Some(key.to_string().as_str()))
                    .put_string(Some(entry.description.as_str()));
            }
        }

        Request::Rename {
            device,
            description,
        } => {
            let Some(mut entry) = manager.store().read(&device) else {
                tracing::warn!(key = %device, "Rename of unknown device rejected");
                return Err(ProtocolError::NoEntry(device));
            };

            entry.set_description(&description);
            match manager
                .store_mut()
                .write(&device, &entry, WritePolicy::ReplaceOnly)
            {
                Ok(()) => {
                    manager.apply_entry(directory, &device, &entry);
                    manager.trigger_save();
                }
                Err(StoreError::NotFound(key)) => return Err(ProtocolError::NoEntry(key)),
                Err(e) => return Err(e.into()),
            }
        }

        Request::Delete(devices) => {
            for device in devices {
                if let Err(e) = manager.store_mut().delete(&device) {
                    tracing::warn!(key = %device, error = %e, "Failed to delete entry");
                }
            }
            manager.trigger_save();
        }

        Request::RoleDevicePriorityRouting(enabled) => {
            manager.set_routing_enabled(enabled);
        }

        Request::Reorder {
            shift,
            role,
            device,
        } => match manager.store_mut().shift(&device, role, shift) {
            Ok(true) => manager.trigger_save(),
            Ok(false) => {}
            Err(StoreError::NotFound(key)) => {
                tracing::warn!(key = %key, role = %role, "Reorder of unknown device rejected");
                return Err(ProtocolError::NoEntry(key));
            }
            Err(e) => return Err(e.into()),
        },

        Request::Subscribe(enabled) => {
            if enabled {
                manager.subscribers_mut().subscribe(client);
            } else {
                manager.subscribers_mut().unsubscribe(client.connection_id);
            }
        }
    }

    Ok(reply.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDirectory;
    use crate::protocol::TagStructReader;
    use crate::store::{DeviceKey, DeviceKind, MemoryDatabase, Role, Shift, ENTRY_VERSION};

    struct Fixture {
        manager: DeviceManager<MemoryDatabase>,
        dir: MemoryDirectory,
        client: ClientContext,
        rx: tokio::sync::mpsc::Receiver<Bytes>,
    }

    impl Fixture {
        fn new() -> Self {
            let (client, rx) = ClientContext::new(7);
            Self {
                manager: DeviceManager::new(MemoryDatabase::new(), ManagerConfig::default()),
                dir: MemoryDirectory::new(),
                client,
                rx,
            }
        }

        fn with_sinks(names: &[&str]) -> Self {
            let mut fixture = Self::new();
            for name in names {
                fixture.dir.add_device(DeviceKind::Sink, name, Some(name));
            }
            fixture.manager.initialize(&fixture.dir);
            // Settle the flush armed by initialization
            fixture.manager.shutdown();
            fixture
        }

        /// Rewrite `key` with a record from a newer format version
        fn make_stale(&mut self, key: &DeviceKey) -> Bytes {
            let entry = self.manager.store().read(key).unwrap();
            let mut raw = entry.encode().to_vec();
            raw[0] = ENTRY_VERSION + 1;
            self.manager
                .store_mut()
                .database_mut()
                .set(&key.to_bytes(), &raw, false)
                .unwrap();
            Bytes::from(raw)
        }

        fn raw(&self, key: &DeviceKey) -> Option<Bytes> {
            self.manager.store().database().get(&key.to_bytes())
        }

        fn call(&mut self, request: Request) -> Result<TagStructReader, ProtocolError> {
            let reply = handle_request(
                &mut self.manager,
                &mut self.dir,
                &self.client,
                3,
                request.encode(),
            )?;
            let mut reader = TagStructReader::new(reply);
            assert_eq!(reader.get_u32().unwrap(), COMMAND_REPLY);
            assert_eq!(reader.get_u32().unwrap(), 3);
            Ok(reader)
        }
    }

    #[tokio::test]
    async fn test_version() {
        let mut f = Fixture::new();
        let mut reply = f.call(Request::Test).unwrap();
        assert_eq!(reply.get_u32().unwrap(), EXT_VERSION);
        assert!(reply.eof());
    }

    #[tokio::test]
    async fn test_read_lists_entries() {
        let mut f = Fixture::with_sinks(&["a", "b"]);
        let mic = f.dir.add_device(DeviceKind::Source, "mic", Some("Mic"));
        f.manager.on_device_changed(&f.dir, DeviceKind::Source, mic);

        let mut reply = f.call(Request::Read).unwrap();
        let mut pairs = Vec::new();
        while !reply.eof() {
            let key = reply.get_string().unwrap().unwrap();
            let description = reply.get_string().unwrap().unwrap();
            pairs.push((key, description));
        }

        assert_eq!(
            pairs,
            vec![
                ("sink:a".to_string(), "a".to_string()),
                ("sink:b".to_string(), "b".to_string()),
                ("source:mic".to_string(), "Mic".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_applies_to_live_device() {
        let mut f = Fixture::with_sinks(&["a"]);
        f.manager.subscribers_mut().subscribe(&f.client);

        f.call(Request::Rename {
            device: DeviceKey::sink("a"),
            description: "Kitchen".to_string(),
        })
        .unwrap();

        assert_eq!(
            f.manager.store().read(&DeviceKey::sink("a")).unwrap().description,
            "Kitchen"
        );
        let live = f.dir.device_by_name(DeviceKind::Sink, "a").unwrap();
        assert_eq!(live.description.as_deref(), Some("Kitchen"));
        assert!(f.manager.next_flush().is_some());
        assert!(f.rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_rename_unknown_device_fails() {
        let mut f = Fixture::with_sinks(&["a"]);

        let result = f.call(Request::Rename {
            device: DeviceKey::sink("ghost"),
            description: "Ghost".to_string(),
        });
        assert!(matches!(result, Err(ProtocolError::NoEntry(k)) if k == DeviceKey::sink("ghost")));
        assert!(f.manager.store().read(&DeviceKey::sink("ghost")).is_none());
        assert!(f.manager.next_flush().is_none());
    }

    #[tokio::test]
    async fn test_delete_entries() {
        let mut f = Fixture::with_sinks(&["a", "b"]);

        f.call(Request::Delete(vec![
            DeviceKey::sink("a"),
            DeviceKey::sink("missing"),
        ]))
        .unwrap();

        assert!(f.manager.store().read(&DeviceKey::sink("a")).is_none());
        assert!(f.manager.store().read(&DeviceKey::sink("b")).is_some());
        assert!(f.manager.next_flush().is_some());
    }

    #[tokio::test]
    async fn test_prefer_and_defer() {
        let mut f = Fixture::with_sinks(&["a", "b"]);

        f.call(Request::Reorder {
            shift: Shift::Prefer,
            role: Role::Music,
            device: DeviceKey::sink("b"),
        })
        .unwrap();
        assert!(f.manager.next_flush().is_some());

        let a = f.manager.store().read(&DeviceKey::sink("a")).unwrap();
        let b = f.manager.store().read(&DeviceKey::sink("b")).unwrap();
        assert_eq!((a.priority[Role::Music], b.priority[Role::Music]), (2, 1));
        assert_eq!((a.priority[Role::Phone], b.priority[Role::Phone]), (1, 2));

        // Already at the top: no change, still a successful reply
        f.manager.shutdown();
        f.call(Request::Reorder {
            shift: Shift::Prefer,
            role: Role::Music,
            device: DeviceKey::sink("b"),
        })
        .unwrap();
        assert!(f.manager.next_flush().is_none());

        let result = f.call(Request::Reorder {
            shift: Shift::Defer,
            role: Role::Music,
            device: DeviceKey::source("b"),
        });
        assert!(matches!(result, Err(ProtocolError::NoEntry(_))));
    }

    #[tokio::test]
    async fn test_routing_toggle() {
        let mut f = Fixture::new();
        assert!(!f.manager.routing_enabled());
        f.call(Request::RoleDevicePriorityRouting(true)).unwrap();
        assert!(f.manager.routing_enabled());
        f.call(Request::RoleDevicePriorityRouting(false)).unwrap();
        assert!(!f.manager.routing_enabled());
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let mut f = Fixture::new();
        f.call(Request::Subscribe(true)).unwrap();
        assert!(f.manager.subscribers().contains(7));

        let a = f.dir.add_device(DeviceKind::Sink, "a", Some("A"));
        f.manager.on_device_changed(&f.dir, DeviceKind::Sink, a);

        let event = f.rx.try_recv().unwrap();
        let mut reader = TagStructReader::new(event);
        assert_eq!(reader.get_u32().unwrap(), COMMAND_EXTENSION);
        assert_eq!(reader.get_u32().unwrap(), TAG_UNSOLICITED);
        assert_eq!(reader.get_u32().unwrap(), 0);
        assert_eq!(
            reader.get_string().unwrap().as_deref(),
            Some("module-device-manager")
        );
        assert_eq!(reader.get_u32().unwrap(), Subcommand::Event as u32);
        assert!(reader.eof());

        f.call(Request::Subscribe(false)).unwrap();
        f.manager.trigger_save();
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_request_rejected() {
        let mut f = Fixture::new();
        let mut w = TagStructWriter::new();
        w.put_u32(99);

        let result = handle_request(&mut f.manager, &mut f.dir, &f.client, 1, w.finish());
        assert!(matches!(result, Err(ProtocolError::UnknownCommand(99))));
    }

    #[tokio::test]
    async fn test_stale_record_rejects_rename_and_reorder() {
        let mut f = Fixture::with_sinks(&["a", "b"]);
        let key = DeviceKey::sink("a");
        let stale = f.make_stale(&key);

        let result = f.call(Request::Rename {
            device: key.clone(),
            description: "Kitchen".to_string(),
        });
        assert!(matches!(result, Err(ProtocolError::NoEntry(ref k)) if *k == key));

        for shift in [Shift::Prefer, Shift::Defer] {
            let result = f.call(Request::Reorder {
                shift,
                role: Role::Music,
                device: key.clone(),
            });
            assert!(matches!(result, Err(ProtocolError::NoEntry(ref k)) if *k == key));
        }

        assert!(f.manager.next_flush().is_none());
        assert_eq!(f.raw(&key), Some(stale));
        let live = f.dir.device_by_name(DeviceKind::Sink, "a").unwrap();
        assert_eq!(live.description.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_stale_neighbour_is_not_swapped() {
        let mut f = Fixture::with_sinks(&["a", "b"]);
        let stale = f.make_stale(&DeviceKey::sink("a"));

        // b's only neighbour in rank is unreadable, so nothing moves
        f.call(Request::Reorder {
            shift: Shift::Prefer,
            role: Role::Music,
            device: DeviceKey::sink("b"),
        })
        .unwrap();

        assert!(f.manager.next_flush().is_none());
        assert_eq!(f.raw(&DeviceKey::sink("a")), Some(stale));
        let b = f.manager.store().read(&DeviceKey::sink("b")).unwrap();
        assert_eq!(b.priority[Role::Music], 2);
    }
}
