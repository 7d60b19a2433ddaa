//! Single-worker manager service
//!
//! Runs a [`DeviceManager`] on one tokio task. Lifecycle events, client
//! requests and the flush timer are all serialized onto that task, so the
//! manager never needs a lock. Callers talk to it through a cloneable
//! [`ManagerHandle`].

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::DeviceManager;
use crate::error::{Error, Result};
use crate::host::{
    DeviceDirectory, DeviceIndex, Hook, HookGroup, HookRegistry, NewDeviceData, NewStreamData,
};
use crate::protocol::{handle_request, ClientContext, ConnectionId, ProtocolError};
use crate::store::{Database, DeviceKind};

/// Pending commands before callers start waiting
const COMMAND_QUEUE: usize = 64;

enum Command {
    DeviceNew {
        kind: DeviceKind,
        data: NewDeviceData,
        reply: oneshot::Sender<NewDeviceData>,
    },
    DeviceChanged {
        kind: DeviceKind,
        index: DeviceIndex,
        reply: oneshot::Sender<()>,
    },
    StreamNew {
        kind: DeviceKind,
        data: NewStreamData,
        reply: oneshot::Sender<NewStreamData>,
    },
    DevicePut {
        kind: DeviceKind,
        reply: oneshot::Sender<usize>,
    },
    DeviceUnlink {
        kind: DeviceKind,
        index: DeviceIndex,
        reply: oneshot::Sender<usize>,
    },
    Request {
        client: ClientContext,
        tag: u32,
        payload: Bytes,
        reply: oneshot::Sender<std::result::Result<Bytes, ProtocolError>>,
    },
    ConnectionClosed {
        connection_id: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Manager task state
pub struct ManagerService<D, H> {
    manager: DeviceManager<D>,
    directory: H,
    hooks: HookGroup,
    commands: mpsc::Receiver<Command>,
}

impl<D, H> ManagerService<D, H>
where
    D: Database + 'static,
    H: DeviceDirectory + HookRegistry + Send + 'static,
{
    /// Connect hooks, record present devices and start the worker task
    pub fn spawn(
        mut manager: DeviceManager<D>,
        mut directory: H,
    ) -> (ManagerHandle, JoinHandle<()>) {
        let hooks = HookGroup::register(&mut directory, manager.config());
        manager.initialize(&directory);

        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let service = Self {
            manager,
            directory,
            hooks,
            commands,
        };

        let task = tokio::spawn(service.run());
        (ManagerHandle { tx }, task)
    }

    async fn run(mut self) {
        tracing::debug!("Device manager running");

        loop {
            let deadline = self.manager.next_flush();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.stop();
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.dispatch(command),
                    None => break,
                },
                _ = flush_timer(deadline) => {
                    self.manager.flush_due(Instant::now());
                }
            }
        }

        // Every handle dropped
        self.stop();
    }

    fn stop(&mut self) {
        std::mem::take(&mut self.hooks).teardown(&mut self.directory);
        self.manager.shutdown();
        tracing::info!("Device manager stopped");
    }

    fn dispatch(&mut self, command: Command) {
        let manager = &mut self.manager;
        let directory = &mut self.directory;
        let hooks = &self.hooks;

        match command {
            Command::DeviceNew {
                kind,
                mut data,
                reply,
            } => {
                if hooks.contains(Hook::DeviceNew(kind)) {
                    manager.on_device_new(kind, &mut data);
                }
                let _ = reply.send(data);
            }
            Command::DeviceChanged { kind, index, reply } => {
                if hooks.contains(Hook::DeviceChanged(kind)) {
                    manager.on_device_changed(directory, kind, index);
                }
                let _ = reply.send(());
            }
            Command::StreamNew {
                kind,
                mut data,
                reply,
            } => {
                if hooks.contains(Hook::StreamNew(kind)) {
                    manager.on_stream_new(directory, kind, &mut data);
                }
                let _ = reply.send(data);
            }
            Command::DevicePut { kind, reply } => {
                let moved = if hooks.contains(Hook::DevicePut(kind)) {
                    manager.on_device_put(directory, kind)
                } else {
                    0
                };
                let _ = reply.send(moved);
            }
            Command::DeviceUnlink { kind, index, reply } => {
                let moved = if hooks.contains(Hook::DeviceUnlink(kind)) {
                    manager.on_device_unlink(directory, kind, index)
                } else {
                    0
                };
                let _ = reply.send(moved);
            }
            Command::Request {
                client,
                tag,
                payload,
                reply,
            } => {
                let result = handle_request(manager, directory, &client, tag, payload);
                let _ = reply.send(result);
            }
            Command::ConnectionClosed {
                connection_id,
                reply,
            } => {
                if hooks.contains(Hook::ConnectionUnlink) {
                    manager.on_connection_closed(connection_id);
                }
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

async fn flush_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running manager service
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::DeviceNew { .. } => "DeviceNew",
            Command::DeviceChanged { .. } => "DeviceChanged",
            Command::StreamNew { .. } => "StreamNew",
            Command::DevicePut { .. } => "DevicePut",
            Command::DeviceUnlink { .. } => "DeviceUnlink",
            Command::Request { .. } => "Request",
            Command::ConnectionClosed { .. } => "ConnectionClosed",
            Command::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl ManagerHandle {
    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }

    /// Device about to be created; returns the possibly amended data
    pub async fn device_new(&self, kind: DeviceKind, data: NewDeviceData) -> Result<NewDeviceData> {
        self.call(|reply| Command::DeviceNew { kind, data, reply }).await
    }

    /// Device created or its properties changed
    pub async fn device_changed(&self, kind: DeviceKind, index: DeviceIndex) -> Result<()> {
        self.call(|reply| Command::DeviceChanged { kind, index, reply })
            .await
    }

    /// Stream about to be created; returns the possibly amended data
    pub async fn stream_new(&self, kind: DeviceKind, data: NewStreamData) -> Result<NewStreamData> {
        self.call(|reply| Command::StreamNew { kind, data, reply }).await
    }

    /// Device became live; returns the number of streams moved
    pub async fn device_put(&self, kind: DeviceKind) -> Result<usize> {
        self.call(|reply| Command::DevicePut { kind, reply }).await
    }

    /// Device going away; returns the number of streams moved
    pub async fn device_unlink(&self, kind: DeviceKind, index: DeviceIndex) -> Result<usize> {
        self.call(|reply| Command::DeviceUnlink { kind, index, reply })
            .await
    }

    /// Extension request from `client`; returns the reply payload
    pub async fn request(&self, client: &ClientContext, tag: u32, payload: Bytes) -> Result<Bytes> {
        let client = client.clone();
        let result = self
            .call(|reply| Command::Request {
                client,
                tag,
                payload,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Client connection closed
    pub async fn connection_closed(&self, connection_id: ConnectionId) -> Result<()> {
        self.call(|reply| Command::ConnectionClosed {
            connection_id,
            reply,
        })
        .await
    }

    /// Disconnect hooks, flush pending changes and stop the service
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|reply| Command::Shutdown { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::ManagerConfig;
    use crate::host::{MemoryDirectory, StreamInfo};
    use crate::protocol::{Request, TagStructReader};
    use crate::store::{DeviceKey, FileDatabase, MemoryDatabase, PriorityStore};

    fn spawn(config: ManagerConfig, dir: &MemoryDirectory) -> (ManagerHandle, JoinHandle<()>) {
        let manager = DeviceManager::new(MemoryDatabase::new(), config);
        ManagerService::spawn(manager, dir.clone())
    }

    fn stored(path: &std::path::Path, key: &DeviceKey) -> Option<String> {
        let db = FileDatabase::open(path, false).ok()?;
        PriorityStore::new(db).read(key).map(|e| e.description)
    }

    #[tokio::test]
    async fn test_hooks_connected_for_lifetime() {
        let dir = MemoryDirectory::new();
        let (handle, task) = spawn(ManagerConfig::default(), &dir);
        assert_eq!(dir.hook_count(), 11);
        assert!(dir.is_connected(Hook::DevicePut(DeviceKind::Source)));

        assert_ok!(handle.shutdown().await);
        assert_ok!(task.await);
        assert_eq!(dir.hook_count(), 0);

        assert!(matches!(
            handle.device_put(DeviceKind::Sink).await,
            Err(Error::ServiceClosed)
        ));
    }

    #[tokio::test]
    async fn test_disabled_hooks_are_not_dispatched() {
        let dir = MemoryDirectory::new();
        let config = ManagerConfig::default()
            .on_hotplug(false)
            .on_rescue(false)
            .role_device_priority_routing(true);
        let (handle, _task) = spawn(config, &dir);
        assert_eq!(dir.hook_count(), 7);

        let a = dir.add_device(DeviceKind::Sink, "a", Some("A"));
        dir.add_stream(DeviceKind::Sink, StreamInfo::new(0, a, None));
        assert_ok!(handle.device_changed(DeviceKind::Sink, a).await);
        let b = dir.add_device(DeviceKind::Sink, "b", Some("B"));
        assert_ok!(handle.device_changed(DeviceKind::Sink, b).await);

        assert_eq!(handle.device_unlink(DeviceKind::Sink, a).await.unwrap(), 0);
        assert!(dir.moves().is_empty());
    }

    #[tokio::test]
    async fn test_requests_and_notifications() {
        let dir = MemoryDirectory::new();
        dir.add_device(DeviceKind::Sink, "a", Some("Speakers"));
        let (handle, _task) = spawn(ManagerConfig::default(), &dir);
        let (client, mut events) = ClientContext::new(1);

        let reply = handle
            .request(&client, 9, Request::Subscribe(true).encode())
            .await
            .unwrap();
        let mut reader = TagStructReader::new(reply);
        assert_eq!(reader.get_u32().unwrap(), crate::protocol::COMMAND_REPLY);
        assert_eq!(reader.get_u32().unwrap(), 9);
        assert!(reader.eof());

        let b = dir.add_device(DeviceKind::Sink, "b", Some("Headphones"));
        assert_ok!(handle.device_changed(DeviceKind::Sink, b).await);
        assert!(events.recv().await.is_some());

        // Present before start: recorded at initialization
        let reply = handle
            .request(&client, 10, Request::Read.encode())
            .await
            .unwrap();
        let mut reader = TagStructReader::new(reply);
        reader.get_u32().unwrap();
        reader.get_u32().unwrap();
        assert_eq!(reader.get_string().unwrap().as_deref(), Some("sink:a"));

        let failed = handle
            .request(
                &client,
                11,
                Request::Rename {
                    device: DeviceKey::sink("ghost"),
                    description: "Ghost".into(),
                }
                .encode(),
            )
            .await;
        assert!(matches!(
            failed,
            Err(Error::Protocol(ProtocolError::NoEntry(_)))
        ));

        assert_ok!(handle.connection_closed(1).await);
        let c = dir.add_device(DeviceKind::Sink, "c", Some("HDMI"));
        assert_ok!(handle.device_changed(DeviceKind::Sink, c).await);
        assert_err!(events.try_recv());
    }

    #[tokio::test]
    async fn test_routing_through_handle() {
        let dir = MemoryDirectory::new();
        let a = dir.add_device(DeviceKind::Sink, "a", Some("A"));
        let b = dir.add_device(DeviceKind::Sink, "b", Some("B"));
        let config = ManagerConfig::default().role_device_priority_routing(true);
        let (handle, _task) = spawn(config, &dir);

        let data = handle
            .stream_new(DeviceKind::Sink, NewStreamData::with_role("game"))
            .await
            .unwrap();
        assert_eq!(data.device, Some(a));

        let stream = dir.add_stream(DeviceKind::Sink, StreamInfo::new(0, a, Some("game")));
        assert_eq!(handle.device_unlink(DeviceKind::Sink, a).await.unwrap(), 1);
        assert_eq!(dir.stream(DeviceKind::Sink, stream).unwrap().device, Some(b));

        let restored = handle
            .device_new(DeviceKind::Sink, NewDeviceData::new("a", Some("Generic")))
            .await
            .unwrap();
        assert_eq!(restored.description.as_deref(), Some("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("device-manager");
        let config = ManagerConfig::default().database_path(&path);
        let dir = MemoryDirectory::new();

        let manager = DeviceManager::open(config).unwrap();
        let (handle, _task) = ManagerService::spawn(manager, dir.clone());

        let a = dir.add_device(DeviceKind::Sink, "a", Some("Speakers"));
        assert_ok!(handle.device_changed(DeviceKind::Sink, a).await);
        assert_eq!(stored(&path, &DeviceKey::sink("a")), None);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(
            stored(&path, &DeviceKey::sink("a")).as_deref(),
            Some("Speakers")
        );
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("device-manager");
        let config = ManagerConfig::default().database_path(&path);
        let dir = MemoryDirectory::new();

        let manager = DeviceManager::open(config).unwrap();
        let (handle, task) = ManagerService::spawn(manager, dir.clone());

        let a = dir.add_device(DeviceKind::Sink, "a", Some("Speakers"));
        assert_ok!(handle.device_changed(DeviceKind::Sink, a).await);
        assert_ok!(handle.shutdown().await);
        assert_ok!(task.await);

        assert_eq!(
            stored(&path, &DeviceKey::sink("a")).as_deref(),
            Some("Speakers")
        );
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_service() {
        let dir = MemoryDirectory::new();
        let (handle, task) = spawn(ManagerConfig::default(), &dir);
        let clone = handle.clone();
        drop(handle);
        drop(clone);

        assert_ok!(task.await);
        assert_eq!(dir.hook_count(), 0);
    }
}
