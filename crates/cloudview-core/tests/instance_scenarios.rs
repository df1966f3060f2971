//! End-to-end single-instance scenarios.
//!
//! Each test plays two "processes" against one session endpoint rooted in a
//! temporary directory: A starts first, B launches later.

use cloudview_core::{
    BatchLoader, Command, CommandHandler, FileLoadRequest, InstanceCoordinator, LoadEvent, Role,
    SessionEndpoint, XyzSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Host stand-in: forwards requested file lists to the test.
struct ChannelHandler {
    tx: mpsc::UnboundedSender<Vec<PathBuf>>,
}

impl CommandHandler for ChannelHandler {
    fn on_files_requested(&self, paths: Vec<PathBuf>) {
        let _ = self.tx.send(paths);
    }
}

fn channel_handler() -> (Arc<ChannelHandler>, mpsc::UnboundedReceiver<Vec<PathBuf>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelHandler { tx }), rx)
}

fn write_cloud(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "0 0 0\n1 1 1\n2 2 2\n").unwrap();
    path
}

/// Run a batch to completion and return the indices that loaded.
async fn load_all(files: Vec<PathBuf>) -> Vec<usize> {
    let mut handle = BatchLoader::new(Arc::new(XyzSource), FileLoadRequest::new(files))
        .spawn()
        .unwrap();

    let mut loaded = Vec::new();
    while let Some(event) = handle.events.recv().await {
        match event {
            LoadEvent::GeometryLoaded { file_index, .. } => loaded.push(file_index),
            LoadEvent::Finished(_) => break,
            _ => {}
        }
    }
    loaded
}

#[tokio::test]
async fn scenario_a_second_launch_forwards_files_to_running_instance() {
    let run_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let endpoint = SessionEndpoint::in_dir(run_dir.path(), "scenario-a");

    // Process A starts with [a, b] and becomes the server
    let a_files = vec![
        write_cloud(data_dir.path(), "a.xyz"),
        write_cloud(data_dir.path(), "b.xyz"),
    ];
    let (handler, mut requests) = channel_handler();
    let a_role = InstanceCoordinator::new(endpoint.clone(), true)
        .start(&a_files, data_dir.path(), handler)
        .await;
    assert!(matches!(a_role, Role::Primary(Some(_))));
    assert_eq!(load_all(a_files).await, vec![0, 1]);

    // Process B starts with a relative [c] and finds A
    let c_abs = write_cloud(data_dir.path(), "c.xyz");
    let b_role = InstanceCoordinator::new(endpoint, true)
        .start(&[PathBuf::from("c.xyz")], data_dir.path(), channel_handler().0)
        .await;

    match b_role {
        Role::Forwarded(Command::OpenFiles(paths)) => assert_eq!(paths, vec![c_abs.clone()]),
        other => panic!("Expected B to forward its files, got: {:?}", other),
    }

    // A receives the absolute path and loads it through the same batch path
    let requested = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(requested, vec![c_abs]);
    assert_eq!(load_all(requested).await, vec![0]);

    drop(a_role);
}

#[tokio::test]
async fn scenario_b_no_listener_makes_first_process_the_server() {
    let run_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    let endpoint = SessionEndpoint::in_dir(run_dir.path(), "scenario-b");
    let files = vec![
        write_cloud(data_dir.path(), "a.xyz"),
        data_dir.path().join("missing.xyz"),
        write_cloud(data_dir.path(), "b.xyz"),
    ];

    let started = Instant::now();
    let role = InstanceCoordinator::new(endpoint.clone(), true)
        .start(&files, data_dir.path(), channel_handler().0)
        .await;
    assert!(started.elapsed() < Duration::from_secs(2));

    match &role {
        Role::Primary(Some(server)) => assert_eq!(server.endpoint(), &endpoint),
        other => panic!("Expected primary with listener, got: {:?}", other),
    }
    #[cfg(unix)]
    assert!(endpoint.socket_path().exists());

    // A proceeds with its own batch; the missing file does not stop the rest
    assert_eq!(load_all(files).await, vec![0, 2]);
}

#[tokio::test]
async fn scenario_c_empty_file_list_sends_goodbye_only() {
    let run_dir = TempDir::new().unwrap();
    let endpoint = SessionEndpoint::in_dir(run_dir.path(), "scenario-c");

    let (handler, mut requests) = channel_handler();
    let a_role = InstanceCoordinator::new(endpoint.clone(), true)
        .start(&[], run_dir.path(), handler)
        .await;
    assert!(a_role.is_primary());

    let b_role = InstanceCoordinator::new(endpoint, true)
        .start(&[], run_dir.path(), channel_handler().0)
        .await;
    assert!(matches!(b_role, Role::Forwarded(Command::Empty)));

    // B only returns after A hung up, so A has already handled the frame
    assert!(requests.try_recv().is_err());
    drop(a_role);
}

#[tokio::test]
async fn listener_survives_many_launches() {
    let run_dir = TempDir::new().unwrap();
    let endpoint = SessionEndpoint::in_dir(run_dir.path(), "busy");

    let (handler, mut requests) = channel_handler();
    let _a_role = InstanceCoordinator::new(endpoint.clone(), true)
        .start(&[], run_dir.path(), handler)
        .await;

    for i in 0..5 {
        let name = PathBuf::from(format!("/abs/{}.xyz", i));
        let role = InstanceCoordinator::new(endpoint.clone(), true)
            .start(std::slice::from_ref(&name), run_dir.path(), channel_handler().0)
            .await;
        assert!(matches!(role, Role::Forwarded(_)));
        assert_eq!(requests.recv().await.unwrap(), vec![name]);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_startup_path_still_goes_to_running_instance() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let run_dir = TempDir::new().unwrap();
    let endpoint = SessionEndpoint::in_dir(run_dir.path(), "non-utf8");

    let (handler, mut requests) = channel_handler();
    let a_role = InstanceCoordinator::new(endpoint.clone(), true)
        .start(&[], run_dir.path(), handler)
        .await;
    assert!(matches!(a_role, Role::Primary(Some(_))));

    let odd = PathBuf::from(OsStr::from_bytes(b"/abs/scan\xff.xyz"));
    let b_role = InstanceCoordinator::new(endpoint, true)
        .start(&[odd], run_dir.path(), channel_handler().0)
        .await;
    assert!(matches!(b_role, Role::Forwarded(Command::OpenFiles(_))));

    let requested = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(requested, vec![PathBuf::from("/abs/scan\u{FFFD}.xyz")]);
    drop(a_role);
}
