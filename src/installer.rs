//! Bounded-concurrency package installer: downloads and writes every
//! locked package to its destination using a small worker pool. The first
//! failing download cancels the remaining queue rather than letting every
//! worker run its task list to completion.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::ui::Ui;

const MAX_PARALLEL_INSTALLS: usize = 5;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download failed for {name}: {source}")]
    Download { name: String, source: reqwest::Error },
}

/// One package to fetch and write to disk.
#[derive(Debug, Clone)]
pub struct InstallTask {
    pub name: String,
    pub url: String,
    pub destination: PathBuf,
}

/// Downloads every task with up to [`MAX_PARALLEL_INSTALLS`] concurrent
/// requests. `ui` is notified as each package finishes.
pub async fn install_all(
    tasks: Vec<InstallTask>,
    client: reqwest::Client,
    ui: Arc<Mutex<dyn Ui + Send>>,
) -> Result<(), InstallError> {
    let total = tasks.len();
    if total == 0 {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(total);
    for task in tasks {
        tx.send(task).await.expect("channel sized to hold every task");
    }
    drop(tx);

    let rx = Arc::new(Mutex::new(rx));
    let mut workers = JoinSet::new();
    for _ in 0..MAX_PARALLEL_INSTALLS.min(total) {
        let rx = Arc::clone(&rx);
        let client = client.clone();
        let ui = Arc::clone(&ui);
        workers.spawn(async move {
            loop {
                let task = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(task) = task else { return Ok(()) };
                install_one(&client, &task).await?;
                ui.lock().await.indicate_progress(&format!("installed {}", task.name));
            }
        });
    }

    let mut first_err = None;
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result.expect("installer worker panicked") {
            if first_err.is_none() {
                first_err = Some(err);
            }
            // Cooperative cancellation: close the channel so idle workers
            // stop dequeuing new tasks instead of racing to finish theirs.
            rx.lock().await.close();
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn install_one(client: &reqwest::Client, task: &InstallTask) -> Result<(), InstallError> {
    let download = |source: reqwest::Error| InstallError::Download {
        name: task.name.clone(),
        source,
    };

    let response = client
        .get(&task.url)
        .send()
        .await
        .map_err(download)?
        .error_for_status()
        .map_err(download)?;
    let bytes = response.bytes().await.map_err(download)?;

    if let Some(parent) = task.destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&task.destination, &bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::NullUi;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn installs_every_task_concurrently() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path_matches(regex::Regex::new("/pkg-.*").unwrap());
            then.status(200).body(b"contents".to_vec());
        });

        let dir = tempfile::tempdir().unwrap();
        let tasks: Vec<InstallTask> = (0..8)
            .map(|i| InstallTask {
                name: format!("pkg-{i}"),
                url: server.url(&format!("/pkg-{i}")),
                destination: dir.path().join(format!("pkg-{i}.bin")),
            })
            .collect();

        let ui: Arc<Mutex<dyn Ui + Send>> = Arc::new(Mutex::new(NullUi));
        install_all(tasks, reqwest::Client::new(), ui).await.unwrap();

        mock.assert_hits(8);
        for i in 0..8 {
            assert!(dir.path().join(format!("pkg-{i}.bin")).exists());
        }
    }

    #[tokio::test]
    async fn first_failure_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let dir = tempfile::tempdir().unwrap();
        let tasks = vec![InstallTask {
            name: "missing".into(),
            url: server.url("/missing"),
            destination: dir.path().join("missing.bin"),
        }];

        let ui: Arc<Mutex<dyn Ui + Send>> = Arc::new(Mutex::new(NullUi));
        let result = install_all(tasks, reqwest::Client::new(), ui).await;
        assert!(result.is_err());
    }
}
