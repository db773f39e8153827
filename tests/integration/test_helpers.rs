//! Shared test helpers for orchestrator and HTTP integration tests.
//!
//! Provides fake container and worktree tooling that record every call,
//! a temporary data directory with a wired [`Orchestrator`], and a server
//! bound on an ephemeral loopback port.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devco::config::GlobalConfig;
use devco::driver::{ContainerDriver, DriverFuture, StartedContainer};
use devco::http::{self, AppState};
use devco::models::{ContainerIdentity, Document, Project, RuntimeInfo, Workspace};
use devco::orchestrator::Orchestrator;
use devco::persistence::{ensure_layout, ProjectStore};
use devco::worktree::WorktreeProvisioner;
use devco::AppError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// One recorded call on [`FakeDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Start(String),
    Stop {
        container_id: Option<String>,
        compose_project_name: Option<String>,
    },
    Resolve(String),
}

/// In-memory [`ContainerDriver`] with scriptable failures.
#[derive(Debug)]
pub struct FakeDriver {
    calls: Mutex<Vec<DriverCall>>,
    started: AtomicUsize,
    pub compose_project: Mutex<Option<String>>,
    pub ip_address: Mutex<String>,
    pub fail_start: Mutex<bool>,
    pub fail_resolve: Mutex<bool>,
    /// Identities (compose name or container id) whose stop fails.
    pub fail_stop_for: Mutex<HashSet<String>>,
    /// Identities whose stop never completes.
    pub hang_stop_for: Mutex<HashSet<String>>,
    pub start_delay: Mutex<Duration>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            compose_project: Mutex::new(None),
            ip_address: Mutex::new("172.17.0.2".to_owned()),
            fail_start: Mutex::new(false),
            fail_resolve: Mutex::new(false),
            fail_stop_for: Mutex::new(HashSet::new()),
            hang_stop_for: Mutex::new(HashSet::new()),
            start_delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl FakeDriver {
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Start(_)))
            .count()
    }

    pub fn stops(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Stop { .. }))
            .count()
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl ContainerDriver for FakeDriver {
    fn start(&self, workspace_folder: &str) -> DriverFuture<'_, StartedContainer> {
        let workspace_folder = workspace_folder.to_owned();
        Box::pin(async move {
            self.record(DriverCall::Start(workspace_folder));
            let delay = *self.start_delay.lock().expect("delay lock");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if *self.fail_start.lock().expect("fail lock") {
                return Err(AppError::Launch("devcontainer up failed: exit status: 1".into()));
            }
            let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StartedContainer {
                container_id: format!("ctr-{n}"),
                compose_project_name: self.compose_project.lock().expect("compose lock").clone(),
                remote_user: "vscode".to_owned(),
                remote_workspace_folder: "/workspaces/app".to_owned(),
            })
        })
    }

    fn stop(
        &self,
        container_id: Option<&str>,
        compose_project_name: Option<&str>,
    ) -> DriverFuture<'_, ()> {
        let container_id = container_id.map(str::to_owned);
        let compose_project_name = compose_project_name.map(str::to_owned);
        Box::pin(async move {
            self.record(DriverCall::Stop {
                container_id: container_id.clone(),
                compose_project_name: compose_project_name.clone(),
            });
            let Some(target) = compose_project_name.or(container_id) else {
                return Err(AppError::NoTarget(
                    "cannot find any compose project or container".into(),
                ));
            };
            let hangs = self.hang_stop_for.lock().expect("hang lock").contains(&target);
            if hangs {
                std::future::pending::<()>().await;
            }
            if self.fail_stop_for.lock().expect("fail lock").contains(&target) {
                return Err(AppError::Stop(format!("docker rm -f {target} failed")));
            }
            Ok(())
        })
    }

    fn resolve_address(&self, container_id: &str) -> DriverFuture<'_, String> {
        let container_id = container_id.to_owned();
        Box::pin(async move {
            self.record(DriverCall::Resolve(container_id));
            if *self.fail_resolve.lock().expect("fail lock") {
                return Err(AppError::AddressNotFound("IPAddress not found".into()));
            }
            Ok(self.ip_address.lock().expect("ip lock").clone())
        })
    }
}

/// One recorded call on [`FakeWorktrees`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Add {
        repo: String,
        branch: String,
        dest: PathBuf,
    },
    Remove {
        repo: String,
        dest: PathBuf,
    },
    DeleteBranch {
        repo: String,
        branch: String,
    },
}

/// In-memory [`WorktreeProvisioner`] with scriptable failures.
#[derive(Debug, Default)]
pub struct FakeWorktrees {
    calls: Mutex<Vec<GitCall>>,
    pub fail_add: Mutex<bool>,
    pub fail_remove: Mutex<bool>,
    pub fail_delete_branch: Mutex<bool>,
}

impl FakeWorktrees {
    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: GitCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl WorktreeProvisioner for FakeWorktrees {
    fn add(&self, repo: &str, branch: &str, dest: &Path) -> DriverFuture<'_, ()> {
        let call = GitCall::Add {
            repo: repo.to_owned(),
            branch: branch.to_owned(),
            dest: dest.to_path_buf(),
        };
        Box::pin(async move {
            self.record(call);
            if *self.fail_add.lock().expect("fail lock") {
                return Err(AppError::Git("git worktree add failed: exit status: 128".into()));
            }
            Ok(())
        })
    }

    fn remove(&self, repo: &str, dest: &Path) -> DriverFuture<'_, ()> {
        let call = GitCall::Remove {
            repo: repo.to_owned(),
            dest: dest.to_path_buf(),
        };
        Box::pin(async move {
            self.record(call);
            if *self.fail_remove.lock().expect("fail lock") {
                return Err(AppError::Git("git worktree remove failed: exit status: 128".into()));
            }
            Ok(())
        })
    }

    fn delete_branch(&self, repo: &str, branch: &str) -> DriverFuture<'_, ()> {
        let call = GitCall::DeleteBranch {
            repo: repo.to_owned(),
            branch: branch.to_owned(),
        };
        Box::pin(async move {
            self.record(call);
            if *self.fail_delete_branch.lock().expect("fail lock") {
                return Err(AppError::Git("git branch -d failed: not fully merged".into()));
            }
            Ok(())
        })
    }
}

/// A wired orchestrator over a temporary data directory.
pub struct Harness {
    _temp: TempDir,
    pub config: Arc<GlobalConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub driver: Arc<FakeDriver>,
    pub worktrees: Arc<FakeWorktrees>,
}

/// Build a `GlobalConfig` rooted at `data_dir`.
pub fn test_config(data_dir: &Path) -> GlobalConfig {
    let toml = format!(
        r#"
address = "127.0.0.1:0"
data_dir = '{root}'
shutdown_timeout_seconds = 2
"#,
        root = data_dir.display(),
    );
    GlobalConfig::from_toml_str(&toml).expect("valid test config")
}

pub fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = test_config(temp.path());
    ensure_layout(&config).expect("layout");

    let driver = Arc::new(FakeDriver::default());
    let worktrees = Arc::new(FakeWorktrees::default());
    let store = Arc::new(ProjectStore::new(config.projects_path()));
    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        store,
        Arc::clone(&driver) as Arc<dyn ContainerDriver>,
        Arc::clone(&worktrees) as Arc<dyn WorktreeProvisioner>,
    ));

    Harness {
        _temp: temp,
        config: Arc::new(config),
        orchestrator,
        driver,
        worktrees,
    }
}

impl Harness {
    /// Register `project` with the given workspaces in `beforeStart`.
    pub async fn seed(&self, project: &str, workspaces: &[&str]) {
        self.orchestrator
            .create_project(project, &format!("/src/{project}"))
            .await
            .expect("create project");
        for ws in workspaces {
            self.orchestrator
                .create_workspace(project, ws, None)
                .await
                .expect("create workspace");
        }
    }

    /// Write a document containing `project/workspace` recorded as running at `ip`.
    pub async fn seed_running(&self, project: &str, workspace: &str, ip: &str) {
        let mut doc = self.document().await;
        let pj = doc
            .projects
            .entry(project.to_owned())
            .or_insert_with(|| Project::new(format!("/src/{project}")));
        let mut ws = Workspace::new(format!("devco/{workspace}"), format!("/wt/{workspace}"));
        ws.mark_running(RuntimeInfo {
            identity: ContainerIdentity::Container(format!("ctr-{workspace}")),
            remote_user: "vscode".to_owned(),
            remote_workspace_folder: "/workspaces/app".to_owned(),
            ip_address: ip.to_owned(),
        });
        pj.workspaces.insert(workspace.to_owned(), ws);
        self.orchestrator
            .store()
            .save(&doc)
            .await
            .expect("save seeded document");
    }

    pub async fn document(&self) -> Document {
        self.orchestrator.document().await.expect("load document")
    }

    pub async fn workspace(&self, project: &str, workspace: &str) -> Workspace {
        self.document()
            .await
            .workspace(project, workspace)
            .expect("workspace present")
            .clone()
    }
}

/// Serve the harness on an ephemeral port, returning the base URL.
///
/// Caller must cancel the token to shut the server down.
pub async fn spawn_server(h: &Harness) -> (String, CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");

    let state = AppState::new(Arc::clone(&h.config), Arc::clone(&h.orchestrator))
        .expect("app state");
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = http::serve(state, listener, server_ct).await;
    });

    (format!("http://{addr}"), ct)
}

/// Client that talks to loopback directly and never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}
