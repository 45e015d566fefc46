//! Production [`ComposeEngine`] backed by the `docker compose` CLI.

use super::{ComposeEngine, ServiceContainer, UpOptions};
use crate::docker::DockerError;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Timeout for read-only compose queries. Pull and up run unbounded.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Docker Compose command type (v1 or v2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    V2, // docker compose
    V1, // docker-compose
}

/// Global cache for compose command detection
static COMPOSE_COMMAND: OnceCell<ComposeCommand> = OnceCell::const_new();

impl ComposeCommand {
    /// Detect which docker compose command is available
    async fn detect() -> Result<ComposeCommand> {
        let v2_check = tokio::process::Command::new("docker")
            .args(["compose", "version"])
            .output()
            .await;

        if let Ok(output) = v2_check {
            if output.status.success() {
                return Ok(ComposeCommand::V2);
            }
        }

        let v1_check = tokio::process::Command::new("docker-compose")
            .args(["--version"])
            .output()
            .await;

        if let Ok(output) = v1_check {
            if output.status.success() {
                return Ok(ComposeCommand::V1);
            }
        }

        Err(Error::Config(
            "Neither 'docker compose' (v2) nor 'docker-compose' (v1) found. Please install Docker Compose.".to_string(),
        ))
    }

    /// Get the compose command (cached)
    pub async fn get() -> Result<ComposeCommand> {
        COMPOSE_COMMAND
            .get_or_try_init(|| async { Self::detect().await })
            .await
            .copied()
    }

    fn command_and_args(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            ComposeCommand::V2 => ("docker", vec!["compose"]),
            ComposeCommand::V1 => ("docker-compose", vec![]),
        }
    }
}

impl std::fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeCommand::V2 => f.write_str("docker compose (v2)"),
            ComposeCommand::V1 => f.write_str("docker-compose (v1)"),
        }
    }
}

/// Runs compose subcommands inside the project directory.
#[derive(Debug, Clone, Default)]
pub struct ComposeCli {
    /// `docker` binary run as `<docker> compose`. Detected when unset.
    docker: Option<PathBuf>,
}

impl ComposeCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `docker` with the v2 `compose` plugin, skipping detection.
    pub fn with_docker(docker: impl Into<PathBuf>) -> Self {
        Self {
            docker: Some(docker.into()),
        }
    }

    fn docker(&self) -> &Path {
        self.docker.as_deref().unwrap_or(Path::new("docker"))
    }

    async fn command(&self, dir: &Path, args: &[&str]) -> Result<tokio::process::Command> {
        let mut command = match &self.docker {
            Some(docker) => {
                let mut command = tokio::process::Command::new(docker);
                command.arg("compose");
                command
            }
            None => {
                let (cmd, base_args) = ComposeCommand::get().await?.command_and_args();
                let mut command = tokio::process::Command::new(cmd);
                command.args(base_args);
                command
            }
        };
        command.args(args).current_dir(dir);
        Ok(command)
    }

    /// Run without a client-side timeout. A hung tool hangs the caller.
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let mut command = self.command(dir, args).await?;
        let output = command
            .output()
            .await
            .map_err(|e| DockerError::spawn(format!("compose {}", args.join(" ")), e))?;
        Ok(output)
    }

    async fn query(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let cmd_str = format!("compose {}", args.join(" "));
        let output = tokio::time::timeout(QUERY_TIMEOUT, self.run(dir, args))
            .await
            .map_err(|_| DockerError::timed_out(&cmd_str, QUERY_TIMEOUT))??;
        if !output.status.success() {
            return Err(DockerError::from_output(cmd_str, "", &output).into());
        }
        Ok(output)
    }

    /// Run a mutating command, mapping any failure through `wrap`.
    async fn mutate(&self, dir: &Path, args: &[&str], wrap: fn(String) -> Error) -> Result<()> {
        let output = self.run(dir, args).await.map_err(|e| wrap(e.to_string()))?;
        if !output.status.success() {
            let cmd_str = format!("compose {}", args.join(" "));
            return Err(wrap(
                DockerError::from_output(cmd_str, "", &output).to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ComposeEngine for ComposeCli {
    async fn services(&self, dir: &Path) -> Result<Vec<String>> {
        let output = self.query(dir, &["config", "--services"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn pull(&self, dir: &Path) -> Result<()> {
        self.mutate(dir, &["pull"], Error::Pull).await
    }

    async fn up(&self, dir: &Path, options: UpOptions) -> Result<()> {
        let mut args = vec!["up", "-d"];
        if options.force_recreate {
            args.push("--force-recreate");
        }
        if options.remove_orphans {
            args.push("--remove-orphans");
        }
        self.mutate(dir, &args, Error::Recreate).await
    }

    async fn ps(&self, dir: &Path, all: bool) -> Result<Vec<ServiceContainer>> {
        let mut args = vec!["ps", "--format", "json"];
        if all {
            args.push("--all");
        }
        let output = self.query(dir, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ps(&stdout))
    }

    async fn image_ref(&self, dir: &Path, service: &str) -> Result<Option<String>> {
        let output = self
            .query(dir, &["images", "--format", "json", service])
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_image_ref(&stdout))
    }

    async fn prune_images(&self) -> Result<()> {
        let output = tokio::process::Command::new(self.docker())
            .args(["image", "prune", "-f"])
            .output()
            .await
            .map_err(|e| DockerError::spawn("docker image prune -f", e))?;
        if !output.status.success() {
            return Err(DockerError::from_output("docker image prune -f", "", &output).into());
        }
        Ok(())
    }
}

/// Compose v2 prints either one JSON array or newline-delimited objects,
/// depending on version.
fn json_rows(stdout: &str) -> Vec<serde_json::Value> {
    if let Ok(rows) = serde_json::from_str::<Vec<serde_json::Value>>(stdout) {
        return rows;
    }
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .collect()
}

fn field<'a>(row: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(|v| v.as_str()).map(str::trim)
}

pub(crate) fn parse_ps(stdout: &str) -> Vec<ServiceContainer> {
    json_rows(stdout)
        .iter()
        .filter_map(|row| {
            let service = field(row, "Service")?;
            let id = field(row, "ID")?;
            if service.is_empty() || id.is_empty() {
                return None;
            }
            Some(ServiceContainer {
                service: service.to_string(),
                container_id: id.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_image_ref(stdout: &str) -> Option<String> {
    json_rows(stdout).iter().find_map(|row| {
        let repo = field(row, "Repository")?;
        if repo.is_empty() || repo == "<none>" {
            return None;
        }
        let tag = match field(row, "Tag") {
            Some(t) if !t.is_empty() && t != "<none>" => t,
            _ => "latest",
        };
        Some(format!("{}:{}", repo, tag))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// A project directory plus a fake `docker` that appends its argv to
    /// `calls` and answers `ps` like compose does: the exited `web`
    /// container only shows up with `--all`. A `fail` file in the project
    /// makes every call exit 1.
    struct FakeDocker {
        root: TempDir,
        cli: ComposeCli,
    }

    impl FakeDocker {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let calls = root.path().join("calls");
            let script = format!(
                "#!/bin/sh\n\
                 echo \"$*\" >> '{calls}'\n\
                 if [ -f fail ]; then echo \"boom: $*\" >&2; exit 1; fi\n\
                 case \"$*\" in\n\
                 \x20 'compose ps --format json --all') echo '[{{\"ID\":\"w1\",\"Service\":\"web\",\"State\":\"exited\"}},{{\"ID\":\"d1\",\"Service\":\"db\",\"State\":\"running\"}}]' ;;\n\
                 \x20 'compose ps --format json') echo '[{{\"ID\":\"d1\",\"Service\":\"db\",\"State\":\"running\"}}]' ;;\n\
                 \x20 'compose images --format json web') echo '[{{\"Repository\":\"nginx\",\"Tag\":\"1.25\"}}]' ;;\n\
                 \x20 'compose config --services') printf 'web\\ndb\\n' ;;\n\
                 esac\n",
                calls = calls.display()
            );
            let docker = root.path().join("docker");
            fs::write(&docker, script).unwrap();
            fs::set_permissions(&docker, fs::Permissions::from_mode(0o755)).unwrap();
            fs::create_dir_all(root.path().join("project")).unwrap();
            Self {
                cli: ComposeCli::with_docker(docker),
                root,
            }
        }

        fn project(&self) -> PathBuf {
            self.root.path().join("project")
        }

        fn fail_from_now_on(&self) {
            fs::write(self.project().join("fail"), "").unwrap();
        }

        fn calls(&self) -> Vec<String> {
            fs::read_to_string(self.root.path().join("calls"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn builds_compose_command_lines() {
        let fake = FakeDocker::new();
        let dir = fake.project();

        assert_eq!(fake.cli.services(&dir).await.unwrap(), vec!["web", "db"]);
        fake.cli.pull(&dir).await.unwrap();
        fake.cli.up(&dir, UpOptions::recreate()).await.unwrap();
        assert_eq!(
            fake.cli.image_ref(&dir, "web").await.unwrap().as_deref(),
            Some("nginx:1.25")
        );
        fake.cli.prune_images().await.unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "compose config --services",
                "compose pull",
                "compose up -d --force-recreate --remove-orphans",
                "compose images --format json web",
                "image prune -f",
            ]
        );
    }

    #[tokio::test]
    async fn ps_lists_stopped_containers_only_when_asked() {
        let fake = FakeDocker::new();
        let dir = fake.project();

        let running = fake.cli.ps(&dir, false).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].service, "db");

        let all = fake.cli.ps(&dir, true).await.unwrap();
        let services: Vec<&str> = all.iter().map(|c| c.service.as_str()).collect();
        assert_eq!(services, vec!["web", "db"]);

        assert_eq!(
            fake.calls(),
            vec!["compose ps --format json", "compose ps --format json --all"]
        );
    }

    #[tokio::test]
    async fn failed_exits_map_to_phase_errors() {
        let fake = FakeDocker::new();
        let dir = fake.project();
        fake.fail_from_now_on();

        match fake.cli.pull(&dir).await {
            Err(Error::Pull(message)) => assert!(message.contains("boom: compose pull")),
            other => panic!("expected pull error, got {:?}", other),
        }
        match fake.cli.up(&dir, UpOptions::recreate()).await {
            Err(Error::Recreate(message)) => assert!(message.contains("exited with 1")),
            other => panic!("expected recreate error, got {:?}", other),
        }
        assert!(matches!(
            fake.cli.ps(&dir, true).await,
            Err(Error::Docker(DockerError::Failed { code: Some(1), .. }))
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let root = tempfile::tempdir().unwrap();
        let cli = ComposeCli::with_docker(root.path().join("no-such-docker"));

        assert!(matches!(
            cli.ps(root.path(), false).await,
            Err(Error::Docker(DockerError::Spawn { .. }))
        ));
        assert!(matches!(cli.pull(root.path()).await, Err(Error::Pull(_))));
    }

    #[test]
    fn parses_ps_array_and_ndjson() {
        let array = r#"[{"ID":"abc","Service":"web","State":"running"},{"ID":"def","Service":"db","State":"running"}]"#;
        let rows = parse_ps(array);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service, "web");
        assert_eq!(rows[1].container_id, "def");

        let ndjson = "{\"ID\":\"abc\",\"Service\":\"web\"}\n\n{\"ID\":\"def\",\"Service\":\"db\"}\n";
        assert_eq!(parse_ps(ndjson).len(), 2);
    }

    #[test]
    fn ps_skips_rows_without_service() {
        let rows = parse_ps(r#"[{"ID":"abc"},{"ID":"def","Service":"db"}]"#);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service, "db");
    }

    #[test]
    fn image_ref_defaults_tag() {
        let out = r#"[{"ContainerName":"p-web-1","Repository":"nginx","Tag":"","ID":"sha256:aaa"}]"#;
        assert_eq!(parse_image_ref(out).as_deref(), Some("nginx:latest"));

        let tagged = r#"{"Repository":"ghcr.io/acme/api","Tag":"1.4"}"#;
        assert_eq!(parse_image_ref(tagged).as_deref(), Some("ghcr.io/acme/api:1.4"));
    }

    #[test]
    fn untagged_build_has_no_ref() {
        assert_eq!(parse_image_ref(r#"[{"Repository":"<none>","Tag":"<none>"}]"#), None);
        assert_eq!(parse_image_ref(""), None);
    }
}
