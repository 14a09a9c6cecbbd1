//! Ephemeral install-test environments.
//!
//! Each install test gets its own virtual environment in a fresh temporary
//! directory. The directory is owned by a [`TestEnv`] and removed when it
//! is dropped, whatever the outcome of the test.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use wheelfix_schema::{InterpreterTag, WheelFilename};

use crate::config::InstallConfig;
use crate::process::{Tool, ToolError, ToolOutput};

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("failed to create environment: {0}")]
    Create(String),

    #[error("failed to upgrade installer tooling: {0}")]
    Upgrade(String),
}

/// Known interpreters and the rules for picking one for a wheel.
#[derive(Debug, Clone)]
pub struct InterpreterRegistry {
    interpreters: BTreeMap<InterpreterTag, PathBuf>,
    preference: Vec<InterpreterTag>,
    stable_abi_fallback: Option<InterpreterTag>,
}

impl InterpreterRegistry {
    pub fn from_config(config: &InstallConfig) -> Self {
        let interpreters = config
            .interpreters
            .iter()
            .filter_map(|(tag, path)| match InterpreterTag::parse(tag) {
                Some(tag) => Some((tag, path.clone())),
                None => {
                    tracing::warn!(%tag, "ignoring interpreter with invalid tag");
                    None
                }
            })
            .collect();

        Self {
            interpreters,
            preference: config
                .preference
                .iter()
                .filter_map(|t| InterpreterTag::parse(t))
                .collect(),
            stable_abi_fallback: InterpreterTag::parse(&config.stable_abi_fallback),
        }
    }

    pub fn contains(&self, tag: &InterpreterTag) -> bool {
        self.interpreters.contains_key(tag)
    }

    pub fn interpreter(&self, tag: &InterpreterTag) -> Option<&Path> {
        self.interpreters.get(tag).map(PathBuf::as_path)
    }

    /// Pick the interpreter tag an install test should use.
    ///
    /// The filename's own tag wins. Without one, the first preferred tag
    /// with a known interpreter is used. Stable-ABI wheels whose tag has no
    /// interpreter fall back to the configured default.
    pub fn resolve(&self, wheel: &WheelFilename) -> Option<InterpreterTag> {
        let tag = wheel
            .interpreter_tag()
            .or_else(|| self.preference.iter().find(|t| self.contains(t)).cloned());

        if wheel.is_stable_abi() && !tag.as_ref().is_some_and(|t| self.contains(t)) {
            return self.stable_abi_fallback.clone().or(tag);
        }
        tag
    }
}

/// A disposable virtual environment.
#[derive(Debug)]
pub struct TestEnv {
    dir: tempfile::TempDir,
    timeout: Duration,
}

impl TestEnv {
    /// Create a virtual environment with `interpreter` under `root`
    /// (the system temp dir when `None`).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// interpreter fails to build the environment.
    pub async fn create(
        interpreter: &Path,
        root: Option<&Path>,
        timeout: Duration,
    ) -> Result<Self, EnvError> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("wheel-venv-");
            b
        };
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let output = Tool::new(interpreter)
            .args(["-m", "venv"])
            .arg(dir.path())
            .run(timeout)
            .await?;
        if !output.success() {
            return Err(EnvError::Create(output.diagnostic()));
        }

        tracing::debug!(path = %dir.path().display(), "created test environment");
        Ok(Self { dir, timeout })
    }

    pub fn python(&self) -> PathBuf {
        self.dir.path().join("bin").join("python")
    }

    /// Upgrade pip, setuptools and wheel inside the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if pip cannot be run or exits non-zero.
    pub async fn upgrade_tooling(&self) -> Result<(), EnvError> {
        let output = Tool::new(self.python())
            .args(["-m", "pip", "install", "--upgrade", "pip", "setuptools", "wheel"])
            .run(self.timeout)
            .await?;
        if !output.success() {
            return Err(EnvError::Upgrade(output.diagnostic()));
        }
        Ok(())
    }

    /// Install `wheel` without resolving its dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error if pip cannot be launched or times out.
    pub async fn install(&self, wheel: &Path) -> Result<ToolOutput, ToolError> {
        Tool::new(self.python())
            .args(["-m", "pip", "install", "--no-deps"])
            .arg(wheel)
            .run(self.timeout)
            .await
    }
}

/// Result of one install test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReport {
    Installed,
    Failed { message: String },
    /// No interpreter is known for the wheel.
    Skipped,
}

#[async_trait]
pub trait InstallTester: Send + Sync {
    /// Try installing `wheel` with the interpreter for `tag`.
    ///
    /// Environment setup failures are errors; an install that runs and
    /// fails, or any step that times out, is a [`InstallReport::Failed`].
    async fn install_test(
        &self,
        tag: Option<&InterpreterTag>,
        wheel: &Path,
    ) -> Result<InstallReport, EnvError>;
}

/// [`InstallTester`] that installs into a fresh venv per wheel.
#[derive(Debug, Clone)]
pub struct VenvTester {
    registry: InterpreterRegistry,
    venv_root: Option<PathBuf>,
    timeout: Duration,
}

impl VenvTester {
    pub fn new(registry: InterpreterRegistry, config: &InstallConfig) -> Self {
        Self {
            registry,
            venv_root: config.venv_root.clone(),
            timeout: config.timeout(),
        }
    }

    async fn prepare(&self, interpreter: &Path) -> Result<TestEnv, EnvError> {
        let env = TestEnv::create(interpreter, self.venv_root.as_deref(), self.timeout).await?;
        env.upgrade_tooling().await?;
        Ok(env)
    }
}

#[async_trait]
impl InstallTester for VenvTester {
    async fn install_test(
        &self,
        tag: Option<&InterpreterTag>,
        wheel: &Path,
    ) -> Result<InstallReport, EnvError> {
        let Some(interpreter) = tag.and_then(|t| self.registry.interpreter(t)) else {
            return Ok(InstallReport::Skipped);
        };

        tracing::debug!(
            wheel = %wheel.display(),
            python = tag.and_then(InterpreterTag::version).as_deref(),
            "install test"
        );

        // Setup timeouts are recorded like install timeouts; other setup
        // failures are raised and the artifact is retried next run.
        let env = match self.prepare(interpreter).await {
            Ok(env) => env,
            Err(EnvError::Tool(e @ ToolError::TimedOut { .. })) => {
                tracing::warn!(wheel = %wheel.display(), "{e}");
                return Ok(InstallReport::Failed {
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        match env.install(wheel).await {
            Ok(output) if output.success() => Ok(InstallReport::Installed),
            Ok(output) => Ok(InstallReport::Failed {
                message: output.diagnostic(),
            }),
            Err(e @ ToolError::TimedOut { .. }) => Ok(InstallReport::Failed {
                message: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(tags: &[&str]) -> InterpreterRegistry {
        let config = InstallConfig {
            interpreters: tags
                .iter()
                .map(|t| ((*t).to_string(), PathBuf::from(format!("/py/{t}"))))
                .collect(),
            ..InstallConfig::default()
        };
        InterpreterRegistry::from_config(&config)
    }

    fn resolve(reg: &InterpreterRegistry, name: &str) -> Option<String> {
        reg.resolve(&WheelFilename::parse(name).unwrap())
            .map(|t| t.as_str().to_string())
    }

    #[test]
    fn test_filename_tag_wins() {
        let reg = registry(&["cp311", "cp312"]);
        assert_eq!(
            resolve(&reg, "foo-1.0-cp39-cp39-linux_ppc64le.whl").as_deref(),
            Some("cp39")
        );
    }

    #[test]
    fn test_preference_when_filename_has_no_tag() {
        let reg = registry(&["cp310", "cp312"]);
        assert_eq!(
            resolve(&reg, "foo-1.0-py3-none-any.whl").as_deref(),
            Some("cp312")
        );
        assert_eq!(resolve(&registry(&[]), "foo-1.0-py3-none-any.whl"), None);
    }

    #[test]
    fn test_stable_abi_fallback() {
        let reg = registry(&["cp311", "cp312"]);
        assert_eq!(
            resolve(&reg, "foo-1.0-cp38-abi3-linux_ppc64le.whl").as_deref(),
            Some("cp311")
        );
        assert_eq!(
            resolve(&reg, "foo-1.0-cp312-abi3-linux_ppc64le.whl").as_deref(),
            Some("cp312")
        );
    }

    #[tokio::test]
    async fn test_unknown_tag_is_skipped() {
        let tester = VenvTester::new(registry(&["cp311"]), &InstallConfig::default());
        let tag = InterpreterTag::parse("cp27").unwrap();
        let report = tester
            .install_test(Some(&tag), Path::new("/nonexistent.whl"))
            .await
            .unwrap();
        assert_eq!(report, InstallReport::Skipped);
        assert_eq!(
            tester.install_test(None, Path::new("/nonexistent.whl")).await.unwrap(),
            InstallReport::Skipped
        );
    }

    #[cfg(unix)]
    mod fake_python {
        use super::*;
        use crate::testutil::{FAKE_PYTHON, write_script};

        fn tester(root: &Path) -> VenvTester {
            let python = write_script(root, "python3.11", FAKE_PYTHON);
            let config = InstallConfig {
                interpreters: [("cp311".to_string(), python)].into_iter().collect(),
                venv_root: Some(root.join("venvs")),
                timeout_secs: 10,
                ..InstallConfig::default()
            };
            VenvTester::new(InterpreterRegistry::from_config(&config), &config)
        }

        fn cp311() -> InterpreterTag {
            InterpreterTag::parse("cp311").unwrap()
        }

        #[tokio::test]
        async fn test_install_success_and_teardown() {
            let tmp = tempfile::tempdir().unwrap();
            let tester = tester(tmp.path());

            let report = tester
                .install_test(Some(&cp311()), Path::new("foo-1.0-cp311-cp311-linux_ppc64le.whl"))
                .await
                .unwrap();
            assert_eq!(report, InstallReport::Installed);

            let leftovers = std::fs::read_dir(tmp.path().join("venvs")).unwrap().count();
            assert_eq!(leftovers, 0);
        }

        #[tokio::test]
        async fn test_install_failure_message() {
            let tmp = tempfile::tempdir().unwrap();
            let report = tester(tmp.path())
                .install_test(Some(&cp311()), Path::new("broken-1.0-cp311-cp311-linux_ppc64le.whl"))
                .await
                .unwrap();
            assert_eq!(
                report,
                InstallReport::Failed {
                    message: "ERROR: broken-1.0-cp311-cp311-linux_ppc64le.whl is not a supported wheel on this platform.".into()
                }
            );
        }

        #[tokio::test]
        async fn test_tooling_upgrade_timeout_is_a_failed_install() {
            let tmp = tempfile::tempdir().unwrap();
            let python = write_script(
                tmp.path(),
                "python3.11",
                r#"if [ "$2" = "venv" ]; then
  mkdir -p "$3/bin" && cp "$0" "$3/bin/python"
  exit $?
fi
case "$*" in
  *--upgrade*) exec sleep 30 ;;
esac
exit 0
"#,
            );
            let config = InstallConfig {
                interpreters: [("cp311".to_string(), python)].into_iter().collect(),
                venv_root: Some(tmp.path().join("venvs")),
                timeout_secs: 1,
                ..InstallConfig::default()
            };
            let tester = VenvTester::new(InterpreterRegistry::from_config(&config), &config);

            let report = tester
                .install_test(Some(&cp311()), Path::new("foo-1.0-cp311-cp311-linux_ppc64le.whl"))
                .await
                .unwrap();
            assert_eq!(
                report,
                InstallReport::Failed {
                    message: "python timed out after 1s".into()
                }
            );
            let leftovers = std::fs::read_dir(tmp.path().join("venvs")).unwrap().count();
            assert_eq!(leftovers, 0);
        }

        #[tokio::test]
        async fn test_env_creation_failure_is_an_error() {
            let tmp = tempfile::tempdir().unwrap();
            let python = write_script(
                tmp.path(),
                "python",
                "echo 'Error: venv unavailable' >&2\nexit 1\n",
            );

            let env = TestEnv::create(&python, Some(tmp.path()), Duration::from_secs(10)).await;
            match env {
                Err(EnvError::Create(msg)) => assert_eq!(msg, "Error: venv unavailable"),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }
}
