//! Shared fixtures for unit tests: fake tool scripts, wheel archives, and
//! in-memory implementations of the component traits whose behavior is
//! keyed on markers in the wheel filename.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;

use wheelfix_schema::{ArtifactDescriptor, ArtifactEntry, InterpreterTag};

use crate::config::InstallConfig;
use crate::io::store::{ArtifactStore, StoreError, UploadReceipt, upload_path};
use crate::process::ToolError;
use crate::repair::{RepairReport, Repairer};
use crate::venv::{EnvError, InstallReport, InstallTester, InterpreterRegistry};

/// A stand-in interpreter: `-m venv DIR` copies itself to `DIR/bin/python`,
/// `-m pip ...` succeeds unless the last argument mentions `broken`.
pub(crate) const FAKE_PYTHON: &str = r#"if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  mkdir -p "$3/bin" && cp "$0" "$3/bin/python"
  exit $?
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ]; then
  for last; do :; done
  case "$last" in
    *broken*) echo "ERROR: $(basename "$last") is not a supported wheel on this platform." >&2; exit 1 ;;
  esac
  exit 0
fi
exit 2
"#;

#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(crate) fn build_wheel(path: &Path, members: &[String]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for member in members {
        zip.start_file(member.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"\x7fELF").unwrap();
    }
    zip.finish().unwrap();
}

pub(crate) fn entry(name: &str) -> ArtifactEntry {
    let mut parts = name.splitn(3, '-');
    let package = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();
    ArtifactEntry {
        repo: "pypi-src".into(),
        path: format!("{package}/{version}"),
        name: name.into(),
    }
}

pub(crate) fn descriptor(name: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::from_entry(entry(name)).unwrap()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// Store fake. Downloads fail for names containing `offline`, uploads are
/// rejected for names containing `reject`.
pub(crate) struct FakeStore {
    pub(crate) downloads: PathBuf,
    pub(crate) entries: Vec<ArtifactEntry>,
    pub(crate) uploads: Mutex<Vec<String>>,
}

impl FakeStore {
    pub(crate) fn new(downloads: &Path, names: &[&str]) -> Self {
        Self {
            downloads: downloads.to_path_buf(),
            entries: names.iter().map(|n| entry(n)).collect(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn query(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        Ok(self.entries.clone())
    }

    async fn ensure_present(&self, artifact: &ArtifactDescriptor) -> Result<PathBuf, StoreError> {
        if artifact.name().contains("offline") {
            return Err(StoreError::Status {
                url: artifact.entry().location(),
                status: 503,
            });
        }
        std::fs::create_dir_all(&self.downloads)?;
        let path = self.downloads.join(artifact.name());
        std::fs::write(&path, b"original")?;
        Ok(path)
    }

    async fn upload(
        &self,
        file: &Path,
        artifact: &ArtifactDescriptor,
    ) -> Result<UploadReceipt, StoreError> {
        let name = file_name(file);
        let path = upload_path(
            "auditwheel-repair",
            artifact.package(),
            artifact.version(),
            &name,
        );
        if name.contains("reject") {
            return Err(StoreError::Rejected {
                path,
                status: 403,
                body: "forbidden".into(),
            });
        }
        self.uploads.lock().unwrap().push(path.clone());
        Ok(UploadReceipt {
            path,
            sha256: String::new(),
            status: 201,
        })
    }
}

/// Repairer fake. Markers: `fail` (tool error), `noelf` (no binary
/// content), `empty` (clean exit, no output), `panic`, `bundled` (adds a
/// grafted library). Otherwise writes one manylinux wheel.
pub(crate) struct FakeRepairer;

#[async_trait]
impl Repairer for FakeRepairer {
    async fn repair(&self, wheel: &Path, out_dir: &Path) -> Result<RepairReport, ToolError> {
        let name = file_name(wheel);
        if name.contains("panic") {
            panic!("repair tool crashed on {name}");
        }
        if name.contains("fail") {
            return Ok(RepairReport::Failed {
                message: "ValueError: cannot repair".into(),
            });
        }
        if name.contains("noelf") {
            return Ok(RepairReport::NoBinaryContent);
        }
        if name.contains("empty") {
            return Ok(RepairReport::Repaired {
                outputs: Vec::new(),
            });
        }

        let package = name.split('-').next().unwrap_or_default();
        let mut members = vec![format!(
            "{package}/_native.cpython-311-ppc64le-linux-gnu.so"
        )];
        if name.contains("bundled") {
            members.push(format!("{package}.libs/libgfortran-a1b2.so.5.0.0"));
        }

        std::fs::create_dir_all(out_dir).unwrap();
        let out = out_dir.join(name.replace("linux_ppc64le", "manylinux_2_34_ppc64le"));
        build_wheel(&out, &members);
        Ok(RepairReport::Repaired { outputs: vec![out] })
    }
}

/// Install-test fake: `broken` fails, `novenv` raises, tags without a
/// default interpreter skip.
pub(crate) struct FakeTester {
    registry: InterpreterRegistry,
    pub(crate) calls: Mutex<Vec<(Option<String>, String)>>,
}

impl Default for FakeTester {
    fn default() -> Self {
        Self {
            registry: InterpreterRegistry::from_config(&InstallConfig::default()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTester {
    pub(crate) fn calls(&self) -> Vec<(Option<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstallTester for FakeTester {
    async fn install_test(
        &self,
        tag: Option<&InterpreterTag>,
        wheel: &Path,
    ) -> Result<InstallReport, EnvError> {
        let name = file_name(wheel);
        self.calls
            .lock()
            .unwrap()
            .push((tag.map(|t| t.as_str().to_string()), name.clone()));

        if name.contains("novenv") {
            return Err(EnvError::Create("venv module missing".into()));
        }
        if !tag.is_some_and(|t| self.registry.contains(t)) {
            return Ok(InstallReport::Skipped);
        }
        if name.contains("broken") {
            return Ok(InstallReport::Failed {
                message: "ERROR: install failed".into(),
            });
        }
        Ok(InstallReport::Installed)
    }
}
