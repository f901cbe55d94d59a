//! External atlas generator invocation.
//!
//! The generator is run as
//!
//! ```text
//! <binary> <mode> --fontpath <font> <flags...> --fnt atlas.png
//! ```
//!
//! with the reservation directory as its working directory. It writes
//! `atlas.png` and `atlas.fnt` there; their contents are never inspected.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::GenerationError;
use crate::metainfo::{AssetType, StoredFile};
use crate::params::ParameterRecord;

/// Files produced by one generation run, by type.
pub type GeneratedFiles = BTreeMap<AssetType, StoredFile>;

const WAIT_POLL: Duration = Duration::from_millis(20);

/// How long output readers may lag behind the exit of the direct child.
/// Readers still blocked after this are detached.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Produces asset files for a font and parameter record.
pub trait Generator: Send + Sync {
    /// Generates every asset type into `workdir`.
    ///
    /// The returned descriptors point at files inside `workdir`.
    fn generate(
        &self,
        font_path: &Path,
        record: &ParameterRecord,
        workdir: &Path,
    ) -> Result<GeneratedFiles, GenerationError>;
}

/// Maps a record to the generator's option flags.
///
/// Each set field yields one flag group; unset fields yield nothing.
/// `dynamicrange` is only passed when both bounds are given.
pub fn command_args(record: &ParameterRecord) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(glyph) = record.glyph.as_deref().filter(|g| !g.is_empty()) {
        args.extend(["--glyph".to_string(), glyph.to_string()]);
    }
    if record.ascii {
        args.push("--ascii".to_string());
    }
    if !record.charcode.is_empty() {
        args.push("--charcode".to_string());
        args.extend(record.charcode.iter().map(u32::to_string));
    }
    if let Some(size) = record.fontsize {
        args.extend(["--fontsize".to_string(), size.to_string()]);
    }
    if let Some(df) = record.distfield {
        args.extend(["--distfield".to_string(), df.as_str().to_string()]);
    }
    if let Some(packing) = record.packing {
        args.extend(["--packing".to_string(), packing.as_str().to_string()]);
    }
    if let Some(padding) = record.padding {
        args.extend(["--padding".to_string(), padding.to_string()]);
    }
    if let Some(ds) = record.downsampling {
        args.extend(["--downsampling".to_string(), ds.as_str().to_string()]);
    }
    if let Some(factor) = record.dsfactor {
        args.extend(["--dsfactor".to_string(), factor.to_string()]);
    }
    if let [min, max] = record.dynamicrange.as_slice() {
        args.extend(["--dynamicrange".to_string(), min.to_string(), max.to_string()]);
    }
    args
}

/// Runs the generator as a child process.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    binary: PathBuf,
    mode: String,
    timeout: Option<Duration>,
}

impl CommandGenerator {
    /// Creates an invoker for `binary` running in `mode`, without a timeout.
    pub fn new(binary: impl Into<PathBuf>, mode: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            mode: mode.into(),
            timeout: None,
        }
    }

    /// Kills the process if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the full argument list passed to the binary.
    pub fn arguments(&self, font_path: &Path, record: &ParameterRecord) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.mode.clone().into(),
            "--fontpath".into(),
            font_path.as_os_str().to_owned(),
        ];
        args.extend(command_args(record).into_iter().map(OsString::from));
        args.push("--fnt".into());
        args.push(AssetType::DistanceField.file_name().into());
        args
    }
}

impl Generator for CommandGenerator {
    fn generate(
        &self,
        font_path: &Path,
        record: &ParameterRecord,
        workdir: &Path,
    ) -> Result<GeneratedFiles, GenerationError> {
        let args = self.arguments(font_path, record);
        tracing::debug!(
            program = %self.binary.display(),
            args = ?args,
            workdir = %workdir.display(),
            "running generator"
        );

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // own group, so a timeout also reaches helpers the generator started
            command.process_group(0);
        }
        let mut child = command.spawn().map_err(|source| GenerationError::Spawn {
            program: self.binary.clone(),
            source,
        })?;

        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());
        let started = Instant::now();
        let waited = wait_with_deadline(&mut child, self.timeout);
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(
                    program = %self.binary.display(),
                    elapsed = ?started.elapsed(),
                    "generator timed out and was killed"
                );
                return Err(GenerationError::TimedOut {
                    after: self.timeout.unwrap_or_default(),
                    stdout,
                    stderr,
                });
            }
            Err(source) => return Err(GenerationError::Io { source }),
        };

        if !status.success() {
            return Err(GenerationError::Failed {
                status,
                stdout,
                stderr,
            });
        }

        let mut files = GeneratedFiles::new();
        let mut missing = Vec::new();
        for asset_type in AssetType::ALL {
            let name = asset_type.file_name();
            let path = workdir.join(name);
            if path.is_file() {
                files.insert(
                    asset_type,
                    StoredFile {
                        path,
                        identifier: name.to_string(),
                    },
                );
            } else {
                missing.push(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(GenerationError::MissingOutputs {
                missing,
                stdout,
                stderr,
            });
        }

        tracing::debug!(elapsed = ?started.elapsed(), "generator finished");
        Ok(files)
    }
}

/// Drains a child pipe on its own thread so the child never blocks on a
/// full pipe buffer.
fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Collects captured output once the child has exited. A pipe still held
/// open by a surviving descendant yields nothing rather than blocking.
fn collect(output: Option<Receiver<Vec<u8>>>) -> String {
    output
        .and_then(|rx| rx.recv_timeout(OUTPUT_GRACE).ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Waits for the child to exit. Returns `Ok(None)` if the deadline passed
/// and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                return Err(e);
            }
        }
        if Instant::now() >= deadline {
            kill_tree(child);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

/// Kills the child and, on unix, every process in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let signalled = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = signalled {
            tracing::warn!(group = %group, error = %e, "failed to kill generator process group");
        }
    }
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{DistanceField, Downsampling, Packing};

    #[test]
    fn empty_record_has_no_flags() {
        assert!(command_args(&ParameterRecord::default()).is_empty());
    }

    #[test]
    fn flags_follow_field_order() {
        let record = ParameterRecord {
            glyph: Some("abc".to_string()),
            ascii: true,
            charcode: [90, 65].into_iter().collect(),
            fontsize: Some(128),
            distfield: Some(DistanceField::DeadRec),
            packing: Some(Packing::MaxRects),
            padding: Some(2),
            downsampling: Some(Downsampling::Max),
            dsfactor: Some(4),
            dynamicrange: vec![-10, 20],
        };
        assert_eq!(
            command_args(&record),
            vec![
                "--glyph", "abc", "--ascii", "--charcode", "65", "90", "--fontsize", "128",
                "--distfield", "deadrec", "--packing", "maxrects", "--padding", "2",
                "--downsampling", "max", "--dsfactor", "4", "--dynamicrange", "-10", "20",
            ]
        );
    }

    #[test]
    fn unset_values_are_omitted() {
        let record = ParameterRecord {
            glyph: Some(String::new()),
            ascii: false,
            fontsize: Some(64),
            ..Default::default()
        };
        assert_eq!(command_args(&record), vec!["--fontsize", "64"]);
    }

    #[test]
    fn single_range_bound_is_omitted() {
        let record = ParameterRecord {
            dynamicrange: vec![5],
            ..Default::default()
        };
        assert!(command_args(&record).is_empty());
    }

    #[test]
    fn full_invocation_shape() {
        let generator = CommandGenerator::new("llassetgen-cmd", "atlas");
        let record = ParameterRecord {
            fontsize: Some(32),
            ..Default::default()
        };
        let args = generator.arguments(Path::new("/fonts/a.ttf"), &record);
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec!["atlas", "--fontpath", "/fonts/a.ttf", "--fontsize", "32", "--fnt", "atlas.png"]
        );
    }

    #[test]
    fn spawn_failure_names_program() {
        let dir = tempfile::tempdir().unwrap();
        let generator = CommandGenerator::new(dir.path().join("no-such-binary"), "atlas");
        let err = generator
            .generate(Path::new("font.ttf"), &ParameterRecord::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, GenerationError::Spawn { .. }));
        assert!(err.to_string().contains("no-such-binary"));
    }

    /// Runs `script` through `sh`, passing the script path as the mode so
    /// that `"$@"` holds the generator flags.
    #[cfg(unix)]
    fn script_generator(dir: &Path, script: &str) -> CommandGenerator {
        let path = dir.join("generator.sh");
        std::fs::write(&path, script).unwrap();
        CommandGenerator::new("/bin/sh", path.to_str().unwrap())
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_returns_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("work");
        std::fs::create_dir(&workdir).unwrap();
        let generator = script_generator(
            dir.path(),
            "printf '%s\\n' \"$@\" > args.txt\nprintf png > atlas.png\nprintf fnt > atlas.fnt\n",
        );
        let record = ParameterRecord {
            ascii: true,
            ..Default::default()
        };

        let files = generator
            .generate(Path::new("/fonts/roboto.ttf"), &record, &workdir)
            .unwrap();
        assert_eq!(files.len(), 2);
        let png = &files[&AssetType::DistanceField];
        assert_eq!(png.path, workdir.join("atlas.png"));
        assert_eq!(std::fs::read_to_string(&png.path).unwrap(), "png");

        let args = std::fs::read_to_string(workdir.join("args.txt")).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            vec!["--fontpath", "/fonts/roboto.ttf", "--ascii", "--fnt", "atlas.png"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let generator = script_generator(
            dir.path(),
            "echo loading font\necho 'cannot open font' >&2\nexit 3\n",
        );
        let err = generator
            .generate(Path::new("font.ttf"), &ParameterRecord::default(), dir.path())
            .unwrap_err();
        match &err {
            GenerationError::Failed {
                status,
                stdout,
                stderr,
            } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stdout.trim(), "loading font");
                assert_eq!(stderr.trim(), "cannot open font");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(err.to_string().contains("cannot open font"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_output_reported() {
        let dir = tempfile::tempdir().unwrap();
        let generator = script_generator(dir.path(), "printf png > atlas.png\n");
        let err = generator
            .generate(Path::new("font.ttf"), &ParameterRecord::default(), dir.path())
            .unwrap_err();
        match err {
            GenerationError::MissingOutputs { missing, .. } => {
                assert_eq!(missing, vec!["atlas.fnt".to_string()]);
            }
            other => panic!("expected missing outputs, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn timeout_is_not_extended_by_helper_processes() {
        let dir = tempfile::tempdir().unwrap();
        let generator = script_generator(dir.path(), "echo started\nsleep 8\necho done\n")
            .with_timeout(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let err = generator
            .generate(Path::new("font.ttf"), &ParameterRecord::default(), dir.path())
            .unwrap_err();
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "returned after {:?}",
            started.elapsed()
        );
        match err {
            GenerationError::TimedOut { stdout, .. } => assert!(!stdout.contains("done")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_generator_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let generator = script_generator(dir.path(), "echo started\nexec sleep 30\n")
            .with_timeout(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let err = generator
            .generate(Path::new("font.ttf"), &ParameterRecord::default(), dir.path())
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            GenerationError::TimedOut { after, stdout, .. } => {
                assert_eq!(after, Duration::from_millis(200));
                assert_eq!(stdout.trim(), "started");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
