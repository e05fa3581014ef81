//! Cassettes: recorded process runs saved as YAML and replayed as fakes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ProcessError;
use super::factory::RecordedProcess;
use super::fake::{FakeHandler, FakeProcessResult, FakeProcessSequence};

/// A single recorded process run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interaction {
    /// Position in the recording.
    pub seq: u64,
    /// Command line that ran.
    pub command: String,
    /// Working directory, if one was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Exit code; absent when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    #[serde(default)]
    pub output: String,
    /// Captured standard error.
    #[serde(default)]
    pub error_output: String,
}

/// A named, timestamped list of recorded process runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cassette {
    /// Human-readable name.
    pub name: String,
    /// When the cassette was written.
    pub recorded_at: DateTime<Utc>,
    /// Runs in the order they finished.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Builds a cassette from a factory's log.
    #[must_use]
    pub fn from_recorded(name: impl Into<String>, recorded: &[RecordedProcess]) -> Self {
        let interactions = recorded
            .iter()
            .zip(0u64..)
            .map(|(entry, seq)| Interaction {
                seq,
                command: entry.result.command().to_string(),
                path: entry.process.working_directory().map(Path::to_path_buf),
                exit_code: entry.result.exit_code(),
                output: entry.result.output().to_string(),
                error_output: entry.result.error_output().to_string(),
            })
            .collect();
        Self { name: name.into(), recorded_at: Utc::now(), interactions }
    }

    /// Reads a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ProcessError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ProcessError::CassetteIo { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&content)
            .map_err(|source| ProcessError::CassetteFormat { path: path.to_path_buf(), source })
    }

    /// Writes the cassette, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), ProcessError> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|source| ProcessError::CassetteFormat { path: path.to_path_buf(), source })?;
        let io_error = |source: std::io::Error| ProcessError::CassetteIo { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, yaml).map_err(io_error)
    }

    /// One handler per distinct command, answering with that command's
    /// recorded results in order and failing once they run out.
    ///
    /// The commands are literal; install them with
    /// [`FakeHandlers::insert_exact`](super::fake::FakeHandlers::insert_exact).
    #[must_use]
    pub fn into_handlers(self) -> Vec<(String, FakeHandler)> {
        let mut queues: Vec<(String, Vec<FakeProcessResult>)> = Vec::new();
        for interaction in self.interactions {
            // A process killed by a signal has no exit code; replay it as a failure.
            let result = FakeProcessResult::verbatim(
                interaction.output,
                interaction.error_output,
                interaction.exit_code.unwrap_or(-1),
            );
            match queues.iter_mut().find(|(command, _)| *command == interaction.command) {
                Some((_, queue)) => queue.push(result),
                None => queues.push((interaction.command, vec![result])),
            }
        }
        queues
            .into_iter()
            .map(|(command, results)| (command, FakeProcessSequence::new(results).into()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::factory::Factory;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join("artisan_cassette_tests").join(name)
    }

    #[test]
    fn yaml_round_trip() {
        let cassette = Cassette {
            name: "round-trip".into(),
            recorded_at: Utc::now(),
            interactions: vec![Interaction {
                seq: 0,
                command: "ls".into(),
                path: Some(PathBuf::from("/srv")),
                exit_code: Some(0),
                output: "a\n".into(),
                error_output: String::new(),
            }],
        };
        let yaml = serde_yaml::to_string(&cassette).unwrap();
        let parsed: Cassette = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, cassette);
    }

    #[test]
    fn records_then_replays_results_per_command() {
        let path = temp_path("replay.cassette.yaml");

        let recording = Factory::new();
        recording.start_recording();
        recording.run("echo one").unwrap();
        recording.run("echo two; exit 3").unwrap();
        recording.run("echo one").unwrap();
        recording.save_cassette(&path, "replay-test").unwrap();

        let saved = Cassette::load(&path).unwrap();
        assert_eq!(saved.name, "replay-test");
        assert_eq!(saved.interactions.len(), 3);
        assert_eq!(saved.interactions[2].seq, 2);

        let replaying = Factory::new();
        replaying.fake_from_cassette(&path).unwrap().prevent_stray_processes(true);
        assert_eq!(replaying.run("echo one").unwrap().output(), "one\n");
        let second = replaying.run("echo two; exit 3").unwrap();
        assert_eq!(second.exit_code(), Some(3));
        assert_eq!(second.output(), "two\n");
        assert_eq!(replaying.run("echo one").unwrap().output(), "one\n");
        assert!(matches!(replaying.run("echo one"), Err(ProcessError::SequenceExhausted)));
        assert!(matches!(replaying.run("echo other"), Err(ProcessError::StrayProcess { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn recorded_commands_replay_verbatim_even_with_a_star() {
        let path = temp_path("verbatim.cassette.yaml");
        let interaction = |seq, command: &str, output: &str| Interaction {
            seq,
            command: command.into(),
            path: None,
            exit_code: Some(0),
            output: output.into(),
            error_output: String::new(),
        };
        let cassette = Cassette {
            name: "verbatim".into(),
            recorded_at: Utc::now(),
            interactions: vec![interaction(0, "echo a*", "a*\n"), interaction(1, "echo abc", "abc\n")],
        };
        cassette.save(&path).unwrap();

        let replaying = Factory::new();
        replaying.fake_from_cassette(&path).unwrap().prevent_stray_processes(true);
        assert_eq!(replaying.run("echo abc").unwrap().output(), "abc\n");
        assert_eq!(replaying.run("echo a*").unwrap().output(), "a*\n");
        assert!(matches!(replaying.run("echo axe"), Err(ProcessError::StrayProcess { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_cassette_io_error() {
        let err = Cassette::load(&temp_path("does-not-exist.yaml")).unwrap_err();
        assert!(matches!(err, ProcessError::CassetteIo { .. }));
    }

    #[test]
    fn malformed_file_is_a_cassette_format_error() {
        let path = temp_path("malformed.cassette.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "interactions: [not, a, cassette").unwrap();
        let err = Cassette::load(&path).unwrap_err();
        assert!(matches!(err, ProcessError::CassetteFormat { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
