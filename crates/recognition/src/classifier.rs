//! Text classifiers: the opaque "image bytes in, text out" collaborator.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::RecognitionError;

/// Turns captcha image bytes into the text they show.
///
/// Implementations are blocking; async callers should run them on a blocking
/// pool.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<String, RecognitionError>;

    /// Short backend name for logs and readiness output.
    fn name(&self) -> &str;
}

/// Selects and builds the text classifier backend.
///
/// `onnx_model` wins over `command`; with neither set the service still
/// starts but every classification fails with a clear message.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClassifierConfig {
    /// External OCR program and its arguments. Image bytes go to stdin, text
    /// is read from stdout.
    #[serde(default)]
    pub command: Vec<String>,

    /// CTC OCR model file (requires the `onnx` feature).
    #[serde(default)]
    pub onnx_model: Option<PathBuf>,

    /// JSON array of output symbols for `onnx_model`; index 0 is the blank.
    #[serde(default)]
    pub onnx_charset: Option<PathBuf>,
}

impl ClassifierConfig {
    pub fn command<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn build(&self) -> Result<Arc<dyn TextClassifier>, RecognitionError> {
        self.build_bounded(None)
    }

    /// Like [`build`](Self::build), but an external command still running
    /// after `deadline` is killed.
    pub fn build_with_deadline(
        &self,
        deadline: Duration,
    ) -> Result<Arc<dyn TextClassifier>, RecognitionError> {
        self.build_bounded(Some(deadline))
    }

    fn build_bounded(
        &self,
        deadline: Option<Duration>,
    ) -> Result<Arc<dyn TextClassifier>, RecognitionError> {
        if let Some(model) = &self.onnx_model {
            let charset = self.onnx_charset.as_ref().ok_or_else(|| {
                RecognitionError::InvalidConfig(
                    "onnx_model is set but onnx_charset is missing".into(),
                )
            })?;
            #[cfg(feature = "onnx")]
            {
                return Ok(Arc::new(crate::onnx::OnnxClassifier::load(model, charset)?));
            }
            #[cfg(not(feature = "onnx"))]
            {
                let _ = (model, charset);
                return Err(RecognitionError::InvalidConfig(
                    "onnx classifier disabled at compile time".into(),
                ));
            }
        }

        if !self.command.is_empty() {
            let mut classifier = CommandClassifier::new(self.command.clone())?;
            if let Some(deadline) = deadline {
                classifier = classifier.with_deadline(deadline);
            }
            return Ok(Arc::new(classifier));
        }

        warn!("no text classifier configured; text recognition requests will fail");
        Ok(Arc::new(UnconfiguredClassifier))
    }
}

/// Runs an external OCR program once per image.
///
/// With a deadline set, a program that has not exited in time is killed and
/// reaped before `classify` returns.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    deadline: Option<Duration>,
}

impl CommandClassifier {
    pub fn new(command: Vec<String>) -> Result<Self, RecognitionError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| RecognitionError::InvalidConfig("classifier command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            deadline: None,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RecognitionError> {
        let waited = match self.deadline {
            Some(limit) => child.wait_timeout(limit),
            None => child.wait().map(Some),
        };
        match waited {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                if let Err(e) = child.kill() {
                    debug!(program = %self.program, error = %e, "classifier exited before kill");
                }
                let _ = child.wait();
                warn!(
                    program = %self.program,
                    deadline = ?self.deadline,
                    "classifier killed after deadline"
                );
                Err(RecognitionError::TimedOut(self.deadline.unwrap_or_default()))
            }
            Err(e) => Err(RecognitionError::classification(format!(
                "classifier process failed: {e}"
            ))),
        }
    }
}

/// Drain a child pipe on its own thread so neither side blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl TextClassifier for CommandClassifier {
    fn classify(&self, image: &[u8]) -> Result<String, RecognitionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RecognitionError::classification(format!("failed to spawn `{}`: {e}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognitionError::classification("classifier stdin unavailable"))?;
        let input = image.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout the drain threads are left to finish on their own; they
        // end once every holder of the pipes has exited.
        let status = self.wait(&mut child)?;

        match writer.join() {
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "classifier closed stdin early")
            }
            Err(_) => debug!(program = %self.program, "stdin writer panicked"),
            Ok(Ok(())) => {}
        }
        let stdout = stdout
            .join()
            .map_err(|_| RecognitionError::classification("classifier stdout reader panicked"))?;
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(RecognitionError::classification(format!(
                "`{}` exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(stdout)
            .map_err(|_| RecognitionError::classification("classifier output is not UTF-8"))?;
        let text = text.trim().to_string();
        debug!(program = %self.program, len = text.len(), "external classifier finished");
        Ok(text)
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Placeholder used when no backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredClassifier;

impl TextClassifier for UnconfiguredClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        Err(RecognitionError::classification(
            "no text classifier configured (set classifier.command or classifier.onnx_model)",
        ))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_builds_unconfigured_classifier() {
        let classifier = ClassifierConfig::default().build().unwrap();
        assert_eq!(classifier.name(), "unconfigured");
        assert!(matches!(
            classifier.classify(b"anything"),
            Err(RecognitionError::Classification(_))
        ));
    }

    #[test]
    fn model_without_charset_is_rejected() {
        let cfg = ClassifierConfig {
            onnx_model: Some("model.onnx".into()),
            ..ClassifierConfig::default()
        };
        assert!(matches!(cfg.build(), Err(RecognitionError::InvalidConfig(_))));
    }

    #[test]
    fn blank_program_is_rejected() {
        let err = CommandClassifier::new(vec!["  ".into()]).unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidConfig(_)));
    }

    #[test]
    fn missing_program_is_a_classification_failure() {
        let classifier =
            CommandClassifier::new(vec!["/nonexistent/ocr-binary-for-tests".into()]).unwrap();
        let err = classifier.classify(b"img").unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[test]
    fn command_output_is_trimmed() {
        let script = "cat > /dev/null; printf ' AB12 \\n'";
        let classifier = ClassifierConfig::command(["sh", "-c", script]).build().unwrap();
        assert_eq!(classifier.name(), "command");
        assert_eq!(classifier.classify(b"fake image bytes").unwrap(), "AB12");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_stderr() {
        let classifier = CommandClassifier::new(vec![
            "sh".into(),
            "-c".into(),
            "cat > /dev/null; echo boom >&2; exit 3".into(),
        ])
        .unwrap();
        let err = classifier.classify(b"x").unwrap_err();
        assert!(err.to_string().contains("boom"), "got {err}");
    }

    #[cfg(unix)]
    #[test]
    fn hung_command_is_killed_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("cat > /dev/null; sleep 1; touch '{}'", marker.display());
        let classifier = ClassifierConfig::command(["sh", "-c", script.as_str()])
            .build_with_deadline(Duration::from_millis(200))
            .unwrap();

        let started = std::time::Instant::now();
        let err = classifier.classify(b"img").unwrap_err();
        assert!(matches!(err, RecognitionError::TimedOut(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_millis(900));

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "classifier kept running past its deadline");
    }

    #[cfg(unix)]
    #[test]
    fn fast_command_finishes_within_its_deadline() {
        let classifier = ClassifierConfig::command(["sh", "-c", "cat > /dev/null; echo ok"])
            .build_with_deadline(Duration::from_secs(5))
            .unwrap();
        assert_eq!(classifier.classify(b"img").unwrap(), "ok");
    }
}
