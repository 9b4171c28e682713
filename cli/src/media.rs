//! Terminal implementations of the photo capture hooks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use foodlog_core::capture::{CaptureSource, Capturer, PermissionGate, Picker};
use foodlog_core::error::CaptureError;

use crate::commands::{prompt_choice, prompt_line};
use crate::config::Config;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Capturer for `--photo`: stdin prompts, the pictures directory and an
/// optional external camera command, behind a consent file.
pub(crate) fn terminal_capturer(config: &Config) -> Capturer {
    Capturer::new(TerminalPicker {
        pictures_dir: config.pictures_dir.clone(),
        camera_cmd: config.camera_cmd.clone(),
    })
    .with_permission_gate(ConsentGate::new(config.permissions_path.clone()))
}

/// Capturer for `--image PATH`.
pub(crate) fn file_capturer(path: PathBuf) -> Capturer {
    Capturer::new(PathPicker(path))
}

pub(crate) struct TerminalPicker {
    pictures_dir: Option<PathBuf>,
    camera_cmd: Option<String>,
}

#[async_trait]
impl Picker for TerminalPicker {
    async fn pick(&self, source: CaptureSource) -> Result<Option<Vec<u8>>, CaptureError> {
        match source {
            CaptureSource::Prompt => {
                let answer = blocking(|| prompt_line("Path to image (blank to cancel): ")).await?;
                match answer {
                    Some(path) => Ok(Some(tokio::fs::read(expand_home(&path)).await?)),
                    None => Ok(None),
                }
            }
            CaptureSource::Gallery => {
                let dir = self.pictures_dir.clone().ok_or_else(|| {
                    CaptureError::Unavailable("no pictures directory on this system".to_string())
                })?;
                let images = list_images(&dir).await?;
                if images.is_empty() {
                    return Err(CaptureError::Unavailable(format!(
                        "no images found in {}",
                        dir.display()
                    )));
                }
                for (i, path) in images.iter().enumerate() {
                    let name = path.file_name().map_or_else(
                        || path.display().to_string(),
                        |n| n.to_string_lossy().into_owned(),
                    );
                    eprintln!("  {}. {name}", i + 1);
                }
                let count = images.len();
                let choice = blocking(move || prompt_choice("a photo", count)).await?;
                match choice {
                    Some(idx) => Ok(Some(tokio::fs::read(&images[idx]).await?)),
                    None => Ok(None),
                }
            }
            CaptureSource::Camera => {
                let cmd = self.camera_cmd.as_deref().ok_or_else(|| {
                    CaptureError::Unavailable(
                        "set FOODLOG_CAMERA_CMD to a command that saves a photo to {output}"
                            .to_string(),
                    )
                })?;
                let output = std::env::temp_dir()
                    .join(format!("foodlog-capture-{}.jpg", std::process::id()));
                run_camera(cmd, &output).await
            }
        }
    }
}

/// Always hands back the same file.
pub(crate) struct PathPicker(PathBuf);

#[async_trait]
impl Picker for PathPicker {
    async fn pick(&self, _source: CaptureSource) -> Result<Option<Vec<u8>>, CaptureError> {
        Ok(Some(tokio::fs::read(&self.0).await?))
    }
}

async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
) -> Result<T, CaptureError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CaptureError::Device(e.to_string()))?
        .map_err(|e| CaptureError::Device(format!("{e:#}")))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut images = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if is_image && entry.file_type().await?.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Run the configured camera command. No output file means the user cancelled.
///
/// `{output}` expands to a quoted reference to `FOODLOG_CAPTURE_OUTPUT`, so the
/// path never passes through the shell parser.
async fn run_camera(cmd: &str, output: &Path) -> Result<Option<Vec<u8>>, CaptureError> {
    let _ = tokio::fs::remove_file(output).await;
    let command = cmd.replace("{output}", "\"$FOODLOG_CAPTURE_OUTPUT\"");
    debug!(command = %command, output = %output.display(), "Running camera command");

    let status = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .env("FOODLOG_CAPTURE_OUTPUT", output)
        .status()
        .await
        .map_err(|e| CaptureError::Unavailable(format!("could not run camera command: {e}")))?;
    if !status.success() {
        let _ = tokio::fs::remove_file(output).await;
        return Err(CaptureError::Device(format!("camera command exited with {status}")));
    }

    match tokio::fs::read(output).await {
        Ok(bytes) => {
            let _ = tokio::fs::remove_file(output).await;
            Ok(Some(bytes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remembers camera and photo library consent in a small `source=yes|no` file.
pub(crate) struct ConsentGate {
    path: PathBuf,
}

impl ConsentGate {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn answers(&self) -> Result<HashMap<String, bool>, CaptureError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_consent(&raw))
    }

    async fn remember(&self, source: CaptureSource, granted: bool) -> Result<(), CaptureError> {
        let mut answers = self.answers().await?;
        answers.insert(source.as_str().to_string(), granted);
        let mut lines: Vec<String> = answers
            .iter()
            .map(|(k, v)| format!("{k}={}", if *v { "yes" } else { "no" }))
            .collect();
        lines.sort();
        tokio::fs::write(&self.path, lines.join("\n") + "\n").await?;
        Ok(())
    }
}

fn parse_consent(raw: &str) -> HashMap<String, bool> {
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim() == "yes"))
        .collect()
}

fn consent_question(source: CaptureSource) -> &'static str {
    match source {
        CaptureSource::Camera => "Allow foodlog to use your camera? [y/N] ",
        _ => "Allow foodlog to read your pictures folder? [y/N] ",
    }
}

#[async_trait]
impl PermissionGate for ConsentGate {
    async fn check(&self, source: CaptureSource) -> Result<bool, CaptureError> {
        Ok(self
            .answers()
            .await?
            .get(source.as_str())
            .copied()
            .unwrap_or(false))
    }

    async fn request(&self, source: CaptureSource) -> Result<bool, CaptureError> {
        let answer = blocking(move || prompt_line(consent_question(source))).await?;
        let granted = answer.is_some_and(|a| matches!(a.to_lowercase().as_str(), "y" | "yes"));
        self.remember(source, granted).await?;
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_consent() {
        let answers = parse_consent("camera=yes\ngallery = no\nbogus line\n");
        assert_eq!(answers.get("camera"), Some(&true));
        assert_eq!(answers.get("gallery"), Some(&false));
        assert_eq!(answers.len(), 2);
    }

    #[tokio::test]
    async fn test_consent_gate_remembers_answers() {
        let dir = TempDir::new().unwrap();
        let gate = ConsentGate::new(dir.path().join("permissions"));
        assert!(!gate.check(CaptureSource::Camera).await.unwrap());

        gate.remember(CaptureSource::Camera, true).await.unwrap();
        gate.remember(CaptureSource::Gallery, false).await.unwrap();
        assert!(gate.check(CaptureSource::Camera).await.unwrap());
        assert!(!gate.check(CaptureSource::Gallery).await.unwrap());

        let raw = std::fs::read_to_string(dir.path().join("permissions")).unwrap();
        assert_eq!(raw, "camera=yes\ngallery=no\n");
    }

    #[tokio::test]
    async fn test_list_images_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "c.webp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.png")).unwrap();

        let images = list_images(dir.path()).await.unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.webp"]);
    }

    #[tokio::test]
    async fn test_path_picker_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meal.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let bytes = PathPicker(path).pick(CaptureSource::Prompt).await.unwrap();
        assert_eq!(bytes, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_path_picker_missing_file() {
        let picker = PathPicker(PathBuf::from("/nonexistent/meal.png"));
        assert!(matches!(
            picker.pick(CaptureSource::Prompt).await,
            Err(CaptureError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_camera_without_command_is_unavailable() {
        let picker = TerminalPicker {
            pictures_dir: None,
            camera_cmd: None,
        };
        assert!(matches!(
            picker.pick(CaptureSource::Camera).await,
            Err(CaptureError::Unavailable(_))
        ));
        assert!(matches!(
            picker.pick(CaptureSource::Gallery).await,
            Err(CaptureError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_camera_command_that_writes_nothing_cancels() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("shot.jpg");
        assert_eq!(run_camera("true", &output).await.unwrap(), None);
        assert!(matches!(
            run_camera("false", &output).await,
            Err(CaptureError::Device(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_camera_output_path_with_shell_characters() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("my photos; rm -rf x $(id)");
        std::fs::create_dir_all(&nested).unwrap();
        let output = nested.join("shot.jpg");

        let bytes = run_camera("printf snap > {output}", &output).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"snap"[..]));
        // The capture file is cleaned up after reading.
        assert!(!output.exists());
    }
}
