//! Interactive sharing session inside one room.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Component, Path, PathBuf};

use clap::Args;
use tracing::warn;

use roomshare_core::{ClientSession, Content, ContentData, FileEntry, RoomId};

use super::open_session;
use super::room::{format_timestamp, print_status};
use crate::config::Config;

const HELP: &str = "\
Commands:
  upload <text>             Share clipboard text
  upload-file <path>...     Share one file, or several as a bundle
  download [--out DIR]      Fetch the shared content (files go to DIR, default .)
  clear                     Remove the shared content
  status                    Show the room and its devices
  help                      Show this help
  quit                      Leave the room and exit";

/// Join a room and share content interactively
#[derive(Args)]
pub struct ShareCommand {
    /// Room ID
    id: RoomId,

    /// Device name (defaults to the configured device name)
    #[arg(long)]
    device: Option<String>,
}

#[derive(Debug, PartialEq)]
enum ShareAction {
    Upload(String),
    UploadFiles(Vec<PathBuf>),
    Download(PathBuf),
    Clear,
    Status,
    Help,
    Quit,
    Nothing,
}

impl ShareCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let device = self
            .device
            .clone()
            .unwrap_or_else(|| config.device_name.value.clone());

        let session = open_session(config)?;
        session.connect_room(self.id, &device)?;
        println!(
            "Connected to room {} as '{}'. Type 'help' for commands.",
            self.id, device
        );

        let result = self.interact(&session, &device);

        if let Err(e) = session.disconnect_room(self.id, &device) {
            warn!(room = %self.id, device = %device, "failed to leave room: {}", e);
        } else {
            println!("Left room {}", self.id);
        }
        result
    }

    fn interact(
        &self,
        session: &ClientSession,
        device: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            print!("roomshare> ");
            io::stdout().flush()?;

            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                println!();
                return Ok(());
            }

            let action = match parse_line(&line) {
                Ok(action) => action,
                Err(msg) => {
                    eprintln!("{}", msg);
                    continue;
                }
            };

            let outcome: Result<(), Box<dyn std::error::Error>> = match action {
                ShareAction::Quit => return Ok(()),
                ShareAction::Nothing => Ok(()),
                ShareAction::Help => {
                    println!("{}", HELP);
                    Ok(())
                }
                ShareAction::Upload(text) => session
                    .upload_text(device, &text)
                    .map(|()| println!("Shared {} characters", text.chars().count()))
                    .map_err(Into::into),
                ShareAction::UploadFiles(paths) => upload_files(session, device, &paths),
                ShareAction::Download(dir) => download(session, &dir),
                ShareAction::Clear => session
                    .delete_content()
                    .map(|()| println!("Cleared shared content"))
                    .map_err(Into::into),
                ShareAction::Status => session
                    .get_room_status(self.id)
                    .map(|status| print_status(&status))
                    .map_err(Into::into),
            };

            // A failed action does not end the session.
            if let Err(e) = outcome {
                eprintln!("Error: {}", e);
            }
        }
    }
}

fn parse_line(line: &str) -> Result<ShareAction, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => Ok(ShareAction::Nothing),
        "upload" if rest.is_empty() => Err("usage: upload <text>".to_string()),
        "upload" => Ok(ShareAction::Upload(rest.to_string())),
        "upload-file" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                Err("usage: upload-file <path>...".to_string())
            } else {
                Ok(ShareAction::UploadFiles(paths))
            }
        }
        "download" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            match args.as_slice() {
                [] => Ok(ShareAction::Download(PathBuf::from("."))),
                ["--out", dir] => Ok(ShareAction::Download(PathBuf::from(*dir))),
                _ => Err("usage: download [--out DIR]".to_string()),
            }
        }
        "clear" => Ok(ShareAction::Clear),
        "status" => Ok(ShareAction::Status),
        "help" | "?" => Ok(ShareAction::Help),
        "quit" | "exit" => Ok(ShareAction::Quit),
        other => Err(format!("unknown command '{}', type 'help'", other)),
    }
}

fn upload_files(
    session: &ClientSession,
    device: &str,
    paths: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let content = content_from_files(device, paths)?;
    session.upload_content(&content)?;
    match &content.data {
        ContentData::MultiFile(files) => println!("Shared {} files", files.len()),
        _ => println!("Shared {}", content.name),
    }
    Ok(())
}

fn content_from_files(device: &str, paths: &[PathBuf]) -> io::Result<Content> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' is not a file path", path.display()),
                )
            })?;
        entries.push((path, FileEntry::new(name, data)));
    }

    match entries.len() {
        1 => {
            let (path, entry) = entries.remove(0);
            Ok(Content::file(device, entry.filename, guess_mime(path), entry.data))
        }
        _ => Ok(Content::multi_file(
            device,
            entries.into_iter().map(|(_, entry)| entry).collect(),
        )),
    }
}

fn download(session: &ClientSession, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = session.get_content()?;
    println!(
        "From {} at {}",
        content.device,
        format_timestamp(content.timestamp)
    );
    match &content.data {
        ContentData::Clipboard(text) => println!("{}", text),
        _ => {
            for path in write_content(&content, dir)? {
                println!("Saved {}", path.display());
            }
        }
    }
    Ok(())
}

/// Writes file payloads under `dir`, returning the paths written.
fn write_content(content: &Content, dir: &Path) -> io::Result<Vec<PathBuf>> {
    let files: Vec<(&str, &[u8])> = match &content.data {
        ContentData::Clipboard(_) => return Ok(Vec::new()),
        ContentData::File(bytes) => vec![(content.name.as_str(), bytes.as_slice())],
        ContentData::MultiFile(files) => files
            .iter()
            .map(|f| (f.filename.as_str(), f.data.as_slice()))
            .collect(),
    };

    let mut written = Vec::with_capacity(files.len());
    for (name, data) in files {
        let target = safe_join(dir, name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("refusing to write outside '{}': {}", dir.display(), name),
            )
        })?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
        written.push(target);
    }
    Ok(written)
}

/// Joins a shared file name onto `dir`, rejecting absolute and parent paths.
fn safe_join(dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    (plain && !name.is_empty()).then(|| dir.join(relative))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomshare_core::ContentKind;
    use tempfile::tempdir;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("upload hello world\n").unwrap(),
            ShareAction::Upload("hello world".to_string())
        );
        assert!(parse_line("upload").is_err());
        assert_eq!(
            parse_line("upload-file a.txt b.txt").unwrap(),
            ShareAction::UploadFiles(vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")])
        );
        assert_eq!(
            parse_line("download").unwrap(),
            ShareAction::Download(PathBuf::from("."))
        );
        assert_eq!(
            parse_line("download --out /tmp/x").unwrap(),
            ShareAction::Download(PathBuf::from("/tmp/x"))
        );
        assert!(parse_line("download /tmp/x").is_err());
        assert_eq!(parse_line("  ").unwrap(), ShareAction::Nothing);
        assert_eq!(parse_line("quit").unwrap(), ShareAction::Quit);
        assert!(parse_line("frobnicate").is_err());
    }

    #[test]
    fn test_single_file_becomes_file_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# notes").unwrap();

        let content = content_from_files("pc", &[path]).unwrap();
        assert_eq!(content.kind(), ContentKind::File);
        assert_eq!(content.name, "notes.md");
        assert_eq!(content.mime, "text/markdown");
        assert_eq!(content.as_file(), Some(&b"# notes"[..]));
    }

    #[test]
    fn test_several_files_become_bundle() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.bin");
        fs::write(&a, "alpha").unwrap();
        fs::write(&b, [0u8, 1, 2]).unwrap();

        let content = content_from_files("pc", &[a, b]).unwrap();
        assert_eq!(content.kind(), ContentKind::MultiFile);
        let files = content.as_files().unwrap();
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[1].data, vec![0u8, 1, 2]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(content_from_files("pc", &[dir.path().join("missing.txt")]).is_err());
    }

    #[test]
    fn test_write_content_creates_nested_files() {
        let dir = tempdir().unwrap();
        let content = Content::multi_file(
            "pc",
            vec![
                FileEntry::new("hello.txt", "Hello World"),
                FileEntry::new("aaa/bbb.txt", "yahoo!"),
            ],
        );
        let written = write_content(&content, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("aaa/bbb.txt")).unwrap(),
            "yahoo!"
        );
    }

    #[test]
    fn test_write_content_rejects_escaping_names() {
        let dir = tempdir().unwrap();
        let content = Content::multi_file("pc", vec![FileEntry::new("../evil.txt", "x")]);
        assert!(write_content(&content, dir.path()).is_err());
        assert!(safe_join(dir.path(), "/etc/passwd").is_none());
        assert!(safe_join(dir.path(), "ok/file.txt").is_some());
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }
}
