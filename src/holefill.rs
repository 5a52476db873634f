//! Filling a `.?.` hole in a source file with a model completion.
//!
//! The file (or a shortened copy of it) is sent with the hole replaced by
//! [`FILL`], and the model is asked to answer inside
//! `<COMPLETION></COMPLETION>`.  Shortened files may pull in context with
//! `//./relative/path//` import markers, which are expanded in place.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::chat::{AskOptions, ChatBackend, ChatSession, DEFAULT_MAX_TOKENS};
use crate::error::{Error, Result};
use crate::render::Renderer;

/// The hole marker.
pub const HOLE: &str = ".?.";

/// What the hole becomes in the prompt.
pub const FILL: &str = "{:FILL_HERE:}";

/// System prompt for completions.
pub const SYSTEM: &str = "You're a code completion assistant.";

/// Shortcode used when none is given.
pub const DEFAULT_MODEL: &str = "C";

/// Printed when no file is given.
pub const USAGE: &str = "Usage: holefill <file> [<shortened_file>] [<model_name>]

This will complete a HOLE, written as '.?.', in <file>, using the AI.
A shortened file can be used to omit irrelevant parts.";

static IMPORT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//\./(.*?)//").expect("import pattern is valid"));

static COMPLETION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<COMPLETION>([\s\S]*?)</COMPLETION>").expect("completion pattern is valid")
});

/// The instruction appended after the code.
pub fn task() -> String {
    format!(
        "### TASK: complete the {FILL} part of the file above. Write ONLY the needed text to \
         replace {FILL} by the correct completion, including correct spacing and indentation. \
         Include the answer inside a <COMPLETION></COMPLETION> tag."
    )
}

/// Positional arguments: `<file> [<shortened_file>] [<model_name>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolefillArgs {
    /// The file containing the hole.
    pub file: PathBuf,
    /// A shortened copy sent instead of `file`.
    pub mini: Option<PathBuf>,
    /// Shortcode or model id.
    pub model: String,
}

impl HolefillArgs {
    /// Parses arguments, excluding the program name.  `None` when no file was
    /// given.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut args = args.into_iter();
        let file = PathBuf::from(args.next()?);
        let mini = args.next().map(PathBuf::from);
        let model = args.next().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Some(Self { file, mini, model })
    }
}

/// Where holefill leaves its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolefillPaths {
    /// The last prompt sent, overwritten each run.
    pub dump_file: PathBuf,
    /// One log per completed run.
    pub prompt_history_dir: PathBuf,
}

impl HolefillPaths {
    /// `~/.ai/.holefill` and `~/.ai/prompt_history`.
    pub fn for_home(home: impl AsRef<Path>) -> Self {
        let ai_dir = home.as_ref().join(".ai");
        Self {
            dump_file: ai_dir.join(".holefill"),
            prompt_history_dir: ai_dir.join("prompt_history"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// The hole was filled with this text.
    Filled(String),
    /// The code sent to the model had no hole.
    NoHole,
}

/// Replaces each `//./path//` marker with a newline and the contents of
/// `path`, relative to `base_dir`.
///
/// Each import is announced through `renderer`.  A missing file is
/// announced with `ERROR` and fails the expansion.
pub fn expand_imports(code: &str, base_dir: &Path, renderer: &mut dyn Renderer) -> Result<String> {
    let mut expanded = code.to_string();
    for caps in IMPORT_MARKER.captures_iter(code) {
        let marker = &caps[0];
        let path = base_dir.join(&caps[1]);
        if !path.exists() {
            renderer.print_info(&format!("import_file: {marker} ERROR"));
            return Err(Error::not_found(format!(
                "import file {} does not exist",
                path.display()
            )));
        }
        let contents = fs::read_to_string(&path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        renderer.print_info(&format!("import_file: {marker}"));
        expanded = expanded.replace(marker, &format!("\n{contents}"));
    }
    Ok(expanded)
}

/// The code with its hole marked, followed by the task.
pub fn build_prompt(code: &str) -> String {
    format!("{}\n\n{}", code.replace(HOLE, FILL), task())
}

/// Whitespace-separated word count, a rough size estimate.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Adds a missing opening or closing completion tag.
pub fn normalize_reply(reply: &str) -> String {
    let mut reply = reply.to_string();
    if !reply.contains("<COMPLETION>") {
        reply.insert_str(0, "<COMPLETION>");
    }
    if !reply.contains("</COMPLETION>") {
        reply.push_str("</COMPLETION>");
    }
    reply
}

/// The text inside the first completion tag pair.
pub fn extract_completion(reply: &str) -> Result<String> {
    COMPLETION
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            Error::malformed_reply("Could not find <COMPLETION> tags in the AI's response.")
        })
}

/// `{timestamp}_{model}.log`, with `:`, `.` and `/` replaced by `-`.
pub fn prompt_log_name(now: OffsetDateTime, model: &str) -> Result<String> {
    let stamp = now
        .format(format_description!(
            "[year]-[month]-[day]T[hour]-[minute]-[second]-[subsecond digits:6]"
        ))
        .map_err(|err| Error::encoding(format!("invalid timestamp: {err}"), Some(Box::new(err))))?;
    Ok(format!("{stamp}_{}.log", model.replace(['/', ':'], "-")))
}

/// Appends the exchange to a new log under `dir`.
pub fn save_prompt_history(
    dir: &Path,
    system: &str,
    prompt: &str,
    reply: &str,
    model: &str,
    now: OffsetDateTime,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|err| Error::io(format!("failed to create {}", dir.display()), err))?;
    let path = dir.join(prompt_log_name(now, model)?);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
    file.write_all(format!("SYSTEM:\n{system}\n\nPROMPT:\n{prompt}\n\nREPLY:\n{reply}\n\n").as_bytes())
        .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
    Ok(path)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| Error::io(format!("failed to read {}", path.display()), err))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|err| Error::io(format!("failed to write {}", path.display()), err))
}

/// Runs one fill: build the prompt, ask the model, and rewrite the file.
///
/// `model_label` is the resolved model id, used for display and log names.
pub async fn fill_hole<B: ChatBackend>(
    args: &HolefillArgs,
    model_label: &str,
    session: &mut ChatSession<B>,
    paths: &HolefillPaths,
    renderer: &mut dyn Renderer,
) -> Result<FillOutcome> {
    let file_code = read(&args.file)?;
    let mini_code = match &args.mini {
        Some(mini) => read(mini)?,
        None => file_code.clone(),
    };

    let base_dir = args
        .file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mini_code = expand_imports(&mini_code, &base_dir, renderer)?;
    if let Some(mini) = &args.mini {
        write(mini, &mini_code)?;
    }

    let tokens = token_count(&mini_code);
    let prompt = build_prompt(&mini_code);
    if let Some(dir) = paths.dump_file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| Error::io(format!("failed to create {}", dir.display()), err))?;
    }
    write(&paths.dump_file, &format!("{SYSTEM}\n###\n{prompt}"))?;

    renderer.print_info(&format!("token_count: {tokens}"));
    renderer.print_info(&format!("model_label: {model_label}"));

    if !mini_code.contains(HOLE) {
        return Ok(FillOutcome::NoHole);
    }

    let options = AskOptions::default()
        .with_system(SYSTEM)
        .with_max_tokens(DEFAULT_MAX_TOKENS);
    let reply = session.send(&prompt, options, renderer).await?;
    renderer.finish_response();

    let reply = normalize_reply(&reply);
    let completion = extract_completion(&reply)?;
    write(&args.file, &file_code.replace(HOLE, &completion))?;

    save_prompt_history(
        &paths.prompt_history_dir,
        SYSTEM,
        &prompt,
        &reply,
        model_label,
        OffsetDateTime::now_utc(),
    )?;
    Ok(FillOutcome::Filled(completion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ScriptedBackend;
    use crate::models::Vendor;
    use crate::render::RecordingRenderer;
    use time::macros::datetime;

    fn args(list: &[&str]) -> Option<HolefillArgs> {
        HolefillArgs::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn args_default_model() {
        assert_eq!(args(&[]), None);
        let parsed = args(&["main.rs"]).unwrap();
        assert_eq!(parsed.file, PathBuf::from("main.rs"));
        assert_eq!(parsed.mini, None);
        assert_eq!(parsed.model, "C");
        let parsed = args(&["main.rs", "mini.rs", "g"]).unwrap();
        assert_eq!(parsed.mini, Some(PathBuf::from("mini.rs")));
        assert_eq!(parsed.model, "g");
    }

    #[test]
    fn prompt_marks_the_hole() {
        let prompt = build_prompt("fn add(a: u32, b: u32) -> u32 {\n    .?.\n}\n");
        assert!(prompt.starts_with("fn add(a: u32, b: u32) -> u32 {\n    {:FILL_HERE:}\n}\n\n\n### TASK:"));
        assert!(prompt.ends_with("Include the answer inside a <COMPLETION></COMPLETION> tag."));
        assert_eq!(token_count("a  b\n\tc"), 3);
    }

    #[test]
    fn missing_tags_are_synthesized_once() {
        assert_eq!(
            extract_completion(&normalize_reply("a + b")).unwrap(),
            "a + b"
        );
        assert_eq!(
            extract_completion(&normalize_reply("<COMPLETION>a + b")).unwrap(),
            "a + b"
        );
        assert_eq!(
            extract_completion(&normalize_reply("a + b</COMPLETION> trailing")).unwrap(),
            "a + b"
        );
        let err = extract_completion(&normalize_reply("</COMPLETION>x<COMPLETION>")).unwrap_err();
        assert!(matches!(err, Error::MalformedReply { .. }));
    }

    #[test]
    fn imports_expand_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("types.rs"), "struct Point;").unwrap();
        let mut renderer = RecordingRenderer::new();
        let code = expand_imports("//./types.rs//\nfn f() {}", dir.path(), &mut renderer).unwrap();
        assert_eq!(code, "\nstruct Point;\nfn f() {}");
        assert_eq!(
            renderer.calls,
            vec![crate::render::Rendered::Info("import_file: //./types.rs//".to_string())]
        );

        let err = expand_imports("//./missing.rs//", dir.path(), &mut renderer).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(
            renderer.calls.last(),
            Some(&crate::render::Rendered::Info(
                "import_file: //./missing.rs// ERROR".to_string()
            ))
        );
    }

    #[test]
    fn prompt_log_names_are_path_safe() {
        let name = prompt_log_name(
            datetime!(2024-12-01 09:05:07.123456 UTC),
            "meta-llama/llama-3.3-70b-instruct",
        )
        .unwrap();
        assert_eq!(
            name,
            "2024-12-01T09-05-07-123456_meta-llama-llama-3.3-70b-instruct.log"
        );
    }

    #[tokio::test]
    async fn fills_every_hole_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("add.rs");
        fs::write(&file, "fn add(a: u32, b: u32) -> u32 {\n    .?.\n}\n// .?.\n").unwrap();
        let paths = HolefillPaths::for_home(dir.path());

        let backend = ScriptedBackend::new(Vendor::Anthropic);
        backend.push_reply("<COMPLETION>a + b</COMPLETION>");
        let mut session = ChatSession::new(backend.clone(), "claude-3-5-sonnet-latest");
        let mut renderer = RecordingRenderer::new();
        let args = HolefillArgs {
            file: file.clone(),
            mini: None,
            model: "C".to_string(),
        };

        let outcome = fill_hole(&args, "claude-3-5-sonnet-latest", &mut session, &paths, &mut renderer)
            .await
            .unwrap();
        assert_eq!(outcome, FillOutcome::Filled("a + b".to_string()));
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n// a + b\n"
        );
        let dump = fs::read_to_string(&paths.dump_file).unwrap();
        assert!(dump.starts_with("You're a code completion assistant.\n###\nfn add"));
        let logs: Vec<_> = fs::read_dir(&paths.prompt_history_dir).unwrap().collect();
        assert_eq!(logs.len(), 1);
        assert_eq!(backend.requests()[0].system(), Some(SYSTEM));
    }

    #[tokio::test]
    async fn no_hole_never_asks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("done.rs");
        fs::write(&file, "fn main() {}\n").unwrap();
        let backend = ScriptedBackend::new(Vendor::Anthropic);
        let mut session = ChatSession::new(backend.clone(), "claude-3-5-sonnet-latest");
        let mut renderer = RecordingRenderer::new();
        let args = HolefillArgs {
            file,
            mini: None,
            model: "C".to_string(),
        };
        let outcome = fill_hole(
            &args,
            "claude-3-5-sonnet-latest",
            &mut session,
            &HolefillPaths::for_home(dir.path()),
            &mut renderer,
        )
        .await
        .unwrap();
        assert_eq!(outcome, FillOutcome::NoHole);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn shortened_file_is_rewritten_with_imports() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("full.rs");
        let mini = dir.path().join("mini.rs");
        fs::write(&file, "use types::Point;\nfn origin() -> Point { .?. }\n").unwrap();
        fs::write(&mini, "//./types.rs//\nfn origin() -> Point { .?. }\n").unwrap();
        fs::write(dir.path().join("types.rs"), "struct Point { x: i32, y: i32 }").unwrap();

        let backend = ScriptedBackend::new(Vendor::Anthropic);
        backend.push_reply("Point { x: 0, y: 0 }");
        let mut session = ChatSession::new(backend.clone(), "claude-3-5-sonnet-latest");
        let mut renderer = RecordingRenderer::new();
        let args = HolefillArgs {
            file: file.clone(),
            mini: Some(mini.clone()),
            model: "C".to_string(),
        };
        fill_hole(
            &args,
            "claude-3-5-sonnet-latest",
            &mut session,
            &HolefillPaths::for_home(dir.path()),
            &mut renderer,
        )
        .await
        .unwrap();

        assert_eq!(
            fs::read_to_string(&mini).unwrap(),
            "\nstruct Point { x: i32, y: i32 }\nfn origin() -> Point { .?. }\n"
        );
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "use types::Point;\nfn origin() -> Point { Point { x: 0, y: 0 } }\n"
        );
        let sent = backend.requests()[0].turns.last().unwrap().text().to_string();
        assert!(sent.contains("struct Point { x: i32, y: i32 }\nfn origin() -> Point { {:FILL_HERE:} }"));
    }
}
