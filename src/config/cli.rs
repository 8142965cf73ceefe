use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the drafthouse binary.
#[derive(Debug, Parser)]
#[command(
    name = "drafthouse",
    version,
    about = "Draft, auto-save and publish blog posts from local files"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "DRAFTHOUSE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    /// API key from env (no visible flag, keeps keys out of shell history)
    #[arg(long = "api-key", hide = true, env = "DRAFTHOUSE_API_KEY")]
    pub api_key_env: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Watch a local file and keep its draft saved until Ctrl-C.
    Edit(EditArgs),
    /// Create a draft from a local file and publish it right away.
    Publish(PublishArgs),
    /// Upload an image for an existing draft and print its public URL.
    #[command(name = "upload-image")]
    UploadImage(UploadImageArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the blog API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Path to a file containing the API key (takes precedence over env).
    #[arg(
        long = "key-file",
        env = "DRAFTHOUSE_API_KEY_FILE",
        value_name = "PATH",
        global = true
    )]
    pub key_file: Option<PathBuf>,

    /// Override the HTTP request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EditorOverrides {
    /// Override the quiet period before a title change settles.
    #[arg(long = "title-debounce-ms", value_name = "MS")]
    pub title_debounce_ms: Option<u64>,

    /// Override the quiet period before a content change settles.
    #[arg(long = "content-debounce-ms", value_name = "MS")]
    pub content_debounce_ms: Option<u64>,

    /// Override the minimum time between two auto-saves.
    #[arg(long = "autosave-interval-seconds", value_name = "SECONDS")]
    pub autosave_interval_seconds: Option<u64>,

    /// Override how often the watched file is polled.
    #[arg(long = "poll-interval-ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct EditArgs {
    #[command(flatten)]
    pub overrides: EditorOverrides,

    /// Continue editing an existing post instead of creating a draft.
    #[arg(long = "id", value_name = "ID")]
    pub id: Option<String>,

    /// Publish the latest file contents when editing stops.
    #[arg(long = "publish-on-exit", action = clap::ArgAction::SetTrue)]
    pub publish_on_exit: bool,

    /// Document to watch; the first line is `# Title`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PublishArgs {
    /// Document to publish; the first line is `# Title`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct UploadImageArgs {
    /// Draft the image belongs to.
    #[arg(long = "draft", value_name = "ID")]
    pub draft: String,

    /// Image number within the draft, used in the object key.
    #[arg(long = "index", value_name = "N", default_value_t = 0)]
    pub index: u32,

    /// Image file to upload.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}
