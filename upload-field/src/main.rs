use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use storage_core::StorageClient;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use upload_field::field::{FieldAdapter, FieldHost, FieldValue, FileHandle, Notification, UploadConfig};
use upload_field::settings::ClientSettings;
use upload_field::transport::{AcceptList, HttpTransport, TransportConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Upload(UploadArgs),
    ShowSettings,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UploadArgs {
    property: PathBuf,
    value: Option<String>,
    files: Vec<PathBuf>,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let mut property = None;
    let mut value = None;
    let mut files = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliMode::Help),
            "--show-settings" => return Ok(CliMode::ShowSettings),
            "--property" => {
                let path = args.next().context("--property requires a path")?;
                property = Some(PathBuf::from(path));
            }
            "--value" => value = Some(args.next().context("--value requires a JSON value")?),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            file => files.push(PathBuf::from(file)),
        }
    }
    let property = property.context("--property is required")?;
    if files.is_empty() {
        anyhow::bail!("no files to upload");
    }
    Ok(CliMode::Upload(UploadArgs {
        property,
        value,
        files,
    }))
}

#[derive(Debug, Default)]
struct ConsoleHost {
    failures: usize,
}

impl FieldHost for ConsoleHost {
    fn on_change(&mut self, value: FieldValue) {
        let value = serde_json::to_string(&value).unwrap_or_default();
        info!(%value, "field value changed");
    }

    fn on_touched(&mut self) {
        debug!("field touched");
    }

    fn notify(&mut self, notification: Notification) {
        self.failures += 1;
        error!(title = %notification.title, "{}", notification.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: upload-field --property <field.json> [--value <json>] FILE...");
            println!("  --property       Field property JSON (string or array of strings)");
            println!("  --value          Current field value as JSON (default: empty)");
            println!("  --show-settings  Print storage settings as JSON and exit");
            Ok(())
        }
        CliMode::ShowSettings => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ClientSettings::from_env())?
            );
            Ok(())
        }
        CliMode::Upload(args) => run_upload(args).await,
    }
}

async fn run_upload(args: UploadArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.property)
        .with_context(|| format!("failed to read {}", args.property.display()))?;
    let config = UploadConfig::from_json(&raw).context("invalid field property")?;
    let value = match args.value.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("invalid --value")?,
        None => FieldValue::empty(config.mode()),
    };

    let settings = ClientSettings::from_env();
    let token = settings
        .token
        .clone()
        .context("STORAGE_TOKEN is not set")?;
    let client = StorageClient::with_base_url(&settings.base_url, token)?;
    let transport = HttpTransport::with_config(
        client,
        TransportConfig {
            upload_concurrency: settings.upload_concurrency,
        },
    )
    .accepting(AcceptList::new(&config.settings().accepted_files));

    let mut adapter = FieldAdapter::new(config, Arc::new(transport), ConsoleHost::default(), value);
    adapter.drop_files(args.files.into_iter().map(FileHandle::from_path).collect());
    adapter.run_until_idle().await;

    println!("{}", serde_json::to_string(adapter.value())?);
    let failures = adapter.host().failures;
    if failures > 0 {
        anyhow::bail!("{failures} upload(s) failed");
    }
    Ok(())
}
