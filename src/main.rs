use std::{process, sync::Arc};

use drafthouse::{
    application::{
        api::BlogApi,
        breaker::CircuitBreaker,
        clock::{Clock, TokioClock},
        editor::{DraftCoordinator, Edit, EditorSession, Outcome},
        error::{AppError, ErrorReport},
        notices::{ChannelNotices, Notice},
        uploads::ImageUploader,
    },
    config::{self, Command, EditArgs, PublishArgs, Settings, UploadImageArgs},
    domain::types::DraftId,
    infra::{
        blog_api::HttpBlogApi,
        credentials::CredentialSource,
        document::{read_document, read_image, watch_document},
        error::InfraError,
        telemetry,
    },
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error(error.kind(), error);
    if dispatcher::has_been_set() {
        error!(kind = report.source, error = %report.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(kind = report.source, error = %report.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let api = build_api(&settings, cli_args.api_key_env)?;
    match cli_args.command {
        Command::Edit(args) => run_edit(&settings, api, args).await,
        Command::Publish(args) => run_publish(&settings, api, args).await,
        Command::UploadImage(args) => run_upload_image(&settings, api, args).await,
    }
}

fn build_api(settings: &Settings, api_key_env: Option<String>) -> Result<Arc<dyn BlogApi>, AppError> {
    let base_url = settings.api.base_url.as_deref().ok_or_else(|| {
        AppError::validation("no API base URL configured; set api.base_url or --api-base-url")
    })?;
    let credentials = CredentialSource::resolve(settings.api.key_file.as_deref(), api_key_env)?;
    if !credentials.is_present() {
        warn!("No API key configured; saving and publishing will be refused");
    }
    let api = HttpBlogApi::new(base_url, credentials, settings.api.timeout)?;
    info!(base = %api.base(), "Blog API client ready");
    Ok(Arc::new(api))
}

fn build_coordinator(
    settings: &Settings,
    api: Arc<dyn BlogApi>,
    notices: ChannelNotices,
) -> Arc<DraftCoordinator> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let breaker = CircuitBreaker::new(settings.breaker.policy(), Arc::clone(&clock));
    let coordinator = DraftCoordinator::new(
        api,
        breaker,
        clock,
        Arc::new(notices),
        settings.editor.autosave_policy(),
    )
    .with_max_image_bytes(settings.uploads.max_image_bytes.get());
    Arc::new(coordinator)
}

async fn run_edit(
    settings: &Settings,
    api: Arc<dyn BlogApi>,
    args: EditArgs,
) -> Result<(), AppError> {
    let (sink, mut notices) = ChannelNotices::new();
    let coordinator = build_coordinator(settings, api, sink);
    let session = EditorSession::start(coordinator, settings.editor.timings());

    if let Some(id) = args.id {
        let loaded = session.load_existing(DraftId::from(id)).await;
        drain_notices(&mut notices);
        loaded?;
    }

    let (watcher, mut snapshots) = watch_document(args.file.clone(), settings.editor.poll_interval);
    info!(file = %args.file.display(), "Watching document; press Ctrl-C to stop");

    let stopped = loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => {
                    session.set_title(snapshot.title);
                    session.set_content(snapshot.content);
                }
                None => break Ok(()),
            },
            Some(notice) = notices.recv() => print_notice(&notice),
            signal = tokio::signal::ctrl_c() => break signal.map_err(InfraError::from),
        }
    };
    watcher.abort();
    stopped?;

    let published = if args.publish_on_exit {
        let latest = read_document(&args.file).await?;
        session.set_title(latest.title);
        session.set_content(latest.content);
        Some(session.publish().await)
    } else {
        None
    };

    let status = session.status();
    info!(
        state = %status.state,
        draft = ?status.draft_id.as_ref().map(DraftId::as_str),
        failures = status.failure_count,
        "Editing stopped"
    );
    session.close();
    drain_notices(&mut notices);

    if let Some(result) = published {
        let post = result?;
        println!("{}", post.id);
    }
    Ok(())
}

async fn run_publish(
    settings: &Settings,
    api: Arc<dyn BlogApi>,
    args: PublishArgs,
) -> Result<(), AppError> {
    let document = read_document(&args.file).await?;
    if document.title.trim().is_empty() {
        return Err(AppError::validation(format!(
            "{} has no `# Title` first line",
            args.file.display()
        )));
    }

    let (sink, mut notices) = ChannelNotices::new();
    let coordinator = build_coordinator(settings, api, sink);
    coordinator.record(Edit::Title(document.title));
    coordinator.record(Edit::Content(document.content));

    let created = coordinator.evaluate().await;
    if created != Outcome::DraftCreated {
        drain_notices(&mut notices);
        return Err(AppError::unexpected(format!(
            "draft was not created ({created:?})"
        )));
    }

    let published = coordinator.publish().await;
    coordinator.shutdown();
    drain_notices(&mut notices);

    let post = published?;
    println!("{}", post.id);
    Ok(())
}

async fn run_upload_image(
    settings: &Settings,
    api: Arc<dyn BlogApi>,
    args: UploadImageArgs,
) -> Result<(), AppError> {
    let image = read_image(&args.file).await?;
    let uploader = ImageUploader::new(api, settings.uploads.max_image_bytes.get());
    let draft = DraftId::from(args.draft);
    let url = uploader.upload(&draft, args.index, image).await?;
    println!("{url}");
    Ok(())
}

fn drain_notices(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    eprintln!("{notice}");
}
