use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use blobver_collapse::{CollapseReport, CollapseRequest, Collapser};
use blobver_diff::{
    ContentEquality, JsonEquality, NameComparer, NumericNameComparer, OrdinalNameComparer,
    OrdinalStreamEquality,
};
use blobver_publish::{
    DedupGate, MarkerExpectation, PublishOutcome, PublishRequest, Publisher, VersionStrategy,
};
use blobver_store::{BlobStore, FsBlobStore};
use blobver_types::ETag;
use bytes::Bytes;
use colored::Colorize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::cli::*;
use crate::config::CliConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let root = cli
        .root
        .clone()
        .or_else(|| config.root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(root));

    match cli.command {
        Command::Upload(args) => cmd_upload(store, &config, args, cli.format).await,
        Command::Latest(args) => cmd_latest(store, &config, args).await,
        Command::Collapse(args) => cmd_collapse(store, &config, args, cli.format).await,
    }
}

fn upload_request(args: &UploadArgs) -> PublishRequest {
    let strategy = if args.number {
        VersionStrategy::Number {
            marker: args
                .marker_etag
                .as_deref()
                .map(|etag| MarkerExpectation::Match(ETag::from(etag)))
                .unwrap_or_default(),
            next_number: args.next_number,
        }
    } else {
        VersionStrategy::Timestamp
    };
    PublishRequest::new(&args.target.container, args.target.path_format.clone())
        .with_content_type(&args.content_type)
        .with_strategy(strategy)
        .with_latest_etag(args.latest_etag.as_deref().map(ETag::from))
        .direct(!args.no_direct)
        .latest(!args.no_latest)
        .use_etags(!args.no_etags)
}

async fn cmd_upload(
    store: Arc<dyn BlobStore>,
    config: &CliConfig,
    args: UploadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let publisher = Publisher::new(store).with_config(config.publisher.clone());
    let mut request = upload_request(&args);

    let result = if args.only_unique {
        // Buffered so the gate can compare it before uploading it.
        let mut buffer = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buffer)
            .await
            .context("failed to read standard input")?;
        let equality: Box<dyn ContentEquality> = if args.json_equality {
            Box::new(JsonEquality)
        } else {
            Box::new(OrdinalStreamEquality::new(config.publisher.chunk_size))
        };
        DedupGate::new(&publisher)
            .publish_if_changed(&request, Bytes::from(buffer), equality.as_ref())
            .await
    } else {
        if request.write_latest && request.use_etags && request.latest_etag.is_none() {
            // Guard against whatever latest is now.
            request.latest_etag = publisher
                .latest_info(&request.container, &request.template)
                .await?
                .map(|info| info.etag);
        }
        publisher
            .publish(&request, Box::new(tokio::io::stdin()))
            .await
            .map(Some)
    };

    match result {
        Ok(Some(outcome)) => print_outcome(&outcome, format),
        Ok(None) => {
            match format {
                OutputFormat::Text => println!(
                    "{} Unchanged: {}",
                    "=".dimmed(),
                    publisher.latest_uri(&request.container, &request.template)
                ),
                OutputFormat::Json => println!("null"),
            }
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial_outcome() {
                eprintln!("{} Partially published before failing:", "!".yellow().bold());
                eprint_outcome(partial);
            }
            if err.is_conflict() {
                eprintln!(
                    "{} Another writer got there first; re-read and retry.",
                    "!".yellow().bold()
                );
            }
            Err(anyhow::Error::new(err).context("upload failed"))
        }
    }
}

fn print_outcome(outcome: &PublishOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => {
            println!("{} Published", "✓".green().bold());
            for line in outcome_lines(outcome) {
                println!("  {line}");
            }
        }
    }
    Ok(())
}

fn eprint_outcome(outcome: &PublishOutcome) {
    for line in outcome_lines(outcome) {
        eprintln!("  {line}");
    }
}

fn outcome_lines(outcome: &PublishOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    let etag = |e: &Option<ETag>| e.as_ref().map(|e| e.to_string()).unwrap_or_default();
    if let Some(uri) = &outcome.direct_uri {
        lines.push(format!("Direct: {} {}", uri.bold(), etag(&outcome.direct_etag).dimmed()));
    }
    if let Some(uri) = &outcome.latest_uri {
        lines.push(format!("Latest: {} {}", uri.bold(), etag(&outcome.latest_etag).dimmed()));
    }
    if let Some(number) = outcome.latest_number {
        lines.push(format!(
            "Number: {} {}",
            number.to_string().yellow(),
            etag(&outcome.latest_number_etag).dimmed()
        ));
    }
    lines
}

async fn cmd_latest(
    store: Arc<dyn BlobStore>,
    config: &CliConfig,
    args: LatestArgs,
) -> anyhow::Result<()> {
    let publisher = Publisher::new(store).with_config(config.publisher.clone());
    let container = &args.target.container;
    let template = &args.target.path_format;
    let Some(mut latest) = publisher.open_latest(container, template).await? else {
        anyhow::bail!(
            "no latest blob at {}",
            publisher.latest_uri(container, template)
        );
    };
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut latest.body, &mut stdout)
        .await
        .context("failed to write latest blob to standard output")?;
    stdout.flush().await?;
    Ok(())
}

async fn cmd_collapse(
    store: Arc<dyn BlobStore>,
    config: &CliConfig,
    args: CollapseArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut collapse_config = config.collapse.clone();
    collapse_config.dry_run |= args.dry_run;
    let equality = OrdinalStreamEquality::new(collapse_config.chunk_size);
    let template = &args.target.path_format;
    let numeric = NumericNameComparer::new(template.clone());
    let name_comparer: &dyn NameComparer = if args.numeric {
        &numeric
    } else {
        &OrdinalNameComparer
    };

    let collapser = Collapser::new(store).with_config(collapse_config);
    let report = collapser
        .collapse(&CollapseRequest {
            container: &args.target.container,
            template,
            name_comparer,
            equality: &equality,
        })
        .await?;
    print_report(&report, format)
}

fn print_report(report: &CollapseReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let verb = if report.dry_run { "Would delete" } else { "Deleted" };
            for path in &report.deleted {
                println!("  {} {}", "-".red(), path);
            }
            println!(
                "{} Examined {}, kept {}. {} {}.",
                "✓".green().bold(),
                report.examined.to_string().bold(),
                report.retained.len().to_string().bold(),
                verb,
                report.deleted.len().to_string().bold()
            );
        }
    }
    Ok(())
}
