mod cli;
mod logging;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use spinner_engine::{
    BodyDecoding, FetchSettings, Page, PageSource, ReqwestFetcher, SnapshotWriter, SpinnerSync,
    WsConnector,
};
use sync_logging::sync_info;

use crate::cli::Args;

// The page document is not `Send`; everything stays on one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::initialize(args.log, args.level(), args.include_dependencies());

    let config = args.sync_config()?;
    let settings = config.fetch_settings();
    let fetcher = Arc::new(ReqwestFetcher::new(settings.clone()));
    // Pages may declare any charset; fragments are read as UTF-8.
    let page_fetcher = ReqwestFetcher::new(FetchSettings {
        decoding: BodyDecoding::Sniff,
        ..settings.clone()
    });

    let source = PageSource::parse(&args.source);
    let loaded = source
        .load(&page_fetcher)
        .await
        .with_context(|| format!("loading page {}", args.source))?;
    let location = args.base_url.clone().or(loaded.location);
    let page = Page::parse(&loaded.markup, location, config.element.clone());

    let connector = WsConnector::new(settings.connect_timeout);
    let sync = SpinnerSync::start(page, &config, &connector, fetcher).await?;
    let report = sync.run().await;

    match &args.output {
        Some(path) => {
            SnapshotWriter::new(path.clone())
                .write(&report.html)
                .with_context(|| format!("writing {}", path.display()))?;
            sync_info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.html.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
