use clap::Parser;
use ftp_import::utils::error::ErrorCategory;
use ftp_import::utils::logger;
use ftp_import::{CliConfig, FileNotification, ImportError, Importer, LocalStorage};

fn exit_code(e: &ImportError) -> i32 {
    match e.category() {
        ErrorCategory::Configuration => 1,
        ErrorCategory::Timeout => 3,
        _ => 2,
    }
}

fn fail(e: ImportError) -> ! {
    tracing::error!("❌ Import failed: {} (Category: {:?})", e, e.category());
    eprintln!("❌ {}", e);
    std::process::exit(exit_code(&e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting ftp-import CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let settings = config.settings().unwrap_or_else(|e| fail(e));
    let storage = LocalStorage::new(config.store_root.clone());
    let tenant_id = settings.tenant.tenant_id.clone();
    let importer = Importer::new(storage, settings).unwrap_or_else(|e| fail(e));

    let summary = if config.scan {
        let prefix = config.prefix.clone().unwrap_or(tenant_id);
        importer
            .scan_bucket(&config.bucket, &prefix, None)
            .await
            .unwrap_or_else(|e| fail(e))
    } else {
        let notifications: Vec<FileNotification> = config
            .keys
            .iter()
            .map(|key| FileNotification::new(config.bucket.clone(), key.clone()))
            .collect();
        importer.handle(&notifications, None).await
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.all_succeeded() {
        for report in summary.failed() {
            eprintln!("❌ {}/{}: {:?}", report.bucket, report.key, report.outcome);
        }
        std::process::exit(2);
    }

    println!("✅ Processed {} files", summary.succeeded());
    Ok(())
}
