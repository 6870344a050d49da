use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::{error, info, info_span};

use subval_ingest::discover_submission_files;
use subval_model::{DataType, FileType, QueuedProject, SubmissionFile};
use subval_server::{
    LogMailService, MemoryReleaseService, PipelineValidator, ReleaseService, SchedulerConfig,
    ServerConfig, StorageLayout, ValidationScheduler,
};
use subval_validate::kv::{DELETION_FILE_NAME, KeyFields, Surjection};
use subval_validate::{
    CancellationFlag, PipelineConfig, PipelineOutcome, ValidationPipeline, ValidationRequest,
    effective_data_types, key_spec,
};

use crate::cli::{ServeArgs, ValidateArgs};
use crate::summary::{apply_table_style, print_release};

pub fn run_file_types() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec![
        "File type",
        "Data type",
        "Primary key",
        "Foreign key",
        "Secondary key",
        "Surjection",
    ]);
    apply_table_style(&mut table);
    for file_type in FileType::ALL {
        let spec = key_spec(file_type);
        let relation = |relation: Option<subval_validate::kv::Relation>| {
            relation.map_or_else(
                || "-".to_string(),
                |relation| format!("{} -> {}", fields(relation.fields), relation.referenced),
            )
        };
        let surjection = match spec.surjection {
            Surjection::None => "-",
            Surjection::Simple => "simple",
            Surjection::Complex => "complex",
        };
        table.add_row(vec![
            file_type.to_string(),
            file_type.data_type().to_string(),
            spec.pk.map_or_else(|| "-".to_string(), fields),
            relation(spec.fk),
            relation(spec.secondary_fk),
            surjection.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn fields(fields: KeyFields) -> String {
    fields.names.join(", ")
}

/// Data types with at least one file in the listing, plus clinical.
fn present_data_types(files: &[SubmissionFile]) -> Vec<DataType> {
    let present: BTreeSet<DataType> = files.iter().filter_map(SubmissionFile::data_type).collect();
    effective_data_types(&present.into_iter().collect::<Vec<_>>())
}

pub fn run_validate(args: &ValidateArgs) -> Result<PipelineOutcome> {
    let dir = &args.submission_dir;
    let span = info_span!("validate", dir = %dir.display());
    let _guard = span.enter();

    let files = discover_submission_files(dir)
        .with_context(|| format!("list submission files in {}", dir.display()))?;
    let data_types = if args.data_types.is_empty() {
        present_data_types(&files)
    } else {
        effective_data_types(&args.data_types)
    };
    let deletions = args.deletions.clone().or_else(|| {
        let default = dir.join(DELETION_FILE_NAME);
        default.is_file().then_some(default)
    });
    let request = ValidationRequest {
        project_key: dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("submission")
            .to_string(),
        data_types,
        files,
        existing_dir: args.existing.clone(),
        deletions,
    };

    let mut config = PipelineConfig::default();
    config.normalization.output_dir = args.normalized_dir.clone();
    info!(
        project = %request.project_key,
        data_types = ?request.data_types,
        files = request.files.len(),
        "validating submission"
    );
    ValidationPipeline::new(config)
        .run(&request, request.initial_report(), &CancellationFlag::new())
        .context("validate submission")
}

pub fn run_serve(args: &ServeArgs) -> Result<()> {
    let mut config = ServerConfig::load(&args.config).context("load configuration")?;
    if let Some(max_simultaneous) = args.max_simultaneous {
        config.validator.max_simultaneous = max_simultaneous;
    }
    config.validate().context("validate configuration")?;

    let storage = StorageLayout::new(config.storage.root.clone());
    let releases = Arc::new(
        MemoryReleaseService::open(storage, &args.release, &args.dictionary_version)
            .context("open release")?,
    );
    for project_key in releases.storage().project_keys(&args.release)? {
        let files = releases
            .storage()
            .submission_files(&args.release, &project_key)?;
        let data_types = if args.data_types.is_empty() {
            present_data_types(&files)
        } else {
            args.data_types.clone()
        };
        let project =
            QueuedProject::new(project_key.clone(), data_types).with_emails(args.notify.clone());
        releases
            .queue(project)
            .with_context(|| format!("queue project {project_key}"))?;
    }

    let scheduler = ValidationScheduler::new(
        SchedulerConfig::from(&config),
        releases.clone(),
        Arc::new(LogMailService::new(config.mail.admin.clone())),
        Arc::new(PipelineValidator::new(PipelineConfig::new(
            config.validator.log_threshold,
        ))),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(async {
        let shutdown = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(%error, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        scheduler.run(shutdown).await
    })?;

    print_release(&releases.open_release()?);
    Ok(())
}
