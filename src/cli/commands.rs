use crate::cli::args::{RepairArgs, ReportFormat, ValidateArgs};
use crate::core::{
    document, EngineError, EnginePolicy, Finding, Pipeline, PipelineDocument, RepairEngine, Report,
    ValidationRegistry,
};
use std::fs;
use std::path::Path;
use std::process::ExitCode;

/// Read-only structural check. Exits 1 when ERROR findings exist, 2 when
/// the document or policy cannot be used at all.
pub fn validate(args: ValidateArgs) -> ExitCode {
    crate::logging::init(args.verbose);
    match run_validate(&args) {
        Ok(code) => code,
        Err(err) => fail(err),
    }
}

/// Read-modify-write repair. A timestamped backup of the original document
/// is written immediately before any overwrite; on unresolved findings the
/// document is left untouched.
pub fn repair(args: RepairArgs) -> ExitCode {
    crate::logging::init(args.verbose);
    match run_repair(&args) {
        Ok(code) => code,
        Err(err) => fail(err),
    }
}

fn run_validate(args: &ValidateArgs) -> Result<ExitCode, EngineError> {
    let policy = load_policy(args.policy.as_deref())?;
    let pipeline = Pipeline::load(&args.document, &policy)?;
    let findings = ValidationRegistry::new().run(&pipeline.graph, &policy);
    let report = Report::build(&pipeline, &findings, &[]);
    emit(&report, &args.format);

    if findings.iter().any(Finding::is_error) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_repair(args: &RepairArgs) -> Result<ExitCode, EngineError> {
    let mut policy = load_policy(args.policy.as_deref())?;
    if let Some(max_passes) = args.max_passes {
        policy.max_repair_passes = max_passes;
        policy.check()?;
    }

    let original_text = fs::read_to_string(&args.document)?;
    let parsed = PipelineDocument::parse(&original_text, &args.document)?;
    let mut pipeline = Pipeline::from_document(parsed, &policy, &args.document)?;

    let engine = RepairEngine::new(&policy)?;
    let outcome = engine.repair(&mut pipeline)?;

    let report = Report::build(&pipeline, &outcome.findings, &outcome.actions);
    emit(&report, &args.format);

    if !outcome.is_clean() {
        // Partial repairs are never persisted.
        return Err(EngineError::UnresolvedRepair {
            residual: outcome.residual_errors(),
        });
    }

    if args.dry_run {
        tracing::info!("dry run; document not written");
    } else if outcome.actions.is_empty() {
        tracing::info!("document already clean; nothing to write");
    } else {
        let backup = document::write_backup(&args.document, &original_text)?;
        pipeline.document.save(&args.document)?;
        eprintln!("backup written to {}", backup.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn load_policy(path: Option<&Path>) -> Result<EnginePolicy, EngineError> {
    match path {
        Some(path) => EnginePolicy::load(path),
        None => Ok(EnginePolicy::default()),
    }
}

fn emit(report: &Report, format: &ReportFormat) {
    match format {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!("{}", report.to_json()),
    }
}

fn fail(err: EngineError) -> ExitCode {
    eprintln!("error: {}", err);
    if let EngineError::UnresolvedRepair { residual } = &err {
        for finding in residual {
            let location = finding.node.as_deref().unwrap_or("<pipeline>");
            eprintln!("  [{}] {} {}: {}", finding.severity, finding.rule_id, location, finding.detail);
        }
    }
    ExitCode::from(err.exit_code())
}
