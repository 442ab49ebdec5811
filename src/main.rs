use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use preset_patcher::batch::{self, BatchOptions, FileStatus, OutputMode};
use preset_patcher::codec::{atomic_write, gzip, Container, ContainerKind, DEFAULT_PAYLOAD_KEY};
use preset_patcher::patch::{apply, load_from_path, OperationOutcome};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "preset-patcher")]
#[command(about = "Inspect, convert, and batch-edit music production preset files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a preset container to its XML payload
    Decode {
        /// Preset file (.adg, .adv, .als, .aupreset)
        input: PathBuf,

        /// Write the payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Container format override (inferred from extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<KindArg>,

        /// plist payload key (data0, data1, ...)
        #[arg(long, default_value = DEFAULT_PAYLOAD_KEY)]
        payload_key: String,
    },

    /// Encode an XML payload back into a preset container
    Encode {
        /// XML payload file
        input: PathBuf,

        /// Destination preset file
        output: PathBuf,

        /// Existing container to splice the payload into (required for
        /// .aupreset output; all bytes outside the payload are kept)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// plist payload key (data0, data1, ...)
        #[arg(long, default_value = DEFAULT_PAYLOAD_KEY)]
        payload_key: String,
    },

    /// Apply a patch set to a single preset file
    Apply {
        /// Preset file
        input: PathBuf,

        /// TOML patch set
        #[arg(short, long)]
        patches: PathBuf,

        /// Write the result here (defaults to in-place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Copy the original to <name>.bak before overwriting
        #[arg(short, long)]
        backup: bool,

        /// Dry run - report what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of the payload
        #[arg(short, long)]
        diff: bool,

        /// Container format override (inferred from extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<KindArg>,

        /// plist payload key (data0, data1, ...)
        #[arg(long, default_value = DEFAULT_PAYLOAD_KEY)]
        payload_key: String,
    },

    /// Apply a patch set to every matching preset under a directory
    Batch {
        /// Library root to scan
        root: PathBuf,

        /// TOML patch set
        #[arg(short, long)]
        patches: PathBuf,

        /// Filename glob to match
        #[arg(long, default_value = "*.adg")]
        pattern: String,

        /// Mirror results under this root instead of writing in place
        #[arg(short, long)]
        output_root: Option<PathBuf>,

        /// Copy each original to <name>.bak before overwriting (in-place only)
        #[arg(short, long)]
        backup: bool,

        /// Directory names to skip
        #[arg(short, long, default_value = "Backup")]
        exclude: Vec<String>,

        /// Do not descend into subdirectories
        #[arg(long)]
        flat: bool,

        /// Dry run - report what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Container format override (inferred from extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<KindArg>,

        /// plist payload key (data0, data1, ...)
        #[arg(long, default_value = DEFAULT_PAYLOAD_KEY)]
        payload_key: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// gzip-wrapped XML (.adg, .adv, .als)
    Gzip,
    /// plist with base64 payload (.aupreset)
    Plist,
}

impl From<KindArg> for ContainerKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Gzip => ContainerKind::Gzip,
            KindArg::Plist => ContainerKind::PlistBase64,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            input,
            output,
            format,
            payload_key,
        } => cmd_decode(&input, output.as_deref(), format, &payload_key),

        Commands::Encode {
            input,
            output,
            template,
            payload_key,
        } => cmd_encode(&input, &output, template.as_deref(), &payload_key),

        Commands::Apply {
            input,
            patches,
            output,
            backup,
            dry_run,
            diff,
            format,
            payload_key,
        } => cmd_apply(
            &input,
            &patches,
            output.as_deref(),
            backup,
            dry_run,
            diff,
            format,
            &payload_key,
        ),

        Commands::Batch {
            root,
            patches,
            pattern,
            output_root,
            backup,
            exclude,
            flat,
            dry_run,
            format,
            payload_key,
        } => {
            let options = BatchOptions {
                pattern,
                recursive: !flat,
                exclude_dirs: exclude,
                output: match output_root {
                    Some(root) => OutputMode::Mirror { root },
                    None => OutputMode::InPlace { backup },
                },
                dry_run,
                kind: format.map(Into::into),
                payload_key,
            };
            cmd_batch(&root, &patches, &options, dry_run)
        }
    }
}

fn cmd_decode(
    input: &Path,
    output: Option<&Path>,
    format: Option<KindArg>,
    payload_key: &str,
) -> Result<()> {
    let container = Container::open(input, format.map(Into::into), payload_key)?;
    let payload = container.payload()?;

    match output {
        Some(path) => {
            atomic_write(path, payload.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "{} Decoded {} -> {}",
                "✓".green(),
                input.display(),
                path.display()
            );
        }
        None => print!("{}", payload),
    }

    Ok(())
}

fn cmd_encode(
    input: &Path,
    output: &Path,
    template: Option<&Path>,
    payload_key: &str,
) -> Result<()> {
    let payload = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    match template {
        Some(template) => {
            let container = Container::open(template, None, payload_key)?;
            container.write_with_payload(&payload, output)?;
        }
        None => match ContainerKind::detect(output) {
            Some(ContainerKind::Gzip) => {
                let bytes = gzip::compress(&payload)?;
                atomic_write(output, &bytes)
                    .with_context(|| format!("failed to write {}", output.display()))?;
            }
            Some(ContainerKind::PlistBase64) => {
                bail!(
                    "aupreset output needs a --template container to splice the payload into"
                );
            }
            None => bail!(
                "cannot infer container kind from extension of {}; pass --template",
                output.display()
            ),
        },
    }

    println!(
        "{} Encoded {} -> {}",
        "✓".green(),
        input.display(),
        output.display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_apply(
    input: &Path,
    patches: &Path,
    output: Option<&Path>,
    backup: bool,
    dry_run: bool,
    show_diff: bool,
    format: Option<KindArg>,
    payload_key: &str,
) -> Result<()> {
    let patch_set = load_from_path(patches)?;
    let container = Container::open(input, format.map(Into::into), payload_key)?;
    let payload = container.payload()?;

    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
    }

    let (modified, outcomes) = apply(&payload, &patch_set.patches)?;

    let mut applied = 0;
    let mut already_applied = 0;
    let mut not_found = 0;

    for (patch_id, outcome) in &outcomes {
        match outcome {
            OperationOutcome::Applied { count } => {
                println!(
                    "{} {}: Applied ({} match{})",
                    "✓".green(),
                    patch_id,
                    count,
                    if *count == 1 { "" } else { "es" }
                );
                applied += 1;
            }
            OperationOutcome::AlreadyApplied => {
                println!("{} {}: Already applied", "⊙".yellow(), patch_id);
                already_applied += 1;
            }
            OperationOutcome::NotFound => {
                println!("{} {}: Target not found", "⊘".cyan(), patch_id);
                not_found += 1;
            }
        }
    }

    if show_diff && modified != payload {
        display_diff(input, &payload, &modified);
    }

    if applied > 0 && !dry_run {
        let dest = output.unwrap_or(input);
        if backup && dest == input {
            let backup_path = {
                let mut name = input.as_os_str().to_os_string();
                name.push(".bak");
                PathBuf::from(name)
            };
            fs::copy(input, &backup_path)
                .with_context(|| format!("failed to create backup {}", backup_path.display()))?;
        }
        container.write_with_payload(&modified, dest)?;
        println!("\nWrote {}", dest.display());
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", applied).green());
    println!(
        "  {} already applied",
        format!("{}", already_applied).yellow()
    );
    println!("  {} not found", format!("{}", not_found).cyan());

    Ok(())
}

fn cmd_batch(root: &Path, patches: &Path, options: &BatchOptions, dry_run: bool) -> Result<()> {
    let patch_set = load_from_path(patches)?;

    println!("Library: {}", root.display());
    println!("Pattern: {}", options.pattern);
    if dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
    }
    println!();

    let report = batch::run(root, &patch_set, options)?;

    for file in &report.details {
        match &file.status {
            FileStatus::Patched { output } => {
                if dry_run {
                    println!("{} {}: Would patch", "✓".green(), file.path.display());
                } else if output == &file.path {
                    println!("{} {}: Patched", "✓".green(), file.path.display());
                } else {
                    println!(
                        "{} {}: Patched -> {}",
                        "✓".green(),
                        file.path.display(),
                        output.display()
                    );
                }
                for (patch_id, outcome) in &file.operations {
                    println!("    {}: {}", patch_id, outcome);
                }
            }
            FileStatus::Unchanged => {
                println!("{} {}: Unchanged", "⊙".yellow(), file.path.display());
            }
            FileStatus::Failed { reason } => {
                eprintln!("{} {}: Failed - {}", "✗".red(), file.path.display(), reason);
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} patched", format!("{}", report.processed).green());
    println!("  {} unchanged", format!("{}", report.skipped).yellow());
    println!("  {} failed", format!("{}", report.errors).red());

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Helper: Show unified diff between original and modified payload
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
