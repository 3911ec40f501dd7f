use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::path::{Path, PathBuf};
use twpar::diff::{DiffCounts, DiffKind, DiffOptions, DiffRecord, Differ, DuplicatePolicy};
use twpar::document;
use twpar::envelope::{EnvelopeOptions, DEFAULT_LEVEL};
use twpar::labels::{FieldLabels, LabelResolver};
use twpar::merge::{self, mergeable, of_kind};
use twpar::edit::suggest_next_name;
use twpar::{read_par_file, write_par_file, ParFile, ParList};

#[derive(Parser)]
#[command(name = "twpar", version, about = "Inspect, convert, compare and merge Two Worlds .par files")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Extra field-label JSON files, applied over the built-in labels in order
    #[arg(long = "labels", global = true)]
    labels: Vec<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file metadata and every list's entries
    Info {
        input: PathBuf,
    },
    /// Write a .par file out as JSON
    Export {
        input:  PathBuf,
        output: PathBuf,
    },
    /// Build a .par file from exported JSON
    Import {
        input:  PathBuf,
        output: PathBuf,
        /// zlib level for wrapped files (0-9)
        #[arg(short, long, default_value_t = DEFAULT_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },
    /// List differences between a source and an input file
    Diff {
        source: PathBuf,
        input:  PathBuf,
        /// Third file whose values are shown for reference
        #[arg(short, long)]
        baseline: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "last")]
        duplicates: Duplicates,
    },
    /// Copy input-side changes into the source and write the result
    Merge {
        source: PathBuf,
        input:  PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Restrict the merge to one kind of difference
        #[arg(long, value_enum)]
        only: Option<Only>,
        #[arg(long, value_enum, default_value = "last")]
        duplicates: Duplicates,
        /// zlib level for wrapped files (0-9)
        #[arg(short, long, default_value_t = DEFAULT_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },
    /// Copy an entry under a new name and insert it after the original
    Duplicate {
        input:  PathBuf,
        /// List index
        #[arg(long)]
        list:   usize,
        entry:  String,
        /// Name of the copy; defaults to the next name in the series
        #[arg(long)]
        name:   Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rename an entry and the string fields that mention it
    Rename {
        input:  PathBuf,
        #[arg(long)]
        list:   usize,
        entry:  String,
        name:   String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove an entry
    Delete {
        input:  PathBuf,
        #[arg(long)]
        list:   usize,
        entry:  String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Append a blank entry shaped like the list's first entry
    Add {
        input:  PathBuf,
        #[arg(long)]
        list:   usize,
        name:   String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Duplicates {
    First,
    Last,
}

impl From<Duplicates> for DuplicatePolicy {
    fn from(d: Duplicates) -> Self {
        match d {
            Duplicates::First => DuplicatePolicy::FirstWins,
            Duplicates::Last  => DuplicatePolicy::LastWins,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Only {
    Changed,
    InputOnly,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut labels = FieldLabels::builtin();
    for path in &cli.labels {
        labels.load_file(path)?;
        info!("loaded labels from {}", path.display());
    }

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raw = std::fs::metadata(&input)?.len();
            let par = read_par_file(&input)?;
            print_info(&input, raw, &par);
        }

        // ── Export ───────────────────────────────────────────────────────────
        Commands::Export { input, output } => {
            let par  = read_par_file(&input)?;
            let json = document::to_json(&par, Some(&labels as &dyn LabelResolver))?;
            std::fs::write(&output, json)?;
            println!("Exported {} entries to {}", par.entry_count(), output.display());
        }

        // ── Import ───────────────────────────────────────────────────────────
        Commands::Import { input, output, level } => {
            let par = document::from_json(&std::fs::read_to_string(&input)?)?;
            write_par_file(&output, &par, &EnvelopeOptions { level })?;
            println!("Imported {} entries to {}", par.entry_count(), output.display());
        }

        // ── Diff ─────────────────────────────────────────────────────────────
        Commands::Diff { source, input, baseline, duplicates } => {
            let src  = read_par_file(&source)?;
            let inp  = read_par_file(&input)?;
            let base = baseline.as_deref().map(read_par_file).transpose()?;

            let records = differ(&labels, duplicates).diff(&src, &inp, base.as_ref());
            print_records(&records, base.is_some());
            print_counts(&records);
        }

        // ── Merge ────────────────────────────────────────────────────────────
        Commands::Merge { source, input, output, only, duplicates, level } => {
            let mut src = read_par_file(&source)?;
            let inp     = read_par_file(&input)?;

            let records  = differ(&labels, duplicates).diff(&src, &inp, None);
            let selected = match only {
                None                  => mergeable(&records),
                Some(Only::Changed)   => of_kind(&records, DiffKind::Changed),
                Some(Only::InputOnly) => of_kind(&records, DiffKind::InputOnly),
            };
            let stats = merge::merge(&mut src, &inp, selected)?;
            write_par_file(&output, &src, &EnvelopeOptions { level })?;

            println!("Fields changed  {}", stats.fields_changed);
            println!("Entries added   {}", stats.entries_added);
            println!("Skipped         {}", stats.skipped);
            println!("Written: {}", output.display());
        }

        // ── Entry editing ────────────────────────────────────────────────────
        Commands::Duplicate { input, list, entry, name, output } => {
            let mut par = read_par_file(&input)?;
            let new_name = name.unwrap_or_else(|| suggest_next_name(&entry));
            if par.contains_name(&new_name) {
                warn!("{new_name:?} already exists; the file will hold it twice");
            }
            let (pl, ei) = locate(&mut par, list, &entry)?;
            pl.duplicate_entry(ei, &new_name);
            write_par_file(&output, &par, &EnvelopeOptions::default())?;
            println!("Duplicated {entry:?} as {new_name:?} in List[{list}]");
        }

        Commands::Rename { input, list, entry, name, output } => {
            let mut par = read_par_file(&input)?;
            let (pl, ei) = locate(&mut par, list, &entry)?;
            let fields = pl.entries[ei].rename(&name);
            write_par_file(&output, &par, &EnvelopeOptions::default())?;
            println!("Renamed {entry:?} to {name:?} (+{fields} fields)");
        }

        Commands::Delete { input, list, entry, output } => {
            let mut par = read_par_file(&input)?;
            let (pl, ei) = locate(&mut par, list, &entry)?;
            pl.remove_entry(ei);
            write_par_file(&output, &par, &EnvelopeOptions::default())?;
            println!("Deleted {entry:?} from List[{list}]");
        }

        Commands::Add { input, list, name, output } => {
            let mut par = read_par_file(&input)?;
            let pl = par
                .lists
                .get_mut(list)
                .ok_or_else(|| format!("no List[{list}]"))?;
            let ei = pl.add_entry(&name);
            let fields = pl.entries[ei].fields.len();
            write_par_file(&output, &par, &EnvelopeOptions::default())?;
            println!("Added {name:?} to List[{list}] with {fields} blank fields");
        }
    }
    Ok(())
}

/// The list and index of a named entry.
fn locate<'p>(par: &'p mut ParFile, list: usize, entry: &str) -> Result<(&'p mut ParList, usize), String> {
    let pl = par.lists.get_mut(list).ok_or_else(|| format!("no List[{list}]"))?;
    let ei = pl.position(entry).ok_or_else(|| format!("no entry {entry:?} in List[{list}]"))?;
    Ok((pl, ei))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn differ(labels: &FieldLabels, duplicates: Duplicates) -> Differ<'_> {
    Differ::new(labels).with_options(DiffOptions {
        duplicates: duplicates.into(),
        ..DiffOptions::default()
    })
}

fn print_info(path: &Path, raw_size: u64, par: &ParFile) {
    println!("── .par File ────────────────────────────────────────────");
    println!("  Path           {}", path.display());
    println!("  Size on disk   {} B", raw_size);
    println!("  Version        0x{:X}", par.version);
    println!("  Wrapped        {}", par.was_wrapped);
    if let Some(header) = &par.envelope_header {
        println!("  Wrapper header {} B  {}", header.len(), hex::encode(&header[..header.len().min(16)]));
    }
    if let Some(trailing) = &par.trailing {
        println!("  Trailing data  {} B", trailing.len());
    }
    println!("  Lists          {}", par.lists.len());
    println!("  Entries        {}", par.entry_count());

    for (li, list) in par.lists.iter().enumerate() {
        println!();
        println!("List[{li}]  tags {}/{}  {} entries", list.tag1, list.tag2, list.entries.len());
        for entry in &list.entries {
            println!("  {:<32} {:>3}  {}", entry.name, entry.fields.len(), entry.type_signature());
        }
    }
}

fn print_records(records: &[DiffRecord], with_baseline: bool) {
    for r in records {
        if with_baseline {
            println!(
                "{:<11} {}\n            source {}  input {}  baseline {}",
                r.kind.name(), r.path(), r.source_value, r.input_value, r.baseline_value
            );
        } else {
            println!(
                "{:<11} {}\n            source {}  input {}",
                r.kind.name(), r.path(), r.source_value, r.input_value
            );
        }
    }
}

fn print_counts(records: &[DiffRecord]) {
    let counts = DiffCounts::of(records);
    println!(
        "{} differences: {} changed, {} input only, {} source only",
        counts.total(), counts.changed, counts.input_only, counts.source_only
    );
}
