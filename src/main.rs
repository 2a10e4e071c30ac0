//! alnstore: query and export whole-genome multiple sequence alignments.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use alnstore::{
    AlignDb, Config, FeatureDb, Genome, SequenceDb, WriteOptions, write_alignments,
};

/// Storage and retrieval of whole-genome multiple sequence alignments.
#[derive(Parser, Debug)]
#[command(name = "alnstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize an alignment database.
    Show {
        /// Path to the alignment database.
        #[arg(value_name = "ALIGN_DB")]
        align_db: PathBuf,

        /// Emit the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Materialize alignments to FASTA files.
    Export {
        /// Path to the alignment database.
        #[arg(long)]
        align_db: PathBuf,

        /// Directory holding per-species genome stores
        /// (`<species>.seqs.db`, optional `<species>.gff3`).
        #[arg(long)]
        genomes: PathBuf,

        /// Reference species for the query coordinates.
        #[arg(long = "ref")]
        ref_species: String,

        /// Output directory.
        #[arg(long)]
        outdir: PathBuf,

        /// Maximum number of alignments to write.
        #[arg(long)]
        limit: Option<usize>,

        /// Mask features of these biotypes in the output.
        #[arg(long = "mask")]
        mask_features: Vec<String>,

        /// Restrict output to alignments overlapping these stable IDs.
        #[arg(long = "stableid")]
        stableids: Vec<String>,
    },
    /// Write the default resource configuration to a directory.
    Exportrc {
        #[arg(value_name = "OUTDIR")]
        outdir: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Show { align_db, json } => show(&align_db, json),
        Command::Export {
            align_db,
            genomes,
            ref_species,
            outdir,
            limit,
            mask_features,
            stableids,
        } => export(
            &align_db,
            &genomes,
            &ref_species,
            &outdir,
            limit,
            mask_features,
            stableids,
        ),
        Command::Exportrc { outdir } => {
            let path = Config::write_default(&outdir)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    records: i64,
    /// Species name to number of distinct seqids.
    species: BTreeMap<String, usize>,
}

fn show(path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let db = AlignDb::open(path)?;
    let mut species = BTreeMap::new();
    for name in db.get_species_names()? {
        let seqids = db.get_distinct_seqids(&name)?;
        species.insert(name, seqids.len());
    }
    let summary = Summary {
        records: db.num_records()?,
        species,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("records: {}", summary.records);
        for (name, count) in &summary.species {
            println!("{name}: {count} seqids");
        }
    }
    Ok(())
}

fn export(
    align_db: &Path,
    genomes_dir: &Path,
    ref_species: &str,
    outdir: &Path,
    limit: Option<usize>,
    mask_features: Vec<String>,
    stableids: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let db = AlignDb::open(align_db)?;
    let mut genomes = HashMap::new();
    for species in db.get_species_names()? {
        let seqs = SequenceDb::open(&genomes_dir.join(format!("{species}.seqs.db")), &species)?;
        let gff_path = genomes_dir.join(format!("{species}.gff3"));
        let annots = gff_path
            .exists()
            .then(|| FeatureDb::from_gff3(&gff_path))
            .transpose()?;
        genomes.insert(species.clone(), Genome::new(&species, seqs, annots));
    }
    let options = WriteOptions {
        limit,
        mask_features: (!mask_features.is_empty()).then_some(mask_features),
        stableids: (!stableids.is_empty()).then_some(stableids),
        show_progress: true,
    };
    let written = write_alignments(&db, &genomes, outdir, ref_species, &options)?;
    println!("wrote {written} alignments to {}", outdir.display());
    Ok(())
}
