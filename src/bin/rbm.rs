use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rlbwt_matcher::{
    DocArray, FileHeader, GrammarText, IndexFlavor, MsIndex, MsMatcher, PmlIndex,
    ReferenceBuilder,
};

/// Build and query run-length BWT matching-statistics indexes.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Build index files from raw reference documents.
    Build {
        /// Reference files (raw bytes), one document each, in id order
        #[arg(short, long, required = true, num_args = 1..)]
        reference: Vec<PathBuf>,

        /// Output prefix; writes `<prefix>.pml` or `<prefix>.ms` + `<prefix>.ra`
        #[arg(short, long)]
        output: PathBuf,

        /// Build the MS flavor (SA samples + random access) instead of PML
        #[arg(long)]
        ms: bool,

        /// Also write the document array to `<prefix>.docs`
        #[arg(long)]
        docs: bool,

        /// Separator byte between documents
        #[arg(long, default_value_t = b'$')]
        separator: u8,
    },
    /// Compute lengths (and MS pointers) for a file of patterns.
    Query {
        /// Index file; the flavor is read from its header
        #[arg(short, long)]
        index: PathBuf,

        /// Random-access file (MS flavor; defaults to the index path with `.ra`)
        #[arg(long)]
        random_access: Option<PathBuf>,

        /// Document-array file; enables per-position document output
        #[arg(long)]
        doc_array: Option<PathBuf>,

        /// Pattern file, one byte pattern per line
        #[arg(short, long)]
        patterns: PathBuf,

        /// Output prefix; writes `<prefix>.lengths` (+ `.pointers`, `.documents`)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    match Args::parse().cmd {
        Cmd::Build {
            reference,
            output,
            ms,
            docs,
            separator,
        } => build(&reference, &output, ms, docs, separator),
        Cmd::Query {
            index,
            random_access,
            doc_array,
            patterns,
            output,
        } => query(&index, random_access, doc_array, &patterns, &output),
    }
}

fn build(reference: &[PathBuf], output: &Path, ms: bool, docs: bool, separator: u8) -> Result<()> {
    let mut builder = ReferenceBuilder::new().separator(separator);
    for path in reference {
        let mut bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        while bytes.last() == Some(&b'\n') || bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        builder = builder.document(&bytes);
    }
    let built = builder.build()?;

    if ms {
        let index = built.ms_index()?;
        let path = output.with_extension("ms");
        let written = index.store_path(&path)?;
        eprintln!("[rbm] wrote {} ({written} bytes)", path.display());
        for (name, bytes) in index.component_sizes()? {
            eprintln!("[rbm]   {name}: {bytes} bytes");
        }
        let ra = built.grammar()?;
        let ra_path = output.with_extension("ra");
        let mut w = BufWriter::new(File::create(&ra_path)?);
        let written = ra.serialize(&mut w)?;
        w.flush()?;
        eprintln!(
            "[rbm] wrote {} ({written} bytes, {} rules)",
            ra_path.display(),
            ra.num_rules()
        );
    } else {
        let index = built.pml_index()?;
        let path = output.with_extension("pml");
        let written = index.store_path(&path)?;
        eprintln!("[rbm] wrote {} ({written} bytes)", path.display());
        for (name, bytes) in index.component_sizes()? {
            eprintln!("[rbm]   {name}: {bytes} bytes");
        }
    }

    if docs {
        let doc_array = built.doc_array()?;
        let path = output.with_extension("docs");
        let mut w = BufWriter::new(File::create(&path)?);
        let written = doc_array.serialize(&mut w)?;
        w.flush()?;
        eprintln!("[rbm] wrote {} ({written} bytes)", path.display());
    }
    Ok(())
}

fn query(
    index_path: &Path,
    random_access: Option<PathBuf>,
    doc_array: Option<PathBuf>,
    patterns_path: &Path,
    output: &Path,
) -> Result<()> {
    let flavor = sniff_flavor(index_path)?;
    let patterns = read_patterns(patterns_path)?;
    eprintln!(
        "[rbm] {} patterns against {} ({:?} index)",
        patterns.len(),
        index_path.display(),
        flavor
    );

    match flavor {
        IndexFlavor::Pml => {
            let index = PmlIndex::load_path(index_path)?;
            let docs = load_docs(doc_array.as_deref(), index.bwt_stats().1)?;
            let results: Vec<(Vec<u64>, Vec<u64>)> = patterns
                .par_iter()
                .map(|p| match &docs {
                    Some(d) => index.query_doc(p, d),
                    None => (index.query(p), Vec::new()),
                })
                .collect();
            write_column(&output.with_extension("lengths"), results.iter().map(|r| &r.0))?;
            if docs.is_some() {
                write_column(&output.with_extension("documents"), results.iter().map(|r| &r.1))?;
            }
        }
        IndexFlavor::Ms => {
            let ra_path = random_access.unwrap_or_else(|| index_path.with_extension("ra"));
            let ra_file = File::open(&ra_path)
                .with_context(|| format!("opening random access {}", ra_path.display()))?;
            let text = GrammarText::load(&mut BufReader::new(ra_file))?;
            let matcher = MsMatcher::new(MsIndex::load_path(index_path)?, text)?;
            let docs = load_docs(doc_array.as_deref(), matcher.index().bwt_stats().1)?;
            let results: Vec<(Vec<u64>, Vec<u64>, Vec<u64>)> = patterns
                .par_iter()
                .map(|p| match &docs {
                    Some(d) => matcher.query_doc(p, d),
                    None => {
                        let (lengths, pointers) = matcher.query(p);
                        (lengths, pointers, Vec::new())
                    }
                })
                .collect();
            write_column(&output.with_extension("lengths"), results.iter().map(|r| &r.0))?;
            write_column(&output.with_extension("pointers"), results.iter().map(|r| &r.1))?;
            if docs.is_some() {
                write_column(&output.with_extension("documents"), results.iter().map(|r| &r.2))?;
            }
        }
    }
    Ok(())
}

fn sniff_flavor(path: &Path) -> Result<IndexFlavor> {
    let file = File::open(path).with_context(|| format!("opening index {}", path.display()))?;
    let header = FileHeader::read_from(&mut BufReader::new(file))
        .with_context(|| format!("reading header of {}", path.display()))?;
    Ok(header.flavor)
}

fn read_patterns(path: &Path) -> Result<Vec<Vec<u8>>> {
    let file = File::open(path).with_context(|| format!("opening patterns {}", path.display()))?;
    let mut patterns = Vec::new();
    for line in BufReader::new(file).split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        patterns.push(line);
    }
    if patterns.is_empty() {
        bail!("no patterns in {}", path.display());
    }
    Ok(patterns)
}

fn load_docs(path: Option<&Path>, num_runs: usize) -> Result<Option<DocArray>> {
    match path {
        None => Ok(None),
        Some(p) => {
            let file = File::open(p).with_context(|| format!("opening documents {}", p.display()))?;
            Ok(Some(DocArray::load(&mut BufReader::new(file), num_runs)?))
        }
    }
}

fn write_column<'a>(
    path: &Path,
    rows: impl Iterator<Item = &'a Vec<u64>>,
) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for row in rows {
        let mut first = true;
        for v in row {
            if !first {
                write!(w, " ")?;
            }
            write!(w, "{v}")?;
            first = false;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}
