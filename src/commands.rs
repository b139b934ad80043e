//! Subcommand implementations for the `earpatch` binary
//!
//! Each command opens the archive with options derived from the global flags,
//! runs one library operation, and prints its result. Long-running rewrites
//! show a spinner unless `-q` is given.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use crate::archive::{Archive, ArchiveOptions, DEFAULT_COMPRESSION_LEVEL, Verbosity};
use crate::args::{Args, Command, PropCommand, Scope, Selection};
use crate::descriptor::{Configurable, Document, EmbeddedDescriptor};
use crate::list::display_listing;
use crate::matcher::{GlobMatcher, Matcher};
use crate::output::DirectoryOutput;
use crate::replacement::ReplacementSet;
use crate::utils::format_size;

/// Archive options for the global `-q`, `-v` and `--level` flags.
pub fn archive_options(args: &Args) -> ArchiveOptions {
    let verbosity = match (args.quiet, args.verbose) {
        (q, _) if q > 0 => Verbosity::Quiet,
        (_, 0) => Verbosity::Normal,
        _ => Verbosity::Verbose,
    };
    ArchiveOptions {
        verbosity,
        compression_level: args.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
    }
}

/// Execute the parsed command line.
pub fn run(args: &Args) -> Result<()> {
    let options = archive_options(args);
    let open = |path: &Path| Archive::with_options(path, options);

    match &args.command {
        Command::List {
            archive,
            long,
            select,
        } => list(&open(archive), *long, select),
        Command::Extract {
            archive,
            output_dir,
            overwrite,
            junk_paths,
            no_timestamps,
            select,
        } => {
            let out = DirectoryOutput::new(output_dir.clone().unwrap_or_else(|| ".".into()))
                .overwrite(*overwrite)
                .flatten(*junk_paths)
                .preserve_timestamps(!*no_timestamps);
            extract(&open(archive), out, select, args.quiet)
        },
        Command::Cat { archive, path } => cat(&open(archive), path),
        Command::Replace {
            archive,
            files,
            texts,
            optional,
        } => {
            let mut replacements = ReplacementSet::new();
            for (path, source) in files {
                replacements.add_file(path.as_str(), source.as_str(), !optional);
            }
            for (path, text) in texts {
                replacements.add_bytes(path.as_str(), text.as_str(), !optional);
            }
            if replacements.is_empty() {
                bail!("Nothing to replace: give PATH=FILE or --text PATH=TEXT");
            }
            replace(&open(archive), &mut replacements, args.quiet)
        },
        Command::Recompress { archive } => {
            recompress(&open(archive), options.compression_level, args.quiet)
        },
        Command::Verify { archive, select } => verify(&open(archive), select, args.quiet),
        Command::Prop { action } => match action {
            PropCommand::Get {
                archive,
                descriptor,
                names,
                scope,
            } => prop_get(open(archive), descriptor, names, scope),
            PropCommand::Set {
                archive,
                descriptor,
                assignments,
                scope,
            } => prop_set(open(archive), descriptor, assignments, scope, args.quiet),
        },
    }
}

fn list(archive: &Archive, long: bool, select: &Selection) -> Result<()> {
    let selection = Selector::new(select);
    let entries: Vec<_> = archive
        .list()
        .with_context(|| format!("Failed to list {}", archive.path().display()))?
        .into_iter()
        .filter(|e| selection.matches(&e.path))
        .collect();
    display_listing(&entries, long);
    Ok(())
}

fn extract(
    archive: &Archive,
    mut out: DirectoryOutput,
    select: &Selection,
    quiet: u8,
) -> Result<()> {
    let selection = Selector::new(select);
    let progress = spinner(quiet, format!("Extracting {}", archive.path().display()))?;
    let result = archive.expand(&[&selection], &mut out);
    finish(progress);
    result.with_context(|| format!("Failed to extract {}", archive.path().display()))?;

    if quiet == 0 {
        println!("Extracted {} files", out.written());
        if out.skipped() > 0 {
            println!("Skipped {} existing files", out.skipped());
        }
    }
    Ok(())
}

fn cat(archive: &Archive, path: &str) -> Result<()> {
    let Some(bytes) = archive.fetch_file(path)? else {
        bail!("No entry matching {} in {}", path, archive.path().display());
    };
    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

fn replace(archive: &Archive, replacements: &mut ReplacementSet, quiet: u8) -> Result<()> {
    let progress = spinner(quiet, format!("Updating {}", archive.path().display()))?;
    let result = archive.update(replacements);
    finish(progress);
    let stats = result.with_context(|| format!("Failed to update {}", archive.path().display()))?;

    if quiet == 0 {
        println!(
            "Replaced {} of {} entries in {} ({} nested archives rewritten)",
            stats.replaced,
            replacements.len(),
            archive.path().display(),
            stats.nested_rewritten
        );
    }
    Ok(())
}

fn recompress(archive: &Archive, level: u32, quiet: u8) -> Result<()> {
    let progress = spinner(quiet, format!("Recompressing {}", archive.path().display()))?;
    let result = archive.recompress(level);
    finish(progress);
    let report =
        result.with_context(|| format!("Failed to recompress {}", archive.path().display()))?;

    if quiet == 0 {
        println!(
            "{}: {} -> {} ({} entries, {} nested archives)",
            archive.path().display(),
            format_size(report.before),
            format_size(report.after),
            report.stats.recompressed,
            report.stats.nested_rewritten
        );
    }
    Ok(())
}

fn verify(archive: &Archive, select: &Selection, quiet: u8) -> Result<()> {
    let selection = Selector::new(select);
    let progress = spinner(quiet, format!("Testing {}", archive.path().display()))?;
    let result = archive.verify(&[&selection]);
    finish(progress);
    let report = result.with_context(|| format!("Failed to test {}", archive.path().display()))?;

    for (path, reason) in &report.failures {
        if quiet < 2 {
            eprintln!("error: {} - {}", path, reason);
        }
    }

    if quiet < 2 {
        if report.is_ok() {
            println!(
                "No errors detected in compressed data of {}.  {} files tested.",
                archive.path().display(),
                report.tested
            );
        } else {
            println!(
                "{} error(s) detected in {}.  {} files tested.",
                report.failures.len(),
                archive.path().display(),
                report.tested
            );
        }
    }

    if !report.is_ok() {
        bail!("Archive test failed with {} errors", report.failures.len());
    }
    Ok(())
}

fn prop_get(archive: Archive, descriptor: &str, names: &[String], scope: &Scope) -> Result<()> {
    let mut descriptors = EmbeddedDescriptor::new(archive);
    let document = descriptors.document(descriptor)?;
    let properties = scoped(document, scope)?;

    let names = if names.is_empty() {
        properties.names()
    } else {
        names.to_vec()
    };
    for name in names {
        match properties.get_param(&name) {
            Some(value) => println!("{name}={value}"),
            None => println!("{name} (not set)"),
        }
    }
    Ok(())
}

fn prop_set(
    archive: Archive,
    descriptor: &str,
    assignments: &[(String, String)],
    scope: &Scope,
    quiet: u8,
) -> Result<()> {
    let mut descriptors = EmbeddedDescriptor::new(archive);
    {
        let document = descriptors.document(descriptor)?;
        let mut properties = scoped(document, scope)?;
        for (name, value) in assignments {
            properties.set_param(name, value)?;
        }
    }

    descriptors
        .update()
        .with_context(|| format!("Failed to write {}", descriptor))?;
    if quiet == 0 {
        println!("Updated {} properties in {}", assignments.len(), descriptor);
    }
    Ok(())
}

fn scoped<'d>(document: &'d mut Document, scope: &Scope) -> Result<Configurable<'d>> {
    let properties = match (&scope.outbound, &scope.activation) {
        (Some(interface), _) => Configurable::outbound(document, interface.as_deref())?,
        (None, Some(ejb_name)) => Configurable::activation_config(document, ejb_name)?,
        (None, None) => Configurable::resource_adapter(document)?,
    };
    Ok(properties)
}

/// Include patterns (any, default all) minus exclude patterns.
struct Selector {
    include: Vec<GlobMatcher>,
    exclude: Vec<GlobMatcher>,
}

impl Selector {
    fn new(select: &Selection) -> Self {
        Self {
            include: select.patterns.iter().map(GlobMatcher::new).collect(),
            exclude: select.exclude.iter().map(GlobMatcher::new).collect(),
        }
    }
}

impl Matcher for Selector {
    fn matches(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|m| m.matches(path));
        included && !self.exclude.iter().any(|m| m.matches(path))
    }
}

fn spinner(quiet: u8, message: String) -> Result<Option<ProgressBar>> {
    if quiet > 0 {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

fn finish(progress: Option<ProgressBar>) {
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
}
