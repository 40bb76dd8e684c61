//! File-level harness around the pipeline.
//!
//! The pipeline itself only sees byte buffers. This module reads inputs from
//! disk, writes both variants next to each other in an output directory, and
//! fans a directory tree out over the rayon pool.
//!
//! ## Output Structure
//!
//! ```text
//! out/
//! ├── beach.jpg           # display variant
//! ├── beach-thumb.jpg     # thumbnail
//! ├── party.gif           # GIF display variant, copied byte-for-byte
//! ├── party-thumb.jpg
//! └── 2024/               # input subdirectories are mirrored
//!     └── ...
//! ```
//!
//! ## Parallel Processing
//!
//! Every file is an independent pipeline invocation with its own decoded
//! handle, so [`process_batch`] runs them with `par_iter`. One failing file
//! does not stop the others; each result is reported separately.

use crate::imaging::{Dimensions, ImageBackend, SourceFormat, supported_input_extensions};
use crate::naming::{file_stem, has_extension, output_names};
use crate::pipeline::{PipelineConfig, ProcessError, ProcessEvent, ProcessedImage, process_image};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Process {
        path: PathBuf,
        source: ProcessError,
    },
    #[error("{}: refusing to overwrite the input with {}", path.display(), output.display())]
    WouldOverwriteInput { path: PathBuf, output: PathBuf },
    #[error("{}: output names already used by {}", path.display(), first.display())]
    DuplicateOutput { path: PathBuf, first: PathBuf },
}

impl BatchError {
    /// The input file the error belongs to.
    pub fn path(&self) -> &Path {
        match self {
            BatchError::Io { path, .. }
            | BatchError::Process { path, .. }
            | BatchError::WouldOverwriteInput { path, .. }
            | BatchError::DuplicateOutput { path, .. } => path,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What was written for one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub source_format: SourceFormat,
    pub original: Dimensions,
    pub main: Dimensions,
    pub main_path: PathBuf,
    pub main_passed_through: bool,
    pub thumbnail: Dimensions,
    pub thumbnail_path: PathBuf,
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write both variants of `processed` into `out_dir`, named after `input`.
///
/// Fails before writing anything if either output would replace `input`.
pub fn write_outputs(
    input: &Path,
    out_dir: &Path,
    processed: &ProcessedImage,
) -> Result<(PathBuf, PathBuf), BatchError> {
    let names = output_names(input, &processed.main, processed.thumbnail.format);
    let main_path = out_dir.join(&names.main);
    let thumbnail_path = out_dir.join(&names.thumbnail);

    for output in [&main_path, &thumbnail_path] {
        if is_same_file(input, output) {
            return Err(BatchError::WouldOverwriteInput {
                path: input.to_path_buf(),
                output: output.clone(),
            });
        }
    }

    std::fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;
    std::fs::write(&main_path, processed.main.bytes()).map_err(io_error(&main_path))?;
    std::fs::write(&thumbnail_path, &processed.thumbnail.bytes)
        .map_err(io_error(&thumbnail_path))?;

    Ok((main_path, thumbnail_path))
}

/// Read one file, run the pipeline on it, and write the results.
///
/// Nothing is written when the pipeline fails.
pub fn process_file<B: ImageBackend>(
    backend: &B,
    input: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<FileReport, BatchError> {
    let blob = std::fs::read(input).map_err(io_error(input))?;
    let processed =
        process_image(backend, &blob, config, events).map_err(|source| BatchError::Process {
            path: input.to_path_buf(),
            source,
        })?;
    let (main_path, thumbnail_path) = write_outputs(input, out_dir, &processed)?;

    Ok(FileReport {
        input: input.to_path_buf(),
        source_format: processed.source_format,
        original: processed.original,
        main: processed.main.dimensions(),
        main_path,
        main_passed_through: matches!(
            processed.main,
            crate::pipeline::MainOutput::PassThrough { .. }
        ),
        thumbnail: processed.thumbnail.dimensions,
        thumbnail_path,
    })
}

/// A directory below the walk root that resolves to `excluded`.
fn is_excluded(entry: &DirEntry, excluded: Option<&Path>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && excluded.is_some_and(|ex| entry.path().canonicalize().is_ok_and(|p| p == ex))
}

/// All files under `root` with a supported image extension, sorted by path.
///
/// Nothing under `out_dir` is collected, so outputs written inside `root`
/// are not picked up again by the next run.
pub fn collect_inputs(root: &Path, out_dir: &Path) -> Vec<PathBuf> {
    let excluded = out_dir.canonicalize().ok();
    let mut inputs: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, excluded.as_deref()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, supported_input_extensions()))
        .collect();
    inputs.sort();
    inputs
}

/// Pick the output directory of every input, in order.
///
/// Each input claims the base names `<stem>` and `<stem>-thumb` in its output
/// directory. An input whose names are already claimed by an earlier one
/// gets [`BatchError::DuplicateOutput`] instead of a directory.
fn assign_outputs(
    root: &Path,
    out_dir: &Path,
    inputs: Vec<PathBuf>,
) -> Vec<(PathBuf, Result<PathBuf, BatchError>)> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    inputs
        .into_iter()
        .map(|input| {
            let relative_dir = input
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .unwrap_or(Path::new(""));
            let target = out_dir.join(relative_dir);
            let stem = file_stem(&input);
            let bases = [target.join(&stem), target.join(format!("{}-thumb", stem))];

            if let Some(first) = bases.iter().find_map(|base| claimed.get(base)) {
                let err = BatchError::DuplicateOutput {
                    path: input.clone(),
                    first: first.clone(),
                };
                return (input, Err(err));
            }
            for base in bases {
                claimed.insert(base, input.clone());
            }
            (input, Ok(target))
        })
        .collect()
}

/// Process every supported image under `root` in parallel.
///
/// Results come back in input order. Subdirectories of `root` are recreated
/// under `out_dir`. Inputs that would write the same output names as an
/// earlier input fail without being processed.
pub fn process_batch<B: ImageBackend>(
    backend: &B,
    root: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
) -> Vec<Result<FileReport, BatchError>> {
    let inputs = collect_inputs(root, out_dir);
    log::info!("found {} images under {}", inputs.len(), root.display());

    assign_outputs(root, out_dir, inputs)
        .into_par_iter()
        .map(|(input, target)| {
            let result = target
                .and_then(|dir| process_file(backend, &input, &dir, config, None));
            if let Err(e) = &result {
                log::warn!("{}", e);
            }
            result
        })
        .collect()
}

/// One entry of the JSON report written by `batch --report`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportEntry<'a> {
    Ok(&'a FileReport),
    Failed { input: &'a Path, error: String },
}

impl<'a> From<&'a Result<FileReport, BatchError>> for ReportEntry<'a> {
    fn from(result: &'a Result<FileReport, BatchError>) -> Self {
        match result {
            Ok(report) => ReportEntry::Ok(report),
            Err(e) => ReportEntry::Failed {
                input: e.path(),
                error: e.to_string(),
            },
        }
    }
}

/// Write batch results as pretty-printed JSON.
pub fn write_report(
    path: &Path,
    results: &[Result<FileReport, BatchError>],
) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<ReportEntry> = results.iter().map(ReportEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json)?;
    Ok(())
}
