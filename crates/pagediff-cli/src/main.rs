//! pagediff: compare rasterized pages from the command line.
//!
//! Reads page images (PNG, JPEG, BMP, WebP), runs the comparison
//! pipeline, writes the resulting images into an output directory, and
//! prints a human-readable report or JSON.
//!
//! # Usage
//!
//! ```text
//! pagediff compare before.png after.png --out diff/
//! pagediff pages --doc1 a1.png --doc1 a2.png --doc2 b1.png --doc2 b2.png
//! pagediff realign before.png after.png --rect 40,60,120,80
//! pagediff crop --doc1 a.png --doc2 b.png --polygon '[{"x":0,"y":0},{"x":50,"y":0},{"x":0,"y":50}]'
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pagediff_pipeline::{
    CompareConfig, ComparisonResult, CroppedRegion, Dimensions, Document, ImageRasterizer,
    PartRectangle, PipelineError, PolygonSelection, Rasterizer, RgbImage,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Visual page comparison tolerant of small positional drift.
#[derive(Parser)]
#[command(name = "pagediff", version)]
struct Cli {
    /// Directory the output images are written into.
    #[arg(long, short, global = true, default_value = ".")]
    out: PathBuf,

    /// Print results as JSON instead of a human-readable report.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare two page images.
    Compare {
        /// Reference page.
        image1: PathBuf,
        /// Page compared against the reference.
        image2: PathBuf,
        /// Pad both images to a common size instead of requiring equal sizes.
        #[arg(long)]
        independent: bool,
        #[command(flatten)]
        params: CompareArgs,
    },
    /// Compare two documents page by page.
    Pages {
        /// Page images of the first document, in order.
        #[arg(long = "doc1", required = true)]
        doc1: Vec<PathBuf>,
        /// Page images of the second document, in order.
        #[arg(long = "doc2", required = true)]
        doc2: Vec<PathBuf>,
        #[command(flatten)]
        params: CompareArgs,
    },
    /// Move one part of the second page onto its match in the first, then compare.
    Realign {
        /// Reference page.
        image1: PathBuf,
        /// Page containing the misplaced part.
        image2: PathBuf,
        /// Part rectangle in aligned coordinates, as `x,y,w,h`.
        #[arg(long, value_parser = parse_rect)]
        rect: PartRectangle,
        #[command(flatten)]
        params: CompareArgs,
    },
    /// Crop the same polygon out of both documents.
    Crop {
        #[command(flatten)]
        pages: PageArgs,
        /// Polygon as a JSON list of `{"x": .., "y": ..}` points.
        #[arg(long, value_parser = parse_polygon)]
        polygon: PolygonSelection,
        /// Align the second page onto the first before cropping.
        #[arg(long)]
        same_frame: bool,
    },
    /// Crop each document with its own polygon.
    CropIndependent {
        #[command(flatten)]
        pages: PageArgs,
        /// Polygon for the first document's page.
        #[arg(long, value_parser = parse_polygon)]
        polygon1: PolygonSelection,
        /// Polygon for the second document's page.
        #[arg(long, value_parser = parse_polygon)]
        polygon2: PolygonSelection,
    },
}

/// Comparison parameters shared by every comparing subcommand.
#[derive(Args)]
struct CompareArgs {
    /// Color-distance cutoff (sum of absolute RGB differences).
    #[arg(long, default_value_t = CompareConfig::DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Half-width of the highlight square drawn around each difference.
    #[arg(long, default_value_t = CompareConfig::DEFAULT_BOX_SIZE)]
    box_size: u32,

    /// 3x3 dilation passes before part extraction.
    #[arg(long, default_value_t = CompareConfig::DEFAULT_DILATION_ITERATIONS)]
    dilation_iterations: u32,

    /// Full comparison config as a JSON string.
    ///
    /// When provided, the individual parameter flags are ignored. The
    /// JSON must be a valid `CompareConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Document pages for the crop subcommands.
#[derive(Args)]
struct PageArgs {
    /// Page images of the first document, in order.
    #[arg(long = "doc1", required = true)]
    doc1: Vec<PathBuf>,
    /// Page images of the second document, in order.
    #[arg(long = "doc2", required = true)]
    doc2: Vec<PathBuf>,
    /// 1-based page of the first document to crop from.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    page1: usize,
    /// 1-based page of the second document to crop from.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    page2: usize,
}

/// Build a [`CompareConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_args(args: &CompareArgs) -> Result<CompareConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(CompareConfig {
        threshold: args.threshold,
        box_size: args.box_size,
        dilation_iterations: args.dilation_iterations,
    })
}

fn parse_rect(s: &str) -> Result<PartRectangle, String> {
    let fields: Vec<u32> = s
        .split(',')
        .map(|f| f.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid rectangle {s:?}: {e}"))?;
    match fields.as_slice() {
        &[x, y, w, h] => Ok(PartRectangle::new(x, y, w, h)),
        _ => Err(format!("invalid rectangle {s:?}: expected x,y,w,h")),
    }
}

fn parse_polygon(s: &str) -> Result<PolygonSelection, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid polygon: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagediff=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    std::fs::create_dir_all(&cli.out)
        .map_err(|e| format!("Error creating {}: {e}", cli.out.display()))?;

    match &cli.command {
        Command::Compare {
            image1,
            image2,
            independent,
            params,
        } => {
            let config = config_from_args(params)?;
            let (first, second) = load_pair(image1, image2)?;
            let result = if *independent {
                pagediff_pipeline::compare_independent(&first, &second, &config)
            } else {
                pagediff_pipeline::compare(&first, &second, &config)
            }
            .map_err(|e| format!("Comparison failed: {e}"))?;
            report_comparisons(cli, &[result])
        }
        Command::Pages { doc1, doc2, params } => {
            let config = config_from_args(params)?;
            let first = load_document(doc1)?;
            let second = load_document(doc2)?;
            let results = pagediff_pipeline::compare_pages(first.pages(), second.pages(), &config)
                .map_err(|e| format!("Comparison failed: {e}"))?;
            report_comparisons(cli, &results)
        }
        Command::Realign {
            image1,
            image2,
            rect,
            params,
        } => {
            let config = config_from_args(params)?;
            let (first, second) = load_pair(image1, image2)?;
            let result = pagediff_pipeline::realign_part(&first, &second, *rect, &config)
                .map_err(|e| format!("Realignment failed: {e}"))?;
            report_comparisons(cli, &[result])
        }
        Command::Crop {
            pages,
            polygon,
            same_frame,
        } => {
            let (first, second) = select_pages(pages)?;
            let regions =
                pagediff_pipeline::crop_by_selection(&first, &second, polygon, *same_frame)
                    .map_err(|e| format!("Crop failed: {e}"))?;
            report_crop(cli, &regions)
        }
        Command::CropIndependent {
            pages,
            polygon1,
            polygon2,
        } => {
            let (first, second) = select_pages(pages)?;
            let regions = pagediff_pipeline::crop_by_independent_selections(
                &first, &second, polygon1, polygon2,
            )
            .map_err(|e| format!("Crop failed: {e}"))?;
            report_crop(cli, &regions)
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

/// Decode the first page of two image files concurrently.
fn load_pair(path1: &Path, path2: &Path) -> Result<(RgbImage, RgbImage), String> {
    let (doc1, doc2) =
        pagediff_pipeline::rasterize_pair(&ImageRasterizer, &read_file(path1)?, &read_file(path2)?)
            .map_err(|e| {
                format!(
                    "Error decoding {} / {}: {e}",
                    path1.display(),
                    path2.display()
                )
            })?;
    let first = first_page(doc1)?;
    let second = first_page(doc2)?;
    tracing::debug!(
        first = %Dimensions::of(&first),
        second = %Dimensions::of(&second),
        "loaded pages"
    );
    Ok((first, second))
}

fn first_page(document: Document) -> Result<RgbImage, String> {
    document
        .into_pages()
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::EmptyDocument.to_string())
}

/// Treat a list of page image files as one document.
fn load_document(paths: &[PathBuf]) -> Result<Document, String> {
    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = read_file(path)?;
        let doc = ImageRasterizer
            .rasterize(&bytes)
            .map_err(|e| format!("Error decoding {}: {e}", path.display()))?;
        pages.extend(doc.into_pages());
    }
    Document::from_pages(pages).map_err(|e| e.to_string())
}

fn select_pages(args: &PageArgs) -> Result<(RgbImage, RgbImage), String> {
    let first = load_document(&args.doc1)?;
    let second = load_document(&args.doc2)?;
    let page1 = first
        .page(args.page1 - 1)
        .map_err(|e| format!("--page1: {e}"))?;
    let page2 = second
        .page(args.page2 - 1)
        .map_err(|e| format!("--page2: {e}"))?;
    Ok((page1.clone(), page2.clone()))
}

fn write_png(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    eprintln!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn report_comparisons(cli: &Cli, results: &[ComparisonResult]) -> Result<(), String> {
    let mut summaries = Vec::with_capacity(results.len());
    for result in results {
        let prefix = result
            .page
            .map_or_else(String::new, |page| format!("page{page}-"));
        for (name, image) in [
            ("diff", &result.diff_image),
            ("before", &result.before),
            ("after", &result.after),
        ] {
            let bytes = pagediff_export::encode_png_rgb(image).map_err(|e| e.to_string())?;
            write_png(&cli.out.join(format!("{prefix}{name}.png")), &bytes)?;
        }

        if cli.json {
            summaries.push(json!({
                "page": result.page,
                "shift": result.shift,
                "diff_pixel_count": result.diff_pixel_count,
                "parts": result.parts,
                "diff_image": cli.out.join(format!("{prefix}diff.png")),
            }));
        } else {
            print_report(result);
        }
    }

    if cli.json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{out}");
    }
    Ok(())
}

fn print_report(result: &ComparisonResult) {
    if let Some(page) = result.page {
        println!("Page {page}");
    }
    let dims = result.dimensions();
    println!("  Size:        {dims}");
    println!(
        "  Shift:       dx={:.3} dy={:.3}",
        result.shift.dx, result.shift.dy
    );
    println!("  Differences: {} pixel(s)", result.diff_pixel_count);
    println!("  Parts:       {}", result.parts.len());
    for part in &result.parts {
        println!("    x={} y={} w={} h={}", part.x, part.y, part.w, part.h);
    }
}

fn report_crop(cli: &Cli, regions: &(CroppedRegion, CroppedRegion)) -> Result<(), String> {
    let mut summaries = Vec::with_capacity(2);
    for (name, region) in [("crop1", &regions.0), ("crop2", &regions.1)] {
        let bytes = pagediff_export::encode_png_rgba(&region.image).map_err(|e| e.to_string())?;
        let path = cli.out.join(format!("{name}.png"));
        write_png(&path, &bytes)?;
        summaries.push(json!({
            "image": path,
            "x": region.origin.0,
            "y": region.origin.1,
            "width": region.image.width(),
            "height": region.image.height(),
        }));
        if !cli.json {
            println!(
                "{name}: {}x{} at ({}, {})",
                region.image.width(),
                region.image.height(),
                region.origin.0,
                region.origin.1
            );
        }
    }
    if cli.json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{out}");
    }
    Ok(())
}
