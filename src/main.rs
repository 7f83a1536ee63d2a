use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use svgtrim::{
    BatchItem, CancellationToken, Engine, OptimizationOptions, OptimizationResult,
    DEFAULT_TIMEOUT, analyze, compare, validate,
};

#[derive(Parser)]
#[command(name = "svgtrim")]
#[command(about = "Shrink SVG files without changing how they look", long_about = None)]
struct Cli {
    /// Input files (use - or nothing for stdin)
    inputs: Vec<PathBuf>,

    /// Output file for a single input (default: stdout)
    #[arg(short, long, conflicts_with = "out_dir")]
    output: Option<PathBuf>,

    /// Directory to write optimized files into, one per input
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Preset to start from
    #[arg(short, long, default_value = "moderate")]
    preset: String,

    /// TOML file with extra `[presets.<name>]` tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decimal places kept for coordinates and path data
    #[arg(long)]
    precision: Option<u8>,

    /// Keep comments
    #[arg(long)]
    keep_comments: bool,

    /// Keep whitespace between tags
    #[arg(long)]
    no_minify: bool,

    /// Try to repair malformed input instead of failing
    #[arg(long)]
    recover: bool,

    /// Time budget per document, in milliseconds (implies --recover)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print size comparison
    #[arg(short, long)]
    stats: bool,

    /// Print results as JSON instead of writing SVG to stdout
    #[arg(long)]
    json: bool,

    /// Report document complexity and a recommended preset
    #[arg(long, conflicts_with_all = ["validate", "compare"])]
    analyze: bool,

    /// Check that the inputs are well-formed SVG
    #[arg(long, conflicts_with = "compare")]
    validate: bool,

    /// Compare the input against another SVG for visible differences
    #[arg(long, value_name = "OTHER")]
    compare: Option<PathBuf>,
}

impl Cli {
    /// Per-flag overrides, laid over the chosen preset.
    fn overrides(&self) -> OptimizationOptions {
        OptimizationOptions {
            precision: self.precision,
            remove_comments: self.keep_comments.then_some(false),
            minify: self.no_minify.then_some(false),
            ..OptimizationOptions::default()
        }
    }

    fn inputs(&self) -> Vec<PathBuf> {
        if self.inputs.is_empty() {
            vec![PathBuf::from("-")]
        } else {
            self.inputs.clone()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut engine = Engine::new();
    if let Some(config) = &cli.config {
        engine.presets_mut().load_file(config)?;
    }

    if cli.validate {
        return run_validate(&cli);
    }
    if cli.analyze {
        return run_analyze(&cli);
    }
    if let Some(other) = &cli.compare {
        return run_compare(&cli, other);
    }
    run_optimize(&cli, &engine)
}

fn run_optimize(cli: &Cli, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = cli.inputs();
    if inputs.len() > 1 && cli.output.is_some() {
        return Err("--output takes a single input; use --out-dir for several".into());
    }
    if inputs.len() > 1 && cli.out_dir.is_none() && !cli.json {
        return Err("several inputs need --out-dir or --json".into());
    }

    let preset = engine
        .presets()
        .get(&cli.preset)
        .ok_or_else(|| format!("unknown preset '{}'", cli.preset))?;
    let options = preset.options.merged_with(&cli.overrides());

    let items = inputs
        .iter()
        .map(|path| -> io::Result<BatchItem> {
            Ok(BatchItem::new(display_name(path), read_input(path)?))
        })
        .collect::<io::Result<Vec<_>>>()?;

    let results: Vec<OptimizationResult> = if cli.recover || cli.timeout_ms.is_some() {
        let timeout = cli.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis);
        items
            .iter()
            .map(|item| engine.optimize_guarded(&item.content, &options, timeout))
            .collect()
    } else {
        engine.process_batch(
            &items,
            &options,
            |progress| {
                tracing::debug!(
                    file = %progress.current_file,
                    overall = progress.overall_progress,
                    "progress"
                )
            },
            &CancellationToken::new(),
        )?
    };

    for ((path, item), result) in inputs.iter().zip(&items).zip(&results) {
        match &result.optimized_svg {
            Some(svg) => write_output(cli, path, svg)?,
            None => {
                let details = result.error_details.as_ref();
                eprintln!(
                    "{}: {}",
                    item.name,
                    result.error.as_deref().unwrap_or("optimization failed")
                );
                if let Some(details) = details.filter(|d| d.recoverable) {
                    eprintln!("  hint: {}", details.suggestion);
                }
            }
        }
        if cli.stats && result.success {
            print_stats(&item.name, result);
        }
    }

    if cli.json {
        if results.len() == 1 {
            print_json(&results[0])?;
        } else {
            print_json(&results)?;
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        return Err(format!("{} of {} documents failed", failed, results.len()).into());
    }
    Ok(())
}

fn run_validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut invalid = 0;
    for path in cli.inputs() {
        let name = display_name(&path);
        let result = validate(&read_input(&path)?);
        if !result.is_valid {
            invalid += 1;
        }
        if cli.json {
            print_json(&result)?;
            continue;
        }
        if result.is_valid {
            println!(
                "{}: valid ({} elements, depth {})",
                name, result.structure.element_count, result.structure.max_depth
            );
        } else {
            println!("{}: invalid", name);
        }
        for error in &result.errors {
            println!("  error: {}", error);
        }
        for warning in &result.warnings {
            println!("  warning: {}", warning);
        }
    }
    if invalid > 0 {
        return Err(format!("{} invalid documents", invalid).into());
    }
    Ok(())
}

fn run_analyze(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for path in cli.inputs() {
        let analysis = analyze(&read_input(&path)?);
        if cli.json {
            print_json(&analysis)?;
            continue;
        }
        println!("{}:", display_name(&path));
        println!("  complexity:   {:.1}", analysis.complexity_score);
        println!(
            "  elements:     {} ({} paths, {} bytes of path data)",
            analysis.element_count, analysis.path_count, analysis.path_data_length
        );
        println!("  colors:       {}", analysis.color_count);
        println!("  potential:    {}%", analysis.optimization_potential);
        println!(
            "  recommended:  {}",
            analysis.recommended_strategy.aggressiveness().as_str()
        );
        println!("  estimated:    {:.0} ms", analysis.estimated_processing_time_ms);
    }
    Ok(())
}

fn run_compare(cli: &Cli, other: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = cli.inputs();
    let [input] = inputs.as_slice() else {
        return Err("--compare takes exactly one input".into());
    };
    let comparison = compare(&read_input(input)?, &read_input(other)?)?;

    if cli.json {
        print_json(&comparison)?;
    } else if comparison.has_visible_changes {
        println!(
            "visible changes (score {:.0}, {} significant)",
            comparison.difference_score, comparison.significant_differences
        );
        for difference in &comparison.differences {
            println!("  {}", difference);
        }
    } else {
        println!(
            "no visible changes (score {:.0})",
            comparison.difference_score
        );
    }
    Ok(())
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
    }
}

fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

fn write_output(cli: &Cli, input: &Path, svg: &str) -> io::Result<()> {
    if let Some(dir) = &cli.out_dir {
        fs::create_dir_all(dir)?;
        let name = match input.file_name() {
            Some(name) if input.as_os_str() != "-" => PathBuf::from(name),
            _ => PathBuf::from("stdin.svg"),
        };
        return fs::write(dir.join(name), svg);
    }
    match &cli.output {
        Some(path) if path.as_os_str() != "-" => fs::write(path, svg),
        // JSON output carries the SVG already.
        _ if cli.json => Ok(()),
        _ => io::stdout().write_all(svg.as_bytes()),
    }
}

fn print_stats(name: &str, result: &OptimizationResult) {
    let saved = result.size_reduction();
    let percent = if result.original_size > 0 {
        (saved as f64 / result.original_size as f64) * 100.0
    } else {
        0.0
    };
    eprintln!(
        "{}: {} -> {} bytes ({:.1}% smaller, {:.1} ms)",
        name, result.original_size, result.optimized_size, percent, result.processing_time_ms
    );
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
