use std::env;
use std::path::{Path, PathBuf};

use copystat::config::Config;
use copystat::coordinator::job_scratch_dir;
use copystat::error::{CsError, CsResult};
use copystat::ground_truth::GroundTruthExtractor;
use copystat::index::CandidateIndex;
use copystat::marc::MarcLoader;
use copystat::refdata::{JsonlLoader, ReferenceLoader, YearFilter};
use copystat::results::{AnalysisResults, Exporter, JsonExporter};
use copystat::signals::TempRegistry;

const DEFAULT_OUTPUT: &str = "ground_truth.json";

struct GroundTruthOptions {
    marc_path: String,
    registration: Option<String>,
    renewal: Option<String>,
    output: String,
    temp_dir: PathBuf,
}

fn main() {
    let (options, config) = match read_options() {
        Some(v) => v,
        None => return,
    };

    if let Err(e) = run(&options, &config) {
        eprintln!("Ground-truth extraction failed: {e}");
        std::process::exit(1);
    }
}

fn read_options() -> Option<(GroundTruthOptions, Config)> {
    let args: Vec<String> = env::args().collect();
    let mut opts = getopts::Options::new();

    opts.optopt("", "marc-xml", "MARC XML file or directory", "PATH");
    opts.optopt("", "registration", "Registration corpus (JSON lines)", "FILE");
    opts.optopt("", "renewal", "Renewal corpus (JSON lines)", "FILE");
    opts.optopt("", "output", "Output JSON path", "FILE");
    opts.optopt("", "temp-dir", "Scratch space for batch files", "DIR");
    opts.optopt("", "batch-size", "Records per batch", "N");
    opts.optflag("h", "help", "Show this help");
    opts.optflag("v", "verbose", "Verbose logging");

    let params = match opts.parse(&args[1..]) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid options: {e}");
            return None;
        }
    };

    if params.opt_present("help") {
        print_help(&opts);
        return None;
    }

    let mut builder = env_logger::Builder::from_default_env();
    if params.opt_present("verbose") {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let marc_path = match params.opt_str("marc-xml") {
        Some(p) => p,
        None => {
            eprintln!("--marc-xml is required");
            print_help(&opts);
            return None;
        }
    };

    let mut config = Config::default();
    if let Ok(Some(n)) = params.opt_get::<usize>("batch-size") {
        config.batch_size = n;
    }

    Some((
        GroundTruthOptions {
            marc_path,
            registration: params.opt_str("registration"),
            renewal: params.opt_str("renewal"),
            output: params
                .opt_str("output")
                .unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            temp_dir: params
                .opt_str("temp-dir")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        },
        config,
    ))
}

fn load_index(path: Option<&str>, label: &str) -> CsResult<CandidateIndex> {
    let mut index = CandidateIndex::new();
    if let Some(path) = path {
        let mut loader = JsonlLoader::new(path, label);
        for publication in loader.load(&YearFilter::default())? {
            index.add(publication);
        }
    }
    Ok(index)
}

fn run(options: &GroundTruthOptions, config: &Config) -> CsResult<()> {
    let registration = load_index(options.registration.as_deref(), "REG")?;
    let renewal = load_index(options.renewal.as_deref(), "REN")?;

    if registration.is_empty() && renewal.is_empty() {
        return Err(CsError::Message(
            "at least one of --registration / --renewal is required".to_string(),
        ));
    }

    let temp = TempRegistry::new();
    let batch_dir = job_scratch_dir(&options.temp_dir, "gt-batches");
    temp.register(&batch_dir);

    let loader = MarcLoader::new(&options.marc_path, config);
    let extraction = loader.extract_to_dir(&batch_dir)?;

    let extractor = GroundTruthExtractor::new(&registration, &renewal);
    let outcome = extractor.extract_from_batches(&extraction.batch_paths);
    temp.cleanup();
    let (pairs, stats) = outcome?;

    let mut results = AnalysisResults::new();
    for pair in pairs {
        results.push(pair);
    }

    JsonExporter {
        single_file: true,
        pretty: true,
    }
    .export(&results, Path::new(&options.output))?;

    println!("MARC records:            {}", stats.marc_total);
    println!("  with LCCN:             {}", stats.marc_with_lccn);
    println!("Registration pairs:      {}", stats.registration_matches);
    println!("Renewal pairs:           {}", stats.renewal_matches);
    println!("Unique LCCNs matched:    {}", stats.unique_lccns_matched);
    println!("Pairs written to {}", options.output);

    Ok(())
}

fn print_help(opts: &getopts::Options) {
    println!(
        "{}",
        opts.usage(
            r#"Extract identifier-matched MARC/reference pairs for matcher evaluation.

Usage:
    copystat-ground-truth --marc-xml PATH --registration REG.jsonl [--renewal REN.jsonl] [options]"#
        )
    );
}
