use std::env;
use std::path::{Path, PathBuf};

use copystat::cache::ArtifactCache;
use copystat::config::Config;
use copystat::coordinator::{job_scratch_dir, BatchCoordinator};
use copystat::error::{CsError, CsResult};
use copystat::generic::GenericTitleDetector;
use copystat::index::CandidateIndex;
use copystat::marc::MarcLoader;
use copystat::pool::WorkerContext;
use copystat::publication::Publication;
use copystat::refdata::{JsonlLoader, ReferenceLoader, YearFilter};
use copystat::results::{Exporter, JsonExporter};
use copystat::signals::TempRegistry;

const DEFAULT_OUTPUT: &str = "matches.json";
const DEFAULT_CACHE_DIR: &str = ".copystat-cache";

struct AnalyzeOptions {
    marc_path: String,
    registration: Option<String>,
    renewal: Option<String>,
    output: String,
    cache_dir: String,
    temp_dir: PathBuf,
    force_refresh: bool,
    single_file: bool,
}

fn main() {
    let (options, config) = match read_options() {
        Some(v) => v,
        None => return,
    };

    if let Err(e) = run(&options, config) {
        eprintln!("Analysis failed: {e}");
        std::process::exit(1);
    }
}

fn read_options() -> Option<(AnalyzeOptions, Config)> {
    let args: Vec<String> = env::args().collect();
    let mut opts = getopts::Options::new();

    opts.optopt("", "marc-xml", "MARC XML file or directory", "PATH");
    opts.optopt("", "registration", "Registration corpus (JSON lines)", "FILE");
    opts.optopt("", "renewal", "Renewal corpus (JSON lines)", "FILE");
    opts.optopt("", "config", "Configuration JSON file", "FILE");
    opts.optopt("", "output", "Output JSON path", "FILE");
    opts.optopt("", "cache-dir", "Artifact cache directory", "DIR");
    opts.optopt("", "temp-dir", "Scratch space for batch files", "DIR");

    opts.optopt("", "batch-size", "Records per batch", "N");
    opts.optopt("", "processes", "Worker pool size", "N");
    opts.optopt("", "min-year", "Minimum publication year", "YEAR");
    opts.optopt("", "max-year", "Maximum publication year", "YEAR");
    opts.optopt("", "expiration-year", "Copyright expiration year", "YEAR");
    opts.optopt("", "max-data-year", "Latest year covered by the corpora", "YEAR");
    opts.optopt("", "min-combined-score", "Combined-score floor (score-everything)", "N");

    opts.optflag("", "us-only", "Keep only US records at load time");
    opts.optflag("", "score-everything", "Compute all scores, skip strict gates");
    opts.optflag("", "brute-force-missing-year", "Match records with no year");
    opts.optflag("", "force-refresh", "Discard all cached artifacts");
    opts.optflag("", "single-file", "One output file instead of per-status files");
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

    init_logging(params.opt_present("verbose"));

    let marc_path = match params.opt_str("marc-xml") {
        Some(p) => p,
        None => {
            eprintln!("--marc-xml is required");
            print_help(&opts);
            return None;
        }
    };

    let mut config = match params.opt_str("config") {
        Some(path) => match Config::from_file(Path::new(&path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                return None;
            }
        },
        None => Config::default(),
    };

    // Command line overrides the config file.
    if let Ok(Some(n)) = params.opt_get::<usize>("batch-size") {
        config.batch_size = n;
    }
    if let Ok(Some(n)) = params.opt_get::<usize>("processes") {
        config.num_processes = Some(n);
    }
    if let Ok(Some(y)) = params.opt_get::<i32>("min-year") {
        config.min_year = Some(y);
    }
    if let Ok(Some(y)) = params.opt_get::<i32>("max-year") {
        config.max_year = Some(y);
    }
    if let Ok(Some(y)) = params.opt_get::<i32>("expiration-year") {
        config.copyright_expiration_year = Some(y);
    }
    if let Ok(Some(y)) = params.opt_get::<i32>("max-data-year") {
        config.max_data_year = Some(y);
    }
    if let Ok(Some(s)) = params.opt_get::<f64>("min-combined-score") {
        config.minimum_combined_score = Some(s);
    }
    if params.opt_present("us-only") {
        config.us_only = true;
    }
    if params.opt_present("score-everything") {
        config.score_everything = true;
    }
    if params.opt_present("brute-force-missing-year") {
        config.brute_force_missing_year = true;
    }

    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return None;
    }

    let temp_dir = params
        .opt_str("temp-dir")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);

    Some((
        AnalyzeOptions {
            marc_path,
            registration: params.opt_str("registration"),
            renewal: params.opt_str("renewal"),
            output: params
                .opt_str("output")
                .unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            cache_dir: params
                .opt_str("cache-dir")
                .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            temp_dir,
            force_refresh: params.opt_present("force-refresh"),
            single_file: params.opt_present("single-file"),
        },
        config,
    ))
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn run(options: &AnalyzeOptions, config: Config) -> CsResult<()> {
    let cache = ArtifactCache::open(&options.cache_dir, options.force_refresh)?;
    let filter = YearFilter {
        min_year: config.min_year,
        max_year: config.max_year,
    };

    let (registration_pubs, reg_max_year) =
        load_corpus(&cache, options.registration.as_deref(), "REG", &filter)?;
    let (renewal_pubs, ren_max_year) =
        load_corpus(&cache, options.renewal.as_deref(), "REN", &filter)?;

    let corpora_max_year = match (reg_max_year, ren_max_year) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    let registration = build_index(
        &cache,
        "index-reg",
        options.registration.as_deref(),
        &filter,
        &registration_pubs,
    )?;
    let renewal = build_index(
        &cache,
        "index-ren",
        options.renewal.as_deref(),
        &filter,
        &renewal_pubs,
    )?;

    let detector = build_detector(&cache, options, &config, &registration_pubs, &renewal_pubs)?;
    drop(registration_pubs);
    drop(renewal_pubs);

    log::info!(
        "Reference data ready: {} registrations, {} renewals",
        registration.len(),
        renewal.len()
    );

    // Spill the catalog to per-batch work files.
    let temp = TempRegistry::new();
    let batch_dir = job_scratch_dir(&options.temp_dir, "batches");
    temp.register(&batch_dir);

    let loader = MarcLoader::new(&options.marc_path, &config);
    let extraction = match loader.extract_to_dir(&batch_dir) {
        Ok(e) => e,
        Err(e) => {
            temp.cleanup();
            return Err(e);
        }
    };
    if extraction.batch_paths.is_empty() {
        temp.cleanup();
        return Err(CsError::Message(format!(
            "no usable records found in {}",
            options.marc_path
        )));
    }

    let context = WorkerContext {
        config,
        registration,
        renewal,
        detector,
        max_data_year: corpora_max_year,
        result_dir: job_scratch_dir(&options.temp_dir, "results"),
    };

    let coordinator = BatchCoordinator::new(context, temp)?;
    let mut results = coordinator.run(&extraction.batch_paths)?;
    results.statistics.skipped_records += extraction.counts.records_skipped;

    let exporter = JsonExporter {
        single_file: options.single_file,
        pretty: true,
    };
    exporter.export(&results, Path::new(&options.output))?;

    let s = &results.statistics;
    println!("Records analyzed:      {}", s.total_records);
    println!("  US records:          {}", s.us_records);
    println!("  Non-US records:      {}", s.non_us_records);
    println!("  Unknown country:     {}", s.unknown_country);
    println!("Registration matches:  {}", s.registration_matches);
    println!("Renewal matches:       {}", s.renewal_matches);
    println!("No matches:            {}", s.no_matches);
    println!("Skipped records:       {}", s.skipped_records);
    println!("Records with errors:   {}", s.records_with_errors);
    println!("Failed batches:        {}", s.failed_batches);
    println!("Statuses:");
    for (status, count) in &s.status_counts {
        println!("  {status}: {count}");
    }
    println!("Results written to {}", options.output);

    Ok(())
}

/// Load one reference corpus through the cache.  Returns the parsed
/// publications and the latest year observed in the corpus.
fn load_corpus(
    cache: &ArtifactCache,
    path: Option<&str>,
    label: &str,
    filter: &YearFilter,
) -> CsResult<(Vec<Publication>, Option<i32>)> {
    let path = match path {
        Some(p) => p,
        None => {
            log::warn!("No {label} corpus supplied; matches on that side are impossible");
            return Ok((Vec::new(), None));
        }
    };

    let signature = ArtifactCache::file_signature(Path::new(path))?;
    let key = ArtifactCache::key_of(&[
        &signature,
        &format!("{:?}", filter.min_year),
        &format!("{:?}", filter.max_year),
    ]);

    let (mut publications, max_year): (Vec<Publication>, Option<i32>) = cache.get_or_build(
        &format!("corpus-{}", label.to_lowercase()),
        &key,
        || {
            let mut loader = JsonlLoader::new(path, label);
            let publications = loader.load(filter)?;
            let max_year = loader.max_data_year();
            Ok((publications, max_year))
        },
    )?;

    for p in publications.iter_mut() {
        p.refresh_caches();
    }
    Ok((publications, max_year))
}

fn build_index(
    cache: &ArtifactCache,
    name: &str,
    path: Option<&str>,
    filter: &YearFilter,
    publications: &[Publication],
) -> CsResult<CandidateIndex> {
    let path = match path {
        Some(p) => p,
        None => return Ok(CandidateIndex::new()),
    };

    let signature = ArtifactCache::file_signature(Path::new(path))?;
    let key = ArtifactCache::key_of(&[
        &signature,
        &format!("{:?}", filter.min_year),
        &format!("{:?}", filter.max_year),
    ]);

    let mut index: CandidateIndex = cache.get_or_build(name, &key, || {
        let mut index = CandidateIndex::new();
        for p in publications {
            index.add(p.clone());
        }
        log::info!("Built {name}: {:?}", index.stats());
        Ok(index)
    })?;

    index.refresh_caches();
    Ok(index)
}

fn build_detector(
    cache: &ArtifactCache,
    options: &AnalyzeOptions,
    config: &Config,
    registration: &[Publication],
    renewal: &[Publication],
) -> CsResult<GenericTitleDetector> {
    let mut key_parts: Vec<String> = vec![
        format!("freq={}", config.generic_frequency_threshold),
        config.generic_title_patterns.join(","),
    ];
    for path in [&options.registration, &options.renewal].into_iter().flatten() {
        key_parts.push(ArtifactCache::file_signature(Path::new(path))?);
    }
    let key_refs: Vec<&str> = key_parts.iter().map(|s| s.as_str()).collect();
    let key = ArtifactCache::key_of(&key_refs);

    cache.get_or_build("detector", &key, || {
        let mut detector = GenericTitleDetector::new(
            config.generic_title_patterns.iter().cloned(),
            config.generic_frequency_threshold,
        );
        for p in registration.iter().chain(renewal.iter()) {
            detector.add_title(p.title(), p.language);
        }
        log::info!(
            "Built generic-title detector over {} distinct titles",
            detector.distinct_titles()
        );
        Ok(detector)
    })
}

fn print_help(opts: &getopts::Options) {
    println!(
        "{}",
        opts.usage(
            r#"Determine the US copyright status of MARC bibliographic records.

Usage:
    copystat-analyze --marc-xml PATH --registration REG.jsonl --renewal REN.jsonl [options]"#
        )
    );
}
