use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use freqcount::compare::{compare, spread_by_key};
use freqcount::{CsurosCounter, ExactCounter, LossyCounter};

enum FileType {
    Int,
    UInt,
    Text,
}

enum Mode {
    All,
    Exact,
    Csuros,
    Lossy,
}

struct Configuration {
    mode:     Mode,
    bases:    Vec<f64>,
    runs:     usize,
    seed:     Option<u64>,
    epsilons: Vec<f64>,
    support:  Option<f64>,
    top:      usize,
    jobs:     usize,
    ftype:    FileType,
    output:   String,
}

fn load<T>(filepath: &String) -> Vec<T>
where
    T: str::FromStr,
{
    let file = File::open(filepath).unwrap();

    let reader = BufReader::new(file);

    let mut keys = Vec::with_capacity(10000);

    let mut skipped = 0;

    for line in reader.lines() {
        let line = line.unwrap();

        let line = line.trim();

        if line.is_empty() {
            skipped += 1;

            continue;
        }

        match line.parse::<T>() {
            Ok(key) => keys.push(key),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        println!("{}: skipped {} malformed lines", filepath, skipped);
    }

    keys
}

fn run<T>(conf: Configuration, args: Vec<String>, pos: usize)
where
    T: str::FromStr
        + fmt::Display
        + Hash
        + Eq
        + Ord
        + Clone
        + Send
        + Sync
        + 'static,
{
    for filepath in &args[pos..] {
        evaluate_file::<T>(&conf, filepath);
    }
}

fn evaluate_file<T>(conf: &Configuration, filepath: &String)
where
    T: str::FromStr
        + fmt::Display
        + Hash
        + Eq
        + Ord
        + Clone
        + Send
        + Sync
        + 'static,
{
    let keys: Arc<Vec<T>> = Arc::new(load(filepath));

    if keys.is_empty() {
        println!("{}: no keys, skipping", filepath);

        return;
    }

    let basename = Path::new(filepath).file_name().unwrap().to_str().unwrap();

    let started = Instant::now();

    let mut exact = ExactCounter::new();

    exact.observe_all(keys.iter().cloned());

    println!(
        "{}: {} keys, {} distinct ({:?})",
        basename,
        exact.total(),
        exact.distinct(),
        started.elapsed()
    );

    match conf.mode {
        Mode::All | Mode::Exact => report_exact(conf, basename, &exact),
        _ => {},
    }

    match conf.mode {
        Mode::All | Mode::Csuros => {
            report_csuros(conf, basename, &keys, &exact)
        },
        _ => {},
    }

    match conf.mode {
        Mode::All | Mode::Lossy => {
            report_lossy(conf, basename, &keys[..], &exact)
        },
        _ => {},
    }
}

fn report_exact<T>(conf: &Configuration, basename: &str, exact: &ExactCounter<T>)
where
    T: Hash + Eq + Ord + fmt::Display,
{
    let filepath = Path::new(&conf.output).join(format!("exact-{}", basename));

    let file = File::create(filepath).unwrap();

    let mut writer = BufWriter::new(file);

    write!(writer, "key,count\n").unwrap();

    let table = exact.most_frequent(exact.distinct()).unwrap();

    for &(key, count) in &table {
        write!(writer, "{},{}\n", key, count).unwrap();
    }

    writer.flush().unwrap();

    println!("exact: top {}:", conf.top);

    for &(key, count) in &exact.most_frequent(conf.top).unwrap() {
        println!("  {} {}", key, count);
    }

    println!("exact: bottom {}:", conf.top);

    for &(key, count) in &exact.least_frequent(conf.top).unwrap() {
        println!("  {} {}", key, count);
    }
}

fn report_csuros<T>(
    conf: &Configuration,
    basename: &str,
    keys: &Arc<Vec<T>>,
    exact: &ExactCounter<T>,
) where
    T: Hash + Eq + Ord + Clone + fmt::Display + Send + Sync + 'static,
{
    let filepath = Path::new(&conf.output).join(format!("csuros-{}", basename));

    let file = File::create(filepath).unwrap();

    let mut writer = BufWriter::new(file);

    write!(writer, "base,key,exact,min-est,max-est,mean-est\n").unwrap();

    for (base_index, &base) in conf.bases.iter().enumerate() {
        let started = Instant::now();

        let runs = csuros_runs(conf, keys, base, base_index);

        let mut rel_means = Vec::new();
        let mut precisions = Vec::new();
        let mut recalls = Vec::new();
        let mut f1s = Vec::new();

        for estimates in &runs {
            let comparison =
                compare(exact.counts(), estimates, conf.top).unwrap();

            if let Some(summary) = comparison.relative {
                rel_means.push(summary.mean);
            }

            precisions.push(comparison.overlap.precision);
            recalls.push(comparison.overlap.recall);
            f1s.push(comparison.overlap.f1);
        }

        let spread = spread_by_key(&runs);

        let mut spread_keys: Vec<&T> = spread.keys().collect();

        spread_keys.sort_by(|a, b| {
            exact
                .count(*b)
                .cmp(&exact.count(*a))
                .then_with(|| a.cmp(b))
        });

        for key in spread_keys {
            let estimates = &spread[key];

            write!(
                writer,
                "{},{},{},{},{},{}\n",
                base,
                key,
                exact.count(key),
                estimates.min,
                estimates.max,
                estimates.mean
            )
            .unwrap();
        }

        println!(
            "csuros: base {}: {} runs, mean-rel-err {} ({:?})",
            base,
            runs.len(),
            mean(&rel_means),
            started.elapsed()
        );

        println!(
            "csuros: base {}: top-{} precision {} recall {} f1 {}",
            base,
            conf.top,
            mean(&precisions),
            mean(&recalls),
            mean(&f1s)
        );
    }

    writer.flush().unwrap();
}

fn csuros_runs<T>(
    conf: &Configuration,
    keys: &Arc<Vec<T>>,
    base: f64,
    base_index: usize,
) -> Vec<HashMap<T, f64>>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
{
    let cursor = Arc::new(Mutex::new(0usize));

    let total_runs = conf.runs;
    let seed = conf.seed;

    let threads: Vec<thread::JoinHandle<Vec<(usize, HashMap<T, f64>)>>> =
        (0..conf.jobs)
            .map(|_| {
                let keys = Arc::clone(keys);
                let cursor = Arc::clone(&cursor);

                thread::spawn(move || {
                    let mut results = Vec::new();

                    loop {
                        let run;

                        {
                            let mut cursor = cursor.lock().unwrap();

                            if *cursor == total_runs {
                                break;
                            }

                            run = *cursor;

                            *cursor += 1;

                            println!(
                                "csuros: base {} run {}/{}",
                                base,
                                run + 1,
                                total_runs
                            );
                        }

                        let mut counter = match seed {
                            Some(seed) => CsurosCounter::with_seed(
                                base,
                                seed + (base_index * total_runs + run) as u64,
                            )
                            .unwrap(),
                            None => CsurosCounter::new(base).unwrap(),
                        };

                        counter.observe_all(keys.iter().cloned());

                        results.push((run, counter.estimates()));
                    }

                    results
                })
            })
            .collect();

    let mut runs: Vec<(usize, HashMap<T, f64>)> = Vec::new();

    for thread in threads {
        match thread.join() {
            Ok(results) => runs.extend(results),
            Err(_) => panic!("csuros worker thread panicked."),
        }
    }

    runs.sort_by_key(|&(run, _)| run);

    runs.into_iter().map(|(_, estimates)| estimates).collect()
}

fn report_lossy<T>(
    conf: &Configuration,
    basename: &str,
    keys: &[T],
    exact: &ExactCounter<T>,
) where
    T: Hash + Eq + Ord + Clone + fmt::Display,
{
    let filepath = Path::new(&conf.output).join(format!("lossy-{}", basename));

    let file = File::create(filepath).unwrap();

    let mut writer = BufWriter::new(file);

    write!(writer, "epsilon,support,key,count,exact\n").unwrap();

    for &epsilon in &conf.epsilons {
        let support = match conf.support {
            Some(support) => support,
            None => (2.0 * epsilon).min(1.0),
        };

        let started = Instant::now();

        let mut counter: LossyCounter<T> = LossyCounter::new(epsilon).unwrap();

        counter.observe_all(keys.iter().cloned());

        let reported = counter.frequent(support).unwrap();

        for &(key, count) in &reported {
            write!(
                writer,
                "{},{},{},{},{}\n",
                epsilon,
                support,
                key,
                count,
                exact.count(key)
            )
            .unwrap();
        }

        println!(
            "lossy: eps {}: {} frequent at support {}, tracked {} (peak {}), {} prunes ({:?})",
            epsilon,
            reported.len(),
            support,
            counter.tracked(),
            counter.peak_tracked(),
            counter.prunes(),
            started.elapsed()
        );

        let comparison =
            compare(exact.counts(), &counter.counts(), conf.top).unwrap();

        if let Some(summary) = comparison.absolute {
            println!(
                "lossy: eps {}: abs err mean {} max {} (bound {})",
                epsilon,
                summary.mean,
                summary.max,
                epsilon * counter.total() as f64
            );
        }

        println!(
            "lossy: eps {}: top-{} precision {} recall {} f1 {}",
            epsilon,
            conf.top,
            comparison.overlap.precision,
            comparison.overlap.recall,
            comparison.overlap.f1
        );
    }

    writer.flush().unwrap();
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

fn parse_f64_list(arg: &str, message: &str) -> Vec<f64> {
    arg.split(',')
        .map(|part| part.trim().parse::<f64>().expect(message))
        .collect()
}

fn usage() {
    println!("evaluate [OPTIONS] [INPUT FILE]...");
    println!("         [--mode all|exact|csuros|lossy] [--base LIST] [--runs RUNS]");
    println!("         [--seed SEED] [--eps LIST] [--support SUPPORT] [--top N]");
    println!("         [--jobs JOBS] [--type TYPE] [--output LOCATION]");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut conf = Configuration {
        mode:     Mode::All,
        bases:    vec![1.3, 1.5, 2.0, 3.0, 4.0],
        runs:     10,
        seed:     None,
        epsilons: vec![0.1, 0.05, 0.01, 0.005, 0.001],
        support:  None,
        top:      10,
        jobs:     1,
        ftype:    FileType::UInt,
        output:   String::from("./"),
    };

    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-m" | "--mode" => {
                conf.mode = match args[i + 1].as_str() {
                    "all" => Mode::All,
                    "exact" => Mode::Exact,
                    "csuros" => Mode::Csuros,
                    "lossy" => Mode::Lossy,
                    _ => panic!("Failed to parse mode"),
                };

                i += 2;
            },
            "-b" | "--base" => {
                conf.bases =
                    parse_f64_list(&args[i + 1], "Failed to parse base.");

                i += 2;
            },
            "-r" | "--runs" => {
                conf.runs = args[i + 1]
                    .parse::<usize>()
                    .expect("Failed to parse runs.");

                if conf.runs == 0 {
                    panic!("Runs must be positive.");
                }

                i += 2;
            },
            "-s" | "--seed" => {
                conf.seed = Some(
                    args[i + 1]
                        .parse::<u64>()
                        .expect("Failed to parse seed."),
                );

                i += 2;
            },
            "-e" | "--eps" => {
                conf.epsilons =
                    parse_f64_list(&args[i + 1], "Failed to parse epsilon.");

                i += 2;
            },
            "-p" | "--support" => {
                conf.support = Some(
                    args[i + 1]
                        .parse::<f64>()
                        .expect("Failed to parse support."),
                );

                i += 2;
            },
            "-n" | "--top" => {
                conf.top = args[i + 1]
                    .parse::<usize>()
                    .expect("Failed to parse top.");

                if conf.top == 0 {
                    panic!("Top must be positive.");
                }

                i += 2;
            },
            "-j" | "--jobs" => {
                conf.jobs = args[i + 1]
                    .parse::<usize>()
                    .expect("Failed to parse jobs.");

                if conf.jobs == 0 {
                    panic!("Jobs must be positive.");
                }

                i += 2;
            },
            "-t" | "--type" => {
                conf.ftype = match args[i + 1].as_str() {
                    "t" => FileType::Text,
                    "i" => FileType::Int,
                    "u" => FileType::UInt,
                    _ => panic!("Failed to parse type"),
                };

                i += 2;
            },
            "-o" | "--output" => {
                conf.output = args[i + 1].clone();

                i += 2;
            },
            "-h" | "--help" => {
                usage();
                std::process::exit(0);
            },
            _ => {
                break;
            },
        }
    }

    if i == args.len() {
        usage();
        std::process::exit(0);
    }

    match conf.ftype {
        FileType::Text => run::<String>(conf, args, i),
        FileType::UInt => run::<u64>(conf, args, i),
        FileType::Int => run::<i64>(conf, args, i),
    }
}
