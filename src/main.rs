use clap::{App, Arg};
use crds_select::{best_references, cache, validate, FsLocate, Header, LoadOptions};
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = App::new("crds-select")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolves calibration reference files against a pipeline context")
        .arg(Arg::with_name("context").required(true).help("pipeline mapping basename, e.g. hst.pmap"))
        .arg(
            Arg::with_name("header")
                .multiple(true)
                .help("KEY=VALUE header fields, e.g. INSTRUME=ACS DETECTOR=WFC"),
        )
        .arg(
            Arg::with_name("bypass-checksum")
                .long("bypass-checksum")
                .help("skip sha1sum verification while loading mappings"),
        )
        .arg(
            Arg::with_name("validate")
                .long("validate")
                .help("run offline valid-value validation against the loaded context instead of resolving"),
        )
        .arg(Arg::with_name("verbose").short("v").long("verbose").help("emit debug-level logging"))
        .get_matches();

    let level = if matches.is_present("verbose") { log::Level::Debug } else { log::Level::Info };
    simple_logger::init_with_level(level).expect("logger already initialized");

    let context = matches.value_of("context").expect("required by clap");
    let header = match parse_header(matches.values_of("header").map(|v| v.collect()).unwrap_or_default()) {
        Ok(h) => h,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let locate = FsLocate::from_env();
    let options = LoadOptions { bypass_checksum: matches.is_present("bypass-checksum") };

    if matches.is_present("validate") {
        let mapping = match cache::global().load(context, &locate, &options) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("error loading {context}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let collaborators = crds_select::NullCollaborators;
        let errors = validate(&mapping, &collaborators);
        if errors.is_empty() {
            println!("{context}: no certification violations found");
            ExitCode::SUCCESS
        } else {
            for err in &errors {
                println!("{err}");
            }
            ExitCode::FAILURE
        }
    } else {
        match best_references(context, &header, cache::global(), &locate, &options) {
            Ok(results) => {
                let mut reftypes: Vec<_> = results.keys().cloned().collect();
                reftypes.sort();
                for reftype in reftypes {
                    println!("{reftype} = {}", results[&reftype]);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        }
    }
}

fn parse_header(pairs: Vec<&str>) -> Result<Header, String> {
    let mut header = Header::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| format!("'{pair}' is not KEY=VALUE"))?;
        header.insert(key, value);
    }
    Ok(header)
}
