use std::{env, path::PathBuf, process::ExitCode};

use mrcoils::{phantom::Phantom, DatasetFile, ReconConfig};

const USE_MESSAGE : &str = "\x1b[31mUsage: compute_csm <input> \
    [-s <smoothness>] [-o <output_path>] [-c <config.json>] [-v]\n       \
    compute_csm --phantom <output_path>\x1b[0m";

macro_rules! send_use_msg {
    () => {{
        eprintln!("{}", USE_MESSAGE);
        return ExitCode::FAILURE;
    }};
}

/// Estimates coil sensitivity maps from an acquisition dataset file
/// and writes them, tagged `csm`, to a new dataset file.
///
/// If `-o` is not specified, the maps go next to the input with the
/// extension `.csm.mrd`. `-s` overrides the smoothness of the
/// configuration (default 1). `--phantom` writes a synthetic
/// 4-slice, 8-coil acquisition file to try things out on.
///
/// # Example
///
/// ```
/// compute_csm --phantom phantom.mrd
/// compute_csm phantom.mrd -s 3 -o maps.mrd -v
/// ```
fn main() -> ExitCode {
    let args : Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {send_use_msg!();}

    if args[0] == "--phantom" {
        let Some(path) = args.get(1) else { send_use_msg!() };
        let written = DatasetFile::open(path, true)
            .and_then(|dataset| Phantom::new(64, 64, 8, 4).with_readout(128).write(&dataset));
        return match written {
            Ok(()) => {
                println!("Wrote phantom acquisitions to {}", path);
                ExitCode::SUCCESS
            },
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            },
        };
    }

    let input = PathBuf::from(&args[0]);
    let mut config = ReconConfig::default();
    let mut smoothness = None;
    let mut output = None;

    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-s" => {
                let Some(value) = rest.next() else { send_use_msg!() };
                match value.parse::<u32>() {
                    Ok(s) => smoothness = Some(s),
                    Err(_) => send_use_msg!(),
                }
            },
            "-o" => {
                let Some(value) = rest.next() else { send_use_msg!() };
                output = Some(PathBuf::from(value));
            },
            "-c" => {
                let Some(value) = rest.next() else { send_use_msg!() };
                config = match ReconConfig::from_json_file(value) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error reading {}: {}", value, e);
                        return ExitCode::FAILURE;
                    },
                };
            },
            "-v" => config.verbose = true,
            _ => send_use_msg!(),
        }
    }
    if let Some(s) = smoothness {
        config.csm_smoothness = s;
    }
    let output = output.unwrap_or_else(|| input.with_extension("csm.mrd"));

    match mrcoils::compute_csm_file(&input, &output, &config) {
        Ok(n) => {
            println!("Wrote {} coil sensitivity maps to {}", n, output.display());
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
