use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use lindex::Index;

#[derive(Debug, StructOpt)]
#[structopt(name = "list", about = "Print up to k lines whose keys are >= a probe key")]
struct CommandLineArgs {
    #[structopt(parse(from_os_str))]
    index_file: PathBuf,

    probe_key: String,

    k: usize,
}

fn main() {
    env_logger::init();
    let opts = CommandLineArgs::from_args();

    let mut index = match Index::open(&opts.index_file) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match index.list(opts.probe_key.as_bytes(), opts.k) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            0
        }
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };

    if let Err(e) = index.close() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
    process::exit(exit_code);
}
