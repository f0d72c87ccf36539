use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use lindex::Index;

#[derive(Debug, StructOpt)]
#[structopt(name = "find", about = "Look up a key in an index")]
struct CommandLineArgs {
    #[structopt(parse(from_os_str))]
    index_file: PathBuf,

    key: String,
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

    let result = index.find(opts.key.as_bytes());
    let exit_code = match result {
        Ok(Some((offset, line))) => {
            println!("offset: {}", offset);
            println!("{}", line);
            0
        }
        Ok(None) => {
            println!("not found: {:?}", opts.key);
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
