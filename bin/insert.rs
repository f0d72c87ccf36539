use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use lindex::{Index, InsertOutcome};

#[derive(Debug, StructOpt)]
#[structopt(name = "insert", about = "Append a record to the data file and index it")]
struct CommandLineArgs {
    #[structopt(parse(from_os_str))]
    index_file: PathBuf,

    record: String,
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

    let exit_code = match index.insert_record(&opts.record) {
        Ok(InsertOutcome::Inserted { offset }) => {
            println!("inserted at offset {}", offset);
            0
        }
        Ok(InsertOutcome::AlreadyPresent { offset }) => {
            println!("key already indexed at offset {}", offset);
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
